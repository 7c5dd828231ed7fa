//! Async transport abstraction used by the tracking controller

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::Transport;

/// Trait for asynchronous request delivery
///
/// Resolves exactly once with the outcome of the send.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    /// Send a GET request, resolving to `true` iff the collector answered 2xx
    async fn send(&self, request: String) -> bool;
}

/// Runs a blocking [`Transport`] on tokio's blocking thread pool
pub struct BlockingAdapter<T> {
    inner: Arc<T>,
}

impl<T> BlockingAdapter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[async_trait]
impl<T: Transport + 'static> AsyncTransport for BlockingAdapter<T> {
    async fn send(&self, request: String) -> bool {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.send(&request)).await {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!("Transport worker did not complete: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock transport for testing
    ///
    /// Records every request. Outcomes are taken from `outcomes` in order;
    /// once exhausted every send succeeds.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        pub requests: Arc<Mutex<Vec<String>>>,
        pub outcomes: Arc<Mutex<VecDeque<bool>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn push_outcome(&self, delivered: bool) {
            self.outcomes.lock().unwrap().push_back(delivered);
        }

        pub fn fail_next(&self, count: usize) {
            for _ in 0..count {
                self.push_outcome(false);
            }
        }
    }

    #[async_trait]
    impl AsyncTransport for MockTransport {
        async fn send(&self, request: String) -> bool {
            self.requests.lock().unwrap().push(request);
            self.outcomes.lock().unwrap().pop_front().unwrap_or(true)
        }
    }
}
