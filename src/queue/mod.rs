//! # Position Queue Module
//!
//! Durable FIFO of positions waiting for delivery.
//!
//! This module handles:
//! - The [`PositionQueue`] contract used by the tracking controller
//! - A JSON Lines journal implementation ([`file::FileQueue`])
//!
//! Entries get their id on insert; the id is the only handle used to delete
//! them. `select_oldest` always returns the earliest inserted pending entry.

pub mod file;

use async_trait::async_trait;

use crate::error::Result;
use crate::position::Position;

pub use file::FileQueue;

/// Persistent store of undelivered positions
#[async_trait]
pub trait PositionQueue: Send + Sync {
    /// Persist a position, returning its assigned id
    async fn insert(&self, position: &Position) -> Result<u64>;

    /// Oldest pending position (with its id set), if any
    async fn select_oldest(&self) -> Result<Option<Position>>;

    /// Remove a position by id; unknown ids are not an error
    async fn delete(&self, id: u64) -> Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::RelayError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Operation recorded by [`MockQueue`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum QueueOp {
        Insert(u64),
        Select(Option<u64>),
        Delete(u64),
    }

    #[derive(Default)]
    struct MockState {
        entries: VecDeque<Position>,
        next_id: u64,
        ops: Vec<QueueOp>,
        inserted: Vec<Position>,
        insert_failures: usize,
        select_failures: usize,
        delete_failures: usize,
    }

    /// In-memory queue with failure injection for testing
    #[derive(Clone, Default)]
    pub struct MockQueue {
        state: Arc<Mutex<MockState>>,
    }

    impl MockQueue {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a position as if a previous run had stored it
        pub fn preload(&self, position: Position) -> u64 {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push_back(position.with_id(id));
            id
        }

        pub fn entries(&self) -> Vec<Position> {
            self.state.lock().unwrap().entries.iter().cloned().collect()
        }

        /// Every position successfully inserted, including delivered ones
        pub fn inserted(&self) -> Vec<Position> {
            self.state.lock().unwrap().inserted.clone()
        }

        pub fn ops(&self) -> Vec<QueueOp> {
            self.state.lock().unwrap().ops.clone()
        }

        pub fn select_count(&self) -> usize {
            self.ops().iter().filter(|op| matches!(op, QueueOp::Select(_))).count()
        }

        pub fn fail_inserts(&self, count: usize) {
            self.state.lock().unwrap().insert_failures = count;
        }

        pub fn fail_selects(&self, count: usize) {
            self.state.lock().unwrap().select_failures = count;
        }

        pub fn fail_deletes(&self, count: usize) {
            self.state.lock().unwrap().delete_failures = count;
        }
    }

    fn injected(counter: &mut usize, op: &str) -> Result<()> {
        if *counter > 0 {
            *counter -= 1;
            return Err(RelayError::Queue(format!("Mock {} error", op)));
        }
        Ok(())
    }

    #[async_trait]
    impl PositionQueue for MockQueue {
        async fn insert(&self, position: &Position) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            injected(&mut state.insert_failures, "insert")?;
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push_back(position.with_id(id));
            state.inserted.push(position.with_id(id));
            state.ops.push(QueueOp::Insert(id));
            Ok(id)
        }

        async fn select_oldest(&self) -> Result<Option<Position>> {
            let mut state = self.state.lock().unwrap();
            injected(&mut state.select_failures, "select")?;
            let oldest = state.entries.front().cloned();
            state.ops.push(QueueOp::Select(oldest.as_ref().and_then(|p| p.id)));
            Ok(oldest)
        }

        async fn delete(&self, id: u64) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            injected(&mut state.delete_failures, "delete")?;
            state.entries.retain(|p| p.id != Some(id));
            state.ops.push(QueueOp::Delete(id));
            Ok(())
        }
    }
}
