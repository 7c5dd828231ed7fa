//! # Journal-backed Position Queue
//!
//! Stores the queue as an append-only JSON Lines journal:
//!
//! ```text
//! {"op":"insert","position":{"id":0,"device_id":"PHONE001",...}}
//! {"op":"insert","position":{"id":1,"device_id":"PHONE001",...}}
//! {"op":"delete","id":0}
//! ```
//!
//! Replaying the journal on open rebuilds the pending entries in insertion
//! order. Every record is synced to disk before the operation reports
//! success, so an acknowledged insert survives a crash. Once enough delete
//! records accumulate the journal is rewritten with only the pending entries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::PositionQueue;
use crate::error::{RelayError, Result};
use crate::position::Position;

/// One journal line
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalRecord {
    Insert { position: Position },
    Delete { id: u64 },
    /// Id high-water mark, written at the top of a compacted journal
    Mark { next_id: u64 },
}

struct Journal {
    file: File,
    /// Pending entries keyed by id; ids grow monotonically so key order is
    /// insertion order
    pending: BTreeMap<u64, Position>,
    next_id: u64,
    /// Delete records since the last compaction
    tombstones: usize,
    /// The file may end in a partial record; the next append starts a new line
    needs_newline: bool,
}

impl Journal {
    /// Append one record and sync it to disk
    ///
    /// A failure can leave part of the record behind. The next append then
    /// begins with a line break so the fragment never swallows a good record.
    async fn append(&mut self, record: &JournalRecord) -> Result<()> {
        let mut line = encode(record)?;
        if self.needs_newline {
            line.insert(0, '\n');
        }
        self.needs_newline = true;

        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RelayError::Queue(format!("Failed to append to journal: {}", e)))?;
        self.file
            .flush()
            .await
            .map_err(|e| RelayError::Queue(format!("Failed to flush journal: {}", e)))?;
        self.file
            .sync_data()
            .await
            .map_err(|e| RelayError::Queue(format!("Failed to sync journal: {}", e)))?;

        self.needs_newline = false;
        Ok(())
    }
}

/// Durable queue stored in a JSON Lines file
pub struct FileQueue {
    path: PathBuf,
    compact_threshold: usize,
    journal: Mutex<Journal>,
}

impl std::fmt::Debug for FileQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileQueue")
            .field("path", &self.path)
            .field("compact_threshold", &self.compact_threshold)
            .finish_non_exhaustive()
    }
}

impl FileQueue {
    /// Open (or create) the queue journal at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Journal file; parent directories are created if missing
    /// * `compact_threshold` - Delete records tolerated before the journal is rewritten
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the journal cannot be read or opened for append.
    /// Unparseable lines are skipped with a warning.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use track_relay::queue::{FileQueue, PositionQueue};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let queue = FileQueue::open("./data/positions.jsonl", 1000).await?;
    ///     if let Some(position) = queue.select_oldest().await? {
    ///         println!("oldest pending: {}", position);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn open<P: AsRef<Path>>(path: P, compact_threshold: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let ((pending, next_id, tombstones), torn_tail) = match fs::read(&path).await {
            Ok(contents) => (replay(&contents), contents.last().is_some_and(|&b| b != b'\n')),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ((BTreeMap::new(), 0, 0), false),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Opened position queue at {} ({} pending, next id {})",
            path.display(),
            pending.len(),
            next_id
        );

        let file = open_append(&path).await?;
        let queue = Self {
            path,
            compact_threshold,
            journal: Mutex::new(Journal {
                file,
                pending,
                next_id,
                tombstones,
                needs_newline: torn_tail,
            }),
        };

        {
            let mut journal = queue.journal.lock().await;
            if journal.tombstones >= queue.compact_threshold {
                queue.compact(&mut journal).await?;
            }
        }

        Ok(queue)
    }

    /// Number of pending positions
    pub async fn len(&self) -> usize {
        self.journal.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rewrite the journal with only the pending entries
    async fn compact(&self, journal: &mut Journal) -> Result<()> {
        let temp_path = self.path.with_extension("compact.tmp");

        let mut contents = encode(&JournalRecord::Mark {
            next_id: journal.next_id,
        })?;
        for position in journal.pending.values() {
            contents.push_str(&encode(&JournalRecord::Insert {
                position: position.clone(),
            })?);
        }

        let mut temp = File::create(&temp_path).await?;
        temp.write_all(contents.as_bytes()).await?;
        temp.sync_all().await?;
        drop(temp);

        fs::rename(&temp_path, &self.path).await?;
        journal.file = open_append(&self.path).await?;
        journal.needs_newline = false;

        debug!(
            "Compacted queue journal: dropped {} delete records, {} pending",
            journal.tombstones,
            journal.pending.len()
        );
        journal.tombstones = 0;
        Ok(())
    }
}

#[async_trait]
impl PositionQueue for FileQueue {
    async fn insert(&self, position: &Position) -> Result<u64> {
        let mut journal = self.journal.lock().await;

        // Reserve the id first so a half-written record never shares its id
        let id = journal.next_id;
        journal.next_id += 1;

        let stored = position.with_id(id);
        journal.append(&JournalRecord::Insert { position: stored.clone() }).await?;
        journal.pending.insert(id, stored);
        Ok(id)
    }

    async fn select_oldest(&self) -> Result<Option<Position>> {
        let journal = self.journal.lock().await;
        Ok(journal.pending.values().next().cloned())
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let mut journal = self.journal.lock().await;

        if !journal.pending.contains_key(&id) {
            debug!("Delete of unknown queue id {} ignored", id);
            return Ok(());
        }

        journal.append(&JournalRecord::Delete { id }).await?;
        journal.pending.remove(&id);
        journal.tombstones += 1;

        if journal.tombstones >= self.compact_threshold {
            self.compact(&mut journal).await?;
        }
        Ok(())
    }
}

/// Rebuild queue state from the raw journal
///
/// Lines are decoded one by one, so a record torn inside a multi-byte
/// character only costs that record.
fn replay(contents: &[u8]) -> (BTreeMap<u64, Position>, u64, usize) {
    let mut pending = BTreeMap::new();
    let mut next_id = 0;
    let mut tombstones = 0;

    for (line_no, raw) in contents.split(|&b| b == b'\n').enumerate() {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                warn!("Queue journal line {} is not UTF-8, skipping: {}", line_no + 1, e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalRecord>(line) {
            Ok(JournalRecord::Insert { position }) => match position.id {
                Some(id) => {
                    next_id = next_id.max(id + 1);
                    pending.insert(id, position);
                }
                None => warn!("Queue journal line {} has an insert without id, skipping", line_no + 1),
            },
            Ok(JournalRecord::Delete { id }) => {
                next_id = next_id.max(id + 1);
                pending.remove(&id);
                tombstones += 1;
            }
            Ok(JournalRecord::Mark { next_id: mark }) => {
                next_id = next_id.max(mark);
            }
            Err(e) => warn!("Queue journal line {} is corrupt, skipping: {}", line_no + 1, e),
        }
    }

    (pending, next_id, tombstones)
}

fn encode(record: &JournalRecord) -> Result<String> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

async fn open_append(path: &Path) -> Result<File> {
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(file)
}
