//! Bounded log of recently answered queries.
//!
//! The whole log is one JSON array stored under a single key. An append reads
//! the array, pushes the new entry, keeps the newest [`HISTORY_CAPACITY`]
//! entries and writes the array back with one replace.
//!
//! Appends from this process are serialised by an async mutex. Processes that
//! share the same Redis key are not coordinated: two of them appending at the
//! same moment can each read the old array, and the later write wins, dropping
//! the other's entry. The "newest four entries" contract still holds for
//! whatever survives.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::{Result, WeatherChatError};
use crate::kv::KvStore;
use crate::models::HistoryEntry;

pub const HISTORY_CAPACITY: usize = 4;

pub struct HistoryStore {
    kv: Arc<dyn KvStore>,
    key: String,
    op_timeout: Duration,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KvStore>, key: String, op_timeout: Duration) -> Self {
        Self {
            kv,
            key,
            op_timeout,
            write_lock: Mutex::new(()),
        }
    }

    /// Entries oldest first, newest last. Any read problem yields an empty list.
    pub async fn list(&self) -> Vec<HistoryEntry> {
        let blob = match self.read_blob().await {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("History read failed, returning empty history: {}", e);
                return Vec::new();
            }
        };
        decode(blob).unwrap_or_else(|e| {
            tracing::warn!("Stored history is unreadable, returning empty history: {}", e);
            Vec::new()
        })
    }

    /// Record an entry, evicting the oldest beyond capacity. Failures are logged and dropped.
    pub async fn append(&self, entry: HistoryEntry) {
        if let Err(e) = self.try_append(entry).await {
            tracing::warn!("History append failed (non-critical): {}", e);
        }
    }

    pub async fn try_append(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        // A failed read must not be written back as an empty log.
        let blob = self.read_blob().await?;
        // A corrupt blob is replaced rather than blocking new entries.
        let mut entries = decode(blob).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable history: {}", e);
            Vec::new()
        });
        entries.push(entry);
        if entries.len() > HISTORY_CAPACITY {
            let overflow = entries.len() - HISTORY_CAPACITY;
            entries.drain(..overflow);
        }

        let blob = serde_json::to_string(&entries)?;
        timeout(self.op_timeout, self.kv.put(&self.key, &blob))
            .await
            .map_err(|_| WeatherChatError::Kv("history write timed out".to_string()))??;

        tracing::debug!("History now holds {} entries", entries.len());
        Ok(())
    }

    async fn read_blob(&self) -> Result<Option<String>> {
        timeout(self.op_timeout, self.kv.get(&self.key))
            .await
            .map_err(|_| WeatherChatError::Kv("history read timed out".to_string()))?
    }
}

/// A missing or blank blob is an empty log.
fn decode(blob: Option<String>) -> Result<Vec<HistoryEntry>> {
    match blob {
        Some(blob) if !blob.trim().is_empty() => Ok(serde_json::from_str(&blob)?),
        _ => Ok(Vec::new()),
    }
}
