//! Bounded scan history
//!
//! History is a newest-first sequence of [`HistoryEntry`] values capped at a
//! fixed capacity. The whole sequence is persisted as one JSON document under
//! [`HISTORY_KEY`], so every saved state is complete and within the bound.
//! Persistence is best-effort: load failures yield an empty history and save
//! failures are logged, never surfaced to the scan pipeline.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::KeyValueStore;
use crate::nutrition::NutritionRecord;

/// Settings key holding the JSON-encoded history
pub const HISTORY_KEY: &str = "ml_history";

/// Default number of entries kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// One past scan result
///
/// Serialized flat: the record's fields plus `timestamp` (epoch milliseconds)
/// and `thumb`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: NutritionRecord,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Display reference for the scanned image (a filesystem path)
    #[serde(rename = "thumb", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl HistoryEntry {
    /// Create an entry stamped with the current time
    ///
    /// The timestamp is truncated to the millisecond precision it is stored at.
    pub fn new(record: NutritionRecord, thumbnail: Option<String>) -> Self {
        Self {
            record,
            timestamp: Utc::now().trunc_subsecs(3),
            thumbnail,
        }
    }

    /// Thumbnail path, if it still points at an existing file
    pub fn thumbnail_path(&self) -> Option<&Path> {
        self.thumbnail
            .as_deref()
            .map(Path::new)
            .filter(|path| path.exists())
    }
}

/// Newest-first, size-bounded history with injected persistence
pub struct HistoryStore {
    entries: Arc<Vec<HistoryEntry>>,
    capacity: usize,
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    /// Load persisted history
    ///
    /// Missing, unreadable, or corrupt data yields an empty history.
    pub async fn load(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        let mut entries = match store.get(HISTORY_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Vec<HistoryEntry>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring corrupt scan history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Scan history unavailable, starting empty: {}", e);
                Vec::new()
            }
        };

        entries.truncate(capacity);
        debug!(entries = entries.len(), capacity, "Loaded scan history");

        Self {
            entries: Arc::new(entries),
            capacity,
            store,
        }
    }

    /// Snapshot of the current sequence, newest first
    pub fn entries(&self) -> Arc<Vec<HistoryEntry>> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    /// Insert at the front, evict beyond capacity, persist
    pub async fn append(&mut self, mut entry: HistoryEntry) {
        // Keep timestamps non-decreasing toward the front even if the clock stepped back
        if let Some(front) = self.entries.first() {
            if entry.timestamp < front.timestamp {
                entry.timestamp = front.timestamp;
            }
        }

        let mut next = Vec::with_capacity(self.capacity.min(self.entries.len() + 1));
        next.push(entry);
        next.extend(self.entries.iter().cloned());
        next.truncate(self.capacity);

        self.persist(&next).await;
        self.entries = Arc::new(next);
    }

    /// Empty the history and delete the persisted slot
    pub async fn clear(&mut self) {
        if let Err(e) = self.store.remove(HISTORY_KEY).await {
            warn!("Failed to remove persisted scan history: {}", e);
        }
        self.entries = Arc::new(Vec::new());
    }

    async fn persist(&self, entries: &[HistoryEntry]) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode scan history: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(HISTORY_KEY, &json).await {
            warn!("Failed to persist scan history: {}", e);
        }
    }
}
