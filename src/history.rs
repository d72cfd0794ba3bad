//! Capped detection history.
//!
//! Entries are kept most-recent-first and persisted as one JSON list in the
//! history slot. The "active" result (what the risk report shows) lives in a
//! second slot and is dropped together with the history on `clear`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::AnalysisResult;
use crate::storage::{StateStore, ACTIVE_SLOT, HISTORY_SLOT};

/// Maximum number of entries kept.
pub const MAX_HISTORY_ENTRIES: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Service reference to the rendered image.
    pub image_ref: Option<String>,
    pub crop_count: u32,
    pub weed_count: u32,
    pub average_confidence: f32,
    pub full_result: AnalysisResult,
}

impl HistoryEntry {
    pub fn new(result: AnalysisResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            image_ref: result.predicted_image().map(str::to_string),
            crop_count: result.crop_count(),
            weed_count: result.weed_count(),
            average_confidence: result.average_confidence(),
            full_result: result,
        }
    }

    pub fn now(result: AnalysisResult) -> Self {
        Self::new(result, Utc::now())
    }
}

pub struct HistoryStore<S: StateStore> {
    store: S,
    entries: Vec<HistoryEntry>,
    active: Option<AnalysisResult>,
}

impl<S: StateStore> HistoryStore<S> {
    /// Load persisted history. Unreadable slots are logged and treated as empty.
    pub fn open(store: S) -> Result<Self> {
        let entries = match store.get(HISTORY_SLOT)? {
            Some(raw) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(mut entries) => {
                    entries.truncate(MAX_HISTORY_ENTRIES);
                    entries
                }
                Err(err) => {
                    log::warn!("discarding unreadable detection history: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let active = match store.get(ACTIVE_SLOT)? {
            Some(raw) => match serde_json::from_str::<AnalysisResult>(&raw) {
                Ok(result) => Some(result),
                Err(err) => {
                    log::warn!("discarding unreadable active result: {}", err);
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            store,
            entries,
            active,
        })
    }

    /// Prepend an entry, evict beyond the cap, and make it the active result.
    /// Memory is only updated once the store has accepted the new state.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<()> {
        let active = entry.full_result.clone();
        let mut entries = Vec::with_capacity(MAX_HISTORY_ENTRIES);
        entries.push(entry);
        entries.extend(self.entries.iter().take(MAX_HISTORY_ENTRIES - 1).cloned());
        self.persist(&entries, &active)?;
        self.entries = entries;
        self.active = Some(active);
        Ok(())
    }

    /// Empty the history and drop the active result.
    pub fn clear(&mut self) -> Result<()> {
        self.store
            .put(HISTORY_SLOT, "[]")
            .context("persist cleared history")?;
        self.store
            .remove(ACTIVE_SLOT)
            .context("remove active result")?;
        self.entries.clear();
        self.active = None;
        Ok(())
    }

    /// Most recent first.
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make a stored entry the active result.
    pub fn select(&mut self, index: usize) -> Result<&AnalysisResult> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| anyhow!("no history entry at position {}", index + 1))?;
        let result = entry.full_result.clone();
        let json = serde_json::to_string(&result)?;
        self.store
            .put(ACTIVE_SLOT, &json)
            .context("persist active result")?;
        Ok(self.active.insert(result))
    }

    pub fn active(&self) -> Option<&AnalysisResult> {
        self.active.as_ref()
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn persist(&mut self, entries: &[HistoryEntry], active: &AnalysisResult) -> Result<()> {
        let history = serde_json::to_string(entries)?;
        let active = serde_json::to_string(active)?;
        self.store
            .put(HISTORY_SLOT, &history)
            .context("persist detection history")?;
        self.store
            .put(ACTIVE_SLOT, &active)
            .context("persist active result")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, PlantClass};
    use crate::storage::InMemoryStateStore;
    use chrono::TimeZone;

    fn result_with(weeds: usize, tag: &str) -> AnalysisResult {
        let detections = (0..weeds)
            .map(|i| Detection::new(PlantClass::Weed, 0.5, [i as f32, 0.0, 1.0, 1.0]))
            .collect();
        AnalysisResult::new(detections, Some(tag.to_string()))
    }

    fn entry(n: i64) -> HistoryEntry {
        let ts = Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap();
        HistoryEntry::new(result_with(1, &format!("predicted_{n}.jpg")), ts)
    }

    #[test]
    fn keeps_ten_most_recent() -> Result<()> {
        let mut history = HistoryStore::open(InMemoryStateStore::new())?;
        for n in 1..=11 {
            history.append(entry(n))?;
        }
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(
            history.list()[0].image_ref.as_deref(),
            Some("predicted_11.jpg")
        );
        assert!(history
            .list()
            .iter()
            .all(|e| e.image_ref.as_deref() != Some("predicted_1.jpg")));
        Ok(())
    }

    #[test]
    fn clear_drops_entries_and_active() -> Result<()> {
        let mut history = HistoryStore::open(InMemoryStateStore::new())?;
        history.append(entry(1))?;
        assert!(history.active().is_some());

        history.clear()?;
        assert!(history.is_empty());
        assert!(history.active().is_none());

        let reopened = HistoryStore::open(history.into_store())?;
        assert!(reopened.is_empty());
        assert!(reopened.active().is_none());
        Ok(())
    }

    #[test]
    fn select_changes_active_result() -> Result<()> {
        let mut history = HistoryStore::open(InMemoryStateStore::new())?;
        history.append(entry(1))?;
        history.append(entry(2))?;

        let selected = history.select(1)?;
        assert_eq!(selected.predicted_image(), Some("predicted_1.jpg"));
        assert!(history.select(5).is_err());

        let reopened = HistoryStore::open(history.into_store())?;
        assert_eq!(
            reopened.active().and_then(|r| r.predicted_image()),
            Some("predicted_1.jpg")
        );
        assert_eq!(reopened.len(), 2);
        Ok(())
    }

    #[test]
    fn entry_summarizes_result() {
        let result = AnalysisResult::new(
            vec![
                Detection::new(PlantClass::Crop, 0.8, [0.0; 4]),
                Detection::new(PlantClass::Weed, 0.4, [0.0; 4]),
            ],
            Some("p.jpg".to_string()),
        );
        let entry = HistoryEntry::now(result);
        assert_eq!(entry.crop_count, 1);
        assert_eq!(entry.weed_count, 1);
        assert!((entry.average_confidence - 0.6).abs() < 1e-6);
        assert_eq!(entry.image_ref.as_deref(), Some("p.jpg"));
    }

    /// Accepts reads, refuses writes once `read_only` is set.
    struct ReadOnlyAfter {
        inner: InMemoryStateStore,
        read_only: bool,
    }

    impl StateStore for ReadOnlyAfter {
        fn get(&self, slot: &str) -> Result<Option<String>> {
            self.inner.get(slot)
        }

        fn put(&mut self, slot: &str, value: &str) -> Result<()> {
            if self.read_only {
                return Err(anyhow!("disk full"));
            }
            self.inner.put(slot, value)
        }

        fn remove(&mut self, slot: &str) -> Result<()> {
            self.inner.remove(slot)
        }
    }

    #[test]
    fn failed_write_leaves_history_unchanged() -> Result<()> {
        let store = ReadOnlyAfter {
            inner: InMemoryStateStore::new(),
            read_only: false,
        };
        let mut history = HistoryStore::open(store)?;
        history.append(entry(1))?;
        history.store.read_only = true;

        let err = history.append(entry(2)).unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
        assert_eq!(history.len(), 1);
        assert_eq!(
            history.active().and_then(|r| r.predicted_image()),
            Some("predicted_1.jpg")
        );

        let reopened = HistoryStore::open(history.into_store())?;
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.list()[0].image_ref.as_deref(),
            Some("predicted_1.jpg")
        );
        Ok(())
    }

    #[test]
    fn corrupt_history_is_treated_as_empty() -> Result<()> {
        let mut store = InMemoryStateStore::new();
        store.put(HISTORY_SLOT, "not json")?;
        let history = HistoryStore::open(store)?;
        assert!(history.is_empty());
        Ok(())
    }
}
