//! In-process store. Used for `--ephemeral` runs and as the reference
//! backend in tests.

use super::{rank_frequencies, Frequency, HistoryEntry, HistoryLog, ListEntry, ListStore};
use crate::error::StoreError;
use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<ListEntry>,
    history: Vec<HistoryEntry>,
    last_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every history record, oldest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

impl ListStore for MemoryStore {
    fn add(
        &mut self,
        item: &str,
        quantity: u32,
        category: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.last_id += 1;
        self.entries.push(ListEntry {
            id: self.last_id,
            item: item.to_string(),
            quantity,
            category: category.map(str::to_string),
            created_at,
        });
        Ok(self.last_id)
    }

    fn remove_by_id(&mut self, id: u64) -> Result<usize, StoreError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        Ok(before - self.entries.len())
    }

    fn remove_matching(&mut self, needle: &str) -> Result<usize, StoreError> {
        let needle = needle.to_lowercase();
        let before = self.entries.len();
        self.entries
            .retain(|e| !e.item.to_lowercase().contains(&needle));
        Ok(before - self.entries.len())
    }

    fn list(&self) -> Result<Vec<ListEntry>, StoreError> {
        Ok(self.entries.iter().rev().cloned().collect())
    }
}

impl HistoryLog for MemoryStore {
    fn record(
        &mut self,
        item: &str,
        category: Option<&str>,
        bought_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.history.push(HistoryEntry {
            item: item.to_string(),
            category: category.map(str::to_string),
            bought_at,
        });
        Ok(())
    }

    fn frequency_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Frequency>, StoreError> {
        Ok(rank_frequencies(
            self.history.iter().filter(|h| h.bought_at >= cutoff),
            limit,
        ))
    }
}
