//! Shopping list and purchase history storage
//!
//! Two independent contracts: [`ListStore`] holds the active list, and
//! [`HistoryLog`] is an append-only record of every add. Writing both is
//! two separate operations with no transaction spanning them.

pub mod cozo_store;
pub mod memory;

pub use self::cozo_store::CozoStore;
pub use self::memory::MemoryStore;

use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Types
// ============================================================================

/// An entry on the active shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Unique, monotonically assigned, never reused
    pub id: u64,
    pub item: String,
    /// Always >= 1
    pub quantity: u32,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A permanent record of one add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub item: String,
    pub category: Option<String>,
    pub bought_at: DateTime<Utc>,
}

/// How often an (item, category) pair was added in a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frequency {
    pub item: String,
    pub category: Option<String>,
    pub count: usize,
}

// ============================================================================
// Contracts
// ============================================================================

pub trait ListStore {
    /// Append an entry and return its freshly assigned id
    fn add(
        &mut self,
        item: &str,
        quantity: u32,
        category: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Remove the entry with `id`. Returns 0 or 1.
    fn remove_by_id(&mut self, id: u64) -> Result<usize, StoreError>;

    /// Remove every entry whose item contains `needle`, case-insensitively.
    ///
    /// This is a bulk delete: "milk" removes both "milk" and "almond milk".
    fn remove_matching(&mut self, needle: &str) -> Result<usize, StoreError>;

    /// All entries, most recently added first
    fn list(&self) -> Result<Vec<ListEntry>, StoreError>;
}

pub trait HistoryLog {
    fn record(
        &mut self,
        item: &str,
        category: Option<&str>,
        bought_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Counts per (item, category) for records at or after `cutoff`, highest
    /// count first, ties in order of first occurrence, at most `limit` rows.
    fn frequency_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Frequency>, StoreError>;
}

// ============================================================================
// Helpers shared by backends
// ============================================================================

/// Fixed-width RFC 3339 text, so string order equals time order
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(
    relation: &'static str,
    raw: &str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::MalformedRow {
            relation,
            detail: format!("timestamp {:?}: {}", raw, e),
        })
}

/// Group history entries (in insertion order) into ranked frequencies
pub(crate) fn rank_frequencies<'a, I>(entries: I, limit: usize) -> Vec<Frequency>
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let mut slots: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut ranked: Vec<Frequency> = Vec::new();

    for entry in entries {
        let key = (entry.item.clone(), entry.category.clone());
        match slots.get(&key) {
            Some(&slot) => ranked[slot].count += 1,
            None => {
                slots.insert(key, ranked.len());
                ranked.push(Frequency {
                    item: entry.item.clone(),
                    category: entry.category.clone(),
                    count: 1,
                });
            }
        }
    }

    // stable: equal counts keep first-occurrence order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}
