//! Suggestion engine
//!
//! Merges three heuristic sources, in this order:
//! 1. items bought often in the last 30 days
//! 2. seasonal items for the current month
//! 3. substitutes for items already on the list
//!
//! Items already on the list are skipped, duplicates (by lower-cased name)
//! keep their first occurrence, and the result is capped.

use crate::categorizer::categorize;
use crate::clock::Clock;
use crate::error::StoreError;
use crate::store::HistoryLog;
use chrono::Duration;
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of suggestions returned
pub const MAX_SUGGESTIONS: usize = 8;

/// How many frequent history items are considered
const FREQUENT_LIMIT: usize = 5;

/// History window for frequency suggestions, in days
const FREQUENT_WINDOW_DAYS: i64 = 30;

/// Category given to seasonal items the categorizer does not know
const SEASONAL_CATEGORY: &str = "seasonal";

/// Alternatives keyed by the first word of a list item
pub const SUBSTITUTES: &[(&str, &[&str])] = &[
    ("milk", &["almond milk", "soy milk"]),
    ("bread", &["whole wheat bread", "gluten-free bread"]),
    ("yogurt", &["greek yogurt"]),
];

/// Seasonal items for a calendar month (1..=12)
pub fn seasonal_items(month: u32) -> [&'static str; 2] {
    match month {
        12 | 1 | 2 => ["oranges", "hot chocolate"],
        3..=5 => ["strawberries", "spinach"],
        6..=8 => ["watermelon", "lemonade"],
        _ => ["apples", "pumpkin"],
    }
}

fn substitutes_for(base: &str) -> &'static [&'static str] {
    SUBSTITUTES
        .iter()
        .find(|(key, _)| *key == base)
        .map(|(_, subs)| *subs)
        .unwrap_or(&[])
}

// ============================================================================
// Types
// ============================================================================

/// Why an item was suggested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Frequent,
    Seasonal,
    SubstituteFor(String),
}

impl Reason {
    /// Sentence shown to the shopper
    pub fn describe(&self) -> String {
        match self {
            Reason::Frequent => "You often buy this.".to_string(),
            Reason::Seasonal => "In season.".to_string(),
            Reason::SubstituteFor(base) => format!("Alternative for {}.", base),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Frequent => write!(f, "frequent"),
            Reason::Seasonal => write!(f, "seasonal"),
            Reason::SubstituteFor(base) => write!(f, "substitute-for:{}", base),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A suggested item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub item: String,
    pub category: Option<String>,
    pub reason: Reason,
}

// ============================================================================
// Engine
// ============================================================================

/// Build suggestions for a list whose lower-cased item names are `on_list`.
///
/// Substitutes are looked up in the set's (sorted) iteration order.
pub fn suggest<H, C>(
    on_list: &BTreeSet<String>,
    history: &H,
    clock: &C,
) -> Result<Vec<Suggestion>, StoreError>
where
    H: HistoryLog + ?Sized,
    C: Clock + ?Sized,
{
    let mut candidates: Vec<Suggestion> = Vec::new();

    let cutoff = clock.now() - Duration::days(FREQUENT_WINDOW_DAYS);
    for freq in history.frequency_since(cutoff, FREQUENT_LIMIT)? {
        if on_list.contains(&freq.item.to_lowercase()) {
            continue;
        }
        let category = freq
            .category
            .clone()
            .or_else(|| categorize(&freq.item).map(str::to_string));
        candidates.push(Suggestion {
            item: freq.item,
            category,
            reason: Reason::Frequent,
        });
    }

    for item in seasonal_items(clock.month()) {
        if on_list.contains(item) {
            continue;
        }
        candidates.push(Suggestion {
            item: item.to_string(),
            category: Some(categorize(item).unwrap_or(SEASONAL_CATEGORY).to_string()),
            reason: Reason::Seasonal,
        });
    }

    for listed in on_list {
        let Some(base) = listed.split_whitespace().next() else {
            continue;
        };
        for sub in substitutes_for(base) {
            if on_list.contains(*sub) {
                continue;
            }
            candidates.push(Suggestion {
                item: sub.to_string(),
                category: categorize(sub).map(str::to_string),
                reason: Reason::SubstituteFor(base.to_string()),
            });
        }
    }

    debug!("{} suggestion candidates before dedup", candidates.len());

    let mut seen: HashSet<String> = HashSet::new();
    let mut unique: Vec<Suggestion> = candidates
        .into_iter()
        .filter(|s| seen.insert(s.item.to_lowercase()))
        .collect();
    unique.truncate(MAX_SUGGESTIONS);
    Ok(unique)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn july() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 7, 15, 10, 0, 0).unwrap())
    }

    fn on_list(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_lowercase()).collect()
    }

    fn record_n(store: &mut MemoryStore, item: &str, n: usize, at: DateTime<Utc>) {
        for _ in 0..n {
            store.record(item, None, at).unwrap();
        }
    }

    fn items(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.item.as_str()).collect()
    }

    #[test]
    fn test_seasonal_table() {
        assert_eq!(seasonal_items(1), ["oranges", "hot chocolate"]);
        assert_eq!(seasonal_items(12), ["oranges", "hot chocolate"]);
        assert_eq!(seasonal_items(4), ["strawberries", "spinach"]);
        assert_eq!(seasonal_items(7), ["watermelon", "lemonade"]);
        assert_eq!(seasonal_items(10), ["apples", "pumpkin"]);
    }

    #[test]
    fn test_july_with_empty_history() {
        let store = MemoryStore::new();
        let got = suggest(&BTreeSet::new(), &store, &july()).unwrap();
        assert_eq!(items(&got), vec!["watermelon", "lemonade"]);
        // "water" is a categorizer keyword
        assert_eq!(got[0].category.as_deref(), Some("beverages"));
        assert_eq!(got[1].category.as_deref(), Some("seasonal"));
        assert!(got.iter().all(|s| s.reason == Reason::Seasonal));
    }

    #[test]
    fn test_order_and_reasons() {
        let clock = july();
        let mut store = MemoryStore::new();
        record_n(&mut store, "eggs", 3, clock.now());
        store.record("cheddar cheese", Some("deli"), clock.now()).unwrap();

        let got = suggest(&on_list(&["Milk"]), &store, &clock).unwrap();
        assert_eq!(
            items(&got),
            vec!["eggs", "cheddar cheese", "watermelon", "lemonade", "almond milk", "soy milk"]
        );
        // historical category wins over the categorizer
        assert_eq!(got[1].category.as_deref(), Some("deli"));
        assert_eq!(got[4].reason.to_string(), "substitute-for:milk");
        assert_eq!(got[4].category.as_deref(), Some("dairy"));
    }

    #[test]
    fn test_skips_items_on_list_and_dedups() {
        let clock = july();
        let mut store = MemoryStore::new();
        record_n(&mut store, "Soy Milk", 2, clock.now());
        record_n(&mut store, "Lemonade", 1, clock.now());

        let got = suggest(&on_list(&["milk", "watermelon"]), &store, &clock).unwrap();
        let names = items(&got);
        assert!(!names.contains(&"watermelon"));
        // "Soy Milk" from history shadows the "soy milk" substitute
        assert_eq!(names.iter().filter(|n| n.eq_ignore_ascii_case("soy milk")).count(), 1);
        assert_eq!(names.iter().filter(|n| n.eq_ignore_ascii_case("lemonade")).count(), 1);
        assert_eq!(got[0].reason, Reason::Frequent);
    }

    #[test]
    fn test_capped_and_no_repeats() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
        let mut store = MemoryStore::new();
        for (i, item) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            record_n(&mut store, item, 6 - i, clock.now());
        }
        let list = on_list(&["bread", "milk", "yogurt"]);
        let got = suggest(&list, &store, &clock).unwrap();
        assert_eq!(got.len(), MAX_SUGGESTIONS);
        // top 5 only: "f" is never considered
        assert!(!items(&got).contains(&"f"));

        let mut seen = HashSet::new();
        for s in &got {
            assert!(seen.insert(s.item.to_lowercase()));
            assert!(!list.contains(&s.item.to_lowercase()));
        }
    }

    #[test]
    fn test_old_history_ignored() {
        let clock = july();
        let mut store = MemoryStore::new();
        record_n(&mut store, "eggs", 4, clock.now() - Duration::days(31));
        let got = suggest(&BTreeSet::new(), &store, &clock).unwrap();
        assert!(!items(&got).contains(&"eggs"));
    }

    #[test]
    fn test_reason_serialization() {
        let s = Suggestion {
            item: "greek yogurt".to_string(),
            category: Some("dairy".to_string()),
            reason: Reason::SubstituteFor("yogurt".to_string()),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["reason"], "substitute-for:yogurt");
        assert_eq!(s.reason.describe(), "Alternative for yogurt.");
    }
}
