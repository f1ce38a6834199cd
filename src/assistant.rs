//! Applies parsed commands to the list, history and catalog.
//!
//! An add is two independent writes: the list entry first, then the history
//! record. If the second write fails the first is not rolled back and the
//! error is returned as-is.

use crate::catalog::{search, CatalogSource, Product, SearchQuery};
use crate::categorizer::categorize;
use crate::clock::Clock;
use crate::error::AssistantError;
use crate::intent::{parse, ParsedCommand};
use crate::store::{HistoryLog, ListEntry, ListStore};
use crate::suggest::{suggest, Suggestion};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Outcome of one utterance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub command: ParsedCommand,
    pub message: String,
    /// Id assigned by an add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Entries deleted by a remove
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    /// Catalog matches for a search
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<Product>,
}

pub struct Assistant<S, C, K> {
    store: S,
    clock: C,
    catalog: K,
}

impl<S, C, K> Assistant<S, C, K>
where
    S: ListStore + HistoryLog,
    C: Clock,
    K: CatalogSource,
{
    pub fn new(store: S, clock: C, catalog: K) -> Self {
        Self {
            store,
            clock,
            catalog,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parse an utterance and carry it out
    pub fn handle_utterance(&mut self, text: &str) -> Result<Reply, AssistantError> {
        let command = parse(text);
        info!("Utterance parsed as {}", command.intent());
        debug!("Parsed command: {:?}", command);

        let (message, id, removed, results) = match &command {
            ParsedCommand::Add { item, quantity } => {
                let id = self.add_item(item, *quantity)?;
                let message = format!("Added {} × {} to your list.", quantity, item);
                (message, Some(id), None, Vec::new())
            }
            ParsedCommand::Remove { item } => {
                let removed = self.remove_matching(item)?;
                let message = format!("Removed items matching \"{}\".", item.to_lowercase());
                (message, None, Some(removed), Vec::new())
            }
            ParsedCommand::Search { item, max_price } => {
                let query = SearchQuery {
                    name: Some(item.clone()),
                    brand: None,
                    max_price: *max_price,
                };
                let results = self.search(&query)?;
                let message = format!("Found {} results for \"{}\".", results.len(), item);
                (message, None, None, results)
            }
        };

        Ok(Reply {
            command,
            message,
            id,
            removed,
            results,
        })
    }

    /// Put an item on the list and log it to history
    pub fn add_item(&mut self, item: &str, quantity: u32) -> Result<u64, AssistantError> {
        let item = item.trim();
        if item.is_empty() {
            return Err(AssistantError::EmptyItem);
        }
        if quantity == 0 {
            return Err(AssistantError::InvalidQuantity(quantity));
        }

        let category = categorize(item);
        let now = self.clock.now();
        let id = self.store.add(item, quantity, category, now)?;
        self.store.record(item, category, now)?;
        info!("Added {} x {} (id {}, category {:?})", quantity, item, id, category);
        Ok(id)
    }

    /// Delete one entry by id. `None` and 0 are rejected.
    pub fn remove_by_id(&mut self, id: Option<u64>) -> Result<usize, AssistantError> {
        let id = id.filter(|id| *id != 0).ok_or(AssistantError::MissingId)?;
        let removed = self.store.remove_by_id(id)?;
        info!("Removed {} entry with id {}", removed, id);
        Ok(removed)
    }

    /// Delete every entry whose name contains `text`
    pub fn remove_matching(&mut self, text: &str) -> Result<usize, AssistantError> {
        let needle = text.trim();
        if needle.is_empty() {
            return Err(AssistantError::EmptyPattern);
        }
        let removed = self.store.remove_matching(needle)?;
        info!("Removed {} entries matching {:?}", removed, needle);
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<ListEntry>, AssistantError> {
        Ok(self.store.list()?)
    }

    pub fn suggest(&self) -> Result<Vec<Suggestion>, AssistantError> {
        let on_list: BTreeSet<String> = self
            .store
            .list()?
            .iter()
            .map(|e| e.item.to_lowercase())
            .collect();
        Ok(suggest(&on_list, &self.store, &self.clock)?)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, AssistantError> {
        let catalog = self.catalog.load()?;
        let results = search(&catalog, query);
        debug!("Search {:?} matched {} of {} products", query, results.len(), catalog.len());
        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::StoreError;
    use crate::store::{Frequency, MemoryStore};
    use chrono::{DateTime, TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 7, 20, 18, 0, 0).unwrap())
    }

    fn catalog() -> Vec<Product> {
        let p = |name: &str, brand: &str, price: f64| Product {
            name: name.to_string(),
            brand: brand.to_string(),
            price,
        };
        vec![
            p("Corn Flakes Cereal", "Sunrise", 3.49),
            p("Granola Cereal", "Green Valley", 5.49),
            p("Potato Chips", "Crunchy Co", 1.99),
        ]
    }

    fn assistant() -> Assistant<MemoryStore, FixedClock, Vec<Product>> {
        Assistant::new(MemoryStore::new(), clock(), catalog())
    }

    #[test]
    fn test_add_utterance_writes_list_and_history() {
        let mut a = assistant();
        let reply = a.handle_utterance("add 2 almond milk").unwrap();
        assert_eq!(reply.message, "Added 2 × almond milk to your list.");
        assert_eq!(reply.id, Some(1));

        let listed = a.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].quantity, 2);
        assert_eq!(listed[0].category.as_deref(), Some("dairy"));
        assert_eq!(listed[0].created_at, clock().now());
        assert_eq!(a.store().history().len(), 1);
    }

    #[test]
    fn test_remove_utterance_is_bulk() {
        let mut a = assistant();
        a.handle_utterance("add milk").unwrap();
        a.handle_utterance("add almond milk").unwrap();
        a.handle_utterance("add bread").unwrap();

        let reply = a.handle_utterance("Remove MILK").unwrap();
        assert_eq!(reply.removed, Some(2));
        assert_eq!(reply.message, "Removed items matching \"milk\".");
        assert_eq!(a.list().unwrap().len(), 1);
        // history is a permanent log
        assert_eq!(a.store().history().len(), 3);
    }

    #[test]
    fn test_search_utterance() {
        let mut a = assistant();
        let reply = a.handle_utterance("find cereal under $5").unwrap();
        assert_eq!(reply.message, "Found 1 results for \"cereal\".");
        assert_eq!(reply.results[0].name, "Corn Flakes Cereal");
        assert!(a.list().unwrap().is_empty());
    }

    #[test]
    fn test_fallback_adds_whole_text() {
        let mut a = assistant();
        let reply = a.handle_utterance("xyz not a command").unwrap();
        assert_eq!(
            reply.command,
            ParsedCommand::Add {
                item: "xyz not a command".to_string(),
                quantity: 1
            }
        );
        assert_eq!(a.list().unwrap()[0].item, "xyz not a command");
    }

    #[test]
    fn test_validation_errors_leave_store_untouched() {
        let mut a = assistant();
        assert!(matches!(a.handle_utterance("   "), Err(AssistantError::EmptyItem)));
        assert!(matches!(a.add_item("eggs", 0), Err(AssistantError::InvalidQuantity(0))));
        assert!(matches!(a.remove_by_id(None), Err(AssistantError::MissingId)));
        assert!(matches!(a.remove_by_id(Some(0)), Err(AssistantError::MissingId)));
        assert!(matches!(a.remove_matching("  "), Err(AssistantError::EmptyPattern)));
        assert!(a.list().unwrap().is_empty());
        assert!(a.store().history().is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut a = assistant();
        let id = a.add_item("eggs", 12).unwrap();
        assert_eq!(a.remove_by_id(Some(id)).unwrap(), 1);
        assert_eq!(a.remove_by_id(Some(id)).unwrap(), 0);
    }

    #[test]
    fn test_suggest_uses_list_and_history() {
        let mut a = assistant();
        a.add_item("bread", 1).unwrap();
        a.add_item("cheese", 1).unwrap();
        a.remove_matching("cheese").unwrap();

        let suggestions = a.suggest().unwrap();
        let names: Vec<&str> = suggestions.iter().map(|s| s.item.as_str()).collect();
        // bread is on the list so only cheese comes back from history
        assert_eq!(
            names,
            vec!["cheese", "watermelon", "lemonade", "whole wheat bread", "gluten-free bread"]
        );
    }

    /// History backend that always fails, to observe the non-atomic add
    struct BrokenHistory(MemoryStore);

    impl ListStore for BrokenHistory {
        fn add(
            &mut self,
            item: &str,
            quantity: u32,
            category: Option<&str>,
            created_at: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            self.0.add(item, quantity, category, created_at)
        }
        fn remove_by_id(&mut self, id: u64) -> Result<usize, StoreError> {
            self.0.remove_by_id(id)
        }
        fn remove_matching(&mut self, needle: &str) -> Result<usize, StoreError> {
            self.0.remove_matching(needle)
        }
        fn list(&self) -> Result<Vec<ListEntry>, StoreError> {
            self.0.list()
        }
    }

    impl HistoryLog for BrokenHistory {
        fn record(
            &mut self,
            _item: &str,
            _category: Option<&str>,
            _bought_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Query("history unavailable".to_string()))
        }
        fn frequency_since(
            &self,
            _cutoff: DateTime<Utc>,
            _limit: usize,
        ) -> Result<Vec<Frequency>, StoreError> {
            Err(StoreError::Query("history unavailable".to_string()))
        }
    }

    #[test]
    fn test_history_failure_is_not_rolled_back() {
        let mut a = Assistant::new(BrokenHistory(MemoryStore::new()), clock(), catalog());
        let err = a.add_item("milk", 1).unwrap_err();
        assert!(matches!(err, AssistantError::Store(StoreError::Query(_))));
        // the list write already happened
        assert_eq!(a.list().unwrap().len(), 1);
        assert!(matches!(a.suggest(), Err(AssistantError::Store(_))));
    }
}
