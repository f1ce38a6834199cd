//! Persistent store on the embedded cozo database.
//!
//! Relations:
//! - `list {id: Int => item, quantity, category?, created_at}`
//! - `history {seq: Int => item, category?, bought_at}`
//! - `counters {name: String => value: Int}` last assigned id per relation,
//!   so ids stay monotonic across deletions and restarts.
//!
//! Rows are written with `:insert`, so an id claimed by another process in
//! the meantime fails the whole transaction (counter bump included) instead
//! of overwriting that row. The id is then read again, a bounded number of
//! times.
//!
//! Timestamps are stored as fixed-width RFC 3339 text.

use super::{
    format_timestamp, parse_timestamp, rank_frequencies, Frequency, HistoryEntry, HistoryLog,
    ListEntry, ListStore,
};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use cozo::{DataValue, DbInstance, NamedRows, ScriptMutability};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &[(&str, &str)] = &[
    (
        "list",
        ":create list {id: Int => item: String, quantity: Int, category: String?, created_at: String}",
    ),
    (
        "history",
        ":create history {seq: Int => item: String, category: String?, bought_at: String}",
    ),
    ("counters", ":create counters {name: String => value: Int}"),
];

const INSERT_LIST: &str = r#"
{
    ?[name, value] := name = 'list', value = $id
    :put counters {name => value}
}
{
    ?[id, item, quantity, category, created_at] := id = $id, item = $item, quantity = $quantity, category = $category, created_at = $created_at
    :insert list {id => item, quantity, category, created_at}
}
"#;

const INSERT_HISTORY: &str = r#"
{
    ?[name, value] := name = 'history', value = $seq
    :put counters {name => value}
}
{
    ?[seq, item, category, bought_at] := seq = $seq, item = $item, category = $category, bought_at = $bought_at
    :insert history {seq => item, category, bought_at}
}
"#;

/// Tries at claiming a fresh id before the conflict is reported
const MAX_ID_ATTEMPTS: usize = 3;

pub struct CozoStore {
    db: DbInstance,
}

type Params = BTreeMap<String, DataValue>;

fn query_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Query(e.to_string())
}

fn opt_str(value: Option<&str>) -> DataValue {
    value.map(DataValue::from).unwrap_or(DataValue::Null)
}

impl CozoStore {
    /// Open (or create) a sqlite-backed database file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::DataDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let db = DbInstance::new("sqlite", path, "").map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Opened store at {:?}", path);
        Self::with_db(db)
    }

    /// Non-persistent database, mostly for tests
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = DbInstance::new("mem", "", "").map_err(|e| StoreError::Open {
            path: ":memory:".into(),
            reason: e.to_string(),
        })?;
        Self::with_db(db)
    }

    fn with_db(db: DbInstance) -> Result<Self, StoreError> {
        let store = Self { db };
        store.ensure_schema()?;
        Ok(store)
    }

    fn run(&self, script: &str, params: Params, mutability: ScriptMutability) -> Result<NamedRows, StoreError> {
        self.db
            .run_script(script, params, mutability)
            .map_err(query_err)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        let existing: HashSet<String> = self
            .run("::relations", Params::new(), ScriptMutability::Immutable)?
            .rows
            .iter()
            .filter_map(|row| row.first().and_then(|v| v.get_str()).map(str::to_string))
            .collect();

        for (name, create) in SCHEMA {
            if !existing.contains(*name) {
                debug!("Creating relation {}", name);
                self.run(create, Params::new(), ScriptMutability::Mutable)?;
            }
        }
        Ok(())
    }

    /// Next value of a named counter. Not persisted until the insert runs.
    fn next_counter(&self, name: &str) -> Result<i64, StoreError> {
        let mut params = Params::new();
        params.insert("name".to_string(), DataValue::from(name));
        let rows = self.run(
            "?[value] := *counters{name, value}, name == $name",
            params,
            ScriptMutability::Immutable,
        )?;
        let last = rows
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.get_int())
            .unwrap_or(0);
        Ok(last + 1)
    }

    fn key_taken(&self, relation: &str, key: &str, id: i64) -> Result<bool, StoreError> {
        let mut params = Params::new();
        params.insert("k".to_string(), DataValue::from(id));
        let script = format!("?[k] := *{}{{{}: k}}, k == $k", relation, key);
        let rows = self.run(&script, params, ScriptMutability::Immutable)?;
        Ok(!rows.rows.is_empty())
    }

    /// Run an insert script under the next id of `relation`, bound to `$key`.
    /// Returns the id the row was stored under.
    fn insert_with_next_id(
        &self,
        relation: &str,
        key: &str,
        script: &str,
        mut params: Params,
    ) -> Result<i64, StoreError> {
        let mut attempt = 1;
        loop {
            let id = self.next_counter(relation)?;
            params.insert(key.to_string(), DataValue::from(id));
            match self.run(script, params.clone(), ScriptMutability::Mutable) {
                Ok(_) => return Ok(id),
                Err(_) if attempt < MAX_ID_ATTEMPTS && self.key_taken(relation, key, id)? => {
                    debug!("{} id {} already taken, reading the counter again", relation, id);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn rm_ids(&self, ids: &[u64]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let literal = ids
            .iter()
            .map(|id| format!("[{}]", id))
            .collect::<Vec<_>>()
            .join(", ");
        let script = format!("?[id] <- [{}]\n:rm list {{id}}", literal);
        self.run(&script, Params::new(), ScriptMutability::Mutable)?;
        Ok(())
    }

    fn all_history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = self.run(
            "?[seq, item, category, bought_at] := *history{seq, item, category, bought_at}",
            Params::new(),
            ScriptMutability::Immutable,
        )?;
        let mut decoded = rows
            .rows
            .iter()
            .map(|row| decode_history(row))
            .collect::<Result<Vec<_>, _>>()?;
        decoded.sort_by_key(|(seq, _)| *seq);
        Ok(decoded.into_iter().map(|(_, entry)| entry).collect())
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn malformed(relation: &'static str, detail: impl Into<String>) -> StoreError {
    StoreError::MalformedRow {
        relation,
        detail: detail.into(),
    }
}

fn int_at(relation: &'static str, row: &[DataValue], i: usize) -> Result<i64, StoreError> {
    row.get(i)
        .and_then(|v| v.get_int())
        .ok_or_else(|| malformed(relation, format!("column {} is not an integer", i)))
}

fn str_at<'r>(relation: &'static str, row: &'r [DataValue], i: usize) -> Result<&'r str, StoreError> {
    row.get(i)
        .and_then(|v| v.get_str())
        .ok_or_else(|| malformed(relation, format!("column {} is not a string", i)))
}

fn opt_str_at(relation: &'static str, row: &[DataValue], i: usize) -> Result<Option<String>, StoreError> {
    match row.get(i) {
        Some(DataValue::Null) => Ok(None),
        Some(v) => v
            .get_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| malformed(relation, format!("column {} is not a string", i))),
        None => Err(malformed(relation, format!("missing column {}", i))),
    }
}

fn decode_list(row: &[DataValue]) -> Result<ListEntry, StoreError> {
    let id = int_at("list", row, 0)?;
    let quantity = int_at("list", row, 2)?;
    Ok(ListEntry {
        id: u64::try_from(id).map_err(|_| malformed("list", format!("negative id {}", id)))?,
        item: str_at("list", row, 1)?.to_string(),
        quantity: u32::try_from(quantity)
            .map_err(|_| malformed("list", format!("bad quantity {}", quantity)))?,
        category: opt_str_at("list", row, 3)?,
        created_at: parse_timestamp("list", str_at("list", row, 4)?)?,
    })
}

fn decode_history(row: &[DataValue]) -> Result<(i64, HistoryEntry), StoreError> {
    Ok((
        int_at("history", row, 0)?,
        HistoryEntry {
            item: str_at("history", row, 1)?.to_string(),
            category: opt_str_at("history", row, 2)?,
            bought_at: parse_timestamp("history", str_at("history", row, 3)?)?,
        },
    ))
}

// ============================================================================
// Contracts
// ============================================================================

impl ListStore for CozoStore {
    fn add(
        &mut self,
        item: &str,
        quantity: u32,
        category: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut params = Params::new();
        params.insert("item".to_string(), DataValue::from(item));
        params.insert("quantity".to_string(), DataValue::from(i64::from(quantity)));
        params.insert("category".to_string(), opt_str(category));
        params.insert(
            "created_at".to_string(),
            DataValue::from(format_timestamp(created_at).as_str()),
        );
        let id = self.insert_with_next_id("list", "id", INSERT_LIST, params)?;
        debug!("Stored list entry {} ({})", id, item);
        u64::try_from(id).map_err(|_| malformed("counters", format!("negative id {}", id)))
    }

    fn remove_by_id(&mut self, id: u64) -> Result<usize, StoreError> {
        let present = self.list()?.iter().any(|e| e.id == id);
        if !present {
            return Ok(0);
        }
        self.rm_ids(&[id])?;
        Ok(1)
    }

    fn remove_matching(&mut self, needle: &str) -> Result<usize, StoreError> {
        let needle = needle.to_lowercase();
        let ids: Vec<u64> = self
            .list()?
            .into_iter()
            .filter(|e| e.item.to_lowercase().contains(&needle))
            .map(|e| e.id)
            .collect();
        self.rm_ids(&ids)?;
        Ok(ids.len())
    }

    fn list(&self) -> Result<Vec<ListEntry>, StoreError> {
        let rows = self.run(
            "?[id, item, quantity, category, created_at] := *list{id, item, quantity, category, created_at}",
            Params::new(),
            ScriptMutability::Immutable,
        )?;
        let mut entries = rows
            .rows
            .iter()
            .map(|row| decode_list(row))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }
}

impl HistoryLog for CozoStore {
    fn record(
        &mut self,
        item: &str,
        category: Option<&str>,
        bought_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut params = Params::new();
        params.insert("item".to_string(), DataValue::from(item));
        params.insert("category".to_string(), opt_str(category));
        params.insert(
            "bought_at".to_string(),
            DataValue::from(format_timestamp(bought_at).as_str()),
        );
        self.insert_with_next_id("history", "seq", INSERT_HISTORY, params)?;
        Ok(())
    }

    fn frequency_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Frequency>, StoreError> {
        let history = self.all_history()?;
        Ok(rank_frequencies(
            history.iter().filter(|h| h.bought_at >= cutoff),
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_add_list_remove() {
        let mut store = CozoStore::in_memory().unwrap();
        let milk = store.add("milk", 2, Some("dairy"), ts()).unwrap();
        let almond = store.add("Almond Milk", 1, Some("dairy"), ts()).unwrap();
        let bread = store.add("bread", 1, None, ts()).unwrap();
        assert!(milk < almond && almond < bread);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, bread);
        assert_eq!(listed[0].category, None);
        assert_eq!(listed[2].quantity, 2);
        assert_eq!(listed[2].created_at, ts());

        assert_eq!(store.remove_matching("milk").unwrap(), 2);
        assert_eq!(store.remove_by_id(milk).unwrap(), 0);
        assert_eq!(store.remove_by_id(bread).unwrap(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shopping.db");

        let first = {
            let mut store = CozoStore::open(&path).unwrap();
            let id = store.add("eggs", 12, None, ts()).unwrap();
            store.remove_by_id(id).unwrap();
            id
        };

        let mut store = CozoStore::open(&path).unwrap();
        let second = store.add("eggs", 6, None, ts()).unwrap();
        assert!(second > first);
    }

    /// Rewind a counter as if another process had read it before our write
    fn rewind_counter(store: &CozoStore, name: &str, value: i64) {
        let mut params = Params::new();
        params.insert("name".to_string(), DataValue::from(name));
        params.insert("value".to_string(), DataValue::from(value));
        store
            .run(
                "?[name, value] := name = $name, value = $value\n:put counters {name => value}",
                params,
                ScriptMutability::Mutable,
            )
            .unwrap();
    }

    #[test]
    fn test_stale_id_never_overwrites_entry() {
        let mut store = CozoStore::in_memory().unwrap();
        let milk = store.add("milk", 2, Some("dairy"), ts()).unwrap();
        rewind_counter(&store, "list", 0);

        assert!(matches!(
            store.add("bread", 1, None, ts()),
            Err(StoreError::Query(_))
        ));
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, milk);
        assert_eq!(listed[0].item, "milk");

        // the failed transaction left the rewound counter alone
        rewind_counter(&store, "list", milk as i64);
        let bread = store.add("bread", 1, None, ts()).unwrap();
        assert_eq!(bread, milk + 1);
    }

    #[test]
    fn test_stale_seq_keeps_history() {
        let mut store = CozoStore::in_memory().unwrap();
        store.record("milk", Some("dairy"), ts()).unwrap();
        rewind_counter(&store, "history", 0);
        assert!(store.record("bread", None, ts()).is_err());
        assert_eq!(store.all_history().unwrap()[0].item, "milk");
        assert_eq!(store.all_history().unwrap().len(), 1);
    }

    #[test]
    fn test_frequency_since() {
        let mut store = CozoStore::in_memory().unwrap();
        let now = ts();
        store.record("bread", Some("bakery"), now - Duration::days(1)).unwrap();
        store.record("milk", Some("dairy"), now - Duration::days(2)).unwrap();
        store.record("milk", Some("dairy"), now - Duration::days(3)).unwrap();
        store.record("cheese", Some("dairy"), now - Duration::days(60)).unwrap();

        let freq = store.frequency_since(now - Duration::days(30), 5).unwrap();
        let got: Vec<(&str, usize)> = freq.iter().map(|f| (f.item.as_str(), f.count)).collect();
        assert_eq!(got, vec![("milk", 2), ("bread", 1)]);
    }
}
