//! Shopping Assistant - voice/text driven shopping list
//!
//! Interprets free-text commands ("add two apples", "remove bread",
//! "find cereal under $5") with ordered regex rules, keeps a persisted
//! shopping list plus a permanent purchase history, and suggests items from
//! three sources: purchase frequency, the season, and substitutes for what
//! is already on the list.
//!
//! # Layout
//! - [`categorizer`]: keyword -> category, first match wins
//! - [`intent`]: utterance -> [`intent::ParsedCommand`], total
//! - [`store`]: list and history contracts with memory and cozo backends
//! - [`suggest`]: merged, deduplicated, capped suggestions
//! - [`catalog`]: product catalog loading and search
//! - [`assistant`]: applies commands and builds confirmation messages

pub mod assistant;
pub mod catalog;
pub mod categorizer;
pub mod clock;
pub mod config;
pub mod error;
pub mod intent;
pub mod store;
pub mod suggest;

pub use assistant::{Assistant, Reply};
pub use catalog::{CatalogSource, JsonCatalog, Product, SearchQuery};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AssistantError, CatalogError, ConfigError, StoreError};
pub use intent::ParsedCommand;
pub use store::{CozoStore, HistoryLog, ListEntry, ListStore, MemoryStore};
pub use suggest::{Reason, Suggestion};
