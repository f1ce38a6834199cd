//! Error types shared by the assistant core and its collaborators.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a list/history storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Store query failed: {0}")]
    Query(String),

    #[error("Malformed row in relation {relation}: {detail}")]
    MalformedRow { relation: &'static str, detail: String },

    #[error("Failed to create data directory {path}: {source}")]
    DataDir { path: PathBuf, source: io::Error },
}

/// Failures while loading the product catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid product at position {index}: {reason}")]
    InvalidProduct { index: usize, reason: String },
}

/// Errors surfaced by [`crate::assistant::Assistant`] operations.
///
/// Validation variants never leave partial writes behind. Store and catalog
/// failures are passed through as-is.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("item required")]
    EmptyItem,

    #[error("quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),

    #[error("id required")]
    MissingId,

    #[error("nothing to remove: empty match text")]
    EmptyPattern,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Failures while resolving runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found")]
    NoHomeDir,

    #[error("Catalog not found at {0}")]
    CatalogNotFound(PathBuf),
}
