//! Product catalog loading and search
//!
//! The catalog is a static JSON array of `{name, brand, price}` records.
//! Search filters it by name substring, brand substring and maximum price,
//! preserving catalog order.

use crate::error::CatalogError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Catalog compiled into the binary, used when no catalog file is present
const BUILTIN_CATALOG: &str = include_str!("../data/products.json");

// ============================================================================
// Types
// ============================================================================

/// A purchasable product. Identity for matching is name + brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub brand: String,
    pub price: f64,
}

/// Anything that can hand over the full product list
pub trait CatalogSource {
    fn load(&self) -> Result<Vec<Product>, CatalogError>;
}

/// Catalog read from a JSON file on every load, or the built-in one
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    path: Option<PathBuf>,
}

impl JsonCatalog {
    /// Read from `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Use the compiled-in product list
    pub fn builtin() -> Self {
        Self { path: None }
    }
}

impl CatalogSource for JsonCatalog {
    fn load(&self) -> Result<Vec<Product>, CatalogError> {
        match &self.path {
            Some(path) => {
                debug!("Loading catalog from {:?}", path);
                let content = fs::read_to_string(path).map_err(|e| CatalogError::Read {
                    path: path.clone(),
                    source: e,
                })?;
                parse_catalog(&content)
            }
            None => parse_catalog(BUILTIN_CATALOG),
        }
    }
}

impl CatalogSource for Vec<Product> {
    fn load(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.clone())
    }
}

/// Parse and validate a JSON product array
pub fn parse_catalog(json: &str) -> Result<Vec<Product>, CatalogError> {
    let products: Vec<Product> = serde_json::from_str(json)?;
    for (index, p) in products.iter().enumerate() {
        if p.name.trim().is_empty() {
            return Err(CatalogError::InvalidProduct {
                index,
                reason: "empty name".to_string(),
            });
        }
        if p.brand.trim().is_empty() {
            return Err(CatalogError::InvalidProduct {
                index,
                reason: "empty brand".to_string(),
            });
        }
        if !p.price.is_finite() || p.price < 0.0 {
            return Err(CatalogError::InvalidProduct {
                index,
                reason: format!("bad price {}", p.price),
            });
        }
    }
    Ok(products)
}

// ============================================================================
// Search
// ============================================================================

/// Search filters. Empty or absent filters impose no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub max_price: Option<f64>,
}

impl SearchQuery {
    /// Build a query from raw request text. A max price that is not a
    /// finite number is ignored.
    pub fn from_raw(name: Option<&str>, brand: Option<&str>, max_price: Option<&str>) -> Self {
        Self {
            name: normalize_filter(name),
            brand: normalize_filter(brand),
            max_price: max_price.and_then(parse_max_price),
        }
    }

    fn matches(&self, product: &Product) -> bool {
        if let Some(name) = &self.name {
            if !product.name.to_lowercase().contains(name.as_str()) {
                return false;
            }
        }
        if let Some(brand) = &self.brand {
            if !product.brand.to_lowercase().contains(brand.as_str()) {
                return false;
            }
        }
        match self.max_price {
            Some(max) => product.price <= max,
            None => true,
        }
    }
}

fn normalize_filter(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

fn parse_max_price(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_start_matches('$');
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            if !raw.is_empty() {
                debug!("Ignoring malformed max price {:?}", raw);
            }
            None
        }
    }
}

/// Filter the catalog, keeping catalog order
pub fn search(catalog: &[Product], query: &SearchQuery) -> Vec<Product> {
    // Normalize here too so hand-built queries behave like from_raw ones
    let query = SearchQuery {
        name: normalize_filter(query.name.as_deref()),
        brand: normalize_filter(query.brand.as_deref()),
        max_price: query.max_price.filter(|m| m.is_finite()),
    };
    catalog
        .par_iter()
        .filter(|p| query.matches(p))
        .cloned()
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
