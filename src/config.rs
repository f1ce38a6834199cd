//! Runtime configuration: where the database and catalog live.

use crate::catalog::JsonCatalog;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Data directory name under the home directory
const APP_DIR: &str = ".shopping-assistant";

/// Database file inside the data directory
const DB_FILE: &str = "shopping.db";

/// Optional catalog override inside the data directory
const CATALOG_FILE: &str = "products.json";

/// Where list and history are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// cozo database on disk
    Sqlite(PathBuf),
    /// Gone when the process exits
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub storage: Storage,
}

impl Config {
    /// Fill in defaults for anything not given explicitly
    pub fn resolve(
        data_dir: Option<PathBuf>,
        catalog_path: Option<PathBuf>,
        ephemeral: bool,
    ) -> Result<Self, ConfigError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        if let Some(path) = &catalog_path {
            if !path.exists() {
                return Err(ConfigError::CatalogNotFound(path.clone()));
            }
        }
        let storage = if ephemeral {
            Storage::Memory
        } else {
            Storage::Sqlite(data_dir.join(DB_FILE))
        };
        debug!("Data directory: {:?}, storage: {:?}", data_dir, storage);
        Ok(Self {
            data_dir,
            catalog_path,
            storage,
        })
    }

    /// Explicit catalog, else `products.json` in the data directory, else
    /// the built-in product list
    pub fn catalog(&self) -> JsonCatalog {
        if let Some(path) = &self.catalog_path {
            return JsonCatalog::from_path(path);
        }
        let local = self.data_dir.join(CATALOG_FILE);
        if local.is_file() {
            JsonCatalog::from_path(local)
        } else {
            JsonCatalog::builtin()
        }
    }
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_data_dir(&home))
}

fn home_data_dir(home: &Path) -> PathBuf {
    home.join(APP_DIR)
}
