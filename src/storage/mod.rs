//! Storage module for persisting crawl data
//!
//! This module handles everything the crawler keeps between runs:
//! - SQLite database initialization and schema management
//! - Page and image records, with atomic check-and-create per href
//! - Page and image bodies on disk, plus diagnostic dumps

mod files;
mod schema;
mod sqlite;
mod traits;

pub use files::{sanitize_for_file_name, unique_path, write_file, DiagnosticStore};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::Category;
use crate::ScoutError;

use std::path::Path;
use std::sync::{Arc, Mutex};

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Database)` - Shared handle to the opened storage
/// * `Err(ScoutError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<Database, ScoutError> {
    Ok(Database::new(SqliteStorage::new(path)?))
}

/// A page stored during the current crawl pass
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub file_path: String,
    pub href: String,
    pub board: String,
    pub parsed: bool,
    pub created_at: String,
}

/// Fields needed to create a page record
#[derive(Debug, Clone)]
pub struct NewPage {
    pub file_path: String,
    pub href: String,
    pub board: String,
}

/// A downloaded image and its classification
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: i64,
    pub file_path: String,
    pub href: String,
    pub board: String,
    pub category: Category,
    pub classification: f32,
    pub created_at: String,
    pub classified_at: Option<String>,
}

/// Fields needed to create an image record
#[derive(Debug, Clone)]
pub struct NewImage {
    pub file_path: String,
    pub href: String,
    pub board: String,
}

/// Result of a check-and-create insert
#[derive(Debug, Clone)]
pub enum InsertOutcome<T> {
    /// The record was created by this call
    Created(T),

    /// Another record already holds the href; nothing was written
    AlreadyExists,
}

/// Shared handle to the storage backend
///
/// Every pipeline task holds a clone. Calls are short and synchronous, so a
/// plain mutex serializes them.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl Database {
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Opens a fresh in-memory database
    pub fn in_memory() -> Result<Self, ScoutError> {
        Ok(Self::new(SqliteStorage::new_in_memory()?))
    }

    /// Runs `f` with exclusive access to the storage
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<R>,
    ) -> Result<R, ScoutError> {
        let mut guard = self.inner.lock().map_err(|_| ScoutError::StoragePoisoned)?;
        Ok(f(&mut guard)?)
    }
}
