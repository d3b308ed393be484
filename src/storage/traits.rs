//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::Category;
use crate::storage::{ImageRecord, InsertOutcome, NewImage, NewPage, PageRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Image not found: {0}")]
    ImageNotFound(i64),

    #[error("Unknown category in database: {0}")]
    UnknownCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Inserts are check-and-create in one step: a backend must report
/// `InsertOutcome::AlreadyExists` rather than create a second record for an
/// href, even when two callers race.
pub trait Storage {
    // ===== Pages =====

    /// Returns true if a page with this href is stored
    fn page_exists(&self, href: &str) -> StorageResult<bool>;

    /// Inserts a page unless its href is already stored
    fn insert_page(&mut self, page: NewPage) -> StorageResult<InsertOutcome<PageRecord>>;

    /// Gets every stored page
    fn get_all_pages(&self) -> StorageResult<Vec<PageRecord>>;

    /// Records that link and image extraction finished for a page
    fn mark_page_parsed(&mut self, page_id: i64) -> StorageResult<()>;

    /// Deletes every page, returning the deleted records
    fn delete_all_pages(&mut self) -> StorageResult<Vec<PageRecord>>;

    /// Gets total page count
    fn count_pages(&self) -> StorageResult<u64>;

    // ===== Images =====

    /// Returns true if an image with this href is stored
    fn image_exists(&self, href: &str) -> StorageResult<bool>;

    /// Inserts an unclassified image unless its href is already stored
    fn insert_image(&mut self, image: NewImage) -> StorageResult<InsertOutcome<ImageRecord>>;

    /// Gets an image by ID
    fn get_image(&self, image_id: i64) -> StorageResult<ImageRecord>;

    /// Gets all images in a category, oldest first
    fn get_images_by_category(&self, category: Category) -> StorageResult<Vec<ImageRecord>>;

    /// Stores a classification verdict
    ///
    /// Only unclassified images are updated. Returns false when the image
    /// already carried a verdict.
    fn update_classification(
        &mut self,
        image_id: i64,
        category: Category,
        score: f32,
    ) -> StorageResult<bool>;

    /// Counts images per category (categories with no images are omitted)
    fn count_images_by_category(&self) -> StorageResult<HashMap<Category, u64>>;
}
