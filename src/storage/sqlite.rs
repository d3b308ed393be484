//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::Category;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ImageRecord, InsertOutcome, NewImage, NewPage, PageRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const PAGE_COLUMNS: &str = "id, file_path, href, board, parsed, created_at";

const IMAGE_COLUMNS: &str =
    "id, file_path, href, board, category, classification, created_at, classified_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// Parent directories are created as needed.
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        href: row.get(2)?,
        board: row.get(3)?,
        parsed: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Reads an image row; the category is returned raw and checked by the caller
fn image_from_row(row: &Row<'_>) -> rusqlite::Result<(ImageRecord, String)> {
    let category: String = row.get(4)?;
    Ok((
        ImageRecord {
            id: row.get(0)?,
            file_path: row.get(1)?,
            href: row.get(2)?,
            board: row.get(3)?,
            category: Category::Unclassified,
            classification: row.get(5)?,
            created_at: row.get(6)?,
            classified_at: row.get(7)?,
        },
        category,
    ))
}

fn with_category((mut image, raw): (ImageRecord, String)) -> StorageResult<ImageRecord> {
    image.category =
        Category::from_db_string(&raw).ok_or(StorageError::UnknownCategory(raw))?;
    Ok(image)
}

impl Storage for SqliteStorage {
    // ===== Pages =====

    fn page_exists(&self, href: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE href = ?1)",
            params![href],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_page(&mut self, page: NewPage) -> StorageResult<InsertOutcome<PageRecord>> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO pages (file_path, href, board, parsed, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)
             ON CONFLICT(href) DO NOTHING",
            params![page.file_path, page.href, page.board, now],
        )?;

        if inserted == 0 {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(InsertOutcome::Created(PageRecord {
            id,
            file_path: page.file_path,
            href: page.href,
            board: page.board,
            parsed: false,
            created_at: now,
        }))
    }

    fn get_all_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM pages ORDER BY id", PAGE_COLUMNS))?;

        let pages = stmt
            .query_map([], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn mark_page_parsed(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET parsed = 1 WHERE id = ?1",
            params![page_id],
        )?;
        Ok(())
    }

    fn delete_all_pages(&mut self) -> StorageResult<Vec<PageRecord>> {
        let tx = self.conn.transaction()?;

        let pages = {
            let mut stmt = tx.prepare(&format!("SELECT {} FROM pages", PAGE_COLUMNS))?;
            let rows = stmt
                .query_map([], page_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        tx.execute("DELETE FROM pages", [])?;
        tx.commit()?;

        Ok(pages)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Images =====

    fn image_exists(&self, href: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM images WHERE href = ?1)",
            params![href],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_image(&mut self, image: NewImage) -> StorageResult<InsertOutcome<ImageRecord>> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO images (file_path, href, board, category, classification, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(href) DO NOTHING",
            params![
                image.file_path,
                image.href,
                image.board,
                Category::Unclassified.to_db_string(),
                now
            ],
        )?;

        if inserted == 0 {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(InsertOutcome::Created(ImageRecord {
            id,
            file_path: image.file_path,
            href: image.href,
            board: image.board,
            category: Category::Unclassified,
            classification: 0.0,
            created_at: now,
            classified_at: None,
        }))
    }

    fn get_image(&self, image_id: i64) -> StorageResult<ImageRecord> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS),
                params![image_id],
                image_from_row,
            )
            .optional()?
            .ok_or(StorageError::ImageNotFound(image_id))?;

        with_category(row)
    }

    fn get_images_by_category(&self, category: Category) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM images WHERE category = ?1 ORDER BY id",
            IMAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![category.to_db_string()], image_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(with_category).collect()
    }

    fn update_classification(
        &mut self,
        image_id: i64,
        category: Category,
        score: f32,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE images SET category = ?1, classification = ?2, classified_at = ?3
             WHERE id = ?4 AND category = ?5",
            params![
                category.to_db_string(),
                score,
                now,
                image_id,
                Category::Unclassified.to_db_string()
            ],
        )?;

        if updated == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM images WHERE id = ?1)",
                params![image_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StorageError::ImageNotFound(image_id));
            }
            return Ok(false);
        }

        tx.commit()?;
        Ok(true)
    }

    fn count_images_by_category(&self) -> StorageResult<HashMap<Category, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT category, COUNT(*) FROM images GROUP BY category")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (raw, count) in rows {
            let category =
                Category::from_db_string(&raw).ok_or(StorageError::UnknownCategory(raw))?;
            counts.insert(category, count as u64);
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_page(href: &str) -> NewPage {
        NewPage {
            file_path: format!("/tmp/{}.html", href.len()),
            href: href.to_string(),
            board: "g".to_string(),
        }
    }

    fn new_image(href: &str) -> NewImage {
        NewImage {
            file_path: "/tmp/image.png".to_string(),
            href: href.to_string(),
            board: "g".to_string(),
        }
    }

    fn created<T>(outcome: InsertOutcome<T>) -> T {
        match outcome {
            InsertOutcome::Created(record) => record,
            InsertOutcome::AlreadyExists => panic!("expected a new record"),
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_insert_page() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = created(storage.insert_page(new_page("https://a.b/g/")).unwrap());

        assert!(page.id > 0);
        assert!(!page.parsed);
        assert!(storage.page_exists("https://a.b/g/").unwrap());
        assert!(!storage.page_exists("https://a.b/v/").unwrap());
    }

    #[test]
    fn test_insert_duplicate_page() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        created(storage.insert_page(new_page("https://a.b/g/")).unwrap());
        let second = storage.insert_page(new_page("https://a.b/g/")).unwrap();

        assert!(matches!(second, InsertOutcome::AlreadyExists));
        assert_eq!(storage.count_pages().unwrap(), 1);
    }

    #[test]
    fn test_mark_page_parsed() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = created(storage.insert_page(new_page("https://a.b/g/")).unwrap());

        storage.mark_page_parsed(page.id).unwrap();

        let pages = storage.get_all_pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].parsed);
    }

    #[test]
    fn test_delete_all_pages() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        created(storage.insert_page(new_page("https://a.b/g/")).unwrap());
        created(storage.insert_page(new_page("https://a.b/v/")).unwrap());
        created(storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap());

        let deleted = storage.delete_all_pages().unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(storage.count_pages().unwrap(), 0);
        // Images survive the page reset
        assert!(storage.image_exists("https://i.a.b/g/1.png").unwrap());
    }

    #[test]
    fn test_insert_image_starts_unclassified() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let image = created(storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap());

        let loaded = storage.get_image(image.id).unwrap();
        assert_eq!(loaded.category, Category::Unclassified);
        assert_eq!(loaded.classification, 0.0);
        assert!(loaded.classified_at.is_none());
    }

    #[test]
    fn test_insert_duplicate_image() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        created(storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap());

        let second = storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap();
        assert!(matches!(second, InsertOutcome::AlreadyExists));
    }

    #[test]
    fn test_update_classification_once() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let image = created(storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap());

        assert!(storage
            .update_classification(image.id, Category::Pepe, 0.95)
            .unwrap());
        assert!(!storage
            .update_classification(image.id, Category::NonPepe, 0.1)
            .unwrap());

        let loaded = storage.get_image(image.id).unwrap();
        assert_eq!(loaded.category, Category::Pepe);
        assert!((loaded.classification - 0.95).abs() < 1e-6);
        assert!(loaded.classified_at.is_some());
    }

    #[test]
    fn test_update_missing_image() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.update_classification(42, Category::Pepe, 1.0);
        assert!(matches!(result, Err(StorageError::ImageNotFound(42))));
    }

    #[test]
    fn test_get_images_by_category() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = created(storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap());
        created(storage.insert_image(new_image("https://i.a.b/g/2.png")).unwrap());
        storage
            .update_classification(first.id, Category::Maybe, 0.5)
            .unwrap();

        let unclassified = storage
            .get_images_by_category(Category::Unclassified)
            .unwrap();
        assert_eq!(unclassified.len(), 1);
        assert_eq!(unclassified[0].href, "https://i.a.b/g/2.png");

        let maybe = storage.get_images_by_category(Category::Maybe).unwrap();
        assert_eq!(maybe.len(), 1);
        assert_eq!(maybe[0].id, first.id);
    }

    #[test]
    fn test_count_images_by_category() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = created(storage.insert_image(new_image("https://i.a.b/g/1.png")).unwrap());
        created(storage.insert_image(new_image("https://i.a.b/g/2.png")).unwrap());
        created(storage.insert_image(new_image("https://i.a.b/g/3.png")).unwrap());
        storage
            .update_classification(first.id, Category::Faulty, 0.0)
            .unwrap();

        let counts = storage.count_images_by_category().unwrap();
        assert_eq!(counts.get(&Category::Unclassified), Some(&2));
        assert_eq!(counts.get(&Category::Faulty), Some(&1));
        assert_eq!(counts.get(&Category::Pepe), None);
    }
}
