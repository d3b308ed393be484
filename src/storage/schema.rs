//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Pepe-Scout database.

/// SQL schema for the database
///
/// `href` is UNIQUE on both tables: the index is what makes
/// check-then-create atomic per href.
pub const SCHEMA_SQL: &str = r#"
-- Pages fetched during the current crawl pass
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    href TEXT NOT NULL UNIQUE,
    board TEXT NOT NULL DEFAULT '',
    parsed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_board ON pages(board);

-- Downloaded images and their classification
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    href TEXT NOT NULL UNIQUE,
    board TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL,
    classification REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    classified_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_images_category ON images(category);
CREATE INDEX IF NOT EXISTS idx_images_board ON images(board);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
