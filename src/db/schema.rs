//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Crop aggregates: one row per (class, subject, course, module) tuple.
-- image_urls is a JSON object mapping each of the four fixed categories
-- to an ordered, append-only list of object storage URLs.
--
-- The UNIQUE constraint on the tuple is what makes first-time appends safe
-- under concurrency; see crops::store.
CREATE TABLE IF NOT EXISTS crop_aggregates (
    id TEXT PRIMARY KEY,
    class_id INTEGER NOT NULL,
    subject_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL,
    module_id INTEGER NOT NULL,
    image_urls TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),

    UNIQUE(class_id, subject_id, course_id, module_id)
);
"#;
