//! Database schema SQL.

/// One write-once row per fingerprint.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS classifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fingerprint TEXT UNIQUE NOT NULL,
    verdict TEXT NOT NULL,
    confidence REAL NOT NULL,
    image_width INTEGER NOT NULL,
    image_height INTEGER NOT NULL,
    processing_time_ms INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_classifications_created_at ON classifications(created_at);
"#;
