//! SQLite-backed fingerprint cache.
//!
//! Uses separate reader and writer connections in WAL mode, so lookups
//! never queue behind an in-flight insert on the same process. Inserts rely
//! on the `UNIQUE` fingerprint column with `ON CONFLICT DO NOTHING`, which
//! makes racing writers (same or different processes) collapse to one row.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::cache::FingerprintCache;
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use crate::Fingerprint;
use falldetect_core::{Error, Result, Verdict};

/// Busy timeout for writers contending on the database lock.
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub struct SqliteFingerprintCache {
    reader: Mutex<Connection>,
    writer: Mutex<Connection>,
}

impl SqliteFingerprintCache {
    /// Open or create the cache.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/falldetect.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("falldetect.db");

        let writer = Self::create_connection(&db_path)?;
        writer
            .execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Internal(format!("Schema init failed: {}", e)))?;
        let reader = Self::create_connection(&db_path)?;

        let cache = Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        };

        let stats = cache.stats()?;
        info!(
            "Fingerprint cache opened: {} entries, path={}",
            stats.total_processed,
            db_path.display()
        );

        Ok(cache)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Internal(format!("Failed to open {}: {}", db_path.display(), e)))?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT_MS
        ))
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(conn)
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl FingerprintCache for SqliteFingerprintCache {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let conn = self.reader.lock();
        let row = conn
            .prepare_cached(
                "SELECT verdict, confidence, image_width, image_height, processing_time_ms, created_at \
                 FROM classifications WHERE fingerprint = ?1",
            )
            .map_err(|e| Error::CacheReadFailure(e.to_string()))?
            .query_row(params![fingerprint.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .optional()
            .map_err(|e| Error::CacheReadFailure(e.to_string()))?;
        drop(conn);

        let Some((verdict, confidence, width, height, processing_ms, created_at)) = row else {
            return Ok(None);
        };
        let verdict: Verdict = verdict
            .parse()
            .map_err(|e: Error| Error::CacheReadFailure(e.to_string()))?;

        Ok(Some(CacheEntry {
            fingerprint: fingerprint.clone(),
            verdict,
            confidence,
            image_width: width as u32,
            image_height: height as u32,
            processing_time_ms: processing_ms.max(0) as u64,
            created_at,
        }))
    }

    fn insert(&self, fingerprint: &Fingerprint, entry: &NewEntry) -> Result<bool> {
        let conn = self.writer.lock();
        let changed = conn
            .prepare_cached(
                "INSERT INTO classifications \
                 (fingerprint, verdict, confidence, image_width, image_height, processing_time_ms, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(fingerprint) DO NOTHING",
            )
            .map_err(|e| Error::CacheWriteFailure(e.to_string()))?
            .execute(params![
                fingerprint.as_str(),
                entry.verdict.as_str(),
                entry.confidence,
                entry.image_width as i64,
                entry.image_height as i64,
                entry.processing_time_ms as i64,
                Self::now_millis(),
            ])
            .map_err(|e| Error::CacheWriteFailure(e.to_string()))?;

        let created = changed > 0;
        if !created {
            debug!("Entry for {} already present, insert ignored", fingerprint.short());
        }
        Ok(created)
    }

    fn stats(&self) -> Result<CacheStats> {
        let conn = self.reader.lock();
        let (total, positive, negative, avg, days) = conn
            .query_row(
                "SELECT COUNT(*), \
                        COALESCE(SUM(CASE WHEN verdict = 'positive' THEN 1 ELSE 0 END), 0), \
                        COALESCE(SUM(CASE WHEN verdict = 'negative' THEN 1 ELSE 0 END), 0), \
                        AVG(processing_time_ms), \
                        COUNT(DISTINCT date(created_at / 1000, 'unixepoch')) \
                 FROM classifications",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .map_err(|e| Error::CacheReadFailure(e.to_string()))?;

        Ok(CacheStats {
            total_processed: total,
            positive_count: positive,
            negative_count: negative,
            avg_processing_time_ms: avg.map(|a| (a * 100.0).round() / 100.0).unwrap_or(0.0),
            days_active: days,
        })
    }

    fn ping(&self) -> bool {
        self.reader
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}
