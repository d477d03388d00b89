//! Data types for cache entries and statistics.

use serde::{Deserialize, Serialize};

use falldetect_core::Verdict;

use crate::Fingerprint;

/// A stored classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub verdict: Verdict,
    pub confidence: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub processing_time_ms: u64,
    /// Unix milliseconds, stamped by the store.
    pub created_at: i64,
}

impl CacheEntry {
    /// Dimensions rendered as `WxH`.
    pub fn image_size(&self) -> String {
        format!("{}x{}", self.image_width, self.image_height)
    }

    pub fn created_at_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.created_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    }
}

/// Fields supplied by the caller when inserting a new entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub verdict: Verdict,
    pub confidence: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub processing_time_ms: u64,
}

/// Aggregate statistics over every stored entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_processed: i64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub avg_processing_time_ms: f64,
    pub days_active: i64,
}
