//! Runtime types.

use serde::Serialize;

use falldetect_core::{Error, Result, Verdict};
use falldetect_store::CacheEntry;

/// Result returned for one classified image.
///
/// A cached response is identical to the fresh one except for `cached`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResponse {
    pub fingerprint: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub image_size: String,
    pub processing_time_ms: u64,
    pub cached: bool,
}

impl ClassificationResponse {
    pub fn from_entry(entry: &CacheEntry, cached: bool) -> Self {
        Self {
            fingerprint: entry.fingerprint.to_string(),
            verdict: entry.verdict,
            confidence: entry.confidence,
            image_size: entry.image_size(),
            processing_time_ms: entry.processing_time_ms,
            cached,
        }
    }
}

/// One uploaded file of a batch request.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Per-item outcome of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchItemResult {
    Classified {
        filename: String,
        #[serde(flatten)]
        response: ClassificationResponse,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl BatchItemResult {
    pub fn filename(&self) -> &str {
        match self {
            Self::Classified { filename, .. } | Self::Failed { filename, .. } => filename,
        }
    }
}

/// Reject a declared content type that is not `image/*`. A missing content
/// type is left to magic-byte sniffing.
pub fn check_content_type(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) if !ct.trim().to_ascii_lowercase().starts_with("image/") => {
            Err(Error::InvalidInput("File must be an image".to_string()))
        }
        _ => Ok(()),
    }
}
