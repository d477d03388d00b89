//! The fingerprint cache contract.

use falldetect_core::Result;

use crate::{CacheEntry, CacheStats, Fingerprint, NewEntry};

/// Append-only map from input fingerprint to a previously computed verdict.
///
/// Entries are write-once: `insert` on an existing fingerprint is a no-op
/// that returns `Ok(false)`, never an error.
pub trait FingerprintCache: Send + Sync {
    /// Fetch the stored entry. Errors are `CacheReadFailure`.
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>>;

    /// Atomically insert if absent. Returns whether this call created the entry.
    /// Errors are `CacheWriteFailure`.
    fn insert(&self, fingerprint: &Fingerprint, entry: &NewEntry) -> Result<bool>;

    fn stats(&self) -> Result<CacheStats>;

    /// Whether the backing store currently answers queries.
    fn ping(&self) -> bool;
}
