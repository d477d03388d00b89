//! FallDetect Store: content-addressed, append-only verdict cache on SQLite.

pub mod cache;
pub mod fingerprint;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use cache::FingerprintCache;
pub use fingerprint::Fingerprint;
pub use sqlite::SqliteFingerprintCache;
pub use types::*;
