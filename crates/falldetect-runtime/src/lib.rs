//! Runtime orchestrator: per-request composition of fingerprinting, the
//! verdict cache and gated ensemble classification.

pub mod orchestrator;
pub mod types;

pub use orchestrator::Orchestrator;
pub use types::*;
