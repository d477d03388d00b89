//! FallDetect Core: error taxonomy, verdict type, configuration.

pub mod config;
pub mod error;
pub mod verdict;

pub use config::{DataPaths, ServiceConfig, VisionSettings};
pub use error::{Error, Result};
pub use verdict::Verdict;
