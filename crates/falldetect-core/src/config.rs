//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default question asked of every crop before the condition question.
pub const DEFAULT_PRESENCE_QUESTION: &str =
    "Is there a person visible in this image? Answer Yes or No.";

/// Default condition question, asked only when a person is visible.
pub const DEFAULT_CONDITION_QUESTION: &str =
    "Is any person lying on the ground or floor (appears fallen)? Answer Yes or No.";

/// Paths to the FallDetect data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            root,
        };
        std::fs::create_dir_all(&paths.db)?;
        Ok(paths)
    }
}

/// Connection settings for the vision-language model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionSettings {
    /// Base URL of an OpenAI-compatible server, without the `/v1` suffix.
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub presence_question: String,
    pub condition_question: String,
}

impl VisionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            model: "HuggingFaceTB/SmolVLM2-2.2B-Instruct".to_string(),
            api_key: None,
            timeout_secs: 60,
            presence_question: DEFAULT_PRESENCE_QUESTION.to_string(),
            condition_question: DEFAULT_CONDITION_QUESTION.to_string(),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub vision: VisionSettings,
    /// Maximum number of images accepted by one batch request.
    pub max_batch_size: usize,
}

impl ServiceConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = env_parse("PORT").unwrap_or(8000);
        let max_batch_size = env_parse("MAX_BATCH_SIZE").unwrap_or(10);

        let defaults = VisionSettings::default();
        let vision = VisionSettings {
            endpoint: std::env::var("VISION_ENDPOINT")
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            model: std::env::var("VISION_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("VISION_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: env_parse("VISION_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            ..defaults
        };

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            vision,
            max_batch_size,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
