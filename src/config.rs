//! Crate-wide configuration, loaded from TOML (spec §6).
//!
//! Every field carries a `#[serde(default)]` so a partial or empty config
//! file is valid — missing sections fall back to the defaults spec.md
//! states explicitly (120s phase timeout, 50 revisions retained, 10-minute
//! task staleness).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// When true, the LLM Gateway uses its deterministic mock backend
    /// instead of a real completion transport (spec §4.3).
    pub mock: bool,
    pub model: String,
    pub timeout_sec: u64,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mock: true,
            model: "mock-itinerary-v1".to_string(),
            timeout_sec: 30,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Memory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Path to the SQLite database file; ignored for the in-memory backend.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: "itinerary-engine.sqlite3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub phase_timeout_sec: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            phase_timeout_sec: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionsConfig {
    pub retain: usize,
}

impl Default for RevisionsConfig {
    fn default() -> Self {
        Self { retain: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSweepConfig {
    /// Soft threshold (spec §4.10): a `running` task without an update for
    /// this long is requeued as a zombie, counting as a failed attempt.
    pub staleness_minutes: i64,
    /// Hard threshold (spec §4.10): a `running` task this stale is reset
    /// unconditionally, bypassing `max_attempts` bookkeeping — a backstop
    /// against a worker that crashed holding the lease indefinitely.
    pub hard_staleness_minutes: i64,
    pub interval_sec: u64,
}

impl Default for TaskSweepConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: 10,
            hard_staleness_minutes: 30,
            interval_sec: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub orchestrator: OrchestratorConfig,
    pub revisions: RevisionsConfig,
    pub task_sweep: TaskSweepConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any section the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Configuration(format!("reading {}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Error::from)
    }

    /// Loads `~/.itinerary-engine/config.toml` if present, otherwise
    /// returns `Config::default()`. Convenience for an embedding
    /// application's startup path that doesn't want to hand-resolve a
    /// platform config directory itself.
    pub fn load_default() -> Result<Self> {
        let Some(home) = dirs::home_dir() else {
            return Ok(Self::default());
        };
        let path = home.join(".itinerary-engine").join("config.toml");
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
