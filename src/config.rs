//! Runtime configuration: data directory, log filter, event capacity.
//!
//! Values layer as CLI / env over `config.toml` over built-in defaults. The
//! TOML file is read from the data dir, so the data dir itself never comes
//! from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

pub const DEFAULT_LOG: &str = "info";
pub const DEFAULT_LOG_FORMAT: &str = "pretty";
/// Snapshot file name under the data dir.
pub const SNAPSHOT_FILE: &str = "worklog.json";

/// Optional overrides from `{data_dir}/config.toml`.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Filter string, e.g. "debug" or "info,worklog=trace".
    log: Option<String>,
    /// "pretty" or "json".
    log_format: Option<String>,
    /// Broadcast channel capacity for engine events.
    event_capacity: Option<usize>,
}

impl TomlConfig {
    /// Read the override file. A missing file is normal and yields defaults;
    /// an unparseable one is logged and ignored rather than aborting the run.
    fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("config.toml");
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&raw).unwrap_or_else(|e| {
            error!(path = %path.display(), err = %e, "ignoring unparseable config.toml");
            Self::default()
        })
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" | "json"; also settable via WORKLOG_LOG_FORMAT.
    pub log_format: String,
    pub event_capacity: usize,
}

impl EngineConfig {
    /// Resolve the effective configuration. `data_dir` and `log` arrive from
    /// clap (flag or env var) and take precedence over the TOML layer.
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let overrides = TomlConfig::load(&data_dir);

        let env_format = std::env::var("WORKLOG_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty());

        Self {
            log: log
                .or(overrides.log)
                .unwrap_or_else(|| DEFAULT_LOG.to_string()),
            log_format: env_format
                .or(overrides.log_format)
                .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string()),
            event_capacity: overrides
                .event_capacity
                .unwrap_or(crate::events::DEFAULT_EVENT_CAPACITY),
            data_dir,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }
}

/// Platform-conventional data directory; last-resort fallback is a dotdir
/// relative to the working directory.
fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").ok().map(PathBuf::from);

    if cfg!(target_os = "macos") {
        if let Some(home) = home {
            return home.join("Library/Application Support/worklog");
        }
    } else if cfg!(windows) {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("worklog");
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("worklog");
        }
        if let Some(home) = home {
            return home.join(".local/share/worklog");
        }
    }
    PathBuf::from(".worklog")
}
