//! Configuration at ~/.config/caltrack/config.toml
//!
//! Every option has a default, so the file is optional. Environment
//! variables prefixed with `CALTRACK_` override file values, using `__`
//! between section and key (e.g. `CALTRACK_WINDOW__ACTIVE_WINDOW_MONTHS=6`).

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeDelta};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{CalTrackError, CalTrackResult};

pub const DEFAULT_TASK_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{6,15}$";
pub const DEFAULT_TASK_ID_PREFIX: &str = "tid#";
pub const DEFAULT_URL_PATTERN: &str = r"(?i)https?://(?:app\.)?clickup\.com/t/([A-Za-z0-9_-]+)";
const DEFAULT_WINDOW_MONTHS: u32 = 3;
const DEFAULT_MAX_PAGES: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub window: WindowConfig,
    pub extract: ExtractConfig,
    pub transform: TransformConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub paging: PagingConfig,
}

/// Which slice of history gets reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Rolling look-back, used when no hard start date is set.
    pub active_window_months: u32,
    /// Fixed first day (local midnight) of the window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_start_date: Option<NaiveDate>,
    /// IANA zone used to resolve `hard_start_date`. System zone when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Widens the destination query on both sides, e.g. "15m".
    pub padding: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            active_window_months: DEFAULT_WINDOW_MONTHS,
            hard_start_date: None,
            timezone: None,
            padding: "0s".to_string(),
        }
    }
}

impl WindowConfig {
    pub fn padding(&self) -> CalTrackResult<TimeDelta> {
        let std = humantime::parse_duration(self.padding.trim()).map_err(|e| {
            CalTrackError::Config(format!("Invalid window padding '{}': {}", self.padding, e))
        })?;
        TimeDelta::from_std(std)
            .map_err(|_| CalTrackError::Config(format!("Window padding '{}' is too large", self.padding)))
    }

    pub fn zone(&self) -> CalTrackResult<Option<Tz>> {
        match self.timezone.as_deref() {
            None | Some("") => Ok(None),
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|_| CalTrackError::Config(format!("Unknown time zone '{}'", name))),
        }
    }
}

/// How task ids are recognized in event bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Shape a task id must have to count as validated.
    pub task_id_pattern: String,
    /// Marker preceding an inline task id, matched case-insensitively.
    pub prefix: String,
    /// Destination task URL; the first capture group is the id.
    pub url_pattern: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            task_id_pattern: DEFAULT_TASK_ID_PATTERN.to_string(),
            prefix: DEFAULT_TASK_ID_PREFIX.to_string(),
            url_pattern: DEFAULT_URL_PATTERN.to_string(),
        }
    }
}

/// Subject to description rewrite. Without a pattern the subject is only trimmed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Only events carrying this category are reconciled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Mapping file location, tilde-expanded. Defaults to the platform data dir.
    pub fn mapping_path(&self) -> CalTrackResult<PathBuf> {
        match &self.mapping_path {
            Some(path) => Ok(PathBuf::from(
                shellexpand::tilde(&path.to_string_lossy()).into_owned(),
            )),
            None => {
                let data_dir = dirs::data_dir().ok_or_else(|| {
                    CalTrackError::Config("Could not determine data directory".into())
                })?;
                Ok(data_dir.join("caltrack").join("mapping.json"))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Hard cap on pages per bulk fetch.
    pub max_pages: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        PagingConfig {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl SyncConfig {
    pub fn config_path() -> CalTrackResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalTrackError::Config("Could not determine config directory".into()))?
            .join("caltrack");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented template first
    /// if no file exists yet.
    pub fn load() -> CalTrackResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from `path` (optional) layered with `CALTRACK_*` environment variables.
    pub fn load_from(path: &Path) -> CalTrackResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("CALTRACK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CalTrackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalTrackError::Config(e.to_string()))
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> CalTrackResult<String> {
        toml::to_string_pretty(self).map_err(|e| CalTrackError::Serialization(e.to_string()))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalTrackResult<()> {
        let contents = format!(
            "\
# caltrack configuration

[window]
# Look-back used when no hard start date is set:
# active_window_months = {months}
# Reconcile everything since this date instead (local midnight):
# hard_start_date = \"2025-01-01\"
# timezone = \"Europe/Berlin\"
# padding = \"15m\"

[extract]
# task_id_pattern = '{pattern}'
# prefix = \"{prefix}\"
# url_pattern = '{url}'

[transform]
# pattern = '^\\[[^\\]]*\\]\\s*'
# replacement = \"\"

[source]
# category = \"Billable\"

[storage]
# mapping_path = \"~/.local/share/caltrack/mapping.json\"

[paging]
# max_pages = {pages}
",
            months = DEFAULT_WINDOW_MONTHS,
            pattern = DEFAULT_TASK_ID_PATTERN,
            prefix = DEFAULT_TASK_ID_PREFIX,
            url = DEFAULT_URL_PATTERN,
            pages = DEFAULT_MAX_PAGES,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalTrackError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalTrackError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
