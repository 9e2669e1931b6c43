//! Service settings.
//!
//! Settings come from three layers, later ones winning:
//!   1. built-in defaults (the public BfS endpoints),
//!   2. an optional TOML file (`odlmon.toml` unless `--config` names another),
//!   3. `ODLMON_*` environment variables, after `.env` has been loaded.
//!
//! Per-run values (station id, timeout, interval) are CLI flags and live in
//! `model::StationQuery`, not here.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// BfS OGC web service serving the ODL time series as WFS.
pub const DEFAULT_WFS_URL: &str = "https://www.imis.bfs.de/ogc/opendata/ows";

/// BfS station detail page; the station id is appended as `?id=`.
pub const DEFAULT_PAGE_URL: &str =
    "https://odlinfo.bfs.de/ODL/DE/themen/wo-stehen-die-sonden/karte/_documents/Messstelle.html";

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "odlmon.toml";

/// Hourly series; three missed updates before a reading counts as stale.
pub const DEFAULT_STALE_AFTER_MINUTES: u64 = 180;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },
}

/// Resolved settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub wfs_url: String,
    pub page_url: String,
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub stale_after_minutes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wfs_url: DEFAULT_WFS_URL.to_string(),
            page_url: DEFAULT_PAGE_URL.to_string(),
            output_dir: PathBuf::from("."),
            user_agent: format!("odlmon/{}", env!("CARGO_PKG_VERSION")),
            stale_after_minutes: DEFAULT_STALE_AFTER_MINUTES,
        }
    }
}

/// On-disk shape; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    wfs_url: Option<String>,
    page_url: Option<String>,
    output_dir: Option<PathBuf>,
    user_agent: Option<String>,
    stale_after_minutes: Option<u64>,
}

impl Settings {
    /// Loads settings from all layers.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut settings = Settings::default();

        match explicit {
            Some(path) => settings.apply_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    settings.apply_file(default)?;
                }
            }
        }

        settings.apply_env(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    /// Parses TOML text on top of the current values.
    pub fn apply_toml(&mut self, text: &str, origin: &str) -> Result<(), ConfigError> {
        let file: SettingsFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        if let Some(v) = file.wfs_url {
            self.wfs_url = v;
        }
        if let Some(v) = file.page_url {
            self.page_url = v;
        }
        if let Some(v) = file.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = file.user_agent {
            self.user_agent = v;
        }
        if let Some(v) = file.stale_after_minutes {
            self.stale_after_minutes = v;
        }
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.apply_toml(&text, &path.display().to_string())
    }

    /// Applies `ODLMON_*` overrides. `lookup` is injected so tests don't
    /// have to touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ODLMON_WFS_URL") {
            self.wfs_url = v;
        }
        if let Some(v) = lookup("ODLMON_PAGE_URL") {
            self.page_url = v;
        }
        if let Some(v) = lookup("ODLMON_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ODLMON_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = lookup("ODLMON_STALE_AFTER_MINUTES") {
            self.stale_after_minutes = v.trim().parse().map_err(|_| ConfigError::Env {
                var: "ODLMON_STALE_AFTER_MINUTES",
                value: v.clone(),
            })?;
        }
        Ok(())
    }
}
