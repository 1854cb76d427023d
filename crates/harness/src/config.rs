//! Suite configuration
//!
//! A small JSON file maps environment names to base URLs; everything else is
//! resolved from CLI flags into one explicit [`SuiteConfig`] at startup and
//! handed down from there. Nothing in the harness reads configuration out of
//! globals after that point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::browser::BrowserConfig;
use crate::error::HarnessResult;

/// Base URL used when neither the config file nor the selected environment
/// provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Config file looked up relative to the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "webdrill.json";

/// Raw shape of the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Per-environment settings, keyed by environment name.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,

    /// Fallback URL for environments without an entry.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub url: String,
}

impl ConfigFile {
    /// Parse the config file. A missing file degrades to defaults with a
    /// warning; a malformed file is an error.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("config file not found at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the base URL for an environment: the environment's own entry
    /// wins, then the top-level fallback, then [`DEFAULT_BASE_URL`].
    pub fn base_url(&self, environment: &str) -> String {
        if let Some(env) = self.environments.get(environment) {
            return env.url.clone();
        }
        self.url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}

/// Resolved configuration for one suite session.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Environment the suite runs against (dev/qa/stage/prod).
    pub environment: String,

    /// URL every test session starts from.
    pub base_url: String,

    /// Browser and driver settings.
    pub browser: BrowserConfig,

    /// Capture a screenshot when a test fails.
    pub screenshots_on: bool,

    /// Log level used when RUST_LOG is not set.
    pub log_level: String,

    /// Directory for per-name dated log files.
    pub logs_dir: PathBuf,

    /// Directory for the results report and failure screenshots.
    pub reports_dir: PathBuf,
}

impl SuiteConfig {
    /// Build the config for `environment` from the given config file path.
    pub fn load(path: &Path, environment: &str) -> HarnessResult<Self> {
        let file = ConfigFile::load(path)?;
        Ok(Self {
            environment: environment.to_string(),
            base_url: file.base_url(environment),
            ..Self::default()
        })
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.reports_dir.join("screenshots")
    }

    pub fn results_file(&self) -> PathBuf {
        self.reports_dir.join("results.json")
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            environment: "qa".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            browser: BrowserConfig::default(),
            screenshots_on: true,
            log_level: "info".to_string(),
            logs_dir: PathBuf::from("logs"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}
