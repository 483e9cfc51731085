//! Application configuration for SupportBridge.
//!
//! User config lives at `~/.supportbridge/supportbridge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SupportBridgeError};
use crate::types::{DEFAULT_TITLE, Source, TARGET_EMAIL_DOMAIN};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "supportbridge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".supportbridge";

// ---------------------------------------------------------------------------
// Config structs (matching supportbridge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Merge and association settings.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory holding exports and every stage's output.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Sources to process, in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            sources: default_sources(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_sources() -> Vec<String> {
    Source::ALL.iter().map(|s| s.as_str().to_string()).collect()
}

/// `[migration]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Domain every contact email is remapped to.
    #[serde(default = "default_target_domain")]
    pub target_domain: String,

    /// Title given to conversations that have none.
    #[serde(default = "default_title")]
    pub default_title: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            target_domain: default_target_domain(),
            default_title: default_title(),
        }
    }
}

fn default_target_domain() -> String {
    TARGET_EMAIL_DOMAIN.into()
}
fn default_title() -> String {
    DEFAULT_TITLE.into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one pipeline run, merged from config file +
/// CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root directory for exports and stage outputs.
    pub output_root: PathBuf,
    /// Run date stamp (`YYYYMMDD`) used in every file name.
    pub date: String,
    /// Enabled sources.
    pub sources: Vec<Source>,
    /// Domain every contact email is remapped to.
    pub target_domain: String,
    /// Title given to conversations that have none.
    pub default_title: String,
}

impl RunConfig {
    /// Build a run config from the app config for the given run date.
    pub fn from_app(config: &AppConfig, date: impl Into<String>) -> Result<Self> {
        let date = date.into();
        validate_run_date(&date)?;

        let sources = config
            .defaults
            .sources
            .iter()
            .map(|s| s.parse::<Source>().map_err(SupportBridgeError::config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            output_root: PathBuf::from(&config.defaults.output_dir),
            date,
            sources,
            target_domain: config.migration.target_domain.clone(),
            default_title: config.migration.default_title.clone(),
        })
    }

    /// Whether `source` takes part in this run.
    pub fn is_enabled(&self, source: Source) -> bool {
        self.sources.contains(&source)
    }
}

/// Today's run date stamp (`YYYYMMDD`, local time).
pub fn today_stamp() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

/// Check that a run date is a real `YYYYMMDD` calendar date.
pub fn validate_run_date(date: &str) -> Result<()> {
    if date.len() != 8 || chrono::NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
        return Err(SupportBridgeError::validation(format!(
            "run date '{date}' is not a YYYYMMDD date"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.supportbridge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SupportBridgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.supportbridge/supportbridge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SupportBridgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SupportBridgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SupportBridgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SupportBridgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SupportBridgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
