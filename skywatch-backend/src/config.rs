use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// State-vector feed (OpenSky Network) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_primary_base_url")]
    pub base_url: String,

    /// Basic-auth credentials; anonymous access when absent
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Length of the route history window ending at call time
    #[serde(default = "default_route_window_hours")]
    pub route_window_hours: i64,
}

/// Live ADS-B feed (FlightRadar24) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_detail_url")]
    pub detail_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Limits applied to per-record lookups inside each source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkywatchConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,

    #[serde(default)]
    pub primary: PrimaryConfig,

    #[serde(default)]
    pub secondary: SecondaryConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

fn default_true() -> bool {
    true
}

fn default_primary_base_url() -> String {
    "https://opensky-network.org/api".to_string()
}

fn default_feed_url() -> String {
    "https://data-cloud.flightradar24.com/zones/fcgi/feed.js".to_string()
}

fn default_detail_url() -> String {
    "https://data-live.flightradar24.com/clickhandler/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_route_window_hours() -> i64 {
    24
}

fn default_max_concurrent() -> usize {
    16
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_retention_days() -> u64 {
    3
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_url: default_primary_base_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            route_window_hours: default_route_window_hours(),
        }
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            feed_url: default_feed_url(),
            detail_url: default_detail_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl Default for SkywatchConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_retention_days: default_log_retention_days(),
            primary: PrimaryConfig::default(),
            secondary: SecondaryConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl PrimaryConfig {
    /// Credentials are only used when both halves are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

impl EnrichmentConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl SkywatchConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SkywatchConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

pub static CONFIG: OnceLock<SkywatchConfig> = OnceLock::new();

/// Whether the configuration came from a file or from built-in defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    Defaults,
}

fn load_config(path: &Path) -> anyhow::Result<(SkywatchConfig, ConfigOrigin)> {
    if !path.exists() {
        return Ok((SkywatchConfig::default(), ConfigOrigin::Defaults));
    }

    let config = SkywatchConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok((config, ConfigOrigin::File))
}

/// Load the config file into [`CONFIG`].
///
/// A missing file is not an error: defaults are used instead. This runs
/// before logging exists, so the caller reports [`ConfigOrigin::Defaults`].
pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<(&'static SkywatchConfig, ConfigOrigin)> {
    let (config, origin) = load_config(path.as_ref())?;
    Ok((CONFIG.get_or_init(|| config), origin))
}
