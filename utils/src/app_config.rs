use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

use super::error::{Error, Result};

/// Environment variables read by earlier releases, mapped onto config keys.
const LEGACY_ENV_OVERRIDES: [(&str, &str); 3] = [
    ("SOURCE_DIR", "sync.source"),
    ("DEST_DIR", "sync.destination"),
    ("TIMEOUT", "sync.poll_interval"),
];

// CONFIG static variable. It's actually an AppConfig
// inside an RwLock.
lazy_static! {
    pub static ref BUILDER: RwLock<ConfigBuilder<DefaultState>> = RwLock::new(Config::builder());
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    pub source: String,
    pub destination: String,
    /// Seconds between two scans
    pub poll_interval: u64,
    /// Copy attempts per file, and consecutive empty cycles before the run ends
    pub max_retries: u32,
    /// Seconds between two copy attempts
    pub retry_delay: u64,
    pub batch_size: usize,
    /// 0 means one worker per available CPU
    pub concurrency: usize,
    pub resume: bool,
    pub lock_file: String,
    /// Draw a terminal progress bar during transfers
    pub progress: bool,
    /// Append synced and failed paths to the sync ledger
    pub ledger: bool,
    pub ledger_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub connect_timeout: u64,
    /// Seconds to wait for a scan response before scanning locally
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub base_dir: String,
    pub destination: String,
    pub threshold: usize,
    pub interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub log: LogConfig,
    pub sync: SyncSection,
    pub remote: RemoteConfig,
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// Initialize AppConfig.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut builder = Config::builder();

        // Embed file into executable
        // This macro will embed the configuration file into the
        // executable. Check include_str! for more info.
        if let Some(config_contents) = default_config {
            builder = builder.add_source(config::File::from_str(
                config_contents,
                config::FileFormat::Toml,
            ));
        }

        // Merge settings with env variables
        builder = builder.add_source(
            Environment::with_prefix("CRYOSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in LEGACY_ENV_OVERRIDES {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        // Save Config to RwLoc
        {
            let mut w = BUILDER.write()?;
            *w = builder;
        }

        Ok(())
    }

    pub fn merge_config(config_file: Option<&Path>) -> Result<()> {
        // Merge settings with config file if there is one
        if let Some(config_file_path) = config_file {
            let path = config_file_path
                .to_str()
                .ok_or_else(|| Error::new("Config file path is not valid UTF-8"))?;
            let mut w = BUILDER.write()?;
            *w = w.clone().add_source(config::File::with_name(path));
        }
        Ok(())
    }

    // Set CONFIG
    pub fn set(key: &str, value: &str) -> Result<()> {
        {
            let mut w = BUILDER.write()?;
            *w = w.clone().set_override(key, value)?;
        }

        Ok(())
    }

    // Get a single value
    pub fn get<'de, T>(key: &'de str) -> Result<T>
    where
        T: serde::Deserialize<'de>,
    {
        Ok(BUILDER.read()?.clone().build()?.get::<T>(key)?)
    }

    // Get CONFIG
    // This clones Config (from RwLock<Config>) into a new AppConfig object.
    // This means you have to fetch this again if you changed the configuration.
    pub fn fetch() -> Result<AppConfig> {
        let r = BUILDER.read()?;
        let config_clone = r.clone().build()?;

        let app_config: AppConfig = config_clone.try_into()?;
        Ok(app_config)
    }
}

impl TryFrom<Config> for AppConfig {
    type Error = crate::error::Error;

    fn try_from(config: Config) -> Result<Self> {
        Ok(config.try_deserialize()?)
    }
}
