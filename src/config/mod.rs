use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub token_path: PathBuf,
    pub token_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    /// Fraction of the quota limit at which the "running low" warning shows.
    pub quota_warning_ratio: f64,
    /// Latency of the simulated payment and transfer collaborators.
    pub simulated_latency_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub downloads: DownloadConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::with_defaults(Config::builder(), "development")?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // E.g., `APP_API__BASE_URL=https://devmarket.example/api`
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder(), "test")?
            .set_override("storage.token_path", ".devmarket-test/storage.json")?
            .set_override("downloads.simulated_latency_ms", 0)?
            .build()?
            .try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("api.base_url", "http://localhost:3000/api")?
            .set_default("api.timeout_secs", 30)?
            .set_default("storage.token_path", ".devmarket/storage.json")?
            .set_default("storage.token_key", "jwt")?
            .set_default("downloads.quota_warning_ratio", 0.8)?
            .set_default("downloads.simulated_latency_ms", 2000)
    }
}
