//! 🔧 App Configuration: the sacred TOML-and-env-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment. Environment variables are `TKX_`-prefixed and nest with a
//! double underscore, so `TKX_DATABASE__HOST` lands in `database.host`. A TOML file,
//! when there is one, is layered on top and wins on conflicts.
//!
//! ⚠️ Loading never judges. [`AppConfig::validate`] does, and it lists everything
//! that's missing in one go instead of making you fix them one restart at a time.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::api_client::ApiConfig;
use crate::destinations::DatabaseConfig;
use crate::retry::RetryConfig;

/// 🎛️ Knobs for how the run executes, as opposed to where it connects.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Overrides the pipeline's own worker count when set.
    #[serde(default)]
    pub concurrency: Option<usize>,
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_file_name() -> String {
    "etl_process.log".to_string()
}

fn default_log_max_files() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// 🪵 The persistent log. The console forgets; this doesn't (for five rotations, anyway).
/// It's the record that tells "the API was down" apart from "there were no tickets".
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub file_enabled: bool,
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// Prefix of the rotated files; each gets a date suffix.
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    /// Rotated files kept before the oldest is deleted.
    #[serde(default = "default_log_max_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: default_true(),
            directory: default_log_directory(),
            file_name: default_log_file_name(),
            max_files: default_log_max_files(),
        }
    }
}

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 💀 Required settings that were missing or blank, by their dotted path.
#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "💀 Missing required configuration: {}. Set them in the config file or as TKX_<SECTION>__<KEY> environment variables.",
    .missing.join(", ")
)]
pub struct ConfigError {
    pub missing: Vec<&'static str>,
}

impl AppConfig {
    /// ✅ Fail fast, but fail thoroughly: every missing value is reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, bool); 7] = [
            ("api.base_url", self.api.base_url.trim().is_empty()),
            ("api.api_key", self.api.api_key.trim().is_empty()),
            ("database.user", self.database.user.trim().is_empty()),
            ("database.password", self.database.password.is_empty()),
            ("database.host", self.database.host.trim().is_empty()),
            ("database.port", self.database.port.is_none()),
            ("database.name", self.database.name.trim().is_empty()),
        ];
        let missing: Vec<&'static str> = required
            .into_iter()
            .filter_map(|(key, is_missing)| is_missing.then_some(key))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { missing })
        }
    }
}

/// 🧱 The figment behind [`load_config`], exposed so tests can bring their own env.
pub fn figment(config_file_name: Option<&Path>) -> Figment {
    let config = Figment::new().merge(Env::prefixed("TKX_").split("__"));
    match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    }
}

/// 🚀 Load the config from `TKX_*` env vars, plus the TOML file if one was given.
///
/// 📐 No file means env only. No assumptions. No pizza defaults.
///
/// 💀 Errors only when the config can't be parsed. Missing values are
/// [`AppConfig::validate`]'s problem.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (TKX_*). \
             The file exists in our hearts, but apparently not in valid TOML.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (TKX_*). \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    figment(config_file_name).extract().context(context_msg)
}
