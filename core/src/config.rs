//! Configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `blockvm.toml` (or the file named by `BLOCKVM_CONFIG_PATH`), then
//! `BLOCKVM_*` environment variables with `__` between nested keys, e.g.
//! `BLOCKVM_RUNTIME__TURBO_MODE=true`. A `.env` file is read first.

use crate::engine::{Clock, RuntimeOptions, MAX_CLONES};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "blockvm";
const ENV_PREFIX: &str = "BLOCKVM";
const CONFIG_PATH_VAR: &str = "BLOCKVM_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Run at 30 frames per second instead of 60
    pub compatibility_mode: bool,
    /// Keep stepping after a redraw request until the frame budget is spent
    pub turbo_mode: bool,
    pub max_clones: usize,
    pub warp_time_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            compatibility_mode: false,
            turbo_mode: false,
            max_clones: MAX_CLONES,
            warp_time_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter, used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    turbo_mode: Option<bool>,
    compatibility_mode: Option<bool>,
    env: Option<config::Map<String, String>>,
}

impl ConfigBuilder {
    /// Config file to read instead of `blockvm.toml`. Unlike the default
    /// file it must exist.
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn turbo_mode(mut self, enabled: Option<bool>) -> Self {
        self.turbo_mode = enabled;
        self
    }

    pub fn compatibility_mode(mut self, enabled: Option<bool>) -> Self {
        self.compatibility_mode = enabled;
        self
    }

    /// Read `BLOCKVM_*` variables from `vars` instead of the process
    /// environment
    pub fn env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.env.is_none() {
            dotenvy::dotenv().ok();
        }

        let config_path = self.config_path.or_else(|| {
            let vars = self.env.as_ref();
            match vars {
                Some(vars) => vars.get(CONFIG_PATH_VAR).map(PathBuf::from),
                None => std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from),
            }
        });

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        builder = match config_path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let mut env = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        if let Some(vars) = self.env {
            env = env.source(Some(vars));
        }
        builder = builder.add_source(env);

        if let Some(turbo) = self.turbo_mode {
            builder = builder.set_override("runtime.turbo_mode", turbo)?;
        }
        if let Some(compat) = self.compatibility_mode {
            builder = builder.set_override("runtime.compatibility_mode", compat)?;
        }

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

impl From<&Config> for RuntimeOptions {
    fn from(config: &Config) -> Self {
        RuntimeOptions {
            compatibility_mode: config.runtime.compatibility_mode,
            turbo_mode: config.runtime.turbo_mode,
            max_clones: config.runtime.max_clones,
            warp_time: Duration::from_millis(config.runtime.warp_time_ms),
            clock: Clock::system(),
        }
    }
}

#[cfg(test)]
mod tests;
