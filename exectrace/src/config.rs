//! Agent settings.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML
//! file, `EXECTRACE_*` environment variables. Command line flags are
//! applied on top by the binary.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File, Map, Source};
use serde::Deserialize;

/// Loaded when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/exectrace/config.toml";

pub const ENV_PREFIX: &str = "EXECTRACE";

/// How records are rendered by the output sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// One human readable line per record
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Compiled probe object; the workspace build output when unset.
    pub ebpf_object: Option<PathBuf>,
    /// Forward `aya-log` records emitted by the probe.
    pub ebpf_logging: bool,
    /// Bound of the reader to sink channel.
    pub channel_capacity: usize,
    /// Idle sleep of the ring buffer reader.
    pub poll_interval_ms: u64,
    /// Resolve uids to user names.
    pub resolve_usernames: bool,
    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ebpf_object: None,
            ebpf_logging: true,
            channel_capacity: 1000,
            poll_interval_ms: 10,
            resolve_usernames: true,
            format: OutputFormat::Json,
        }
    }
}

impl Settings {
    /// Load settings from `path` (must exist) or from
    /// [`DEFAULT_CONFIG_PATH`] (skipped when missing), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };
        Self::from_sources(file, Self::environment(None))
    }

    fn environment(vars: Option<Map<String, String>>) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars)
    }

    fn from_sources<S>(file: S, env: Environment) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::Message(
                "channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
