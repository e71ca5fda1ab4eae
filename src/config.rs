use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt;
use url::Url;

use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::model::CompletionThreshold;

/// Application configuration, read from the environment.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Console output format, the log file is always JSON.
    #[serde(default, deserialize_with = "parsed")]
    pub log_format: LogFormat,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Mark the session cookies `Secure`.
    #[serde(default)]
    pub secure_cookies: bool,

    #[serde(flatten)]
    pub api: ApiConfig,
    #[serde(flatten)]
    pub progress: ProgressConfig,
    #[serde(flatten)]
    pub access: AccessConfig,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`, expected `pretty` or `json`")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(rename = "api_base_url")]
    pub base_url: Url,
    #[serde(
        rename = "api_timeout",
        default = "default_api_timeout",
        deserialize_with = "humantime_duration"
    )]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProgressConfig {
    #[serde(
        rename = "progress_debounce",
        default = "default_debounce",
        deserialize_with = "humantime_duration"
    )]
    pub debounce: Duration,
    #[serde(
        rename = "progress_idle_timeout",
        default = "default_idle_timeout",
        deserialize_with = "humantime_duration"
    )]
    pub idle_timeout: Duration,
    #[serde(default, deserialize_with = "parsed")]
    pub completion_threshold: CompletionThreshold,
    #[serde(
        rename = "replication_queue_capacity",
        default = "default_queue_capacity",
        deserialize_with = "parsed"
    )]
    pub queue_capacity: usize,
    /// Progress writes in flight at once across all sessions.
    #[serde(
        rename = "replication_concurrency",
        default = "default_concurrency",
        deserialize_with = "parsed"
    )]
    pub concurrency: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            idle_timeout: default_idle_timeout(),
            completion_threshold: CompletionThreshold::DEFAULT,
            queue_capacity: default_queue_capacity(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    /// Let students through when the access check itself fails.
    #[serde(
        rename = "access_gate_fail_open",
        default = "default_fail_open",
        deserialize_with = "parsed"
    )]
    pub fail_open: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            fail_open: default_fail_open(),
        }
    }
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_debounce() -> Duration {
    Duration::from_secs(2)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_queue_capacity() -> usize {
    256
}

fn default_concurrency() -> usize {
    8
}

fn default_fail_open() -> bool {
    true
}

// flattened groups only ever see envy values as strings
fn parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = String::deserialize(deserializer)?;
    text.trim().parse().map_err(serde::de::Error::custom)
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
