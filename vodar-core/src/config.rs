use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VodarConfig {
    pub channel: ChannelSection,
    pub paths: PathsSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub watchdog: WatchdogSection,
}

impl VodarConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.paths.database)
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.work_dir)
    }

    pub fn archive_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.archive_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog.poll_interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSection {
    /// Channel login whose archive-type videos are watched.
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub work_dir: String,
    pub archive_dir: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_segment_concurrency")]
    pub segment_concurrency: usize,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            segment_concurrency: default_segment_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_segment_concurrency() -> usize {
    8
}

fn default_poll_interval() -> u64 {
    15
}

pub fn load_vodar_config<P: AsRef<Path>>(path: P) -> Result<VodarConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/vodar.toml");
        let config = load_vodar_config(path).expect("config should parse");
        assert_eq!(config.channel.login, "enssatv");
        assert_eq!(config.watchdog.poll_interval_seconds, 15);
        assert_eq!(config.network.segment_concurrency, 8);
        assert!(config.database_path().ends_with("vods.sqlite"));
    }

    #[test]
    fn network_and_watchdog_sections_are_optional() {
        let config: VodarConfig = toml::from_str(
            r#"
            [channel]
            login = "somechannel"

            [paths]
            work_dir = "/tmp/vodar/work"
            archive_dir = "/tmp/vodar/archive"
            database = "/tmp/vodar/vods.sqlite"
            "#,
        )
        .expect("minimal config should parse");
        assert_eq!(config.network.request_timeout_seconds, 30);
        assert_eq!(config.poll_interval().as_secs(), 15);
    }
}
