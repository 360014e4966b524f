use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use hls_stream::TwitchEndpoints;
use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

/// Env var naming an optional TOML config file, read before the env overrides
pub const CONFIG_PATH_ENV: &str = "STITCH_MONITOR_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required config: {key}")]
    Missing { key: &'static str },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Read config file failed: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse config file failed: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_playlist_interval_secs")]
    pub playlist_interval_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_gql_url")]
    pub gql_url: String,
    #[serde(default = "default_usher_url")]
    pub usher_url: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_playlist_interval_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gql_url() -> String {
    TwitchEndpoints::default().gql_url
}

fn default_usher_url() -> String {
    TwitchEndpoints::default().usher_url
}

impl Config {
    /// Load config from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => toml::from_str("")?,
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(value) = get("CHANNEL_NAME") {
            self.channel_name = value;
        }
        if let Some(value) = get("CLIENT_ID") {
            self.client_id = value;
        }
        if let Some(value) = get("LISTEN_ADDR") {
            self.listen_addr = parse_value("LISTEN_ADDR", &value)?;
        }
        if let Some(value) = get("PLAYLIST_INTERVAL_SECS") {
            self.playlist_interval_secs = parse_value("PLAYLIST_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = get("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_value("POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = get("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_value("HTTP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get("GQL_URL") {
            self.gql_url = value;
        }
        if let Some(value) = get("USHER_URL") {
            self.usher_url = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_name.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "CHANNEL_NAME",
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing { key: "CLIENT_ID" });
        }
        for (key, value) in [
            ("PLAYLIST_INTERVAL_SECS", self.playlist_interval_secs),
            ("POLL_INTERVAL_SECS", self.poll_interval_secs),
            ("HTTP_TIMEOUT_SECS", self.http_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.to_string(),
                });
            }
        }
        parse_value::<LevelFilter>("LOG_LEVEL", &self.log_level)?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    pub fn playlist_interval(&self) -> Duration {
        Duration::from_secs(self.playlist_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn endpoints(&self) -> TwitchEndpoints {
        TwitchEndpoints {
            gql_url: self.gql_url.clone(),
            usher_url: self.usher_url.clone(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_applied() {
        let config =
            Config::from_lookup(lookup(&[("CHANNEL_NAME", "some_channel"), ("CLIENT_ID", "abc")]))
                .unwrap();
        assert_eq!(config.channel_name, "some_channel");
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.playlist_interval(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level_filter(), LevelFilter::Info);
        assert_eq!(config.endpoints(), TwitchEndpoints::default());
    }

    #[test]
    fn channel_and_client_id_are_required() {
        let err = Config::from_lookup(lookup(&[("CLIENT_ID", "abc")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "CHANNEL_NAME"
            }
        ));

        let err = Config::from_lookup(lookup(&[("CHANNEL_NAME", "some_channel"), ("CLIENT_ID", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "CLIENT_ID" }));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = [("CHANNEL_NAME", "some_channel"), ("CLIENT_ID", "abc")];

        let mut vars = base.to_vec();
        vars.push(("POLL_INTERVAL_SECS", "soon"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_SECS",
                ..
            })
        ));

        let mut vars = base.to_vec();
        vars.push(("PLAYLIST_INTERVAL_SECS", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidValue {
                key: "PLAYLIST_INTERVAL_SECS",
                ..
            })
        ));

        let mut vars = base.to_vec();
        vars.push(("LOG_LEVEL", "loud"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidValue {
                key: "LOG_LEVEL",
                ..
            })
        ));
    }

    #[test]
    fn env_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "channel_name = \"from_file\"\nclient_id = \"file-id\"\nlisten_addr = \"127.0.0.1:8080\"\npoll_interval_secs = 5\nlog_level = \"debug\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = Config::from_lookup(lookup(&[
            (CONFIG_PATH_ENV, path.as_str()),
            ("CHANNEL_NAME", "from_env"),
        ]))
        .unwrap();
        assert_eq!(config.channel_name, "from_env");
        assert_eq!(config.client_id, "file-id");
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.playlist_interval(), Duration::from_secs(60));
        assert_eq!(config.log_level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let err = Config::from_lookup(lookup(&[
            (CONFIG_PATH_ENV, "/nonexistent/stitch-monitor.toml"),
            ("CHANNEL_NAME", "some_channel"),
            ("CLIENT_ID", "abc"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
