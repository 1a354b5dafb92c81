//! Link configuration
//!
//! Loaded with figment: built-in defaults, then an optional YAML/TOML/JSON
//! file, then `MESHLINK_*` environment variables.

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LinkError, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MESHLINK_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port of the coordinator
    pub port: String,
    /// Fixed interval between reconnect attempts
    pub reconnect_interval_ms: u64,
    /// Default per-request timeout, 0 disables it
    pub request_timeout_ms: u64,
    /// Timeout override for named commands
    pub command_timeout_ms: Option<u64>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            reconnect_interval_ms: 1000,
            request_timeout_ms: 0,
            command_timeout_ms: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl LinkConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(LinkConfig::default()));

        if let Some(path) = path {
            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .ok_or_else(|| LinkError::config("Invalid file extension"))?;

            figment = match extension {
                "json" => figment.merge(Json::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                _ => {
                    return Err(LinkError::config(format!(
                        "Unsupported config format: {}",
                        extension
                    )))
                },
            };
            debug!("Config file: {}", path.display());
        }

        let config: LinkConfig = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval_ms == 0 {
            return Err(LinkError::config("reconnect_interval_ms must be greater than 0"));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        match self.command_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => self.request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.reconnect_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.command_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "port: /dev/ttyACM1\nrequest_timeout_ms: 250\ncommand_timeout_ms: 2000"
        )
        .unwrap();

        let config = LinkConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, "/dev/ttyACM1");
        assert_eq!(config.reconnect_interval_ms, 1000);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "reconnect_interval_ms = 500\nlog_json = true").unwrap();

        let config = LinkConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.reconnect_interval(), Duration::from_millis(500));
        assert!(config.log_json);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = LinkConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"reconnect_interval_ms\": 0}}").unwrap();
        assert!(LinkConfig::load(Some(file.path())).is_err());
    }
}
