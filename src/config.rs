use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::endpoint::Endpoint;

pub const DEFAULT_DIAL_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_ADMISSION_RANGE: &str = "0.0.0.0/0";

#[derive(Clone, Debug, Deserialize)]
pub struct ForwarderConfig {
    pub source: Endpoint,
    pub destination: Endpoint,
    #[serde(default = "default_dial_timeout_seconds")]
    pub dial_timeout_seconds: u64,
    #[serde(default = "default_admission_range")]
    pub admission_range: String,
}

const fn default_dial_timeout_seconds() -> u64 {
    DEFAULT_DIAL_TIMEOUT_SECONDS
}

fn default_admission_range() -> String {
    DEFAULT_ADMISSION_RANGE.to_string()
}

impl ForwarderConfig {
    pub fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            source,
            destination,
            dial_timeout_seconds: DEFAULT_DIAL_TIMEOUT_SECONDS,
            admission_range: default_admission_range(),
        }
    }

    #[must_use]
    pub const fn with_dial_timeout_seconds(mut self, seconds: u64) -> Self {
        self.dial_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_admission_range(mut self, range: impl Into<String>) -> Self {
        self.admission_range = range.into();
        self
    }

    /// Bound for the outbound dial. Zero disables the bound.
    #[must_use]
    pub const fn dial_timeout(&self) -> Option<Duration> {
        match self.dial_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ForwarderConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse {} as valid TOML", path.display()))
}

pub fn parse_config(content: &str) -> Result<ForwarderConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = parse_config(
            r#"
            dial_timeout_seconds = 2
            admission_range = "127.0.0.0/8"

            [source]
            host = "127.0.0.1"
            port = 9000

            [destination]
            host = "127.0.0.1"
            port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.source, Endpoint::new("127.0.0.1", 9000));
        assert_eq!(config.destination, Endpoint::new("127.0.0.1", 9100));
        assert_eq!(config.dial_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.admission_range, "127.0.0.0/8");
    }

    #[test]
    fn applies_defaults() {
        let config = parse_config(
            r#"
            source = { host = "0.0.0.0", port = 80 }
            destination = { host = "backend", port = 8080 }
            "#,
        )
        .unwrap();

        assert_eq!(config.dial_timeout_seconds, DEFAULT_DIAL_TIMEOUT_SECONDS);
        assert_eq!(config.admission_range, DEFAULT_ADMISSION_RANGE);
    }

    #[test]
    fn zero_timeout_is_unbounded() {
        let config = ForwarderConfig::new(Endpoint::new("a", 1), Endpoint::new("b", 2))
            .with_dial_timeout_seconds(0);
        assert_eq!(config.dial_timeout(), None);
    }

    #[test]
    fn rejects_missing_destination() {
        let result = parse_config(r#"source = { host = "0.0.0.0", port = 80 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/forwarder.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/forwarder.toml"));
    }
}
