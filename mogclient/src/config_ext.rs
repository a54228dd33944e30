//! Client settings on top of `mogconfig`
//!
//! Provides the `MogConfigExt` trait, which adds typed accessors for the
//! `client` section of the configuration to `mogconfig::Config`.
//!
//! Getters persist the default value when the key is missing or malformed,
//! so the written `config.yaml` always documents the effective settings.
//!
//! # Example
//!
//! ```no_run
//! use mogconfig::Config;
//! use mogclient::MogConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load_config("")?;
//! println!("server: {}", config.get_server_url()?);
//! config.set_stream_enabled_at_start(true)?;
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, bail, Result};
use mogconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

use crate::client::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Default status polling period
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

const SERVER_URL: &[&str] = &["client", "server_url"];
const REQUEST_TIMEOUT: &[&str] = &["client", "request_timeout_secs"];
const POLL_INTERVAL: &[&str] = &["client", "poll_interval_ms"];
const STREAM_AT_START: &[&str] = &["client", "stream", "enabled_at_start"];

fn positive_u64(value: Result<Value>) -> Option<u64> {
    value.ok().and_then(|v| v.as_u64()).filter(|v| *v > 0)
}

pub trait MogConfigExt {
    /// Base URL of the mog server
    fn get_server_url(&self) -> Result<String>;
    fn set_server_url(&self, url: &str) -> Result<()>;

    /// Timeout applied to API requests, in whole seconds
    ///
    /// Setting anything below one second is rejected.
    fn get_request_timeout(&self) -> Result<Duration>;
    fn set_request_timeout(&self, timeout: Duration) -> Result<()>;

    /// Period of the status poller, in milliseconds
    ///
    /// Setting a zero interval is rejected.
    fn get_poll_interval(&self) -> Result<Duration>;
    fn set_poll_interval(&self, interval: Duration) -> Result<()>;

    /// Whether a session starts streaming audio right away (default: `false`)
    fn get_stream_enabled_at_start(&self) -> Result<bool>;
    fn set_stream_enabled_at_start(&self, enabled: bool) -> Result<()>;
}

impl MogConfigExt for Config {
    fn get_server_url(&self) -> Result<String> {
        match self.get_value(SERVER_URL) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => {
                self.set_server_url(DEFAULT_BASE_URL)?;
                Ok(DEFAULT_BASE_URL.to_string())
            }
        }
    }

    fn set_server_url(&self, url: &str) -> Result<()> {
        self.set_value(SERVER_URL, Value::String(url.to_string()))
    }

    fn get_request_timeout(&self) -> Result<Duration> {
        match positive_u64(self.get_value(REQUEST_TIMEOUT)) {
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => {
                self.set_number(REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT_SECS)?;
                Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            }
        }
    }

    fn set_request_timeout(&self, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs();
        if secs == 0 {
            bail!("request timeout must be at least one second, got {:?}", timeout);
        }
        self.set_number(REQUEST_TIMEOUT, secs)
    }

    fn get_poll_interval(&self) -> Result<Duration> {
        match positive_u64(self.get_value(POLL_INTERVAL)) {
            Some(ms) => Ok(Duration::from_millis(ms)),
            None => {
                self.set_number(POLL_INTERVAL, DEFAULT_POLL_INTERVAL_MS)?;
                Ok(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
            }
        }
    }

    fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        let ms = u64::try_from(interval.as_millis())
            .map_err(|_| anyhow!("poll interval {:?} is too long", interval))?;
        if ms == 0 {
            bail!("poll interval must be at least one millisecond, got {:?}", interval);
        }
        self.set_number(POLL_INTERVAL, ms)
    }

    fn get_stream_enabled_at_start(&self) -> Result<bool> {
        match self.get_value(STREAM_AT_START) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => {
                self.set_stream_enabled_at_start(false)?;
                Ok(false)
            }
        }
    }

    fn set_stream_enabled_at_start(&self, enabled: bool) -> Result<()> {
        self.set_value(STREAM_AT_START, Value::Bool(enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(dir: &tempfile::TempDir) -> Config {
        Config::load_config(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);

        assert_eq!(config.get_server_url().unwrap(), DEFAULT_BASE_URL);
        assert_eq!(
            config.get_request_timeout().unwrap(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(
            config.get_poll_interval().unwrap(),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert!(!config.get_stream_enabled_at_start().unwrap());
    }

    #[test]
    fn test_malformed_values_fall_back_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);
        config
            .set_value(POLL_INTERVAL, Value::String("soon".to_string()))
            .unwrap();

        assert_eq!(
            config.get_poll_interval().unwrap(),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert_eq!(
            config.get_value(POLL_INTERVAL).unwrap(),
            Value::Number(DEFAULT_POLL_INTERVAL_MS.into())
        );
    }

    #[test]
    fn test_sub_unit_durations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);
        config.set_request_timeout(Duration::from_secs(5)).unwrap();
        config.set_poll_interval(Duration::from_millis(250)).unwrap();

        assert!(config
            .set_request_timeout(Duration::from_millis(500))
            .is_err());
        assert!(config.set_poll_interval(Duration::from_micros(200)).is_err());
        assert!(config.set_poll_interval(Duration::MAX).is_err());

        // rejected values leave the stored ones alone
        assert_eq!(
            config.get_request_timeout().unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.get_poll_interval().unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);
        config.set_server_url("http://jukebox:6601").unwrap();
        config.set_stream_enabled_at_start(true).unwrap();

        let reloaded = load(&dir);
        assert_eq!(reloaded.get_server_url().unwrap(), "http://jukebox:6601");
        assert!(reloaded.get_stream_enabled_at_start().unwrap());
    }
}
