//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use vitals_broadcaster::BroadcasterConfig;
use vitals_core::RandomDiastolic;

use crate::ingest::IngestConfig;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("diastolic range is inverted: {min} > {max}")]
    InvertedDiastolicRange { min: f32, max: f32 },

    #[error("patient label must not be empty")]
    EmptyPatientLabel,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Producer (device) endpoint
    pub producer_addr: SocketAddr,

    /// Subscriber (display) WebSocket endpoint
    pub subscriber_addr: SocketAddr,

    /// Longest wait for producer data before the connection is closed (ms)
    pub frame_timeout_ms: u64,

    /// Broadcast cadence (ms)
    pub broadcast_interval_ms: u64,

    /// Label sent with every broadcast
    pub patient_label: String,

    /// Concurrent producer connections allowed
    pub max_producers: usize,

    /// Concurrent subscribers allowed
    pub max_subscribers: usize,

    /// Messages buffered per subscriber before new ones are dropped
    pub subscriber_queue_depth: usize,

    /// Longest a single subscriber write may take (ms)
    pub subscriber_send_timeout_ms: u64,

    /// Longest a subscriber may take to complete the WebSocket upgrade (ms)
    pub subscriber_handshake_timeout_ms: u64,

    /// Synthetic diastolic range, lower bound (mmHg)
    pub diastolic_min: f32,

    /// Synthetic diastolic range, upper bound (mmHg)
    pub diastolic_max: f32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            producer_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            subscriber_addr: SocketAddr::from(([0, 0, 0, 0], 6789)),
            frame_timeout_ms: 10_000,
            broadcast_interval_ms: 2_000,
            patient_label: "Patient 1".to_string(),
            max_producers: 64,
            max_subscribers: 64,
            subscriber_queue_depth: 8,
            subscriber_send_timeout_ms: 10_000,
            subscriber_handshake_timeout_ms: 5_000,
            diastolic_min: RandomDiastolic::DEFAULT_MIN,
            diastolic_max: RandomDiastolic::DEFAULT_MAX,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            let mut config: RelayConfig = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            config.config_path = path.to_path_buf();
            Ok(config)
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, value) in [
            ("frame_timeout_ms", self.frame_timeout_ms),
            ("broadcast_interval_ms", self.broadcast_interval_ms),
            ("subscriber_send_timeout_ms", self.subscriber_send_timeout_ms),
            ("subscriber_handshake_timeout_ms", self.subscriber_handshake_timeout_ms),
            ("max_producers", self.max_producers as u64),
            ("max_subscribers", self.max_subscribers as u64),
            ("subscriber_queue_depth", self.subscriber_queue_depth as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        if self.diastolic_min > self.diastolic_max {
            return Err(ConfigError::InvertedDiastolicRange {
                min: self.diastolic_min,
                max: self.diastolic_max,
            });
        }

        if self.patient_label.trim().is_empty() {
            return Err(ConfigError::EmptyPatientLabel);
        }

        Ok(())
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Settings for the producer side
    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            bind_addr: self.producer_addr,
            frame_timeout: self.frame_timeout(),
            max_producers: self.max_producers,
            diastolic_min: self.diastolic_min,
            diastolic_max: self.diastolic_max,
        }
    }

    /// Settings for the subscriber side
    pub fn broadcaster(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            bind_addr: self.subscriber_addr,
            interval: self.broadcast_interval(),
            patient_label: self.patient_label.clone(),
            max_subscribers: self.max_subscribers,
            queue_depth: self.subscriber_queue_depth,
            send_timeout: Duration::from_millis(self.subscriber_send_timeout_ms),
            handshake_timeout: Duration::from_millis(self.subscriber_handshake_timeout_ms),
        }
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitals-relay")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.producer_addr.port(), 8081);
        assert_eq!(config.subscriber_addr.port(), 6789);
        assert_eq!(config.frame_timeout(), Duration::from_secs(10));
        assert_eq!(config.broadcast_interval(), Duration::from_secs(2));
        assert_eq!(config.patient_label, "Patient 1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = RelayConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.max_producers, 64);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = RelayConfig::load_from(&path).unwrap();
        config.patient_label = "Bed 4".to_string();
        config.broadcast_interval_ms = 500;
        config.save().unwrap();

        let reloaded = RelayConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.patient_label, "Bed 4");
        assert_eq!(reloaded.broadcast_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "producer_addr = \"127.0.0.1:9000\"\n").unwrap();

        let config = RelayConfig::load_from(&path).unwrap();
        assert_eq!(config.producer_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.subscriber_addr.port(), 6789);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "frame_timeout_ms = \"soon\"\n").unwrap();

        assert!(RelayConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_validate() {
        let config = RelayConfig {
            broadcast_interval_ms: 0,
            ..RelayConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("broadcast_interval_ms")));

        let config = RelayConfig {
            diastolic_min: 95.0,
            ..RelayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedDiastolicRange { .. })
        ));

        let config = RelayConfig {
            patient_label: "  ".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPatientLabel));

        let config = RelayConfig {
            subscriber_handshake_timeout_ms: 0,
            ..RelayConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("subscriber_handshake_timeout_ms"))
        );
    }

    #[test]
    fn test_component_configs() {
        let config = RelayConfig::default();

        let ingest = config.ingest();
        assert_eq!(ingest.bind_addr, config.producer_addr);
        assert_eq!(ingest.frame_timeout, Duration::from_secs(10));

        let broadcaster = config.broadcaster();
        assert_eq!(broadcaster.bind_addr, config.subscriber_addr);
        assert_eq!(broadcaster.queue_depth, 8);
        assert_eq!(broadcaster.patient_label, "Patient 1");
        assert_eq!(broadcaster.handshake_timeout, Duration::from_secs(5));
    }
}
