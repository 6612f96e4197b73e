//! Beacon configuration, loaded from a TOML file.
//!
//! Every field has a default so a partial file parses, and a missing file is
//! replaced with a serialized default instead of failing startup. Broker
//! credentials and addresses live here; nothing network-related is compiled
//! in.

use crate::link::supervisor::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no platform config directory available")]
    NoConfigDir,
}

/// Broker address and session identity.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "openbeacon".to_string(),
            keep_alive_secs: 5,
        }
    }
}

impl BrokerConfig {
    /// Credentials are optional; empty strings mean anonymous access.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.username.trim();
        if user.is_empty() {
            None
        } else {
            Some((user, self.password.as_str()))
        }
    }
}

/// The one topic we publish to and the one we subscribe to.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TopicConfig {
    pub publish: String,
    pub subscribe: String,
    /// Payload published on every successful (re)connect, and the prefix of
    /// each counter message.
    pub announcement: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        TopicConfig {
            publish: "outTopic".to_string(),
            subscribe: "inTopic".to_string(),
            announcement: "hello world".to_string(),
        }
    }
}

/// Pacing of the periodic counter publish.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub period_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig { period_ms: 2000 }
    }
}

impl TelemetryConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Digital output mirrored from inbound payloads.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PinConfig {
    /// BCM pin number of the output.
    pub bcm: u8,
    /// The on-board LED on several boards is wired active-low.
    pub active_low: bool,
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            bcm: 2,
            active_low: true,
        }
    }
}

/// Status panel settings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    pub enabled: bool,
    /// Redraw period for the decorative marker animation.
    pub frame_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            enabled: true,
            frame_ms: 250,
        }
    }
}

impl PanelConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

/// Complete beacon configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BeaconConfig {
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    pub telemetry: TelemetryConfig,
    pub reconnect: RetryPolicy,
    pub pin: PinConfig,
    pub panel: PanelConfig,
}

impl BeaconConfig {
    /// Platform default location: `<config dir>/openbeacon/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("openbeacon").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Writes a default config when none exists, then loads whatever is on
    /// disk. Startup never fails just because the file was missing.
    pub fn ensure_and_load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let default = BeaconConfig::default();
            std::fs::write(path, toml::to_string_pretty(&default)?)?;
            info!("Wrote default configuration to {}", path.display());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_parses_to_defaults() {
        let config: BeaconConfig = toml::from_str("").expect("empty config must parse");
        assert_eq!(config, BeaconConfig::default());
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topics.subscribe, "inTopic");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let raw = r#"
            [broker]
            host = "broker.example.net"

            [telemetry]
            period_ms = 500
        "#;
        let config: BeaconConfig = toml::from_str(raw).expect("partial config must parse");
        assert_eq!(config.broker.host, "broker.example.net");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.telemetry.period(), Duration::from_millis(500));
        assert_eq!(config.pin, PinConfig::default());
    }

    #[test]
    fn interval_reconnect_policy_parses() {
        let raw = r#"
            [reconnect]
            mode = "interval"
            min_interval = 5000
        "#;
        let config: BeaconConfig = toml::from_str(raw).expect("interval policy must parse");
        assert_eq!(
            config.reconnect,
            RetryPolicy::Interval {
                min_interval: Duration::from_millis(5000)
            }
        );
    }

    #[test]
    fn default_round_trips_through_toml() {
        let serialized =
            toml::to_string_pretty(&BeaconConfig::default()).expect("default must serialize");
        let parsed: BeaconConfig = toml::from_str(&serialized).expect("must parse back");
        assert_eq!(parsed, BeaconConfig::default());
    }

    #[test]
    fn empty_username_means_anonymous() {
        let broker = BrokerConfig::default();
        assert_eq!(broker.credentials(), None);

        let broker = BrokerConfig {
            username: "beacon".to_string(),
            password: "secret".to_string(),
            ..BrokerConfig::default()
        };
        assert_eq!(broker.credentials(), Some(("beacon", "secret")));
    }
}
