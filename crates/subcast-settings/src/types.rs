//! Settings type definitions with compiled defaults.

use serde::{Deserialize, Serialize};

/// Top-level settings for the relay.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubcastSettings {
    /// HTTP/WebSocket listener settings.
    pub server: ServerSettings,
    /// Message bus connection settings.
    pub bus: BusSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `3000`; `0` auto-assigns).
    pub port: u16,
    /// Per-connection send queue capacity.
    pub send_queue: usize,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            send_queue: 256,
            heartbeat_interval_secs: 30,
        }
    }
}

/// Message bus connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Broker URL.
    pub url: String,
    /// Subject all publishes and the relay subscription use.
    pub subject: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".into(),
            subject: "my_subject".into(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default log level / filter directive when `SUBCAST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
