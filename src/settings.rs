//! Typed view of the client config file.
//!
//! ```text
//! [Signaling]
//! server = rooms.example.org
//! connect_timeout_ms = 5000
//!
//! [Shaper]
//! target_mbps = 100
//! credit_cap_ms = 1000
//! ```
use std::time::Duration;

use crate::config::{Config, ConfigError};

const SIGNALING: &str = "Signaling";
const SHAPER: &str = "Shaper";
const RECEIVER: &str = "Receiver";
const LOGGING: &str = "Logging";

/// Everything the orchestrator and its transports need.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalingSettings {
    /// Rendezvous host, or a full base URL.
    pub server: String,
    /// Preset room; a random one is generated when absent.
    pub room_id: Option<String>,
    pub join_timeout: Duration,
    pub connect_timeout: Duration,
    /// Reconnect attempts after the duplex channel drops.
    pub duplex_retry_budget: u32,
    pub loopback: bool,
    /// Upper bound on how long the runtime waits between pumps.
    pub service_interval: Duration,
    pub max_frame_bytes: usize,
    pub max_reassembly_bytes: usize,
    /// Extra PEM root for HTTPS and WSS.
    pub ca_file: Option<String>,
}

impl Default for SignalingSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            room_id: None,
            join_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            duplex_retry_budget: 3,
            loopback: false,
            service_interval: Duration::from_millis(10),
            max_frame_bytes: 4 * 1024,
            max_reassembly_bytes: 1024 * 1024,
            ca_file: None,
        }
    }
}

/// Bulk sender pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaperSettings {
    pub target_mbps: f64,
    pub chunk_bytes: usize,
    pub buffered_cap: u64,
    pub pump_interval: Duration,
    /// Stored credit is capped at this much time worth of target rate.
    pub credit_cap: Option<Duration>,
}

impl ShaperSettings {
    #[must_use]
    pub fn target_bytes_per_sec(&self) -> f64 {
        self.target_mbps * 1e6 / 8.0
    }
}

impl Default for ShaperSettings {
    fn default() -> Self {
        Self {
            target_mbps: 500.0,
            chunk_bytes: 16 * 1024,
            buffered_cap: 8 * 1024 * 1024,
            pump_interval: Duration::from_millis(10),
            credit_cap: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverSettings {
    pub log_period: Duration,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            log_period: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub log_path: Option<String>,
    pub log_filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSettings {
    pub signaling: SignalingSettings,
    pub shaper: ShaperSettings,
    pub receiver: ReceiverSettings,
    pub logging: LogSettings,
}

impl ClientSettings {
    /// Reads every section, falling back to defaults for absent keys.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for unparsable values and
    /// [`ConfigError::Missing`] when no server is configured.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let d = SignalingSettings::default();
        let server = cfg.get_or_default(SIGNALING, "server", "").to_owned();
        if server.is_empty() {
            return Err(ConfigError::Missing {
                section: SIGNALING.to_owned(),
                key: "server".to_owned(),
            });
        }
        let signaling = SignalingSettings {
            server,
            room_id: cfg.get_non_empty(SIGNALING, "room_id").map(str::to_owned),
            join_timeout: millis(cfg, SIGNALING, "join_timeout_ms", d.join_timeout)?,
            connect_timeout: millis(cfg, SIGNALING, "connect_timeout_ms", d.connect_timeout)?,
            duplex_retry_budget: cfg.get_parsed_or(
                SIGNALING,
                "duplex_retry_budget",
                d.duplex_retry_budget,
            )?,
            loopback: cfg.get_parsed_or(SIGNALING, "loopback", d.loopback)?,
            service_interval: millis(cfg, SIGNALING, "service_interval_ms", d.service_interval)?,
            max_frame_bytes: cfg.get_parsed_or(SIGNALING, "max_frame_bytes", d.max_frame_bytes)?,
            max_reassembly_bytes: cfg.get_parsed_or(
                SIGNALING,
                "max_reassembly_bytes",
                d.max_reassembly_bytes,
            )?,
            ca_file: cfg.get_non_empty(SIGNALING, "ca_file").map(str::to_owned),
        };

        let s = ShaperSettings::default();
        let shaper = ShaperSettings {
            target_mbps: positive_rate(cfg, SHAPER, "target_mbps", s.target_mbps)?,
            chunk_bytes: cfg.get_parsed_or(SHAPER, "chunk_bytes", s.chunk_bytes)?,
            buffered_cap: cfg.get_parsed_or(SHAPER, "buffered_cap", s.buffered_cap)?,
            pump_interval: millis(cfg, SHAPER, "pump_interval_ms", s.pump_interval)?,
            credit_cap: cfg
                .get_parsed::<u64>(SHAPER, "credit_cap_ms")?
                .map(Duration::from_millis),
        };

        let receiver = ReceiverSettings {
            log_period: millis(
                cfg,
                RECEIVER,
                "log_period_ms",
                ReceiverSettings::default().log_period,
            )?,
        };

        let logging = LogSettings {
            log_path: cfg.get_non_empty(LOGGING, "log_path").map(str::to_owned),
            log_filename: cfg.get_non_empty(LOGGING, "log_filename").map(str::to_owned),
        };

        Ok(Self {
            signaling,
            shaper,
            receiver,
            logging,
        })
    }
}

fn millis(cfg: &Config, section: &str, key: &str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(cfg
        .get_parsed::<u64>(section, key)?
        .map_or(default, Duration::from_millis))
}

/// A rate must be a finite number above zero.
fn positive_rate(cfg: &Config, section: &str, key: &str, default: f64) -> Result<f64, ConfigError> {
    let value = cfg.get_parsed_or(section, key, default)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            section: section.to_owned(),
            key: key.to_owned(),
            value: cfg.get(section, key).unwrap_or_default().to_owned(),
        })
    }
}
