//! Configuration loading for the simulator binary.
//!
//! Configuration is layered with figment (later sources override earlier):
//! 1. Default values (compiled in)
//! 2. Config file: `logs-api-simulator.toml`, or the path in `LOGS_SIM_CONFIG` (optional)
//! 3. Environment variables with the `LOGS_SIM_` prefix, `__` separating sections
//!    (for example `LOGS_SIM_SERVER__PORT=3000`)
//!
//! Durations are given in milliseconds.

use crate::delivery::DeliveryPolicy;
use crate::simulator::SimulatorConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "logs-api-simulator.toml";
const CONFIG_PATH_VAR: &str = "LOGS_SIM_CONFIG";
const ENV_PREFIX: &str = "LOGS_SIM_";

/// Which delivery trigger event cycles use.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Deliver with a fixed probability each cycle.
    #[default]
    Random,
    /// Deliver when the subscription's buffering thresholds are crossed.
    Threshold,
    /// Deliver every cycle.
    Always,
    /// Never deliver from a cycle.
    Never,
}

/// Top-level configuration for the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration.
    pub server: ServerConfig,
    /// Lifecycle event configuration.
    pub events: EventsConfig,
    /// Simulated function work.
    pub work: WorkConfig,
    /// Log delivery behaviour.
    pub delivery: DeliverySettings,
    /// Log buffer limits.
    pub buffer: BufferSettings,
}

impl Config {
    /// Loads configuration from all sources.
    ///
    /// The file path comes from `LOGS_SIM_CONFIG` when set.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(path)
    }

    /// Loads configuration from a custom config file path.
    ///
    /// A missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if config_path.as_ref().exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Converts to the simulator's runtime configuration.
    pub fn simulator_config(&self) -> SimulatorConfig {
        let delivery_policy = match self.delivery.policy {
            PolicyKind::Random => DeliveryPolicy::Random {
                probability: self.delivery.probability,
            },
            PolicyKind::Threshold => DeliveryPolicy::Threshold,
            PolicyKind::Always => DeliveryPolicy::Always,
            PolicyKind::Never => DeliveryPolicy::Never,
        };

        SimulatorConfig {
            host: self.server.host,
            port: Some(self.server.port),
            deadline_ms: self.events.deadline_ms,
            work_delay: self.work.delay,
            batch_size: self.work.batch_size,
            gate_poll_interval: self.events.gate_poll_interval,
            delivery_policy,
            delivery_timeout: self.delivery.timeout,
            max_buffered_records: self.buffer.max_records,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
        }
    }
}

/// Lifecycle event configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Placeholder `deadlineMs` on generated events.
    pub deadline_ms: i64,
    /// Backstop re-check interval for blocked `/event/next` calls.
    #[serde(with = "duration_ms")]
    pub gate_poll_interval: Duration,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 1000,
            gate_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Simulated function work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Simulated execution time per invocation.
    #[serde(with = "duration_ms")]
    pub delay: Duration,
    /// Log records produced per invocation.
    pub batch_size: usize,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
            batch_size: 7,
        }
    }
}

/// Log delivery behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Trigger used by event cycles.
    pub policy: PolicyKind,
    /// Delivery chance per cycle for the random policy.
    pub probability: f64,
    /// Timeout for each outbound request.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Random,
            probability: 0.2,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Log buffer limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Cap on buffered records; unset means unbounded.
    pub max_records: Option<usize>,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
