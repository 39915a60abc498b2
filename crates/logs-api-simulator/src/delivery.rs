//! Logs API subscription types and delivery of buffered logs.
//!
//! Subscription shapes follow the Lambda Logs API as documented at:
//! <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-logs-api.html>

use crate::error::{DeliveryError, DeliveryResult};
use crate::log_buffer::{BufferStats, LogBuffer, LogRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

/// Fixed CloudWatch-style prefix prepended to every delivered line.
pub const LOG_LINE_PREFIX: &str =
    "2020-11-18T23:52:30.128Z 6e48723a-1596-4313-a9af-e4da9214d637 INFO ";

/// Configuration sent by an extension to `PUT /2020-08-15/logs`.
///
/// Every field is optional. Nothing is validated when the configuration is
/// stored; a configuration without a destination URI simply cannot be
/// delivered to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Where to send logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,

    /// Log types the subscriber asked for. Stored as given; delivery sends
    /// every buffered record regardless.
    #[serde(default)]
    pub types: Vec<String>,

    /// Buffering thresholds.
    #[serde(default)]
    pub buffering: BufferingConfig,
}

impl DeliveryConfig {
    /// Returns the URI to post batches to, if one was configured.
    pub fn destination_uri(&self) -> Option<&str> {
        self.destination
            .as_ref()
            .map(|d| d.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

/// HTTP destination for delivered logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Protocol (the platform only supports "HTTP").
    #[serde(default)]
    pub protocol: String,

    /// URI to post batches to.
    #[serde(rename = "URI", default)]
    pub uri: String,
}

/// Buffering thresholds for log delivery.
///
/// Values are taken as sent. A zero or negative limit is crossed as soon as
/// anything is buffered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferingConfig {
    /// Deliver once this many records are buffered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,

    /// Deliver once the buffered records reach this many bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<i64>,

    /// Deliver once the oldest buffered record is this old.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
}

impl BufferingConfig {
    /// Returns `true` when any configured threshold has been crossed.
    pub fn is_exceeded(&self, stats: &BufferStats, now: DateTime<Utc>) -> bool {
        let items = self
            .max_items
            .is_some_and(|max| stats.items as i64 >= max);
        let bytes = self
            .max_bytes
            .is_some_and(|max| stats.bytes as i64 >= max);
        let age = match (self.timeout_ms, stats.oldest) {
            (Some(timeout_ms), Some(oldest)) => (now - oldest).num_milliseconds() >= timeout_ms,
            _ => false,
        };
        items || bytes || age
    }
}

/// Decides whether an event cycle delivers the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeliveryPolicy {
    /// Deliver with the given probability each cycle.
    Random {
        /// Chance of delivering, between 0 and 1.
        probability: f64,
    },

    /// Deliver when the configured buffering thresholds are crossed.
    Threshold,

    /// Deliver every cycle.
    Always,

    /// Never deliver from an event cycle.
    Never,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy::Random { probability: 0.2 }
    }
}

impl DeliveryPolicy {
    /// Evaluates the policy.
    ///
    /// # Arguments
    ///
    /// * `stats` - Current buffer summary
    /// * `buffering` - Thresholds from the stored configuration, if any
    /// * `roll` - Uniform random sample in `[0, 1)`
    /// * `now` - Current time, for the age threshold
    pub fn should_deliver(
        &self,
        stats: &BufferStats,
        buffering: Option<&BufferingConfig>,
        roll: f64,
        now: DateTime<Utc>,
    ) -> bool {
        match self {
            DeliveryPolicy::Random { probability } => roll < *probability,
            DeliveryPolicy::Threshold => buffering.is_some_and(|b| b.is_exceeded(stats, now)),
            DeliveryPolicy::Always => true,
            DeliveryPolicy::Never => false,
        }
    }
}

/// What a delivery attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The policy did not trigger, or there was nothing to send.
    Skipped,

    /// A batch was accepted by the destination.
    Delivered {
        /// Number of records sent.
        records: usize,
    },
}

/// Formats a record for delivery as a CloudWatch-style log line.
pub fn format_log_line(record: &LogRecord) -> LogRecord {
    LogRecord {
        time: record.time,
        log_type: record.log_type,
        record: serde_json::Value::String(format!("{LOG_LINE_PREFIX}{}", record.record)),
    }
}

/// Holds the delivery configuration and ships buffered logs to it.
#[derive(Debug)]
pub struct LogSink {
    config: RwLock<Option<DeliveryConfig>>,
    policy: DeliveryPolicy,

    /// HTTP/1.1 only client; log receivers in extensions are usually plain hyper http1 servers.
    http_client: reqwest::Client,
}

impl LogSink {
    /// Creates a sink with no configuration.
    ///
    /// # Arguments
    ///
    /// * `policy` - Delivery trigger used by event cycles
    /// * `request_timeout` - Upper bound on a single outbound POST
    pub fn new(policy: DeliveryPolicy, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .http1_only()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: RwLock::new(None),
            policy,
            http_client,
        }
    }

    /// Stores a configuration, replacing any previous one wholesale.
    pub async fn configure(&self, config: DeliveryConfig) -> Option<DeliveryConfig> {
        self.config.write().await.replace(config)
    }

    /// Returns the stored configuration.
    pub async fn config(&self) -> Option<DeliveryConfig> {
        self.config.read().await.clone()
    }

    /// Delivers the buffer if the policy says so.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::ConfigurationNotSet`] if the policy triggers
    /// while no destination URI is stored; the buffer is left untouched.
    /// Transport and status failures put the drained batch back into the buffer.
    pub async fn maybe_deliver(&self, buffer: &LogBuffer) -> DeliveryResult<DeliveryOutcome> {
        let config = self.config().await;
        let buffering = config.as_ref().map(|c| &c.buffering);
        let uri = config.as_ref().and_then(DeliveryConfig::destination_uri);
        let roll = rand::random::<f64>();
        let now = Utc::now();

        let mut triggered = false;
        let drained = buffer
            .drain_if(|stats| {
                triggered = self.policy.should_deliver(stats, buffering, roll, now);
                triggered && uri.is_some()
            })
            .await;

        match (drained, uri) {
            (Some(records), Some(uri)) => self.send(buffer, uri, records).await,
            _ if triggered => Err(DeliveryError::ConfigurationNotSet),
            _ => {
                tracing::trace!("Delivery not triggered");
                Ok(DeliveryOutcome::Skipped)
            }
        }
    }

    /// Delivers the buffer regardless of the policy.
    ///
    /// # Errors
    ///
    /// Same as [`LogSink::maybe_deliver`].
    pub async fn flush(&self, buffer: &LogBuffer) -> DeliveryResult<DeliveryOutcome> {
        let config = self.config().await;
        let Some(uri) = config.as_ref().and_then(DeliveryConfig::destination_uri) else {
            if buffer.is_empty().await {
                return Ok(DeliveryOutcome::Skipped);
            }
            return Err(DeliveryError::ConfigurationNotSet);
        };

        let records = buffer.drain_all().await;
        if records.is_empty() {
            return Ok(DeliveryOutcome::Skipped);
        }
        self.send(buffer, uri, records).await
    }

    async fn send(
        &self,
        buffer: &LogBuffer,
        uri: &str,
        drained: Vec<LogRecord>,
    ) -> DeliveryResult<DeliveryOutcome> {
        let batch: Vec<LogRecord> = drained.iter().map(format_log_line).collect();
        tracing::debug!(count = batch.len(), uri = %uri, "Sending logs");

        match self.http_client.post(uri).json(&batch).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(status = %resp.status(), count = batch.len(), "Log delivery successful");
                Ok(DeliveryOutcome::Delivered {
                    records: batch.len(),
                })
            }
            Ok(resp) => {
                let status = resp.status();
                buffer.requeue_front(drained).await;
                Err(DeliveryError::Status {
                    uri: uri.to_string(),
                    status,
                })
            }
            Err(source) => {
                buffer.requeue_front(drained).await;
                Err(DeliveryError::Transport {
                    uri: uri.to_string(),
                    source,
                })
            }
        }
    }
}
