//! Synthetic lifecycle events and function work.

use crate::extension::{LifecycleEvent, ShutdownReason, TracingInfo};
use crate::log_buffer::LogRecord;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Trace header type carried by generated INVOKE events.
pub const TRACE_HEADER_TYPE: &str = "X-Amzn-Trace-Id";

/// Payload of a generated function log record.
#[derive(Debug, Clone, Serialize)]
struct WorkPayload {
    /// Random marker distinguishing one record from another.
    #[serde(rename = "testData")]
    random_marker: Uuid,

    level: &'static str,
}

/// Produces INVOKE events and the logs their simulated work emits.
#[derive(Debug, Clone)]
pub struct EventGenerator {
    deadline_ms: i64,
    work_delay: Duration,
    batch_size: usize,
}

impl Default for EventGenerator {
    fn default() -> Self {
        Self {
            deadline_ms: 1000,
            work_delay: Duration::from_millis(300),
            batch_size: 7,
        }
    }
}

impl EventGenerator {
    /// Creates a generator.
    ///
    /// # Arguments
    ///
    /// * `deadline_ms` - Placeholder deadline stamped on every event
    /// * `work_delay` - Simulated execution time before logs are produced
    /// * `batch_size` - Number of log records each invocation produces
    pub fn new(deadline_ms: i64, work_delay: Duration, batch_size: usize) -> Self {
        Self {
            deadline_ms,
            work_delay,
            batch_size,
        }
    }

    /// Builds an INVOKE event with freshly generated identifiers.
    pub fn next_invocation_event(&self) -> LifecycleEvent {
        LifecycleEvent::Invoke {
            deadline_ms: self.deadline_ms,
            request_id: Uuid::new_v4().to_string(),
            invoked_function_arn: Uuid::new_v4().to_string(),
            tracing: TracingInfo {
                trace_type: TRACE_HEADER_TYPE.to_string(),
                value: Uuid::new_v4().to_string(),
            },
        }
    }

    /// Builds a SHUTDOWN event.
    pub fn shutdown_event(&self, reason: ShutdownReason) -> LifecycleEvent {
        LifecycleEvent::Shutdown {
            shutdown_reason: reason,
            deadline_ms: self.deadline_ms,
        }
    }

    /// Waits out the simulated execution time, then returns the logs it wrote.
    pub async fn simulate_work(&self) -> Vec<LogRecord> {
        tokio::time::sleep(self.work_delay).await;

        (0..self.batch_size)
            .map(|_| {
                LogRecord::function(
                    serde_json::to_value(WorkPayload {
                        random_marker: Uuid::new_v4(),
                        level: "INFO",
                    })
                    .unwrap_or_default(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::EventType;
    use crate::log_buffer::LogType;
    use std::collections::HashSet;

    #[test]
    fn test_invocation_events_have_distinct_request_ids() {
        let generator = EventGenerator::default();
        let mut seen = HashSet::new();

        for _ in 0..1000 {
            let event = generator.next_invocation_event();
            assert_eq!(event.event_type(), EventType::Invoke);
            let request_id = event.request_id().unwrap().to_string();
            assert!(seen.insert(request_id), "request ID repeated");
        }
    }

    #[test]
    fn test_invocation_identifiers_are_independent_uuids() {
        let LifecycleEvent::Invoke {
            deadline_ms,
            request_id,
            invoked_function_arn,
            tracing,
        } = EventGenerator::default().next_invocation_event()
        else {
            panic!("expected INVOKE");
        };

        assert_eq!(deadline_ms, 1000);
        assert_eq!(tracing.trace_type, TRACE_HEADER_TYPE);
        for id in [&request_id, &invoked_function_arn, &tracing.value] {
            assert!(Uuid::parse_str(id).is_ok(), "{id} is not a UUID");
        }
        assert_ne!(request_id, invoked_function_arn);
        assert_ne!(request_id, tracing.value);
    }

    #[test]
    fn test_shutdown_event_carries_reason() {
        let generator = EventGenerator::new(2500, Duration::ZERO, 1);
        assert_eq!(
            generator.shutdown_event(ShutdownReason::Timeout),
            LifecycleEvent::Shutdown {
                shutdown_reason: ShutdownReason::Timeout,
                deadline_ms: 2500,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_work_waits_then_yields_batch() {
        let generator = EventGenerator::default();
        let started = tokio::time::Instant::now();

        let records = generator.simulate_work().await;

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(records.len(), 7);
        for record in &records {
            assert_eq!(record.log_type, LogType::Function);
            assert_eq!(record.record["level"], "INFO");
            assert!(Uuid::parse_str(record.record["testData"].as_str().unwrap()).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_work_does_not_block_other_tasks() {
        let generator = EventGenerator::default();
        let work = tokio::spawn(async move { generator.simulate_work().await });

        let ticker = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tokio::time::Instant::now()
        });

        let ticked_at = ticker.await.unwrap();
        let records = work.await.unwrap();
        assert_eq!(records.len(), 7);
        assert!(ticked_at.elapsed() >= Duration::from_millis(200));
    }
}
