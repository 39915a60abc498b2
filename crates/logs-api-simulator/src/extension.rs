//! Lambda Extensions API event types.
//!
//! Wire shapes follow the Extensions API as documented at:
//! <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-extensions-api.html>

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extension identifier returned upon registration.
pub type ExtensionId = String;

/// Issues a fresh extension identifier.
///
/// Identifiers are opaque; nothing records which ones have been handed out.
pub fn new_extension_id() -> ExtensionId {
    Uuid::new_v4().to_string()
}

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// Invocation event - sent when a new invocation starts.
    Invoke,

    /// Shutdown event - sent when the environment is shutting down.
    Shutdown,
}

/// Reasons for a shutdown event, in their lowercase wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownReason {
    /// Normal spindown of the environment.
    Spindown,

    /// Timeout occurred during execution.
    Timeout,

    /// Failure in the environment.
    Failure,
}

/// A lifecycle event returned from `/event/next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum LifecycleEvent {
    /// Invocation event.
    #[serde(rename = "INVOKE")]
    Invoke {
        /// Placeholder deadline for the invocation.
        #[serde(rename = "deadlineMs")]
        deadline_ms: i64,

        /// Request ID for this invocation.
        #[serde(rename = "requestId")]
        request_id: String,

        /// ARN of the invoked function.
        #[serde(rename = "invokedFunctionArn")]
        invoked_function_arn: String,

        /// Tracing header for the invocation.
        #[serde(rename = "tracing")]
        tracing: TracingInfo,
    },

    /// Shutdown event with reason.
    #[serde(rename = "SHUTDOWN")]
    Shutdown {
        /// Reason for the shutdown.
        #[serde(rename = "shutdownReason")]
        shutdown_reason: ShutdownReason,

        /// Placeholder deadline for cleanup.
        #[serde(rename = "deadlineMs")]
        deadline_ms: i64,
    },
}

impl LifecycleEvent {
    /// Returns the kind of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            LifecycleEvent::Invoke { .. } => EventType::Invoke,
            LifecycleEvent::Shutdown { .. } => EventType::Shutdown,
        }
    }

    /// Returns the request ID of an INVOKE event.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            LifecycleEvent::Invoke { request_id, .. } => Some(request_id),
            LifecycleEvent::Shutdown { .. } => None,
        }
    }
}

/// X-Ray tracing information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingInfo {
    /// Trace header type.
    #[serde(rename = "type")]
    pub trace_type: String,

    /// The trace ID value.
    pub value: String,
}
