//! # Logs API Simulator
//!
//! A local simulator of the AWS Lambda Extensions and Logs APIs for testing
//! log-shipping extensions without deploying them.
//!
//! ## Overview
//!
//! An extension registers, subscribes a log destination and then long-polls
//! for lifecycle events. Every event it receives starts a simulated
//! invocation that writes a batch of function logs into an in-memory buffer.
//! The buffer is forwarded to the subscribed destination as CloudWatch-style
//! log lines whenever the delivery policy says so.
//!
//! Only one event is outstanding at a time: a poll that arrives while the
//! previous invocation is still running waits until it has finished.
//!
//! ## Quick Start
//!
//! ```no_run
//! use logs_api_simulator::{DeliveryPolicy, Simulator};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let simulator = Simulator::builder()
//!         .delivery_policy(DeliveryPolicy::Threshold)
//!         .build()
//!         .await?;
//!
//!     println!("Extensions API available at: {}", simulator.base_url());
//!
//!     // Point the extension under test at simulator.addr() and let it run...
//!
//!     simulator
//!         .wait_for(|| async { simulator.completed_cycles() >= 3 }, Duration::from_secs(5))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Endpoints
//!
//! - `POST /2020-01-01/extension/register` - Issue an extension identifier
//! - `GET /2020-01-01/extension/event/next` - Next lifecycle event (long-poll)
//! - `PUT /2020-08-15/logs` - Subscribe a log destination
//!
//! For more details, see:
//! <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-extensions-api.html>
//! and <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-logs-api.html>

pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod extension;
pub(crate) mod extensions_api;
pub mod gate;
pub mod generator;
pub mod log_buffer;
pub(crate) mod logs_api;
pub mod simulator;

pub use config::Config;
pub use delivery::{
    BufferingConfig, DeliveryConfig, DeliveryOutcome, DeliveryPolicy, Destination, LOG_LINE_PREFIX,
    LogSink,
};
pub use dispatch::EventDispatcher;
pub use error::{DeliveryError, SimulatorError, SimulatorResult};
pub use extension::{EventType, ExtensionId, LifecycleEvent, ShutdownReason, TracingInfo};
pub use extensions_api::{EXTENSION_IDENTIFIER_HEADER, EXTENSION_NAME_HEADER};
pub use gate::{EventGate, GateGuard};
pub use generator::EventGenerator;
pub use log_buffer::{BufferStats, LogBuffer, LogRecord, LogType};
pub use simulator::{Simulator, SimulatorBuilder, SimulatorConfig};
