//! Error types for the logs API simulator.

use thiserror::Error;

/// Errors that can occur while starting or driving the simulator.
#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Error starting the HTTP server.
    #[error("Failed to start server: {0}")]
    ServerStart(String),

    /// Error binding to the specified address.
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Timeout occurred during operation.
    #[error("Timeout occurred: {0}")]
    Timeout(String),
}

/// Errors that can occur when shipping buffered logs to the configured destination.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Delivery was triggered before any `PUT /2020-08-15/logs` call.
    #[error("Log delivery configuration has not been set")]
    ConfigurationNotSet,

    /// The outbound request could not be completed.
    #[error("Failed to send logs to {uri}: {source}")]
    Transport {
        /// Destination the batch was addressed to.
        uri: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The destination answered with a non-success status.
    #[error("Destination {uri} rejected logs with status {status}")]
    Status {
        /// Destination the batch was addressed to.
        uri: String,
        /// HTTP status returned by the destination.
        status: reqwest::StatusCode,
    },
}

/// Result type for simulator operations.
pub type SimulatorResult<T> = Result<T, SimulatorError>;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
