//! Main simulator orchestration and builder.

use crate::delivery::{DeliveryConfig, DeliveryOutcome, DeliveryPolicy, LogSink};
use crate::dispatch::EventDispatcher;
use crate::error::{DeliveryResult, SimulatorError, SimulatorResult};
use crate::extension::ShutdownReason;
use crate::extensions_api::{ExtensionsApiState, create_extensions_api_router};
use crate::gate::EventGate;
use crate::generator::EventGenerator;
use crate::log_buffer::{LogBuffer, LogRecord};
use crate::logs_api::{LogsApiState, create_logs_api_router};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Configuration for the logs API simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Address to listen on.
    pub host: IpAddr,

    /// Port to listen on. `None` picks a random free port.
    pub port: Option<u16>,

    /// Placeholder `deadlineMs` stamped on generated events.
    pub deadline_ms: i64,

    /// Simulated execution time of each invocation.
    pub work_delay: Duration,

    /// Log records produced per invocation.
    pub batch_size: usize,

    /// Longest a blocked `/event/next` waits before re-checking the gate.
    pub gate_poll_interval: Duration,

    /// Whether an event cycle delivers the buffer.
    pub delivery_policy: DeliveryPolicy,

    /// Timeout for each outbound delivery request.
    pub delivery_timeout: Duration,

    /// Cap on buffered records. `None` leaves the buffer unbounded.
    pub max_buffered_records: Option<usize>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
            deadline_ms: 1000,
            work_delay: Duration::from_millis(300),
            batch_size: 7,
            gate_poll_interval: Duration::from_millis(100),
            delivery_policy: DeliveryPolicy::default(),
            delivery_timeout: Duration::from_secs(5),
            max_buffered_records: None,
        }
    }
}

/// Builder for creating a logs API simulator.
///
/// # Examples
///
/// ```no_run
/// use logs_api_simulator::{DeliveryPolicy, Simulator};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let simulator = Simulator::builder()
///     .work_delay(Duration::from_millis(50))
///     .delivery_policy(DeliveryPolicy::Threshold)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing unless .build() is called"]
pub struct SimulatorBuilder {
    config: SimulatorConfig,
}

impl SimulatorBuilder {
    /// Creates a new simulator builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from a complete configuration.
    pub fn from_config(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Sets the address to listen on. Default: 127.0.0.1
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    /// Sets the port to bind to. If not specified, a random available port will be used.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Sets the placeholder deadline on generated events. Default: 1000
    pub fn deadline_ms(mut self, deadline_ms: i64) -> Self {
        self.config.deadline_ms = deadline_ms;
        self
    }

    /// Sets the simulated execution time per invocation. Default: 300ms
    pub fn work_delay(mut self, delay: Duration) -> Self {
        self.config.work_delay = delay;
        self
    }

    /// Sets the number of log records each invocation produces. Default: 7
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Sets how often a blocked `/event/next` re-checks the gate on its own.
    ///
    /// Waiters are normally woken by the release itself; this only bounds
    /// how long a missed wake-up can stall them. Default: 100ms
    pub fn gate_poll_interval(mut self, interval: Duration) -> Self {
        self.config.gate_poll_interval = interval;
        self
    }

    /// Sets the delivery trigger. Default: random with probability 0.2
    pub fn delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.config.delivery_policy = policy;
        self
    }

    /// Sets the timeout for outbound delivery requests. Default: 5s
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    /// Caps the buffer, dropping the oldest records beyond `max`.
    pub fn max_buffered_records(mut self, max: usize) -> Self {
        self.config.max_buffered_records = Some(max);
        self
    }

    /// Builds and starts the simulator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the server fails
    /// to bind to the requested address.
    pub async fn build(self) -> SimulatorResult<Simulator> {
        let config = self.config;

        if let DeliveryPolicy::Random { probability } = config.delivery_policy
            && !(0.0..=1.0).contains(&probability)
        {
            return Err(SimulatorError::InvalidConfiguration(format!(
                "delivery probability must be between 0 and 1, got {probability}"
            )));
        }
        if config.gate_poll_interval.is_zero() {
            return Err(SimulatorError::InvalidConfiguration(
                "gate poll interval must be greater than zero".to_string(),
            ));
        }

        let buffer = Arc::new(match config.max_buffered_records {
            Some(max) => LogBuffer::with_capacity_limit(max),
            None => LogBuffer::new(),
        });
        let sink = Arc::new(LogSink::new(
            config.delivery_policy,
            config.delivery_timeout,
        ));
        let dispatcher = Arc::new(EventDispatcher::new(
            EventGate::new_shared(config.gate_poll_interval),
            EventGenerator::new(config.deadline_ms, config.work_delay, config.batch_size),
            buffer,
            sink.clone(),
        ));

        let extensions_router = create_extensions_api_router(ExtensionsApiState {
            dispatcher: dispatcher.clone(),
        });
        let logs_router = create_logs_api_router(LogsApiState { sink });

        let combined_router = extensions_router.merge(logs_router).fallback(
            |req: axum::extract::Request| async move {
                tracing::warn!(
                    method = %req.method(),
                    uri = %req.uri(),
                    "Unhandled request"
                );
                axum::http::StatusCode::NOT_FOUND
            },
        );

        let addr = SocketAddr::new(config.host, config.port.unwrap_or(0));

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SimulatorError::BindError(e.to_string()))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| SimulatorError::ServerStart(e.to_string()))?;

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, combined_router)
                .await
                .map_err(|e| SimulatorError::ServerStart(e.to_string()))
        });

        tracing::info!(
            target: "lambda_lifecycle",
            "🚀 Logs API simulator listening on http://{} (policy: {:?})",
            local_addr,
            config.delivery_policy
        );

        Ok(Simulator {
            dispatcher,
            config: Arc::new(config),
            addr: local_addr,
            server_handle,
        })
    }
}

/// A running logs API simulator.
///
/// Every simulator owns its gate, buffer and delivery configuration, so
/// several instances can run side by side without sharing state.
pub struct Simulator {
    dispatcher: Arc<EventDispatcher>,
    config: Arc<SimulatorConfig>,
    addr: SocketAddr,
    server_handle: JoinHandle<SimulatorResult<()>>,
}

impl Simulator {
    /// Creates a new simulator builder.
    pub fn builder() -> SimulatorBuilder {
        SimulatorBuilder::new()
    }

    /// Returns the base URL extensions should talk to.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use logs_api_simulator::Simulator;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let simulator = Simulator::builder().build().await?;
    /// println!("Set AWS_LAMBDA_RUNTIME_API={}", simulator.addr());
    /// println!("Register at {}/2020-01-01/extension/register", simulator.base_url());
    /// # Ok(())
    /// # }
    /// ```
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Returns the socket address the simulator is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the configuration the simulator was built with.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Number of log records waiting for delivery.
    pub async fn buffered_log_count(&self) -> usize {
        self.dispatcher.buffer().len().await
    }

    /// Copies the log records waiting for delivery.
    pub async fn buffered_logs(&self) -> Vec<LogRecord> {
        self.dispatcher.buffer().snapshot().await
    }

    /// Returns the delivery configuration last stored through `PUT /2020-08-15/logs`.
    pub async fn delivery_config(&self) -> Option<DeliveryConfig> {
        self.dispatcher.sink().config().await
    }

    /// Returns `true` while an event is held by an extension.
    pub fn is_event_outstanding(&self) -> bool {
        self.dispatcher.gate().is_outstanding()
    }

    /// Number of event cycles that have run to completion.
    pub fn completed_cycles(&self) -> u64 {
        self.dispatcher.completed_cycles()
    }

    /// Waits until at least `count` event cycles have completed.
    ///
    /// # Errors
    ///
    /// Returns `SimulatorError::Timeout` if the cycles don't complete in time.
    pub async fn wait_for_cycles(&self, count: u64, timeout: Duration) -> SimulatorResult<()> {
        tokio::time::timeout(timeout, self.dispatcher.wait_for_completed_cycles(count))
            .await
            .map_err(|_| {
                SimulatorError::Timeout(format!(
                    "{} event cycles did not complete within {:?}",
                    count, timeout
                ))
            })
    }

    /// Makes the next `/event/next` return a SHUTDOWN event.
    ///
    /// The cycle serving that event flushes the buffer before releasing the gate.
    pub async fn request_shutdown(&self, reason: ShutdownReason) {
        tracing::info!(target: "lambda_lifecycle", "🛑 Shutdown requested ({:?})", reason);
        self.dispatcher.request_shutdown(reason).await;
    }

    /// Returns `true` while a requested SHUTDOWN has not been polled yet.
    pub async fn is_shutdown_pending(&self) -> bool {
        self.dispatcher.is_shutdown_pending().await
    }

    /// Delivers the buffer now, regardless of the delivery policy.
    ///
    /// # Errors
    ///
    /// Returns the delivery error; on failure the buffer is left intact.
    pub async fn flush_logs(&self) -> DeliveryResult<DeliveryOutcome> {
        self.dispatcher.sink().flush(self.dispatcher.buffer()).await
    }

    /// Waits for a condition to become true, with timeout.
    ///
    /// # Errors
    ///
    /// Returns `SimulatorError::Timeout` if the condition doesn't become true within the timeout.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use logs_api_simulator::Simulator;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let simulator = Simulator::builder().build().await?;
    ///
    /// simulator.wait_for(
    ///     || async { simulator.buffered_log_count().await >= 7 },
    ///     Duration::from_secs(5)
    /// ).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_for<F, Fut>(&self, condition: F, timeout: Duration) -> SimulatorResult<()>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let poll_interval = Duration::from_millis(10);

        loop {
            if condition().await {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(SimulatorError::Timeout(format!(
                    "Condition did not become true within {:?}",
                    timeout
                )));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stops the HTTP server and waits for it to finish.
    pub async fn shutdown(self) {
        self.server_handle.abort();
        let _ = self.server_handle.await;
    }
}
