//! Stream relay: forwards canonical events to an external sink while recording.
//!
//! The relay observes the transport's connection state but never drives
//! reconnection. Sends happen on a dedicated worker thread fed through a
//! bounded queue, so forwarding never blocks the acquisition loop. A failed
//! send moves the relay to [`ConnectionState::Error`] and is not retried.

use crate::core::event::CanonicalEvent;
use crate::stats::SharedRecordingStats;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Maximum number of events waiting for the relay worker.
pub const RELAY_QUEUE_CAPACITY: usize = 1_000;

/// Relay endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay host (default: localhost)
    pub host: String,
    /// Relay port (default: 8080)
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

impl RelayConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the full relay URL.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Endpoint that receives one event per request.
    pub fn ingest_url(&self) -> String {
        format!("{}/sensor_data", self.url())
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

/// Connection state as observed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Relay error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Relay is not connected")]
    NotConnected,
    #[error("Relay config error: {0}")]
    Config(String),
    #[error("Relay network error: {0}")]
    Network(String),
    #[error("Relay server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Relay serialization error: {0}")]
    Serialization(String),
}

/// Connect/disconnect/send over a persistent connection.
pub trait RelayTransport: Send + 'static {
    fn connect(&mut self) -> Result<(), RelayError>;

    fn disconnect(&mut self) {}

    fn send(&mut self, event: &CanonicalEvent) -> Result<(), RelayError>;
}

struct RelayWorker {
    sender: Sender<CanonicalEvent>,
    handle: JoinHandle<()>,
}

/// Optional side channel that forwards recorded events.
pub struct StreamRelay {
    state: Arc<Mutex<ConnectionState>>,
    worker: Option<RelayWorker>,
    stats: SharedRecordingStats,
}

impl StreamRelay {
    pub fn new(stats: SharedRecordingStats) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            worker: None,
            stats,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().is_connected()
    }

    /// Connect through `transport` and start the send worker.
    ///
    /// Any previous connection is closed first.
    pub fn connect(&mut self, mut transport: Box<dyn RelayTransport>) -> Result<(), RelayError> {
        self.disconnect();
        *self.state.lock() = ConnectionState::Connecting;

        if let Err(e) = transport.connect() {
            warn!("Relay connection failed: {e}");
            *self.state.lock() = ConnectionState::Error(e.to_string());
            return Err(e);
        }

        let (sender, receiver) = bounded::<CanonicalEvent>(RELAY_QUEUE_CAPACITY);
        let state = Arc::clone(&self.state);
        let stats = Arc::clone(&self.stats);

        let handle = thread::Builder::new()
            .name("stream-relay".to_string())
            .spawn(move || {
                for event in receiver.iter() {
                    if let Err(e) = transport.send(&event) {
                        warn!("Relay send failed: {e}");
                        stats.record_relay_failure();
                        *state.lock() = ConnectionState::Error(e.to_string());
                        break;
                    }
                }
                transport.disconnect();
                debug!("relay worker exited");
            })
            .map_err(|e| RelayError::Config(format!("Failed to spawn relay worker: {e}")))?;

        *self.state.lock() = ConnectionState::Connected;
        self.worker = Some(RelayWorker { sender, handle });
        info!("Relay connected");
        Ok(())
    }

    /// Queue `event` for sending.
    ///
    /// Only attempted while connected; never blocks. Returns whether the event
    /// was queued.
    pub fn forward(&self, event: &CanonicalEvent) -> bool {
        if !self.is_connected() {
            return false;
        }
        let Some(worker) = &self.worker else {
            return false;
        };

        match worker.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("relay queue full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Drain queued events, stop the worker and close the transport.
    pub fn disconnect(&mut self) {
        if let Some(RelayWorker { sender, handle }) = self.worker.take() {
            drop(sender);
            if handle.join().is_err() {
                warn!("relay worker panicked");
            }
            let mut state = self.state.lock();
            if state.is_connected() {
                *state = ConnectionState::Disconnected;
            }
            info!("Relay disconnected");
        } else {
            let mut state = self.state.lock();
            if !matches!(*state, ConnectionState::Error(_)) {
                *state = ConnectionState::Disconnected;
            }
        }
    }
}

impl Drop for StreamRelay {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// HTTP transport posting each event as JSON.
#[cfg(feature = "relay")]
pub struct HttpRelayTransport {
    config: RelayConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    device_id: String,
}

#[cfg(feature = "relay")]
impl HttpRelayTransport {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create runtime: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            runtime,
            device_id: device_id(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn check_health(&self) -> Result<(), RelayError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Server {
                status: status.as_u16(),
                message: "health check failed".to_string(),
            });
        }
        Ok(())
    }

    async fn post_event(&self, event: &CanonicalEvent) -> Result<(), RelayError> {
        let body =
            serde_json::to_vec(event).map_err(|e| RelayError::Serialization(e.to_string()))?;

        let response = self
            .client
            .post(self.config.ingest_url())
            .header("Content-Type", "application/json")
            .header("X-Device-Id", &self.device_id)
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RelayError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(feature = "relay")]
impl RelayTransport for HttpRelayTransport {
    fn connect(&mut self) -> Result<(), RelayError> {
        self.runtime.block_on(self.check_health())
    }

    fn send(&mut self, event: &CanonicalEvent) -> Result<(), RelayError> {
        self.runtime.block_on(self.post_event(event))
    }
}

/// `recorder-<hostname>-<8 hex chars>`
pub fn device_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!(
        "recorder-{}-{}",
        hostname,
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    )
}
