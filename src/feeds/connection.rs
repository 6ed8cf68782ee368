use super::record::RawMessage;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    ClosedPendingRetry,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "live",
            ConnectionState::ClosedPendingRetry => "reconnecting",
        };
        f.write_str(label)
    }
}

/// The transport could not be established. Handled exactly like a closure.
#[derive(Debug, Error)]
#[error("failed to connect to {target}: {reason}")]
pub struct ConnectError {
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("a connection is already {0}; close it before opening another")]
    AlreadyActive(ConnectionState),
}

/// Establishes push transports. Implemented over WebSockets in production.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &Url) -> Result<Box<dyn Transport>, ConnectError>;
}

/// One established push channel.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound payload, or `None` once the channel is closed for any reason.
    async fn next_message(&mut self) -> Option<RawMessage>;
}

/// Owns at most one transport at a time and tracks its lifecycle.
pub struct StreamConnection {
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
}

impl StreamConnection {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start a connection attempt to `target`.
    ///
    /// Refused while another attempt is in flight or open. A failed connect is
    /// not an error here: the connection just lands in `ClosedPendingRetry`.
    pub async fn open(&mut self, target: &Url) -> Result<(), StreamError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                return Err(StreamError::AlreadyActive(self.state));
            }
            ConnectionState::Disconnected | ConnectionState::ClosedPendingRetry => {}
        }

        self.state = ConnectionState::Connecting;
        info!(url = %target, "connecting");

        match self.connector.connect(target).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = ConnectionState::Open;
                info!(url = %target, "stream open");
            }
            Err(err) => {
                warn!(error = %err, "connect failed");
                self.state = ConnectionState::ClosedPendingRetry;
            }
        }
        Ok(())
    }

    /// Wait for the next payload. Returns `None` when there is no open
    /// transport; if the transport just closed it is dropped first.
    pub async fn recv(&mut self) -> Option<RawMessage> {
        let transport = self.transport.as_mut()?;
        match transport.next_message().await {
            Some(raw) => Some(raw),
            None => {
                self.transport = None;
                self.state = ConnectionState::ClosedPendingRetry;
                info!("stream closed");
                None
            }
        }
    }

    /// Drop the transport, if any, and return to `Disconnected`.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("transport dropped on teardown");
        }
        self.state = ConnectionState::Disconnected;
    }
}
