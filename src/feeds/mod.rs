pub mod backoff;
pub mod connection;
pub mod orchestrator;
pub mod record;
pub mod websocket;

pub use backoff::{Backoff, ReconnectPolicy};
pub use connection::{ConnectError, ConnectionState, Connector, StreamConnection, StreamError, Transport};
pub use orchestrator::{FeedStats, Orchestrator, StreamStatus};
pub use record::{decode, Author, DecodeError, RawMessage, StreamRecord};
pub use websocket::WsConnector;
