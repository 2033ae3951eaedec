use thiserror::Error;

use crate::types::ConnectionId;

/// Errors reported by a `Transport` implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection is unknown or already closed
    #[error("Connection {connection} is not open on this transport")]
    ConnectionNotFound { connection: ConnectionId },

    /// The transport itself has shut down
    #[error("Transport is closed. No further frames can be sent")]
    Closed,

    /// The frame exceeds what the transport can carry
    #[error("Frame of {length} bytes exceeds the transport limit of {limit} bytes")]
    PayloadTooLarge { length: usize, limit: usize },
}
