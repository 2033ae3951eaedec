use thiserror::Error;

use netsync_serde::SerdeErr;

use crate::{messages::message_type::MessageType, types::ConnectionId};

/// Errors raised while framing or dispatching messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Incoming frame could not be decoded
    #[error("Malformed {message_type} message from {connection}: {source}")]
    Malformed {
        connection: ConnectionId,
        message_type: MessageType,
        source: SerdeErr,
    },

    /// Incoming frame was too short to hold a message type
    #[error("Frame from {connection} is too short to carry a message type")]
    MissingMessageType { connection: ConnectionId },

    /// No handler registered for this message type
    #[error("No handler registered for {message_type} from {connection}. Register it on the MessageRouter before receiving")]
    UnknownMessageType {
        connection: ConnectionId,
        message_type: MessageType,
    },

    /// A reserved message type arrived at a role that never receives it
    #[error("{message_type} is not accepted by this host (sent by {connection})")]
    UnexpectedMessageType {
        connection: ConnectionId,
        message_type: MessageType,
    },

    /// Attempted to register a handler inside the reserved range
    #[error("{message_type} is reserved for the replication protocol. Custom message types must be greater than {highest}")]
    ReservedMessageType {
        message_type: MessageType,
        highest: MessageType,
    },

    /// Attempted to register two handlers for the same message type
    #[error("A handler for {message_type} is already registered")]
    DuplicateHandler { message_type: MessageType },

    /// No connection to send on
    #[error("Not connected. Messages can only be sent after the transport reports a connection")]
    NotConnected,
}

impl MessageError {
    pub fn malformed(connection: ConnectionId, message_type: MessageType, source: SerdeErr) -> Self {
        Self::Malformed {
            connection,
            message_type,
            source,
        }
    }
}
