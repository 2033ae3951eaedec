use thiserror::Error;

use netsync_shared::{
    ComponentError, ConnectionId, MessageError, RegistryError, RpcError, SyncFieldError, SyncListError,
    TransportError,
};

/// Errors surfaced by the server, either returned from its API or reported as
/// `ErrorEvent`s after a protocol error was logged and dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetsyncServerError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    SyncField(#[from] SyncFieldError),

    #[error(transparent)]
    SyncList(#[from] SyncListError),

    /// The connection is unknown or already gone
    #[error("{connection} is not connected to this server")]
    ConnectionNotFound { connection: ConnectionId },

    /// The operation needs a connection that completed EnterGame
    #[error("{connection} has not entered the game. Clients must send EnterGame before Ready")]
    NotEntered { connection: ConnectionId },

    /// A local client is attached already
    #[error("A local client is already attached as {connection}")]
    LocalClientExists { connection: ConnectionId },
}
