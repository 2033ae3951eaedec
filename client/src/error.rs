use thiserror::Error;

use netsync_shared::{
    ComponentError, MessageError, RegistryError, ResponseCode, RpcError, SyncFieldError,
    SyncListError, TransportError,
};

/// Errors surfaced by the client, either returned from its API or reported as
/// `ErrorEvent`s after a protocol error was logged and dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetsyncClientError {
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

    /// No transport connection to a server
    #[error("Client is not connected to a server")]
    NotConnected,

    /// The operation needs a completed EnterGame handshake
    #[error("Client has not entered the game. Send EnterGame and wait for its response first")]
    NotEntered,

    /// The server refused a handshake request or it timed out
    #[error("{request} request failed with {code:?}")]
    HandshakeFailed {
        request: &'static str,
        code: ResponseCode,
    },
}
