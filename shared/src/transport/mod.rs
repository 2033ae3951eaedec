mod error;

pub use error::TransportError;

use crate::{messages::channel_mode::ChannelMode, types::ConnectionId};

/// Something that happened on the byte channel since the last poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(ConnectionId),
    Data(ConnectionId, Box<[u8]>),
    Disconnected(ConnectionId),
}

/// The byte channel a role runs on. Implementations own the sockets; the
/// replication layer only ever sees opaque frames addressed by connection.
pub trait Transport {
    /// Sends one frame to `connection` with the requested delivery guarantee
    fn send(
        &mut self,
        connection: ConnectionId,
        mode: ChannelMode,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Returns the next pending event, or `None` when nothing is waiting
    fn receive(&mut self) -> Option<TransportEvent>;

    /// Closes a connection. A `Disconnected` event follows on both ends.
    fn disconnect(&mut self, connection: ConnectionId);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(
        &mut self,
        connection: ConnectionId,
        mode: ChannelMode,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        (**self).send(connection, mode, payload)
    }

    fn receive(&mut self) -> Option<TransportEvent> {
        (**self).receive()
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        (**self).disconnect(connection)
    }
}
