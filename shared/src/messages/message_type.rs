use std::fmt;

use netsync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

/// The 2-byte tag at the front of every frame.
///
/// Values up to and including [`MessageType::HIGHEST_RESERVED`] are owned by
/// the replication protocol itself. Applications register their own types
/// above that range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageType(pub u16);

impl MessageType {
    pub const ENTER_GAME: MessageType = MessageType(0);
    pub const CLIENT_READY: MessageType = MessageType(1);
    pub const CLIENT_NOT_READY: MessageType = MessageType(2);
    pub const CALL_FUNCTION: MessageType = MessageType(3);
    pub const SPAWN_STATIC: MessageType = MessageType(4);
    pub const SPAWN_DYNAMIC: MessageType = MessageType(5);
    pub const DESTROY: MessageType = MessageType(6);
    pub const SYNC_FIELD_UPDATE: MessageType = MessageType(7);
    pub const SYNC_FIELD_INITIAL: MessageType = MessageType(8);
    pub const SYNC_LIST_OPERATION: MessageType = MessageType(9);
    pub const SERVER_ERROR: MessageType = MessageType(12);
    pub const SCENE_CHANGE: MessageType = MessageType(13);
    pub const SET_OWNER: MessageType = MessageType(15);
    pub const PING: MessageType = MessageType(16);
    pub const GENERIC_RESPONSE: MessageType = MessageType(17);

    pub const HIGHEST_RESERVED: MessageType = MessageType(17);

    pub fn is_reserved(&self) -> bool {
        *self <= Self::HIGHEST_RESERVED
    }

    /// Reserved types that carry a correlation id and expect a generic response
    pub fn is_system_request(&self) -> bool {
        matches!(
            *self,
            MessageType::ENTER_GAME | MessageType::CLIENT_READY | MessageType::CLIENT_NOT_READY
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            MessageType::ENTER_GAME => "EnterGame",
            MessageType::CLIENT_READY => "ClientReady",
            MessageType::CLIENT_NOT_READY => "ClientNotReady",
            MessageType::CALL_FUNCTION => "CallFunction",
            MessageType::SPAWN_STATIC => "SpawnStatic",
            MessageType::SPAWN_DYNAMIC => "SpawnDynamic",
            MessageType::DESTROY => "Destroy",
            MessageType::SYNC_FIELD_UPDATE => "SyncFieldUpdate",
            MessageType::SYNC_FIELD_INITIAL => "SyncFieldInitial",
            MessageType::SYNC_LIST_OPERATION => "SyncListOperation",
            MessageType::SERVER_ERROR => "ServerError",
            MessageType::SCENE_CHANGE => "SceneChange",
            MessageType::SET_OWNER => "SetOwner",
            MessageType::PING => "Ping",
            MessageType::GENERIC_RESPONSE => "GenericResponse",
            _ => return write!(f, "MessageType({})", self.0),
        };
        f.write_str(name)
    }
}

impl Serde for MessageType {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(u16::de(reader)?))
    }

    fn byte_length(&self) -> usize {
        2
    }
}

impl ConstByteLength for MessageType {
    fn const_byte_length() -> usize {
        2
    }
}
