use std::fmt;

use netsync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

pub type ComponentIndex = u8;
pub type SlotIndex = u16;
pub type RequestId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }
}

/// Identifies one transport-level connection. Assigned by the transport and
/// never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

impl Serde for ConnectionId {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(u64::de(reader)?))
    }

    fn byte_length(&self) -> usize {
        8
    }
}

impl ConstByteLength for ConnectionId {
    fn const_byte_length() -> usize {
        8
    }
}

/// Network identity of a replicated entity. Zero is never a live id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(u32);

impl ObjectId {
    pub const UNASSIGNED: ObjectId = ObjectId(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl Serde for ObjectId {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(u32::de(reader)?))
    }

    fn byte_length(&self) -> usize {
        4
    }
}

impl ConstByteLength for ObjectId {
    fn const_byte_length() -> usize {
        4
    }
}

/// Key of an entity prototype registered with the `Protocol`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrototypeId(pub u16);

impl Serde for PrototypeId {
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

/// Why an entity is being removed from a remote host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DestroyReason {
    /// The entity was destroyed on the server
    RequestedToDestroy,
    /// The entity left the receiving connection's interest set
    RemovedFromSubscribing,
}

impl Serde for DestroyReason {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let value: u8 = match self {
            DestroyReason::RequestedToDestroy => 0,
            DestroyReason::RemovedFromSubscribing => 1,
        };
        value.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match u8::de(reader)? {
            0 => Ok(DestroyReason::RequestedToDestroy),
            1 => Ok(DestroyReason::RemovedFromSubscribing),
            other => Err(SerdeErr::InvalidValue {
                type_name: "DestroyReason",
                value: other as u64,
            }),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}
