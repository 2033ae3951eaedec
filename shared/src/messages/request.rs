use netsync_serde::{ByteReader, ByteWrite, ConstByteLength, Serde, SerdeErr};

/// A message that expects exactly one correlated response
pub trait Request: Serde + 'static {
    type Response: Serde + 'static;
}

/// Outcome carried by a generic response, or produced locally on timeout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Success,
    Error,
    Timeout,
}

impl Serde for ResponseCode {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let value: u8 = match self {
            ResponseCode::Success => 0,
            ResponseCode::Error => 1,
            ResponseCode::Timeout => 2,
        };
        value.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match u8::de(reader)? {
            0 => Ok(ResponseCode::Success),
            1 => Ok(ResponseCode::Error),
            2 => Ok(ResponseCode::Timeout),
            other => Err(SerdeErr::InvalidValue {
                type_name: "ResponseCode",
                value: other as u64,
            }),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}

impl ConstByteLength for ResponseCode {
    fn const_byte_length() -> usize {
        1
    }
}

/// Payload-less request and response, used by the session handshake
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmptyMessage;

impl Serde for EmptyMessage {
    fn ser(&self, _: &mut dyn ByteWrite) {}

    fn de(_: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(EmptyMessage)
    }

    fn byte_length(&self) -> usize {
        0
    }
}
