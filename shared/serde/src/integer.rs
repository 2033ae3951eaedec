use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

// Each byte carries 7 bits of payload, low bits first. The high bit is set
// when another byte follows.
const PAYLOAD_MASK: u8 = 0b0111_1111;
const PROCEED_FLAG: u8 = 0b1000_0000;
const MAX_ENCODED_BYTES: usize = 10;

/// Unsigned integer written in as few bytes as its magnitude needs. Used for
/// list indices and length prefixes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct UnsignedVariableInteger {
    inner: u64,
}

impl UnsignedVariableInteger {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        Self {
            inner: value.into(),
        }
    }

    pub fn get(&self) -> u64 {
        self.inner
    }

    pub fn set<T: Into<u64>>(&mut self, value: T) {
        self.inner = value.into();
    }

    /// Converts into a narrower integer, failing if the value does not fit
    pub fn to<T: TryFrom<u64>>(&self) -> Result<T, SerdeErr> {
        T::try_from(self.inner).map_err(|_| SerdeErr::InvalidValue {
            type_name: std::any::type_name::<T>(),
            value: self.inner,
        })
    }
}

impl From<usize> for UnsignedVariableInteger {
    fn from(value: usize) -> Self {
        Self {
            inner: value as u64,
        }
    }
}

impl Serde for UnsignedVariableInteger {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let mut value = self.inner;
        loop {
            let payload = (value & PAYLOAD_MASK as u64) as u8;
            value >>= 7;
            if value == 0 {
                writer.write_byte(payload);
                return;
            }
            writer.write_byte(payload | PROCEED_FLAG);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;
        for index in 0..MAX_ENCODED_BYTES {
            let byte = reader.read_byte()?;
            let payload = (byte & PAYLOAD_MASK) as u64;
            let shift = 7 * index as u32;
            // the tenth byte may only carry the single remaining bit
            if index == MAX_ENCODED_BYTES - 1 && payload > 1 {
                return Err(SerdeErr::VariableIntegerOverflow);
            }
            output |= payload << shift;
            if byte & PROCEED_FLAG == 0 {
                return Ok(Self { inner: output });
            }
        }
        Err(SerdeErr::VariableIntegerOverflow)
    }

    fn byte_length(&self) -> usize {
        let mut value = self.inner >> 7;
        let mut output = 1;
        while value != 0 {
            output += 1;
            value >>= 7;
        }
        output
    }
}

/// Signed counterpart of [`UnsignedVariableInteger`]. Zig-zag mapping keeps
/// small negative numbers short.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct SignedVariableInteger {
    inner: i64,
}

impl SignedVariableInteger {
    pub fn new<T: Into<i64>>(value: T) -> Self {
        Self {
            inner: value.into(),
        }
    }

    pub fn get(&self) -> i64 {
        self.inner
    }

    pub fn set<T: Into<i64>>(&mut self, value: T) {
        self.inner = value.into();
    }

    fn zigzag(&self) -> UnsignedVariableInteger {
        UnsignedVariableInteger::new(((self.inner << 1) ^ (self.inner >> 63)) as u64)
    }
}

impl Serde for SignedVariableInteger {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.zigzag().ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let encoded = UnsignedVariableInteger::de(reader)?.get();
        let inner = ((encoded >> 1) as i64) ^ -((encoded & 1) as i64);
        Ok(Self { inner })
    }

    fn byte_length(&self) -> usize {
        self.zigzag().byte_length()
    }
}
