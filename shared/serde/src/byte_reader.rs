use crate::error::SerdeErr;

/// Cursor over an incoming byte buffer
pub struct ByteReader<'b> {
    buffer: &'b [u8],
    cursor: usize,
}

impl<'b> ByteReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let Some(byte) = self.buffer.get(self.cursor) else {
            return Err(SerdeErr::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            });
        };
        self.cursor += 1;
        Ok(*byte)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'b [u8], SerdeErr> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(SerdeErr::UnexpectedEnd {
                needed: count,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += count;
        Ok(&self.buffer[start..self.cursor])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerdeErr> {
        let bytes = self.read_bytes(N)?;
        let mut output = [0u8; N];
        output.copy_from_slice(bytes);
        Ok(output)
    }

    /// Everything not yet consumed, without advancing the cursor
    pub fn remaining_bytes(&self) -> &'b [u8] {
        &self.buffer[self.cursor..]
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn to_owned(&self) -> OwnedByteReader {
        OwnedByteReader {
            buffer: self.remaining_bytes().into(),
        }
    }
}

/// Owns the bytes of a payload so it can be read after the transport buffer
/// has been released
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedByteReader {
    buffer: Box<[u8]>,
}

impl OwnedByteReader {
    pub fn new(buffer: &[u8]) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    pub fn borrow(&self) -> ByteReader<'_> {
        ByteReader::new(&self.buffer)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }
}
