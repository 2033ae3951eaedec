use crate::{byte_reader::ByteReader, byte_writer::ByteCounter, byte_writer::ByteWrite, error::SerdeErr};

/// A type that can be written to and read from the netsync wire format
pub trait Serde: Sized + Clone + PartialEq {
    /// Writes the value into the outgoing byte stream
    fn ser(&self, writer: &mut dyn ByteWrite);

    /// Reads a value out of an incoming byte stream
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` will write
    fn byte_length(&self) -> usize {
        let mut counter = ByteCounter::new();
        self.ser(&mut counter);
        counter.count()
    }
}

/// Implemented by types whose encoding always has the same size
pub trait ConstByteLength {
    fn const_byte_length() -> usize;
}
