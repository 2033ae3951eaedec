use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        if let Some(value) = self {
            true.ser(writer);
            value.ser(writer);
        } else {
            false.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn byte_length(&self) -> usize {
        match self {
            Some(value) => 1 + value.byte_length(),
            None => 1,
        }
    }
}
