use crate::{
    byte_reader::ByteReader, byte_writer::ByteWrite, constants::MAX_SEQUENCE_LENGTH,
    error::SerdeErr, integer::UnsignedVariableInteger, serde::Serde,
};

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::from(self.len()).ser(writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = UnsignedVariableInteger::de(reader)?.get();
        if length > MAX_SEQUENCE_LENGTH {
            return Err(SerdeErr::LengthLimitExceeded {
                length,
                limit: MAX_SEQUENCE_LENGTH,
            });
        }
        // never trust the prefix for the allocation size
        let mut output = Vec::with_capacity((length as usize).min(reader.remaining()));
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }

    fn byte_length(&self) -> usize {
        let mut output = UnsignedVariableInteger::from(self.len()).byte_length();
        for item in self {
            output += item.byte_length();
        }
        output
    }
}
