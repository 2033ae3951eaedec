use crate::{
    byte_reader::ByteReader, byte_writer::ByteWrite, constants::MAX_SEQUENCE_LENGTH,
    error::SerdeErr, integer::UnsignedVariableInteger, serde::Serde,
};

impl Serde for String {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::from(self.len()).ser(writer);
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = UnsignedVariableInteger::de(reader)?.get();
        if length > MAX_SEQUENCE_LENGTH {
            return Err(SerdeErr::LengthLimitExceeded {
                length,
                limit: MAX_SEQUENCE_LENGTH,
            });
        }
        let bytes = reader.read_bytes(length as usize)?;
        let text = std::str::from_utf8(bytes).map_err(|_| SerdeErr::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn byte_length(&self) -> usize {
        UnsignedVariableInteger::from(self.len()).byte_length() + self.len()
    }
}
