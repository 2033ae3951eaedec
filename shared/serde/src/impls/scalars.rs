use crate::{
    byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::ConstByteLength,
    serde::Serde,
};

// Unit

impl Serde for () {
    fn ser(&self, _: &mut dyn ByteWrite) {}

    fn de(_: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(())
    }

    fn byte_length(&self) -> usize {
        0
    }
}

impl ConstByteLength for () {
    fn const_byte_length() -> usize {
        0
    }
}

// Boolean

impl Serde for bool {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        writer.write_byte(if *self { 1 } else { 0 });
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerdeErr::InvalidValue {
                type_name: "bool",
                value: other as u64,
            }),
        }
    }

    fn byte_length(&self) -> usize {
        1
    }
}

impl ConstByteLength for bool {
    fn const_byte_length() -> usize {
        1
    }
}

// Fixed-width numbers, little endian

macro_rules! impl_serde_for_number {
    ($impl_type:ty) => {
        impl Serde for $impl_type {
            fn ser(&self, writer: &mut dyn ByteWrite) {
                writer.write_bytes(&self.to_le_bytes());
            }

            fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                let bytes = reader.read_array::<{ std::mem::size_of::<$impl_type>() }>()?;
                Ok(<$impl_type>::from_le_bytes(bytes))
            }

            fn byte_length(&self) -> usize {
                std::mem::size_of::<$impl_type>()
            }
        }

        impl ConstByteLength for $impl_type {
            fn const_byte_length() -> usize {
                std::mem::size_of::<$impl_type>()
            }
        }
    };
}

impl_serde_for_number!(u8);
impl_serde_for_number!(u16);
impl_serde_for_number!(u32);
impl_serde_for_number!(u64);
impl_serde_for_number!(i8);
impl_serde_for_number!(i16);
impl_serde_for_number!(i32);
impl_serde_for_number!(i64);
impl_serde_for_number!(f32);
impl_serde_for_number!(f64);

// Char, as its scalar value

impl Serde for char {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        (*self as u32).ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = u32::de(reader)?;
        char::from_u32(value).ok_or(SerdeErr::InvalidValue {
            type_name: "char",
            value: value as u64,
        })
    }

    fn byte_length(&self) -> usize {
        4
    }
}

impl ConstByteLength for char {
    fn const_byte_length() -> usize {
        4
    }
}
