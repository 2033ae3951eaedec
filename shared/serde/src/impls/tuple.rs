use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

// Tuples carry RPC parameter lists, written in declaration order.
macro_rules! impl_serde_for_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: Serde),+> Serde for ($($name,)+) {
            fn ser(&self, writer: &mut dyn ByteWrite) {
                let ($($name,)+) = self;
                $($name.ser(writer);)+
            }

            fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                Ok(($($name::de(reader)?,)+))
            }

            fn byte_length(&self) -> usize {
                let ($($name,)+) = self;
                0 $(+ $name.byte_length())+
            }
        }
    };
}

impl_serde_for_tuple!(A);
impl_serde_for_tuple!(A, B);
impl_serde_for_tuple!(A, B, C);
impl_serde_for_tuple!(A, B, C, D);
impl_serde_for_tuple!(A, B, C, D, E);
impl_serde_for_tuple!(A, B, C, D, E, F);
impl_serde_for_tuple!(A, B, C, D, E, F, G);
impl_serde_for_tuple!(A, B, C, D, E, F, G, H);
