/// Implements `Serde` for a plain struct by writing its fields in declaration
/// order.
///
/// ```
/// use netsync_serde::{impl_serde_struct, ByteReader, ByteWriter, Serde};
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl_serde_struct!(Position { x, y });
///
/// let mut writer = ByteWriter::new();
/// Position { x: 1.0, y: 2.0 }.ser(&mut writer);
/// let bytes = writer.to_bytes();
/// let mut reader = ByteReader::new(&bytes);
/// assert_eq!(Position::de(&mut reader).unwrap(), Position { x: 1.0, y: 2.0 });
/// ```
#[macro_export]
macro_rules! impl_serde_struct {
    ($name:ident {}) => {
        impl $crate::Serde for $name {
            fn ser(&self, _: &mut dyn $crate::ByteWrite) {}

            fn de(_: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                Ok(Self {})
            }

            fn byte_length(&self) -> usize {
                0
            }
        }
    };
    ($name:ident { $($field:ident),* $(,)? }) => {
        impl $crate::Serde for $name {
            fn ser(&self, writer: &mut dyn $crate::ByteWrite) {
                $( $crate::Serde::ser(&self.$field, writer); )*
            }

            fn de(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                Ok(Self {
                    $( $field: $crate::Serde::de(reader)?, )*
                })
            }

            fn byte_length(&self) -> usize {
                0 $( + $crate::Serde::byte_length(&self.$field) )*
            }
        }
    };
}
