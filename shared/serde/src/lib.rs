//! # Netsync Serde
//! Byte-aligned serialization for the netsync wire protocol. Every replicated
//! value, message payload and RPC parameter goes through the [`Serde`] trait.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_reader;
mod byte_writer;
mod constants;
mod error;
mod impls;
mod integer;
mod macros;
mod serde;

pub use byte_reader::{ByteReader, OwnedByteReader};
pub use byte_writer::{ByteCounter, ByteWrite, ByteWriter};
pub use constants::MAX_SEQUENCE_LENGTH;
pub use error::SerdeErr;
pub use integer::{SignedVariableInteger, UnsignedVariableInteger};
pub use serde::{ConstByteLength, Serde};
