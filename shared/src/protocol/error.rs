use thiserror::Error;

use crate::{types::PrototypeId, world::error::ComponentError};

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// Two builders were registered for the same prototype id
    #[error("Prototype {prototype:?} is already registered. Each prototype id must map to exactly one builder")]
    DuplicatePrototype { prototype: PrototypeId },

    /// The builder declares a layout no address can reach
    #[error("Prototype {prototype:?} has an invalid layout: {source}")]
    InvalidPrototype {
        prototype: PrototypeId,
        source: ComponentError,
    },
}
