use thiserror::Error;

use netsync_serde::SerdeErr;

use crate::types::{ComponentIndex, ObjectId, PrototypeId, SlotIndex};

/// Errors that can occur during entity registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every 32-bit object id is taken
    #[error("Object id space exhausted. No unused id remains above {highest}")]
    ObjectIdExhausted { highest: u32 },

    /// A static entity was placed on an id another live entity already uses
    #[error("{object_id} is already used by a live entity. Static entities need unique, pre-assigned ids")]
    ObjectIdInUse { object_id: ObjectId },

    /// Static entities must carry a pre-assigned id
    #[error("Static entities cannot use the unassigned object id 0")]
    UnassignedStaticId,

    /// No live entity with this id
    #[error("{object_id} is not registered")]
    EntityNotFound { object_id: ObjectId },

    /// The entity exists but was not placed as a static entity
    #[error("{object_id} is not a static entity")]
    NotStatic { object_id: ObjectId },

    /// Only the server allocates ids and spawns dynamic entities
    #[error("{operation} can only be performed by the server")]
    ServerOnly { operation: &'static str },

    /// The prototype was never registered with the Protocol
    #[error("Prototype {prototype:?} is not registered. Add it to the Protocol via add_prototype()")]
    UnknownPrototype { prototype: PrototypeId },

    /// The builder declared more components or slots than an address can hold
    #[error("Entity layout is invalid: {0}")]
    Layout(#[from] ComponentError),
}

/// Errors raised while resolving a component slot on an entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// Component index beyond the entity's component count
    #[error("Component index {component} out of range, entity has {count} component(s)")]
    ComponentOutOfRange {
        component: ComponentIndex,
        count: usize,
    },

    /// Slot index beyond the component's slot count for this member kind
    #[error("{kind} slot {slot} out of range on component {component}, which has {count}")]
    SlotOutOfRange {
        kind: &'static str,
        component: ComponentIndex,
        slot: SlotIndex,
        count: usize,
    },

    /// The slot holds a different value type than the handle expects
    #[error("{kind} slot {slot} on component {component} does not hold {expected}. Check the handle against the prototype builder")]
    TypeMismatch {
        kind: &'static str,
        component: ComponentIndex,
        slot: SlotIndex,
        expected: &'static str,
    },

    /// More components than a ComponentIndex can number
    #[error("An entity can declare at most {limit} components")]
    TooManyComponents { limit: usize },

    /// More slots of one kind than a SlotIndex can number
    #[error("Component {component} can declare at most {limit} {kind} slots")]
    TooManySlots {
        kind: &'static str,
        component: ComponentIndex,
        limit: usize,
    },
}

/// Errors that can occur when mutating a SyncField
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFieldError {
    /// Replicated fields are authoritative on the server
    #[error("SyncField values can only be set on the server. Clients receive them through replication")]
    ClientCannotSet,
}

/// Errors that can occur when mutating or replaying a SyncList
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncListError {
    /// Replicated lists are authoritative on the server
    #[error("SyncList can only be mutated on the server. Clients receive operations through replication")]
    ClientCannotMutate,

    /// Operation addressed an element that does not exist
    #[error("SyncList index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Custom operation codes must not collide with built-in ones
    #[error("Operation code {code} is built in. Custom operation codes start above {highest}")]
    InvalidCustomOperation { code: u8, highest: u8 },

    /// Operation payload could not be decoded
    #[error("Malformed SyncList operation: {0}")]
    Decode(#[from] SerdeErr),
}

/// Errors that can occur when calling a remote procedure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Caller neither owns the entity nor may the slot be called by anyone
    #[error("Not authorized to call RPC on {object_id}. Only the owner may call it unless the slot is callable by everyone")]
    NotAuthorized { object_id: ObjectId },

    /// Target receiver is neither subscribed to nor owns the entity
    #[error("Target of RPC on {object_id} does not observe that entity")]
    TargetNotObserving { object_id: ObjectId },

    /// Parameters could not be decoded
    #[error("Malformed RPC parameters: {0}")]
    Decode(#[from] SerdeErr),
}
