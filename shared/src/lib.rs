//! # Netsync Shared
//! Common functionality shared between netsync-server & netsync-client crates:
//! the message router, entity registry, replicated components, sync
//! primitives, RPC slots and the byte transport contract.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")]
    {
        compile_error!("netsync_shared has no wasm backend, build it for a native target");
    }
}

pub use netsync_serde::{
    impl_serde_struct, ByteReader, ByteWrite, ByteWriter, ConstByteLength, OwnedByteReader,
    Serde, SerdeErr, SignedVariableInteger, UnsignedVariableInteger, MAX_SEQUENCE_LENGTH,
};

mod backends;
mod messages;
mod protocol;
mod transport;
mod types;
mod world;

pub use backends::{TimeError, Timestamp};
pub use messages::{
    channel_mode::ChannelMode,
    error::MessageError,
    message_type::MessageType,
    request::{EmptyMessage, Request, ResponseCode},
    router::{Incoming, MessageHandler, MessageRouter, OutgoingMessage},
    system_messages::{
        ClientNotReadyRequest, ClientReadyRequest, DestroyMessage, EnterGameRequest,
        EnterGameResponse, PongMessage, SceneChangeMessage, ServerErrorMessage, SetOwnerMessage,
        SpawnDynamicMessage, SpawnStaticMessage,
    },
};
pub use protocol::{Protocol, ProtocolError, ProtocolPlugin, PrototypeBuilder};
pub use transport::{Transport, TransportError, TransportEvent};
pub use types::{
    ComponentIndex, ConnectionId, DestroyReason, HostType, ObjectId, PrototypeId, RequestId,
    SlotIndex,
};
pub use world::{
    component::{Component, ComponentBuilder, EntityBuilder},
    entity::Entity,
    error::{ComponentError, RegistryError, RpcError, SyncFieldError, SyncListError},
    handles::{FieldHandle, ListHandle, RpcHandle},
    object_id_allocator::ObjectIdAllocator,
    registry::{DestroyOutcome, EntityRegistry},
    replication::ReplicationAddress,
    rpc::{encode_params, RpcConfig, RpcContext, RpcReceiver, RpcSlot},
    sync_field::{FieldSlot, SyncField, SyncFieldConfig},
    sync_list::{encode_operation, ListSlot, SyncList, SyncListConfig, SyncListOp},
    transform::{Quat, Transform, Vec3},
};
