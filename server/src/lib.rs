//! # Netsync Server
//! The authoritative side of a netsync session. Owns every replicated entity,
//! decides which connections observe which entities, relays RPCs and pushes
//! SyncField and SyncList changes to observers.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        compile_error!("netsync-server does not run in the browser");
    }
}

pub mod shared {
    pub use netsync_shared::{
        impl_serde_struct, ByteReader, ByteWrite, ByteWriter, ChannelMode, ConnectionId,
        MessageType, ObjectId, Protocol, PrototypeId, Request, ResponseCode, RpcConfig,
        RpcReceiver, Serde, SerdeErr, SyncField, SyncFieldConfig, SyncList, SyncListConfig,
        Transform, Transport, TransportError, TransportEvent,
    };
}

mod connection;
mod error;
mod events;
mod interest;
mod server;

pub use error::NetsyncServerError;
pub use events::{
    ConnectEvent, DespawnEntityEvent, DisconnectEvent, EnterGameEvent, ErrorEvent, Event, Events,
    NotReadyEvent, ReadyEvent,
};
pub use interest::{InterestDiff, InterestManager, OwnedOnly, VisibilityRule, VisibleToAll};
pub use server::{Server, ServerConfig, LOCAL_CONNECTION};
