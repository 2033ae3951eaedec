//! # Netsync Client
//! The remote side of a netsync session. Joins a server, mirrors the entities
//! the server shows it, applies their replicated state and calls RPCs through
//! the server.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        compile_error!("netsync-client needs a native target");
    }
}

pub mod shared {
    pub use netsync_shared::{
        impl_serde_struct, ByteReader, ByteWrite, ByteWriter, ChannelMode, ConnectionId,
        DestroyReason, MessageType, ObjectId, Protocol, PrototypeId, Request, ResponseCode,
        RpcConfig, RpcReceiver, Serde, SerdeErr, SyncField, SyncFieldConfig, SyncList,
        SyncListConfig, Transform, Transport, TransportError, TransportEvent,
    };
}

mod client;
mod client_config;
mod connection;
mod error;
mod events;

pub use client::Client;
pub use client_config::{ClientConfig, PingConfig};
pub use error::NetsyncClientError;
pub use events::{
    ConnectEvent, DespawnEntityEvent, DisconnectEvent, EnterGameEvent, ErrorEvent, Event, Events,
    OwnerChangeEvent, ReadyEvent, SceneChangeEvent, ServerErrorEvent, SpawnEntityEvent,
};
