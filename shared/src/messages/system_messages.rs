//! Payloads of the reserved message types. Replication messages that address a
//! component slot (field updates, list operations, RPC calls) are written with
//! [`ReplicationAddress`](crate::ReplicationAddress) instead.

use netsync_serde::impl_serde_struct;

use crate::{
    messages::request::{EmptyMessage, Request},
    types::{ConnectionId, DestroyReason, ObjectId, PrototypeId},
    world::transform::Transform,
};

/// Sent by a client after it connects; correlated like any other request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnterGameRequest;

impl_serde_struct!(EnterGameRequest {});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnterGameResponse {
    pub connection_id: ConnectionId,
    pub scene_name: String,
}

impl_serde_struct!(EnterGameResponse {
    connection_id,
    scene_name
});

impl Request for EnterGameRequest {
    type Response = EnterGameResponse;
}

/// Sent when the client finished loading the current scene
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientReadyRequest;

impl_serde_struct!(ClientReadyRequest {});

impl Request for ClientReadyRequest {
    type Response = EmptyMessage;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientNotReadyRequest;

impl_serde_struct!(ClientNotReadyRequest {});

impl Request for ClientNotReadyRequest {
    type Response = EmptyMessage;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpawnDynamicMessage {
    pub object_id: ObjectId,
    pub prototype: PrototypeId,
    pub owner: Option<ConnectionId>,
    pub transform: Transform,
}

impl_serde_struct!(SpawnDynamicMessage {
    object_id,
    prototype,
    owner,
    transform
});

/// References an entity both sides placed ahead of time
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnStaticMessage {
    pub object_id: ObjectId,
    pub owner: Option<ConnectionId>,
    pub transform: Transform,
}

impl_serde_struct!(SpawnStaticMessage {
    object_id,
    owner,
    transform
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyMessage {
    pub object_id: ObjectId,
    pub reason: DestroyReason,
}

impl_serde_struct!(DestroyMessage { object_id, reason });

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneChangeMessage {
    pub scene_name: String,
}

impl_serde_struct!(SceneChangeMessage { scene_name });

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetOwnerMessage {
    pub object_id: ObjectId,
    pub owner: Option<ConnectionId>,
}

impl_serde_struct!(SetOwnerMessage { object_id, owner });

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerErrorMessage {
    pub should_disconnect: bool,
    pub message: String,
}

impl_serde_struct!(ServerErrorMessage {
    should_disconnect,
    message
});

/// Server's answer to a client ping: its wall clock in unix milliseconds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PongMessage {
    pub server_unix_millis: u64,
}

impl_serde_struct!(PongMessage { server_unix_millis });
