use std::{
    collections::HashMap,
    mem,
    time::Instant,
};

use log::{debug, info, trace, warn};

use netsync_shared::{
    encode_params, ByteReader, ByteWrite, ChannelMode, ClientNotReadyRequest, ClientReadyRequest,
    ConnectionId, DestroyMessage, DestroyReason, EmptyMessage, EnterGameRequest,
    EnterGameResponse, Entity, EntityBuilder, EntityRegistry, FieldHandle, Incoming, ListHandle,
    MessageError, MessageRouter, MessageType, ObjectId, PongMessage, Protocol, PrototypeId,
    RegistryError, ReplicationAddress, Request, RequestId, ResponseCode, RpcContext, RpcError,
    RpcHandle, RpcReceiver, SceneChangeMessage, Serde, SerdeErr, ServerErrorMessage,
    SetOwnerMessage, SpawnDynamicMessage, SpawnStaticMessage, SyncList, Timestamp, Transform,
    Transport, TransportEvent, HostType,
};

use crate::{
    connection::connection::Connection,
    events::Events,
    interest::{InterestManager, OwnedOnly, VisibilityRule, VisibleToAll},
    NetsyncServerError, ServerConfig,
};

/// Connection id used for the in-process client of a combined host
pub const LOCAL_CONNECTION: ConnectionId = ConnectionId::new(u64::MAX);

type EnterGameFilter = Box<dyn FnMut(ConnectionId) -> bool>;

/// The authoritative role. Owns the entity registry, tracks every
/// connection's readiness and subscriptions, relays RPCs and replicates
/// SyncFields and SyncLists.
///
/// Drive it with `receive` then `send_all_updates` once per tick.
pub struct Server<T: Transport> {
    config: ServerConfig,
    protocol: Protocol,
    transport: T,
    router: MessageRouter,
    registry: EntityRegistry,
    connections: HashMap<ConnectionId, Connection>,
    interest: InterestManager,
    scene_name: String,
    local_connection: Option<ConnectionId>,
    enter_game_filter: Option<EnterGameFilter>,
    incoming_events: Events,
}

impl<T: Transport> Server<T> {
    /// Create a new Server
    pub fn new(config: ServerConfig, mut protocol: Protocol, transport: T) -> Self {
        if !protocol.is_locked() {
            protocol.lock();
        }
        let rule: Box<dyn VisibilityRule> = if config.default_visibility {
            Box::new(VisibleToAll)
        } else {
            Box::new(OwnedOnly)
        };
        Self {
            scene_name: config.initial_scene.clone(),
            config,
            protocol,
            transport,
            router: MessageRouter::new(HostType::Server),
            registry: EntityRegistry::new(HostType::Server),
            connections: HashMap::new(),
            interest: InterestManager::new(rule),
            local_connection: None,
            enter_game_filter: None,
            incoming_events: Events::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // Configuration

    /// Replaces the visibility rule. Subscriptions are rebuilt on the next
    /// `send_all_updates`.
    pub fn set_visibility_rule<R: VisibilityRule + 'static>(&mut self, rule: R) {
        self.interest.set_rule(Box::new(rule));
    }

    /// Installs a hook that decides whether a connection may enter the game.
    /// Refused connections get an EnterGame response with `ResponseCode::Error`.
    pub fn set_enter_game_filter<F: FnMut(ConnectionId) -> bool + 'static>(&mut self, filter: F) {
        self.enter_game_filter = Some(Box::new(filter));
    }

    /// Call after changing anything a custom visibility rule reads
    pub fn mark_interest_dirty(&mut self) {
        self.interest.mark_dirty();
    }

    // Custom messages

    pub fn register_message_handler<M, F>(
        &mut self,
        message_type: MessageType,
        handler: F,
    ) -> Result<(), NetsyncServerError>
    where
        M: Serde,
        F: FnMut(ConnectionId, M) + 'static,
    {
        self.router
            .register_message_handler::<M, F>(message_type, handler)
            .map_err(NetsyncServerError::from)
    }

    pub fn register_request_handler<Q, F>(
        &mut self,
        message_type: MessageType,
        handler: F,
    ) -> Result<(), NetsyncServerError>
    where
        Q: Request,
        F: FnMut(ConnectionId, Q) -> (ResponseCode, Q::Response) + 'static,
    {
        self.router
            .register_request_handler::<Q, F>(message_type, handler)
            .map_err(NetsyncServerError::from)
    }

    pub fn send_message<M: Serde>(
        &mut self,
        connection: &ConnectionId,
        mode: ChannelMode,
        message_type: MessageType,
        message: &M,
    ) -> Result<(), NetsyncServerError> {
        self.check_remote(connection)?;
        self.router.send(*connection, mode, message_type, message);
        Ok(())
    }

    /// Sends a custom request; `on_response` runs once the client answers or
    /// the configured request timeout passes
    pub fn send_request<Q, F>(
        &mut self,
        connection: &ConnectionId,
        message_type: MessageType,
        request: &Q,
        now: Instant,
        on_response: F,
    ) -> Result<RequestId, NetsyncServerError>
    where
        Q: Request,
        F: FnOnce(ResponseCode, Option<Q::Response>) + 'static,
    {
        self.check_remote(connection)?;
        Ok(self.router.send_request(
            *connection,
            message_type,
            request,
            self.config.request_timeout,
            now,
            on_response,
        ))
    }

    fn check_remote(&self, connection: &ConnectionId) -> Result<(), NetsyncServerError> {
        match self.connections.get(connection) {
            Some(found) if !found.is_local => Ok(()),
            _ => Err(NetsyncServerError::ConnectionNotFound {
                connection: *connection,
            }),
        }
    }

    // Connections

    /// Connected ids, ascending
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_connected(&self, connection: &ConnectionId) -> bool {
        self.connections.contains_key(connection)
    }

    pub fn is_ready(&self, connection: &ConnectionId) -> bool {
        self.connections
            .get(connection)
            .map(|connection| connection.is_ready())
            .unwrap_or(false)
    }

    pub fn has_entered(&self, connection: &ConnectionId) -> bool {
        self.connections
            .get(connection)
            .map(|connection| connection.has_entered())
            .unwrap_or(false)
    }

    /// Entities `connection` currently observes, ascending
    pub fn subscriptions(&self, connection: &ConnectionId) -> Vec<ObjectId> {
        self.connections
            .get(connection)
            .map(|connection| connection.sorted_subscriptions())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, connection: &ConnectionId, object_id: &ObjectId) -> bool {
        self.connections
            .get(connection)
            .map(|connection| connection.is_subscribed(object_id))
            .unwrap_or(false)
    }

    /// Closes a connection and tears its state down in the same call
    pub fn disconnect(&mut self, connection: &ConnectionId) {
        if !self.connections.contains_key(connection) {
            return;
        }
        self.teardown_connection(connection);
        if self.local_connection == Some(*connection) {
            self.local_connection = None;
        } else {
            self.transport.disconnect(*connection);
        }
    }

    /// Attaches an in-process client. It is entered and ready immediately,
    /// never receives bytes, and sees entities through their hidden flag.
    pub fn connect_local_client(&mut self) -> Result<ConnectionId, NetsyncServerError> {
        if let Some(connection) = self.local_connection {
            return Err(NetsyncServerError::LocalClientExists { connection });
        }
        for entity in self.registry.iter_mut() {
            entity.set_hidden(true);
        }
        self.connections
            .insert(LOCAL_CONNECTION, Connection::new_local(LOCAL_CONNECTION));
        self.local_connection = Some(LOCAL_CONNECTION);
        self.interest.mark_dirty();
        self.incoming_events.push_connection(LOCAL_CONNECTION);
        info!("Local client attached as {}", LOCAL_CONNECTION);
        Ok(LOCAL_CONNECTION)
    }

    pub fn local_connection(&self) -> Option<ConnectionId> {
        self.local_connection
    }

    // Scene

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    /// Moves everyone to a new scene: every connection stops being ready and
    /// loses its subscriptions, dynamic entities are destroyed and clients
    /// are told to load `scene_name`
    pub fn change_scene(&mut self, scene_name: &str) {
        info!("Changing scene to '{}'", scene_name);
        for connection_id in self.connection_ids() {
            self.drop_subscriptions(&connection_id, false);
            if let Some(connection) = self.connections.get_mut(&connection_id) {
                if !connection.is_local {
                    connection.set_ready(false);
                }
            }
        }
        for object_id in self.registry.clear_dynamic() {
            debug!("Scene change destroyed {}", object_id);
        }
        if self.local_connection.is_some() {
            for entity in self.registry.iter_mut() {
                entity.set_hidden(true);
            }
        }
        self.scene_name = scene_name.to_string();

        let message = SceneChangeMessage {
            scene_name: self.scene_name.clone(),
        };
        for connection_id in self.connection_ids() {
            if self.is_remote_entered(&connection_id) {
                self.router.send(
                    connection_id,
                    ChannelMode::OrderedReliable,
                    MessageType::SCENE_CHANGE,
                    &message,
                );
            }
        }
        self.interest.mark_dirty();
    }

    fn is_remote_entered(&self, connection: &ConnectionId) -> bool {
        self.connections
            .get(connection)
            .map(|connection| !connection.is_local && connection.has_entered())
            .unwrap_or(false)
    }

    /// Tells a client something went wrong, optionally asking it to
    /// disconnect
    pub fn send_error(
        &mut self,
        connection: &ConnectionId,
        should_disconnect: bool,
        message: &str,
    ) -> Result<(), NetsyncServerError> {
        self.check_remote(connection)?;
        warn!("Sending error to {}: {}", connection, message);
        self.router.send(
            *connection,
            ChannelMode::OrderedReliable,
            MessageType::SERVER_ERROR,
            &ServerErrorMessage {
                should_disconnect,
                message: message.to_string(),
            },
        );
        Ok(())
    }

    // Entities

    /// Spawns a dynamic entity from a registered prototype
    pub fn spawn(
        &mut self,
        prototype: PrototypeId,
        transform: Transform,
        owner: Option<ConnectionId>,
    ) -> Result<ObjectId, NetsyncServerError> {
        if let Some(owner) = owner {
            if !self.connections.contains_key(&owner) {
                return Err(NetsyncServerError::ConnectionNotFound { connection: owner });
            }
        }
        let object_id = self
            .registry
            .spawn(&self.protocol, prototype, transform, owner)?;
        self.after_insert(&object_id);
        Ok(object_id)
    }

    /// Registers a statically placed entity. Clients place the same entity
    /// under the same id and reveal it when it enters their interest.
    pub fn place_static<F>(
        &mut self,
        object_id: ObjectId,
        transform: Transform,
        build: F,
    ) -> Result<(), NetsyncServerError>
    where
        F: FnOnce(&mut EntityBuilder),
    {
        self.registry.insert_static(object_id, transform, build)?;
        self.after_insert(&object_id);
        Ok(())
    }

    fn after_insert(&mut self, object_id: &ObjectId) {
        if self.local_connection.is_some() {
            if let Some(entity) = self.registry.lookup_mut(object_id) {
                entity.set_hidden(true);
            }
        }
        self.interest.mark_dirty();
    }

    /// Destroys an entity everywhere it is observed
    pub fn destroy(&mut self, object_id: &ObjectId) -> Result<(), NetsyncServerError> {
        if !self.registry.contains(object_id) {
            return Err(RegistryError::EntityNotFound {
                object_id: *object_id,
            }
            .into());
        }
        for connection_id in self.connection_ids() {
            let Some(connection) = self.connections.get_mut(&connection_id) else {
                continue;
            };
            if !connection.unsubscribe(object_id) || connection.is_local {
                continue;
            }
            self.router.send(
                connection_id,
                ChannelMode::OrderedReliable,
                MessageType::DESTROY,
                &DestroyMessage {
                    object_id: *object_id,
                    reason: DestroyReason::RequestedToDestroy,
                },
            );
        }
        self.registry
            .destroy(*object_id, DestroyReason::RequestedToDestroy)?;
        self.interest.mark_dirty();
        Ok(())
    }

    /// Hands an entity to another connection, or back to the server with
    /// `None`. Current observers learn the new owner. A new owner that
    /// already observes the entity receives its owner-only state; otherwise
    /// it is subscribed with full state on the next interest rebuild.
    pub fn set_owner(
        &mut self,
        object_id: &ObjectId,
        owner: Option<ConnectionId>,
    ) -> Result<(), NetsyncServerError> {
        if let Some(owner) = owner {
            if !self.connections.contains_key(&owner) {
                return Err(NetsyncServerError::ConnectionNotFound { connection: owner });
            }
        }
        let current = self
            .registry
            .lookup(object_id)
            .ok_or(RegistryError::EntityNotFound {
                object_id: *object_id,
            })?
            .owner();
        if current == owner {
            return Ok(());
        }
        // owner-only edits recorded so far belong to the previous owner
        self.send_list_operations();
        if let Some(entity) = self.registry.lookup_mut(object_id) {
            entity.set_owner(owner);
        }

        let message = SetOwnerMessage {
            object_id: *object_id,
            owner,
        };
        for connection_id in self.connection_ids() {
            let Some(connection) = self.connections.get(&connection_id) else {
                continue;
            };
            if connection.is_local || !connection.is_subscribed(object_id) {
                continue;
            }
            self.router.send(
                connection_id,
                ChannelMode::OrderedReliable,
                MessageType::SET_OWNER,
                &message,
            );
        }
        if let Some(owner) = owner {
            self.send_owner_state(&owner, object_id);
        }
        self.interest.mark_dirty();
        Ok(())
    }

    /// Sends owner-only SyncField values and SyncList contents to a new owner
    /// that already observes the entity
    fn send_owner_state(&mut self, owner: &ConnectionId, object_id: &ObjectId) {
        let Some(connection) = self.connections.get(owner) else {
            return;
        };
        if connection.is_local || !connection.is_subscribed(object_id) {
            return;
        }
        let Some(entity) = self.registry.lookup_mut(object_id) else {
            return;
        };
        debug!("Sending owner-only state of {} to {}", object_id, owner);
        for component in entity.components_mut() {
            let component_index = component.index();
            for (slot, field) in component.fields_mut() {
                if !field.config().owner_only {
                    continue;
                }
                field.forget_connection(owner);
                let address = ReplicationAddress::new(*object_id, component_index, slot);
                self.router.send_with(
                    *owner,
                    ChannelMode::OrderedReliable,
                    MessageType::SYNC_FIELD_INITIAL,
                    |writer| {
                        address.ser(writer);
                        field.write_value(writer);
                    },
                );
            }
            for (slot, list) in component.lists() {
                if !list.config().owner_only {
                    continue;
                }
                let address = ReplicationAddress::new(*object_id, component_index, slot);
                for operation in list.catch_up_operations() {
                    send_list_operation(&mut self.router, *owner, &address, &operation);
                }
            }
        }
    }

    pub fn entity(&self, object_id: &ObjectId) -> Option<&Entity> {
        self.registry.lookup(object_id)
    }

    pub fn entity_mut(&mut self, object_id: &ObjectId) -> Option<&mut Entity> {
        self.registry.lookup_mut(object_id)
    }

    /// Live entity ids, ascending
    pub fn entity_ids(&self) -> Vec<ObjectId> {
        self.registry.object_ids()
    }

    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    /// Sets a SyncField through its handle
    pub fn set_field<V: Serde + 'static>(
        &mut self,
        object_id: &ObjectId,
        handle: FieldHandle<V>,
        value: V,
    ) -> Result<(), NetsyncServerError> {
        let entity = self.entity_or_err(object_id)?;
        entity.field_mut(handle)?.set(value)?;
        Ok(())
    }

    /// Mutable access to a SyncList through its handle
    pub fn list_mut<V: Serde + 'static>(
        &mut self,
        object_id: &ObjectId,
        handle: ListHandle<V>,
    ) -> Result<&mut SyncList<V>, NetsyncServerError> {
        let entity = self.entity_or_err(object_id)?;
        Ok(entity.list_mut(handle)?)
    }

    fn entity_or_err(&mut self, object_id: &ObjectId) -> Result<&mut Entity, NetsyncServerError> {
        self.registry
            .lookup_mut(object_id)
            .ok_or_else(|| {
                RegistryError::EntityNotFound {
                    object_id: *object_id,
                }
                .into()
            })
    }

    /// Calls an RPC as the server. The server may call any slot.
    pub fn call_rpc<P: Serde + 'static>(
        &mut self,
        object_id: &ObjectId,
        handle: RpcHandle<P>,
        receiver: RpcReceiver,
        params: &P,
    ) -> Result<(), NetsyncServerError> {
        self.entity_or_err(object_id)?.rpc_mut(handle)?;
        let address = ReplicationAddress::new(*object_id, handle.component(), handle.slot());
        let params = encode_params(params);
        self.dispatch_rpc(None, address, receiver, &params)
    }

    // Interest

    /// Rebuilds subscriptions right away instead of waiting for the next
    /// `send_all_updates`
    pub fn update_interest(&mut self) {
        // pending list edits belong to current observers, newcomers get them
        // through the catch-up replay
        self.send_list_operations();

        let diffs = self.interest.compute(&self.connections, &self.registry);
        for diff in diffs {
            for object_id in diff.leaving {
                self.leave_interest(&diff.connection, &object_id, true);
            }
            for object_id in diff.entering {
                self.enter_interest(&diff.connection, &object_id);
            }
        }
    }

    fn enter_interest(&mut self, connection_id: &ConnectionId, object_id: &ObjectId) {
        let Some(connection) = self.connections.get_mut(connection_id) else {
            return;
        };
        if !connection.subscribe(*object_id) {
            return;
        }
        let is_local = connection.is_local;
        let Some(entity) = self.registry.lookup_mut(object_id) else {
            return;
        };
        trace!("{} starts observing {}", connection_id, object_id);

        if is_local {
            entity.set_hidden(false);
            return;
        }
        let owned = entity.is_owned_by(connection_id);

        // spawn
        if entity.is_static() {
            self.router.send(
                *connection_id,
                ChannelMode::OrderedReliable,
                MessageType::SPAWN_STATIC,
                &SpawnStaticMessage {
                    object_id: *object_id,
                    owner: entity.owner(),
                    transform: entity.transform,
                },
            );
        } else if let Some(prototype) = entity.prototype() {
            self.router.send(
                *connection_id,
                ChannelMode::OrderedReliable,
                MessageType::SPAWN_DYNAMIC,
                &SpawnDynamicMessage {
                    object_id: *object_id,
                    prototype,
                    owner: entity.owner(),
                    transform: entity.transform,
                },
            );
        }

        // initial values
        for component in entity.components() {
            for (slot, field) in component.fields() {
                if field.config().owner_only && !owned {
                    continue;
                }
                let address = ReplicationAddress::new(*object_id, component.index(), slot);
                self.router.send_with(
                    *connection_id,
                    ChannelMode::OrderedReliable,
                    MessageType::SYNC_FIELD_INITIAL,
                    |writer| {
                        address.ser(writer);
                        field.write_value(writer);
                    },
                );
            }
            for (slot, list) in component.lists() {
                if list.config().owner_only && !owned {
                    continue;
                }
                let address = ReplicationAddress::new(*object_id, component.index(), slot);
                for operation in list.catch_up_operations() {
                    send_list_operation(
                        &mut self.router,
                        *connection_id,
                        &address,
                        &operation,
                    );
                }
            }
        }
    }

    fn leave_interest(&mut self, connection_id: &ConnectionId, object_id: &ObjectId, notify: bool) {
        let Some(connection) = self.connections.get_mut(connection_id) else {
            return;
        };
        if !connection.unsubscribe(object_id) {
            return;
        }
        let is_local = connection.is_local;
        trace!("{} stops observing {}", connection_id, object_id);

        if let Some(entity) = self.registry.lookup_mut(object_id) {
            if is_local {
                entity.set_hidden(true);
            }
            for component in entity.components_mut() {
                for (_, field) in component.fields_mut() {
                    field.forget_connection(connection_id);
                }
            }
        }
        if notify && !is_local {
            self.router.send(
                *connection_id,
                ChannelMode::OrderedReliable,
                MessageType::DESTROY,
                &DestroyMessage {
                    object_id: *object_id,
                    reason: DestroyReason::RemovedFromSubscribing,
                },
            );
        }
    }

    fn drop_subscriptions(&mut self, connection_id: &ConnectionId, notify: bool) {
        let object_ids = self
            .connections
            .get(connection_id)
            .map(|connection| connection.sorted_subscriptions())
            .unwrap_or_default();
        for object_id in object_ids {
            self.leave_interest(connection_id, &object_id, notify);
        }
    }

    fn destroy_owned(&mut self, owner: &ConnectionId) {
        for object_id in self.registry.owned_by(owner) {
            match self.destroy(&object_id) {
                Ok(()) => self.incoming_events.push_despawn(*owner, object_id),
                Err(error) => warn!("Failed to destroy {} owned by {}: {}", object_id, owner, error),
            }
        }
    }

    fn teardown_connection(&mut self, connection_id: &ConnectionId) {
        self.drop_subscriptions(connection_id, false);
        self.destroy_owned(connection_id);
        self.connections.remove(connection_id);
        self.router.discard_connection(connection_id);
        self.interest.mark_dirty();
    }

    // Receiving

    /// Drains the transport, dispatches every message and expires pending
    /// requests. Protocol errors are logged, dropped and reported as
    /// `ErrorEvent`s; the connection stays open.
    pub fn receive(&mut self, now: Instant) -> Events {
        while let Some(event) = self.transport.receive() {
            match event {
                TransportEvent::Connected(connection_id) => {
                    info!("{} connected", connection_id);
                    self.connections
                        .insert(connection_id, Connection::new(connection_id));
                    self.incoming_events.push_connection(connection_id);
                }
                TransportEvent::Disconnected(connection_id) => {
                    if self.connections.contains_key(&connection_id) {
                        info!("{} disconnected", connection_id);
                        self.teardown_connection(&connection_id);
                        self.incoming_events.push_disconnection(connection_id);
                    }
                }
                TransportEvent::Data(connection_id, frame) => {
                    if !self.connections.contains_key(&connection_id) {
                        warn!("Dropping frame from unknown {}", connection_id);
                        continue;
                    }
                    if let Err(error) = self.receive_frame(&connection_id, &frame) {
                        warn!("{}", error);
                        self.incoming_events.push_error(error);
                    }
                }
            }
        }

        self.router.update(now);

        mem::take(&mut self.incoming_events)
    }

    fn receive_frame(
        &mut self,
        connection_id: &ConnectionId,
        frame: &[u8],
    ) -> Result<(), NetsyncServerError> {
        let Some(incoming) = self.router.receive(*connection_id, frame)? else {
            return Ok(());
        };
        match incoming {
            Incoming::Request {
                message_type,
                request_id,
                mut reader,
            } => match message_type {
                MessageType::ENTER_GAME => {
                    decode::<EnterGameRequest>(connection_id, message_type, &mut reader)?;
                    self.handle_enter_game(connection_id, request_id);
                    Ok(())
                }
                MessageType::CLIENT_READY => {
                    decode::<ClientReadyRequest>(connection_id, message_type, &mut reader)?;
                    self.handle_ready(connection_id, request_id)
                }
                MessageType::CLIENT_NOT_READY => {
                    decode::<ClientNotReadyRequest>(connection_id, message_type, &mut reader)?;
                    self.handle_not_ready(connection_id, request_id);
                    Ok(())
                }
                _ => Err(unexpected(connection_id, message_type)),
            },
            Incoming::Message {
                message_type,
                mut reader,
            } => match message_type {
                MessageType::CALL_FUNCTION => self.handle_rpc(connection_id, &mut reader),
                MessageType::PING => {
                    self.handle_ping(connection_id);
                    Ok(())
                }
                _ => Err(unexpected(connection_id, message_type)),
            },
        }
    }

    fn handle_enter_game(&mut self, connection_id: &ConnectionId, request_id: RequestId) {
        let accepted = match self.enter_game_filter.as_mut() {
            Some(filter) => filter(*connection_id),
            None => true,
        };
        let response = EnterGameResponse {
            connection_id: *connection_id,
            scene_name: self.scene_name.clone(),
        };
        if !accepted {
            info!("{} was refused entry", connection_id);
            self.router
                .respond(*connection_id, request_id, ResponseCode::Error, &response);
            return;
        }
        if let Some(connection) = self.connections.get_mut(connection_id) {
            connection.set_entered();
        }
        info!("{} entered the game", connection_id);
        self.router
            .respond(*connection_id, request_id, ResponseCode::Success, &response);
        self.incoming_events.push_enter_game(*connection_id);
    }

    fn handle_ready(
        &mut self,
        connection_id: &ConnectionId,
        request_id: RequestId,
    ) -> Result<(), NetsyncServerError> {
        let Some(connection) = self.connections.get_mut(connection_id) else {
            return Err(NetsyncServerError::ConnectionNotFound {
                connection: *connection_id,
            });
        };
        if !connection.has_entered() {
            self.router.respond(
                *connection_id,
                request_id,
                ResponseCode::Error,
                &EmptyMessage,
            );
            return Err(NetsyncServerError::NotEntered {
                connection: *connection_id,
            });
        }
        connection.set_ready(true);
        debug!("{} is ready", connection_id);
        self.router.respond(
            *connection_id,
            request_id,
            ResponseCode::Success,
            &EmptyMessage,
        );
        self.interest.mark_dirty();
        self.incoming_events.push_ready(*connection_id);
        Ok(())
    }

    fn handle_not_ready(&mut self, connection_id: &ConnectionId, request_id: RequestId) {
        if let Some(connection) = self.connections.get_mut(connection_id) {
            connection.set_ready(false);
        }
        debug!("{} is no longer ready", connection_id);
        self.drop_subscriptions(connection_id, true);
        self.destroy_owned(connection_id);
        self.router.respond(
            *connection_id,
            request_id,
            ResponseCode::Success,
            &EmptyMessage,
        );
        self.interest.mark_dirty();
        self.incoming_events.push_not_ready(*connection_id);
    }

    fn handle_ping(&mut self, connection_id: &ConnectionId) {
        match Timestamp::try_now_millis() {
            Ok(server_unix_millis) => self.router.send(
                *connection_id,
                ChannelMode::UnorderedUnreliable,
                MessageType::PING,
                &PongMessage { server_unix_millis },
            ),
            Err(error) => warn!("Cannot answer ping from {}: {}", connection_id, error),
        }
    }

    /// Checks a client's call and relays it. Unauthorized calls are dropped
    /// without telling anyone.
    fn handle_rpc(
        &mut self,
        connection_id: &ConnectionId,
        reader: &mut ByteReader,
    ) -> Result<(), NetsyncServerError> {
        let address = decode::<ReplicationAddress>(connection_id, MessageType::CALL_FUNCTION, reader)?;
        let receiver = decode::<RpcReceiver>(connection_id, MessageType::CALL_FUNCTION, reader)?;
        let params = reader.remaining_bytes();

        let entity = self
            .registry
            .lookup(&address.object_id)
            .ok_or(RegistryError::EntityNotFound {
                object_id: address.object_id,
            })?;
        let owner = entity.owner();
        let slot = entity.component(address.component)?.rpc(address.slot)?;

        if !slot.is_authorized(owner, Some(*connection_id)) {
            debug!(
                "Dropping unauthorized RPC on {} from {}",
                address.object_id, connection_id
            );
            return Ok(());
        }
        slot.validate(params).map_err(RpcError::from)?;

        match self.dispatch_rpc(Some(*connection_id), address, receiver, params) {
            Err(NetsyncServerError::Rpc(RpcError::TargetNotObserving { object_id })) => {
                debug!(
                    "Dropping RPC on {} from {}, its target does not observe it",
                    object_id, connection_id
                );
                Ok(())
            }
            other => other,
        }
    }

    fn dispatch_rpc(
        &mut self,
        caller: Option<ConnectionId>,
        address: ReplicationAddress,
        receiver: RpcReceiver,
        params: &[u8],
    ) -> Result<(), NetsyncServerError> {
        let object_id = address.object_id;
        match receiver {
            RpcReceiver::Server => self.invoke_locally(caller, &address, params),
            RpcReceiver::Target(target) => {
                if !self.observes(&target, &object_id) {
                    return Err(RpcError::TargetNotObserving { object_id }.into());
                }
                if self.local_connection == Some(target) {
                    self.invoke_locally(caller, &address, params)
                } else {
                    self.forward_rpc(&target, &address, receiver, params)
                }
            }
            RpcReceiver::All => {
                self.invoke_locally(caller, &address, params)?;
                for connection_id in self.connection_ids() {
                    if self.local_connection == Some(connection_id)
                        || !self.observes(&connection_id, &object_id)
                    {
                        continue;
                    }
                    self.forward_rpc(&connection_id, &address, receiver, params)?;
                }
                Ok(())
            }
        }
    }

    fn observes(&self, connection_id: &ConnectionId, object_id: &ObjectId) -> bool {
        let subscribed = self.is_subscribed(connection_id, object_id);
        let owns = self
            .registry
            .lookup(object_id)
            .map(|entity| entity.is_owned_by(connection_id))
            .unwrap_or(false);
        subscribed || owns
    }

    fn invoke_locally(
        &mut self,
        caller: Option<ConnectionId>,
        address: &ReplicationAddress,
        params: &[u8],
    ) -> Result<(), NetsyncServerError> {
        let entity = self.entity_or_err(&address.object_id)?;
        let context = RpcContext {
            object_id: address.object_id,
            caller,
            host: HostType::Server,
        };
        entity
            .component_mut(address.component)?
            .rpc_mut(address.slot)?
            .invoke(&context, params)
            .map_err(RpcError::from)?;
        Ok(())
    }

    fn forward_rpc(
        &mut self,
        connection_id: &ConnectionId,
        address: &ReplicationAddress,
        receiver: RpcReceiver,
        params: &[u8],
    ) -> Result<(), NetsyncServerError> {
        let mode = self
            .entity_or_err(&address.object_id)?
            .component(address.component)?
            .rpc(address.slot)?
            .config()
            .mode;
        self.router.send_with(
            *connection_id,
            mode,
            MessageType::CALL_FUNCTION,
            |writer| {
                address.ser(writer);
                receiver.ser(writer);
                writer.write_bytes(params);
            },
        );
        Ok(())
    }

    // Sending

    /// Runs one outbound replication pass, then flushes every queued frame
    /// to the transport:
    ///
    /// 1. SyncList operations recorded since the last pass go to current
    ///    observers
    /// 2. subscriptions are rebuilt if anything affecting interest changed,
    ///    sending spawns with initial state and destroys
    /// 3. dirty SyncFields whose send interval elapsed are pushed
    pub fn send_all_updates(&mut self, now: Instant) {
        self.send_list_operations();

        if self.interest.is_dirty() {
            self.update_interest();
        }

        self.send_field_updates(now);

        self.flush();
    }

    fn send_list_operations(&mut self) {
        for object_id in self.registry.object_ids() {
            let Some(entity) = self.registry.lookup_mut(&object_id) else {
                continue;
            };
            let owner = entity.owner();
            for component in entity.components_mut() {
                let component_index = component.index();
                for (slot, list) in component.lists_mut() {
                    let operations = list.drain_operations();
                    if operations.is_empty() {
                        continue;
                    }
                    let audience = audience(
                        &self.connections,
                        &object_id,
                        owner,
                        list.config().owner_only,
                    );
                    let address = ReplicationAddress::new(object_id, component_index, slot);
                    for connection_id in &audience {
                        for operation in &operations {
                            send_list_operation(
                                &mut self.router,
                                *connection_id,
                                &address,
                                operation,
                            );
                        }
                    }
                }
            }
        }
    }

    fn send_field_updates(&mut self, now: Instant) {
        for object_id in self.registry.object_ids() {
            let Some(entity) = self.registry.lookup_mut(&object_id) else {
                continue;
            };
            let owner = entity.owner();
            for component in entity.components_mut() {
                let component_index = component.index();
                for (slot, field) in component.fields_mut() {
                    if !field.network_update(now) {
                        continue;
                    }
                    let audience = audience(
                        &self.connections,
                        &object_id,
                        owner,
                        field.config().owner_only,
                    );
                    let address = ReplicationAddress::new(object_id, component_index, slot);
                    for connection_id in audience {
                        let mode = if field.mark_pushed(connection_id) {
                            ChannelMode::OrderedReliable
                        } else {
                            field.config().mode
                        };
                        self.router.send_with(
                            connection_id,
                            mode,
                            MessageType::SYNC_FIELD_UPDATE,
                            |writer| {
                                address.ser(writer);
                                field.write_value(writer);
                            },
                        );
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        let mut connections = self.router.outgoing_connections();
        fastrand::shuffle(&mut connections);
        for connection_id in connections {
            let messages = self.router.take_outgoing(&connection_id);
            if self.local_connection == Some(connection_id) {
                continue;
            }
            for message in messages {
                if let Err(error) =
                    self.transport
                        .send(connection_id, message.mode, &message.payload)
                {
                    warn!("Failed to send to {}: {}", connection_id, error);
                }
            }
        }
    }
}

/// Remote connections that observe `object_id`, ascending. Owner-only members
/// go to the owner alone.
fn audience(
    connections: &HashMap<ConnectionId, Connection>,
    object_id: &ObjectId,
    owner: Option<ConnectionId>,
    owner_only: bool,
) -> Vec<ConnectionId> {
    let mut audience: Vec<ConnectionId> = connections
        .values()
        .filter(|connection| !connection.is_local && connection.is_subscribed(object_id))
        .filter(|connection| !owner_only || owner == Some(connection.id))
        .map(|connection| connection.id)
        .collect();
    audience.sort();
    audience
}

fn send_list_operation(
    router: &mut MessageRouter,
    connection_id: ConnectionId,
    address: &ReplicationAddress,
    operation: &[u8],
) {
    router.send_with(
        connection_id,
        ChannelMode::OrderedReliable,
        MessageType::SYNC_LIST_OPERATION,
        |writer| {
            address.ser(writer);
            writer.write_bytes(operation);
        },
    );
}

fn decode<V: Serde>(
    connection_id: &ConnectionId,
    message_type: MessageType,
    reader: &mut ByteReader,
) -> Result<V, NetsyncServerError> {
    V::de(reader).map_err(|error: SerdeErr| {
        MessageError::malformed(*connection_id, message_type, error).into()
    })
}

fn unexpected(connection_id: &ConnectionId, message_type: MessageType) -> NetsyncServerError {
    MessageError::UnexpectedMessageType {
        connection: *connection_id,
        message_type,
    }
    .into()
}
