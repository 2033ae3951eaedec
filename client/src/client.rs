use std::{
    cell::RefCell,
    mem,
    rc::Rc,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use netsync_shared::{
    ByteReader, ByteWrite, ChannelMode, ClientNotReadyRequest, ClientReadyRequest, ConnectionId,
    DestroyMessage, EmptyMessage, EnterGameRequest, EnterGameResponse, Entity, EntityBuilder,
    EntityRegistry, HostType, Incoming, MessageError, MessageRouter, MessageType, ObjectId,
    PongMessage, Protocol, RegistryError, ReplicationAddress, Request, RequestId, ResponseCode,
    RpcContext, RpcError, RpcHandle, RpcReceiver, SceneChangeMessage, Serde, SerdeErr,
    ServerErrorMessage, SetOwnerMessage, SpawnDynamicMessage, SpawnStaticMessage, Timestamp,
    Transform, Transport, TransportEvent,
};

use crate::{
    connection::connection::Connection, events::Events, ClientConfig, NetsyncClientError,
};

/// Outcome of a handshake request, recorded by its response callback and
/// applied on the next `receive`
enum HandshakeReply {
    EnterGame(ResponseCode, Option<EnterGameResponse>),
    Ready(ResponseCode),
    NotReady(ResponseCode),
}

type HandshakeReplies = Rc<RefCell<Vec<HandshakeReply>>>;

/// The remote role. Mirrors the entities the server shows it, applies
/// replicated state and calls RPCs through the server.
///
/// Drive it with `receive` then `send_all_updates` once per tick.
pub struct Client<T: Transport> {
    config: ClientConfig,
    protocol: Protocol,
    transport: T,
    router: MessageRouter,
    registry: EntityRegistry,
    connection: Option<Connection>,
    handshake_replies: HandshakeReplies,
    incoming_events: Events,
}

impl<T: Transport> Client<T> {
    /// Create a new Client
    pub fn new(config: ClientConfig, mut protocol: Protocol, transport: T) -> Self {
        if !protocol.is_locked() {
            protocol.lock();
        }
        Self {
            config,
            protocol,
            transport,
            router: MessageRouter::new(HostType::Client),
            registry: EntityRegistry::new(HostType::Client),
            connection: None,
            handshake_replies: Rc::new(RefCell::new(Vec::new())),
            incoming_events: Events::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // Connection

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn has_entered(&self) -> bool {
        self.connection
            .as_ref()
            .map(|connection| connection.has_entered())
            .unwrap_or(false)
    }

    pub fn is_ready(&self) -> bool {
        self.connection
            .as_ref()
            .map(|connection| connection.is_ready())
            .unwrap_or(false)
    }

    /// ClientReady was sent and its response has not arrived yet
    pub fn is_ready_pending(&self) -> bool {
        self.connection
            .as_ref()
            .map(|connection| connection.is_ready_pending())
            .unwrap_or(false)
    }

    /// The id the server assigned to this client, once EnterGame succeeded
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection
            .as_ref()
            .and_then(|connection| connection.assigned_id)
    }

    /// Transport-level id of the server
    pub fn server_connection(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|connection| connection.server)
    }

    /// The server's current scene, as last reported
    pub fn scene_name(&self) -> Option<&str> {
        self.connection
            .as_ref()
            .and_then(|connection| connection.scene_name.as_deref())
    }

    /// Last measured round trip time
    pub fn rtt(&self) -> Option<Duration> {
        self.connection
            .as_ref()
            .and_then(|connection| connection.ping_manager.rtt())
    }

    /// Server clock minus local clock in milliseconds, with half the round
    /// trip already subtracted
    pub fn server_clock_offset_millis(&self) -> Option<i64> {
        self.connection
            .as_ref()
            .and_then(|connection| connection.ping_manager.offset_millis())
    }

    /// Estimated server wall clock in unix milliseconds, available once a
    /// ping was answered
    pub fn server_unix_time(&self) -> Option<u64> {
        let connection = self.connection.as_ref()?;
        let local = match Timestamp::try_now_millis() {
            Ok(local) => local,
            Err(error) => {
                warn!("{}", error);
                return None;
            }
        };
        connection.ping_manager.server_unix_millis(local)
    }

    pub fn disconnect(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        let server = connection.server;
        self.transport.disconnect(server);
        self.teardown();
        self.incoming_events.push_disconnection(server);
    }

    fn teardown(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.router.discard_connection(&connection.server);
        }
        self.handshake_replies.borrow_mut().clear();
        self.clear_replicated();
    }

    /// Removes dynamic replicas and hides statics until the server shows them
    /// again
    fn clear_replicated(&mut self) {
        for object_id in self.registry.clear_dynamic() {
            debug!("Cleared replica {}", object_id);
        }
        for entity in self.registry.iter_mut() {
            entity.set_hidden(true);
        }
    }

    fn server_or_err(&self) -> Result<ConnectionId, NetsyncClientError> {
        self.connection
            .as_ref()
            .map(|connection| connection.server)
            .ok_or(NetsyncClientError::NotConnected)
    }

    // Handshake

    /// Asks the server to let this client into the game. Sent automatically
    /// on connect unless `enter_game_on_connect` is off.
    pub fn send_enter_game(&mut self, now: Instant) -> Result<(), NetsyncClientError> {
        let server = self.server_or_err()?;
        let replies = self.handshake_replies.clone();
        self.router.send_request(
            server,
            MessageType::ENTER_GAME,
            &EnterGameRequest,
            self.config.request_timeout,
            now,
            move |code, response: Option<EnterGameResponse>| {
                replies
                    .borrow_mut()
                    .push(HandshakeReply::EnterGame(code, response));
            },
        );
        Ok(())
    }

    /// Tells the server the current scene is loaded and static entities are
    /// placed, so it may start sending entities
    pub fn send_ready(&mut self, now: Instant) -> Result<(), NetsyncClientError> {
        let server = self.server_or_err()?;
        if let Some(connection) = self.connection.as_mut() {
            if !connection.has_entered() {
                return Err(NetsyncClientError::NotEntered);
            }
            connection.set_ready_pending();
        }
        let replies = self.handshake_replies.clone();
        self.router.send_request(
            server,
            MessageType::CLIENT_READY,
            &ClientReadyRequest,
            self.config.request_timeout,
            now,
            move |code, _: Option<EmptyMessage>| {
                replies.borrow_mut().push(HandshakeReply::Ready(code));
            },
        );
        Ok(())
    }

    /// Stops receiving entities. The server destroys everything this client
    /// owns.
    pub fn send_not_ready(&mut self, now: Instant) -> Result<(), NetsyncClientError> {
        let server = self.server_or_err()?;
        if let Some(connection) = self.connection.as_mut() {
            connection.set_ready(false);
        }
        let replies = self.handshake_replies.clone();
        self.router.send_request(
            server,
            MessageType::CLIENT_NOT_READY,
            &ClientNotReadyRequest,
            self.config.request_timeout,
            now,
            move |code, _: Option<EmptyMessage>| {
                replies.borrow_mut().push(HandshakeReply::NotReady(code));
            },
        );
        Ok(())
    }

    fn apply_handshake_replies(&mut self, now: Instant) {
        let replies = mem::take(&mut *self.handshake_replies.borrow_mut());
        for reply in replies {
            match reply {
                HandshakeReply::EnterGame(ResponseCode::Success, Some(response)) => {
                    let Some(connection) = self.connection.as_mut() else {
                        continue;
                    };
                    info!(
                        "Entered the game as {} in scene '{}'",
                        response.connection_id, response.scene_name
                    );
                    connection.set_entered(response.connection_id, response.scene_name.clone());
                    self.incoming_events
                        .push_enter_game(response.connection_id, response.scene_name);
                    if self.config.ready_on_enter {
                        let result = self.send_ready(now);
                        self.report(result);
                    }
                }
                HandshakeReply::EnterGame(code, _) => {
                    self.handshake_failed("EnterGame", code);
                }
                HandshakeReply::Ready(ResponseCode::Success) => {
                    if let Some(connection) = self.connection.as_mut() {
                        connection.set_ready(true);
                        debug!("Server acknowledged ready");
                        self.incoming_events.push_ready();
                    }
                }
                HandshakeReply::Ready(code) => {
                    if let Some(connection) = self.connection.as_mut() {
                        connection.set_ready(false);
                    }
                    self.handshake_failed("ClientReady", code);
                }
                HandshakeReply::NotReady(ResponseCode::Success) => {}
                HandshakeReply::NotReady(code) => {
                    self.handshake_failed("ClientNotReady", code);
                }
            }
        }
    }

    fn handshake_failed(&mut self, request: &'static str, code: ResponseCode) {
        let error = NetsyncClientError::HandshakeFailed { request, code };
        warn!("{}", error);
        self.incoming_events.push_error(error);
    }

    fn report(&mut self, result: Result<(), NetsyncClientError>) {
        if let Err(error) = result {
            warn!("{}", error);
            self.incoming_events.push_error(error);
        }
    }

    // Custom messages

    pub fn register_message_handler<M, F>(
        &mut self,
        message_type: MessageType,
        handler: F,
    ) -> Result<(), NetsyncClientError>
    where
        M: Serde,
        F: FnMut(ConnectionId, M) + 'static,
    {
        self.router
            .register_message_handler::<M, F>(message_type, handler)
            .map_err(NetsyncClientError::from)
    }

    pub fn register_request_handler<Q, F>(
        &mut self,
        message_type: MessageType,
        handler: F,
    ) -> Result<(), NetsyncClientError>
    where
        Q: Request,
        F: FnMut(ConnectionId, Q) -> (ResponseCode, Q::Response) + 'static,
    {
        self.router
            .register_request_handler::<Q, F>(message_type, handler)
            .map_err(NetsyncClientError::from)
    }

    pub fn send_message<M: Serde>(
        &mut self,
        mode: ChannelMode,
        message_type: MessageType,
        message: &M,
    ) -> Result<(), NetsyncClientError> {
        let server = self.server_or_err()?;
        self.router.send(server, mode, message_type, message);
        Ok(())
    }

    pub fn send_request<Q, F>(
        &mut self,
        message_type: MessageType,
        request: &Q,
        now: Instant,
        on_response: F,
    ) -> Result<RequestId, NetsyncClientError>
    where
        Q: Request,
        F: FnOnce(ResponseCode, Option<Q::Response>) + 'static,
    {
        let server = self.server_or_err()?;
        Ok(self.router.send_request(
            server,
            message_type,
            request,
            self.config.request_timeout,
            now,
            on_response,
        ))
    }

    // Entities

    /// Places a static entity of the loaded scene. It stays hidden until the
    /// server spawns it for this client.
    pub fn place_static<F>(
        &mut self,
        object_id: ObjectId,
        transform: Transform,
        build: F,
    ) -> Result<(), NetsyncClientError>
    where
        F: FnOnce(&mut EntityBuilder),
    {
        self.registry.insert_static(object_id, transform, build)?;
        Ok(())
    }

    pub fn entity(&self, object_id: &ObjectId) -> Option<&Entity> {
        self.registry.lookup(object_id)
    }

    pub fn entity_mut(&mut self, object_id: &ObjectId) -> Option<&mut Entity> {
        self.registry.lookup_mut(object_id)
    }

    /// Ids of every local entity, hidden statics included, ascending
    pub fn entity_ids(&self) -> Vec<ObjectId> {
        self.registry.object_ids()
    }

    /// Ids of entities the server currently shows this client, ascending
    pub fn visible_entity_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .registry
            .iter()
            .filter(|entity| !entity.is_hidden())
            .map(|entity| entity.object_id())
            .collect();
        ids.sort();
        ids
    }

    /// Asks the server to run an RPC. Calls this client may not make are
    /// rejected here instead of being dropped by the server.
    pub fn call_rpc<P: Serde + 'static>(
        &mut self,
        object_id: &ObjectId,
        handle: RpcHandle<P>,
        receiver: RpcReceiver,
        params: &P,
    ) -> Result<(), NetsyncClientError> {
        let server = self.server_or_err()?;
        let caller = self.connection_id();
        let entity = self
            .registry
            .lookup_mut(object_id)
            .ok_or(RegistryError::EntityNotFound {
                object_id: *object_id,
            })?;
        let owner = entity.owner();
        let slot = entity.rpc_mut(handle)?;
        if caller.is_none() || !slot.is_authorized(owner, caller) {
            return Err(RpcError::NotAuthorized {
                object_id: *object_id,
            }
            .into());
        }
        let mode = slot.config().mode;
        let address = ReplicationAddress::new(*object_id, handle.component(), handle.slot());
        self.router
            .send_with(server, mode, MessageType::CALL_FUNCTION, |writer| {
                address.ser(writer);
                receiver.ser(writer);
                params.ser(writer);
            });
        Ok(())
    }

    // Receiving

    /// Drains the transport, applies every server message and resolves
    /// pending requests. Protocol errors are logged, dropped and reported as
    /// `ErrorEvent`s.
    pub fn receive(&mut self, now: Instant) -> Events {
        while let Some(event) = self.transport.receive() {
            match event {
                TransportEvent::Connected(server) => {
                    info!("Connected to server {}", server);
                    if self.connection.is_some() {
                        self.teardown();
                    }
                    self.connection = Some(Connection::new(server, &self.config.ping));
                    self.incoming_events.push_connection(server);
                    if self.config.enter_game_on_connect {
                        let result = self.send_enter_game(now);
                        self.report(result);
                    }
                }
                TransportEvent::Disconnected(server) => {
                    if self.server_connection() == Some(server) {
                        info!("Disconnected from server {}", server);
                        self.teardown();
                        self.incoming_events.push_disconnection(server);
                    }
                }
                TransportEvent::Data(sender, frame) => {
                    if self.server_connection() != Some(sender) {
                        warn!("Dropping frame from {}, which is not the server", sender);
                        continue;
                    }
                    let result = self.receive_frame(now, &sender, &frame);
                    self.report(result);
                }
            }
        }

        self.router.update(now);
        self.apply_handshake_replies(now);

        mem::take(&mut self.incoming_events)
    }

    fn receive_frame(
        &mut self,
        now: Instant,
        server: &ConnectionId,
        frame: &[u8],
    ) -> Result<(), NetsyncClientError> {
        let Some(incoming) = self.router.receive(*server, frame)? else {
            return Ok(());
        };
        let (message_type, mut reader) = match incoming {
            Incoming::Message {
                message_type,
                reader,
            } => (message_type, reader),
            Incoming::Request { message_type, .. } => {
                return Err(unexpected(server, message_type));
            }
        };
        let reader = &mut reader;

        match message_type {
            MessageType::SPAWN_DYNAMIC => {
                let message: SpawnDynamicMessage = decode(server, message_type, reader)?;
                self.registry.insert_replica(
                    &self.protocol,
                    message.object_id,
                    message.prototype,
                    message.owner,
                    message.transform,
                )?;
                debug!("Spawned replica {}", message.object_id);
                self.incoming_events.push_spawn(message.object_id);
            }
            MessageType::SPAWN_STATIC => {
                let message: SpawnStaticMessage = decode(server, message_type, reader)?;
                let entity = self.registry.resolve_static(message.object_id)?;
                entity.set_hidden(false);
                entity.set_owner(message.owner);
                entity.transform = message.transform;
                debug!("Revealed static {}", message.object_id);
                self.incoming_events.push_spawn(message.object_id);
            }
            MessageType::DESTROY => {
                let message: DestroyMessage = decode(server, message_type, reader)?;
                self.registry.destroy(message.object_id, message.reason)?;
                self.incoming_events
                    .push_despawn(message.object_id, message.reason);
            }
            MessageType::SYNC_FIELD_INITIAL | MessageType::SYNC_FIELD_UPDATE => {
                let address: ReplicationAddress = decode(server, message_type, reader)?;
                self.entity_or_err(&address.object_id)?
                    .component_mut(address.component)?
                    .field_mut(address.slot)?
                    .read_value(reader)
                    .map_err(|error| MessageError::malformed(*server, message_type, error))?;
            }
            MessageType::SYNC_LIST_OPERATION => {
                let address: ReplicationAddress = decode(server, message_type, reader)?;
                self.entity_or_err(&address.object_id)?
                    .component_mut(address.component)?
                    .list_mut(address.slot)?
                    .apply_operation(reader)?;
            }
            MessageType::CALL_FUNCTION => {
                let address: ReplicationAddress = decode(server, message_type, reader)?;
                let _: RpcReceiver = decode(server, message_type, reader)?;
                let context = RpcContext {
                    object_id: address.object_id,
                    caller: None,
                    host: HostType::Client,
                };
                self.entity_or_err(&address.object_id)?
                    .component_mut(address.component)?
                    .rpc_mut(address.slot)?
                    .invoke(&context, reader.remaining_bytes())
                    .map_err(RpcError::from)?;
            }
            MessageType::SCENE_CHANGE => {
                let message: SceneChangeMessage = decode(server, message_type, reader)?;
                info!("Server changed scene to '{}'", message.scene_name);
                self.registry.clear();
                if let Some(connection) = self.connection.as_mut() {
                    connection.set_ready(false);
                    connection.scene_name = Some(message.scene_name.clone());
                }
                // ready waits for the application to place the new scene's
                // statics and call send_ready
                self.incoming_events.push_scene_change(message.scene_name);
            }
            MessageType::SET_OWNER => {
                let message: SetOwnerMessage = decode(server, message_type, reader)?;
                self.entity_or_err(&message.object_id)?
                    .set_owner(message.owner);
                self.incoming_events
                    .push_owner_change(message.object_id, message.owner);
            }
            MessageType::SERVER_ERROR => {
                let message: ServerErrorMessage = decode(server, message_type, reader)?;
                warn!("Server error: {}", message.message);
                let should_disconnect = message.should_disconnect;
                self.incoming_events.push_server_error(message);
                if should_disconnect {
                    self.disconnect();
                }
            }
            MessageType::PING => {
                let message: PongMessage = decode(server, message_type, reader)?;
                let local = match Timestamp::try_now_millis() {
                    Ok(local) => local,
                    Err(error) => {
                        warn!("Ignoring pong: {}", error);
                        return Ok(());
                    }
                };
                if let Some(connection) = self.connection.as_mut() {
                    if !connection
                        .ping_manager
                        .on_pong(now, message.server_unix_millis, local)
                    {
                        debug!("Dropping pong without a ping in flight");
                    }
                }
            }
            _ => return Err(unexpected(server, message_type)),
        }
        Ok(())
    }

    fn entity_or_err(&mut self, object_id: &ObjectId) -> Result<&mut Entity, NetsyncClientError> {
        self.registry.lookup_mut(object_id).ok_or_else(|| {
            RegistryError::EntityNotFound {
                object_id: *object_id,
            }
            .into()
        })
    }

    // Sending

    /// Sends a ping when one is due, then flushes every queued frame to the
    /// transport
    pub fn send_all_updates(&mut self, now: Instant) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        let server = connection.server;
        if connection.ping_manager.should_send(now) {
            connection.ping_manager.on_sent(now);
            self.router.send_with(
                server,
                ChannelMode::OrderedReliable,
                MessageType::PING,
                |_: &mut dyn ByteWrite| {},
            );
        }

        for message in self.router.take_outgoing(&server) {
            if let Err(error) = self.transport.send(server, message.mode, &message.payload) {
                warn!("Failed to send to server {}: {}", server, error);
            }
        }
    }
}

fn decode<V: Serde>(
    server: &ConnectionId,
    message_type: MessageType,
    reader: &mut ByteReader,
) -> Result<V, NetsyncClientError> {
    V::de(reader).map_err(|error: SerdeErr| MessageError::malformed(*server, message_type, error).into())
}

fn unexpected(server: &ConnectionId, message_type: MessageType) -> NetsyncClientError {
    MessageError::UnexpectedMessageType {
        connection: *server,
        message_type,
    }
    .into()
}
