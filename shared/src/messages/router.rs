use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use netsync_serde::{ByteReader, ByteWrite, ByteWriter, Serde, SerdeErr};

use crate::{
    messages::{
        channel_mode::ChannelMode,
        error::MessageError,
        message_type::MessageType,
        request::{Request, ResponseCode},
    },
    types::{ConnectionId, HostType, RequestId},
};

pub type MessageHandler = Box<dyn FnMut(ConnectionId, &mut ByteReader) -> Result<(), SerdeErr>>;

type RequestHandler =
    Box<dyn FnMut(ConnectionId, &mut ByteReader) -> Result<(ResponseCode, ByteWriter), SerdeErr>>;

type ResponseCallback = Box<dyn FnOnce(ResponseCode, &mut ByteReader)>;

struct PendingRequest {
    connection: ConnectionId,
    message_type: MessageType,
    deadline: Instant,
    on_response: ResponseCallback,
}

/// A framed message waiting for the transport
pub struct OutgoingMessage {
    pub mode: ChannelMode,
    pub payload: Box<[u8]>,
}

/// A reserved message the router does not handle itself. The owning role
/// reads the payload with the returned reader.
pub enum Incoming<'b> {
    Message {
        message_type: MessageType,
        reader: ByteReader<'b>,
    },
    Request {
        message_type: MessageType,
        request_id: RequestId,
        reader: ByteReader<'b>,
    },
}

/// Frames outgoing messages, dispatches incoming ones and correlates
/// requests with their responses.
///
/// Outgoing frames are queued per connection until the owning role flushes
/// them to the transport.
pub struct MessageRouter {
    host: HostType,
    handlers: HashMap<MessageType, MessageHandler>,
    request_handlers: HashMap<MessageType, RequestHandler>,
    pending_requests: HashMap<RequestId, PendingRequest>,
    next_request_id: RequestId,
    outgoing: HashMap<ConnectionId, VecDeque<OutgoingMessage>>,
}

impl MessageRouter {
    pub fn new(host: HostType) -> Self {
        Self {
            host,
            handlers: HashMap::new(),
            request_handlers: HashMap::new(),
            pending_requests: HashMap::new(),
            next_request_id: 0,
            outgoing: HashMap::new(),
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host
    }

    // Registration

    /// Registers a handler for an application message type
    pub fn register_handler<F>(
        &mut self,
        message_type: MessageType,
        handler: F,
    ) -> Result<(), MessageError>
    where
        F: FnMut(ConnectionId, &mut ByteReader) -> Result<(), SerdeErr> + 'static,
    {
        self.check_registrable(message_type)?;
        self.handlers.insert(message_type, Box::new(handler));
        Ok(())
    }

    /// Registers a handler for an application message type, decoding the
    /// payload as `M` first
    pub fn register_message_handler<M, F>(
        &mut self,
        message_type: MessageType,
        mut handler: F,
    ) -> Result<(), MessageError>
    where
        M: Serde,
        F: FnMut(ConnectionId, M) + 'static,
    {
        self.register_handler(message_type, move |connection, reader: &mut ByteReader| {
            let message = M::de(reader)?;
            handler(connection, message);
            Ok(())
        })
    }

    /// Registers the responding side of an application request type
    pub fn register_request_handler<Q, F>(
        &mut self,
        message_type: MessageType,
        mut handler: F,
    ) -> Result<(), MessageError>
    where
        Q: Request,
        F: FnMut(ConnectionId, Q) -> (ResponseCode, Q::Response) + 'static,
    {
        self.check_registrable(message_type)?;
        self.request_handlers.insert(
            message_type,
            Box::new(move |connection: ConnectionId, reader: &mut ByteReader| {
                let request = Q::de(reader)?;
                let (code, response) = handler(connection, request);
                let mut writer = ByteWriter::new();
                response.ser(&mut writer);
                Ok((code, writer))
            }),
        );
        Ok(())
    }

    fn check_registrable(&self, message_type: MessageType) -> Result<(), MessageError> {
        if message_type.is_reserved() {
            return Err(MessageError::ReservedMessageType {
                message_type,
                highest: MessageType::HIGHEST_RESERVED,
            });
        }
        if self.handlers.contains_key(&message_type)
            || self.request_handlers.contains_key(&message_type)
        {
            return Err(MessageError::DuplicateHandler { message_type });
        }
        Ok(())
    }

    // Sending

    /// Frames a message with the given serializer and queues it for
    /// `connection`
    pub fn send_with<F>(
        &mut self,
        connection: ConnectionId,
        mode: ChannelMode,
        message_type: MessageType,
        serializer: F,
    ) where
        F: FnOnce(&mut dyn ByteWrite),
    {
        let mut writer = ByteWriter::new();
        message_type.ser(&mut writer);
        serializer(&mut writer);
        self.queue(connection, mode, writer.to_bytes());
    }

    pub fn send<M: Serde>(
        &mut self,
        connection: ConnectionId,
        mode: ChannelMode,
        message_type: MessageType,
        message: &M,
    ) {
        self.send_with(connection, mode, message_type, |writer| message.ser(writer));
    }

    /// Queues an already framed message
    pub fn queue(&mut self, connection: ConnectionId, mode: ChannelMode, payload: Box<[u8]>) {
        trace!("queue {} byte(s) for {}", payload.len(), connection);
        self.outgoing
            .entry(connection)
            .or_default()
            .push_back(OutgoingMessage { mode, payload });
    }

    /// Sends a correlated request. `on_response` runs exactly once: with the
    /// decoded response, with `(Error, None)` if the response cannot be
    /// decoded, or with `(Timeout, None)` once `timeout` has passed.
    pub fn send_request<Q, F>(
        &mut self,
        connection: ConnectionId,
        message_type: MessageType,
        request: &Q,
        timeout: Duration,
        now: Instant,
        on_response: F,
    ) -> RequestId
    where
        Q: Request,
        F: FnOnce(ResponseCode, Option<Q::Response>) + 'static,
    {
        let request_id = self.next_request_id();
        let callback: ResponseCallback = Box::new(move |code: ResponseCode, reader: &mut ByteReader| {
            if code == ResponseCode::Timeout {
                on_response(code, None);
                return;
            }
            match Q::Response::de(reader) {
                Ok(response) => on_response(code, Some(response)),
                Err(error) => {
                    warn!("Dropping undecodable response to request {request_id}: {error}");
                    on_response(ResponseCode::Error, None);
                }
            }
        });
        self.pending_requests.insert(
            request_id,
            PendingRequest {
                connection,
                message_type,
                deadline: now + timeout,
                on_response: callback,
            },
        );
        self.send_with(
            connection,
            ChannelMode::OrderedReliable,
            message_type,
            |writer| {
                request_id.ser(writer);
                request.ser(writer);
            },
        );
        request_id
    }

    /// Answers a request received through [`Incoming::Request`]
    pub fn respond<R: Serde>(
        &mut self,
        connection: ConnectionId,
        request_id: RequestId,
        code: ResponseCode,
        response: &R,
    ) {
        self.send_with(
            connection,
            ChannelMode::OrderedReliable,
            MessageType::GENERIC_RESPONSE,
            |writer| {
                request_id.ser(writer);
                code.ser(writer);
                response.ser(writer);
            },
        );
    }

    fn next_request_id(&mut self) -> RequestId {
        loop {
            let request_id = self.next_request_id;
            self.next_request_id = self.next_request_id.wrapping_add(1);
            if !self.pending_requests.contains_key(&request_id) {
                return request_id;
            }
        }
    }

    // Receiving

    /// Dispatches one incoming frame. Application messages and requests are
    /// handled here; reserved messages are handed back to the caller.
    pub fn receive<'b>(
        &mut self,
        connection: ConnectionId,
        frame: &'b [u8],
    ) -> Result<Option<Incoming<'b>>, MessageError> {
        let mut reader = ByteReader::new(frame);
        let message_type = MessageType::de(&mut reader)
            .map_err(|_| MessageError::MissingMessageType { connection })?;

        if message_type == MessageType::GENERIC_RESPONSE {
            self.receive_response(connection, &mut reader)
                .map_err(|error| MessageError::malformed(connection, message_type, error))?;
            return Ok(None);
        }

        if message_type.is_reserved() {
            if message_type.is_system_request() {
                let request_id = RequestId::de(&mut reader)
                    .map_err(|error| MessageError::malformed(connection, message_type, error))?;
                return Ok(Some(Incoming::Request {
                    message_type,
                    request_id,
                    reader,
                }));
            }
            return Ok(Some(Incoming::Message {
                message_type,
                reader,
            }));
        }

        if let Some(handler) = self.handlers.get_mut(&message_type) {
            handler(connection, &mut reader)
                .map_err(|error| MessageError::malformed(connection, message_type, error))?;
            return Ok(None);
        }

        if let Some(handler) = self.request_handlers.get_mut(&message_type) {
            let request_id = RequestId::de(&mut reader)
                .map_err(|error| MessageError::malformed(connection, message_type, error))?;
            let (code, writer) = handler(connection, &mut reader)
                .map_err(|error| MessageError::malformed(connection, message_type, error))?;
            self.send_with(
                connection,
                ChannelMode::OrderedReliable,
                MessageType::GENERIC_RESPONSE,
                |out| {
                    request_id.ser(out);
                    code.ser(out);
                    out.write_bytes(writer.as_slice());
                },
            );
            return Ok(None);
        }

        Err(MessageError::UnknownMessageType {
            connection,
            message_type,
        })
    }

    fn receive_response(
        &mut self,
        connection: ConnectionId,
        reader: &mut ByteReader,
    ) -> Result<(), SerdeErr> {
        let request_id = RequestId::de(reader)?;
        let code = ResponseCode::de(reader)?;

        let Some(pending) = self.pending_requests.get(&request_id) else {
            debug!("Dropping response to unknown or expired request {request_id}");
            return Ok(());
        };
        if pending.connection != connection {
            debug!(
                "Dropping response to request {request_id} from {connection}, it was sent to {}",
                pending.connection
            );
            return Ok(());
        }
        let Some(pending) = self.pending_requests.remove(&request_id) else {
            return Ok(());
        };
        trace!("{} response {:?} for request {request_id}", pending.message_type, code);
        (pending.on_response)(code, reader);
        Ok(())
    }

    /// Resolves every request whose deadline has passed with `Timeout`.
    /// Returns how many were resolved.
    pub fn update(&mut self, now: Instant) -> usize {
        let mut expired: Vec<RequestId> = self
            .pending_requests
            .iter()
            .filter(|(_, pending)| now >= pending.deadline)
            .map(|(request_id, _)| *request_id)
            .collect();
        expired.sort_unstable();

        for request_id in &expired {
            let Some(pending) = self.pending_requests.remove(request_id) else {
                continue;
            };
            debug!("{} request {request_id} timed out", pending.message_type);
            let mut empty = ByteReader::new(&[]);
            (pending.on_response)(ResponseCode::Timeout, &mut empty);
        }
        expired.len()
    }

    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    // Flushing

    pub fn outgoing_connections(&self) -> Vec<ConnectionId> {
        self.outgoing
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(connection, _)| *connection)
            .collect()
    }

    pub fn take_outgoing(&mut self, connection: &ConnectionId) -> VecDeque<OutgoingMessage> {
        self.outgoing.remove(connection).unwrap_or_default()
    }

    pub fn has_outgoing(&self) -> bool {
        self.outgoing.values().any(|queue| !queue.is_empty())
    }

    /// Drops whatever is still queued for a connection that went away
    pub fn discard_connection(&mut self, connection: &ConnectionId) {
        self.outgoing.remove(connection);
    }
}
