//! Application messages and requests riding alongside replication traffic.
//!
//! Custom message types live above the reserved range. Requests resolve once
//! with the peer's response code, or with `Timeout` when nobody answers.

use std::{cell::RefCell, rc::Rc, time::Duration};

use netsync_client::NetsyncClientError;
use netsync_server::{ErrorEvent, NetsyncServerError};
use netsync_shared::{
    ChannelMode, ConnectionId, MessageError, MessageType, ResponseCode,
};
use netsync_test::{test_protocol::SumRequest, TestSession};

const CHAT: MessageType = MessageType(100);
const SUM: MessageType = MessageType(101);
const UNANSWERED: MessageType = MessageType(102);

type Responses = Rc<RefCell<Vec<(ResponseCode, Option<u32>)>>>;

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn record(responses: &Responses) -> impl FnOnce(ResponseCode, Option<u32>) + 'static {
    let responses = responses.clone();
    move |code, response| responses.borrow_mut().push((code, response))
}

#[test]
fn custom_messages_flow_both_ways() {
    init_logging();
    let mut session = TestSession::new();
    let index = session.add_ready_client();
    let client_id = session.client_id(index);

    let server_inbox: Rc<RefCell<Vec<(ConnectionId, String)>>> = Rc::default();
    let inbox = server_inbox.clone();
    session
        .server
        .register_message_handler::<String, _>(CHAT, move |from, text| {
            inbox.borrow_mut().push((from, text))
        })
        .unwrap();

    let client_inbox: Rc<RefCell<Vec<String>>> = Rc::default();
    let inbox = client_inbox.clone();
    session
        .client_mut(index)
        .register_message_handler::<String, _>(CHAT, move |_, text| inbox.borrow_mut().push(text))
        .unwrap();

    session
        .client_mut(index)
        .send_message(ChannelMode::OrderedReliable, CHAT, &"hi".to_string())
        .unwrap();
    session.ticks(2);
    assert_eq!(*server_inbox.borrow(), vec![(client_id, "hi".to_string())]);

    session
        .server
        .send_message(&client_id, ChannelMode::UnorderedReliable, CHAT, &"welcome".to_string())
        .unwrap();
    session.tick();
    assert_eq!(*client_inbox.borrow(), vec!["welcome".to_string()]);
}

#[test]
fn requests_resolve_with_the_handler_response() {
    init_logging();
    let mut session = TestSession::new();
    let index = session.add_ready_client();
    let client_id = session.client_id(index);

    session
        .server
        .register_request_handler::<SumRequest, _>(SUM, |_, request| {
            (ResponseCode::Success, request.a + request.b)
        })
        .unwrap();
    session
        .client_mut(index)
        .register_request_handler::<SumRequest, _>(SUM, |_, request| {
            (ResponseCode::Error, request.a * request.b)
        })
        .unwrap();

    let client_responses: Responses = Rc::default();
    let now = session.now;
    session
        .client_mut(index)
        .send_request(SUM, &SumRequest { a: 2, b: 3 }, now, record(&client_responses))
        .unwrap();
    session.ticks(2);
    assert_eq!(
        *client_responses.borrow(),
        vec![(ResponseCode::Success, Some(5))]
    );

    let server_responses: Responses = Rc::default();
    let now = session.now;
    session
        .server
        .send_request(&client_id, SUM, &SumRequest { a: 4, b: 6 }, now, record(&server_responses))
        .unwrap();
    session.ticks(2);
    assert_eq!(
        *server_responses.borrow(),
        vec![(ResponseCode::Error, Some(24))]
    );

    // callbacks run once
    session.ticks(3);
    assert_eq!(client_responses.borrow().len(), 1);
    assert_eq!(server_responses.borrow().len(), 1);
}

#[test]
fn unanswered_requests_time_out() {
    init_logging();
    let mut session = TestSession::new();
    let index = session.add_ready_client();
    let client_id = session.client_id(index);

    let responses: Responses = Rc::default();
    let now = session.now;
    session
        .client_mut(index)
        .send_request(UNANSWERED, &SumRequest { a: 1, b: 1 }, now, record(&responses))
        .unwrap();

    session.tick();
    let mut events = session.tick();
    let errors: Vec<NetsyncServerError> = events.server.read::<ErrorEvent>().collect();
    assert_eq!(
        errors,
        vec![NetsyncServerError::Message(MessageError::UnknownMessageType {
            connection: client_id,
            message_type: UNANSWERED,
        })]
    );
    assert!(responses.borrow().is_empty());

    session.advance(Duration::from_secs(6));
    session.tick();
    assert_eq!(*responses.borrow(), vec![(ResponseCode::Timeout, None)]);

    session.advance(Duration::from_secs(6));
    session.tick();
    assert_eq!(responses.borrow().len(), 1);
}

#[test]
fn reserved_and_duplicate_registrations_are_refused() {
    init_logging();
    let mut session = TestSession::new();
    let index = session.add_client();

    assert_eq!(
        session
            .server
            .register_message_handler::<String, _>(MessageType::PING, |_, _| {}),
        Err(NetsyncServerError::Message(MessageError::ReservedMessageType {
            message_type: MessageType::PING,
            highest: MessageType::HIGHEST_RESERVED,
        }))
    );
    assert!(matches!(
        session
            .client_mut(index)
            .register_message_handler::<String, _>(MessageType::GENERIC_RESPONSE, |_, _| {}),
        Err(NetsyncClientError::Message(MessageError::ReservedMessageType { .. }))
    ));

    session
        .server
        .register_message_handler::<String, _>(CHAT, |_, _| {})
        .unwrap();
    assert_eq!(
        session
            .server
            .register_request_handler::<SumRequest, _>(CHAT, |_, request| {
                (ResponseCode::Success, request.a)
            }),
        Err(NetsyncServerError::Message(MessageError::DuplicateHandler {
            message_type: CHAT
        }))
    );
}

#[test]
fn server_sends_only_to_remote_connections() {
    init_logging();
    let mut session = TestSession::new();
    let missing = ConnectionId::new(9999);

    assert_eq!(
        session
            .server
            .send_message(&missing, ChannelMode::OrderedReliable, CHAT, &"lost".to_string()),
        Err(NetsyncServerError::ConnectionNotFound {
            connection: missing
        })
    );

    let local = session.server.connect_local_client().unwrap();
    assert_eq!(
        session
            .server
            .send_error(&local, false, "not for you"),
        Err(NetsyncServerError::ConnectionNotFound { connection: local })
    );
}
