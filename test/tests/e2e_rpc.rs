//! End-to-end RPC dispatch.
//!
//! Owner-only slots are refused on the calling client and silently dropped
//! by the server when a raw frame bypasses that check. Open slots relay to the
//! server, to every observer, or to one target.

use netsync_client::NetsyncClientError;
use netsync_server::{ErrorEvent, NetsyncServerError};
use netsync_shared::{
    encode_params, ByteWrite, ByteWriter, ConnectionId, Entity, HostType, MessageType, ObjectId,
    ReplicationAddress, RpcError, RpcReceiver, Serde, Transform,
};
use netsync_test::{
    frames_to,
    test_protocol::{JUMP, PLAYER, WAVE},
    RpcCall, TestSession,
};

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// A session with two ready clients observing one player owned by the first
fn owned_player_session() -> (TestSession, usize, usize, ObjectId) {
    let mut session = TestSession::new();
    let owner = session.add_ready_client();
    let other = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), Some(session.client_id(owner)))
        .unwrap();
    session.tick();
    (session, owner, other, player)
}

#[test]
fn owner_calls_owner_only_rpc_on_the_server() {
    init_logging();
    let (mut session, owner, _, player) = owned_player_session();
    let owner_id = session.client_id(owner);

    session
        .client_mut(owner)
        .call_rpc(&player, JUMP, RpcReceiver::Server, &3)
        .unwrap();
    session.ticks(2);

    assert_eq!(
        *session.server_calls.borrow(),
        vec![RpcCall {
            host: HostType::Server,
            object_id: player,
            caller: Some(owner_id),
            rpc: "jump",
            argument: "3".to_string(),
        }]
    );
    for client in &session.clients {
        assert!(client.calls.borrow().is_empty());
    }
}

#[test]
fn client_refuses_calls_it_is_not_authorized_for() {
    init_logging();
    let (mut session, _, other, player) = owned_player_session();

    let result = session
        .client_mut(other)
        .call_rpc(&player, JUMP, RpcReceiver::Server, &3);
    assert_eq!(
        result,
        Err(NetsyncClientError::Rpc(RpcError::NotAuthorized { object_id: player }))
    );

    session.ticks(2);
    assert!(session.server_calls.borrow().is_empty());
}

#[test]
fn server_drops_unauthorized_calls_silently() {
    init_logging();
    let (mut session, _, other, player) = owned_player_session();
    let other_id = session.client_id(other);

    let mut writer = ByteWriter::new();
    MessageType::CALL_FUNCTION.ser(&mut writer);
    ReplicationAddress::new(player, JUMP.component(), JUMP.slot()).ser(&mut writer);
    RpcReceiver::All.ser(&mut writer);
    9u8.ser(&mut writer);
    session.network.take_sent();
    session.network.inject_to_server(other_id, writer.as_slice());

    let mut events = session.tick();
    session.tick();

    assert!(!events.server.has::<ErrorEvent>());
    assert!(session.server_calls.borrow().is_empty());
    let sent = session.network.take_sent();
    for client in &session.clients {
        assert!(client.calls.borrow().is_empty());
        assert!(frames_to(&sent, client.id, MessageType::CALL_FUNCTION).is_empty());
    }
    assert!(session.server.is_connected(&other_id));
    assert_eq!(events.server.read::<ErrorEvent>().count(), 0);
}

#[test]
fn open_rpc_to_all_runs_on_server_and_every_observer() {
    init_logging();
    let (mut session, _, other, player) = owned_player_session();
    let other_id = session.client_id(other);

    session
        .client_mut(other)
        .call_rpc(&player, WAVE, RpcReceiver::All, &"hello".to_string())
        .unwrap();
    session.ticks(2);

    assert_eq!(
        *session.server_calls.borrow(),
        vec![RpcCall {
            host: HostType::Server,
            object_id: player,
            caller: Some(other_id),
            rpc: "wave",
            argument: "hello".to_string(),
        }]
    );
    for client in &session.clients {
        assert_eq!(
            *client.calls.borrow(),
            vec![RpcCall {
                host: HostType::Client,
                object_id: player,
                caller: None,
                rpc: "wave",
                argument: "hello".to_string(),
            }]
        );
    }
}

#[test]
fn targeted_rpc_reaches_one_connection() {
    init_logging();
    let (mut session, owner, other, player) = owned_player_session();
    let owner_id = session.client_id(owner);

    session
        .server
        .call_rpc(&player, WAVE, RpcReceiver::Target(owner_id), &"psst".to_string())
        .unwrap();
    session.tick();

    assert!(session.server_calls.borrow().is_empty());
    assert_eq!(session.clients[owner].calls.borrow().len(), 1);
    assert_eq!(session.clients[owner].calls.borrow()[0].argument, "psst");
    assert!(session.clients[other].calls.borrow().is_empty());
}

#[test]
fn target_must_observe_the_entity() {
    init_logging();
    let (mut session, owner, other, player) = owned_player_session();
    let other_id = session.client_id(other);
    let owner_id = session.client_id(owner);

    session
        .server
        .set_visibility_rule(move |connection: &ConnectionId, _: &Entity| *connection != other_id);
    session.tick();
    assert!(!session.server.is_subscribed(&other_id, &player));

    let result = session.server.call_rpc(
        &player,
        WAVE,
        RpcReceiver::Target(other_id),
        &"anyone there".to_string(),
    );
    assert_eq!(
        result,
        Err(NetsyncServerError::Rpc(RpcError::TargetNotObserving { object_id: player }))
    );

    // a client aiming at a non-observer is dropped without an error
    session
        .client_mut(owner)
        .call_rpc(&player, WAVE, RpcReceiver::Target(other_id), &"hi".to_string())
        .unwrap();
    let first = session.tick();
    let mut second = session.tick();
    assert!(!first.server.has::<ErrorEvent>());
    assert!(!second.server.has::<ErrorEvent>());
    assert_eq!(second.server.read::<ErrorEvent>().count(), 0);
    assert!(session.clients[other].calls.borrow().is_empty());
    assert!(session.server.is_subscribed(&owner_id, &player));
}

#[test]
fn malformed_parameters_are_reported_and_dropped() {
    init_logging();
    let (mut session, _, other, player) = owned_player_session();
    let other_id = session.client_id(other);

    let mut writer = ByteWriter::new();
    MessageType::CALL_FUNCTION.ser(&mut writer);
    ReplicationAddress::new(player, WAVE.component(), WAVE.slot()).ser(&mut writer);
    RpcReceiver::Server.ser(&mut writer);
    // a string length with no bytes behind it
    writer.write_bytes(&encode_params(&20u8));
    session.network.inject_to_server(other_id, writer.as_slice());

    let mut events = session.tick();
    let errors: Vec<NetsyncServerError> = events.server.read::<ErrorEvent>().collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], NetsyncServerError::Rpc(RpcError::Decode(_))));
    assert!(session.server_calls.borrow().is_empty());
    assert!(session.server.is_connected(&other_id));
}
