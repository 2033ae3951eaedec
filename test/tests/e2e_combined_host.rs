//! A server with an in-process client attached. The local client never
//! receives bytes: entities it does not observe are flagged hidden, and RPCs
//! aimed at it run in place.

use netsync_server::{
    ConnectEvent, NetsyncServerError, ServerConfig, LOCAL_CONNECTION,
};
use netsync_shared::{ConnectionId, Entity, HostType, RpcReceiver, Transform};
use netsync_test::{
    test_protocol::{PLAYER, WAVE},
    TestSession,
};

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn flush(session: &mut TestSession) {
    let now = session.now;
    session.server.send_all_updates(now);
}

#[test]
fn local_client_sees_entities_through_the_hidden_flag() {
    init_logging();
    let mut session = TestSession::new();
    let local = session.server.connect_local_client().unwrap();
    assert_eq!(local, LOCAL_CONNECTION);
    assert_eq!(session.server.local_connection(), Some(LOCAL_CONNECTION));
    assert!(session.server.is_ready(&local));
    assert_eq!(
        session.server.connect_local_client(),
        Err(NetsyncServerError::LocalClientExists {
            connection: LOCAL_CONNECTION
        })
    );

    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    assert!(session.server.entity(&player).unwrap().is_hidden());

    flush(&mut session);
    assert!(!session.server.entity(&player).unwrap().is_hidden());
    assert_eq!(session.server.subscriptions(&local), vec![player]);

    session
        .server
        .set_visibility_rule(|connection: &ConnectionId, _: &Entity| *connection != LOCAL_CONNECTION);
    flush(&mut session);
    assert!(session.server.entity(&player).unwrap().is_hidden());
    assert!(session.server.subscriptions(&local).is_empty());
}

#[test]
fn local_client_connect_event_and_no_traffic() {
    init_logging();
    let mut session = TestSession::new();
    let remote = session.add_ready_client();
    session.server.connect_local_client().unwrap();

    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    let mut events = session.tick();
    assert_eq!(
        events.server.read::<ConnectEvent>().collect::<Vec<_>>(),
        vec![LOCAL_CONNECTION]
    );

    assert!(session
        .network
        .sent()
        .iter()
        .all(|frame| frame.to != LOCAL_CONNECTION));
    assert_eq!(session.client(remote).visible_entity_ids(), vec![player]);
    assert!(!session.server.entity(&player).unwrap().is_hidden());
}

#[test]
fn rpcs_for_the_local_client_run_in_place() {
    init_logging();
    let mut session = TestSession::new();
    let remote = session.add_ready_client();
    let local = session.server.connect_local_client().unwrap();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    session
        .server
        .call_rpc(&player, WAVE, RpcReceiver::Target(local), &"local".to_string())
        .unwrap();
    assert_eq!(session.server_calls.borrow().len(), 1);
    assert_eq!(session.server_calls.borrow()[0].host, HostType::Server);

    // a broadcast runs once in the combined host and once per remote observer
    session
        .client_mut(remote)
        .call_rpc(&player, WAVE, RpcReceiver::All, &"everyone".to_string())
        .unwrap();
    session.ticks(2);
    let server_calls = session.server_calls.borrow();
    assert_eq!(server_calls.len(), 2);
    assert_eq!(server_calls[1].argument, "everyone");
    assert_eq!(session.clients[remote].calls.borrow().len(), 1);
}

#[test]
fn owned_only_visibility_applies_to_the_local_client() {
    init_logging();
    let mut session = TestSession::with_config(ServerConfig {
        default_visibility: false,
        ..Default::default()
    });
    let local = session.server.connect_local_client().unwrap();
    let mine = session
        .server
        .spawn(PLAYER, Transform::default(), Some(local))
        .unwrap();
    let theirs = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    flush(&mut session);

    assert!(!session.server.entity(&mine).unwrap().is_hidden());
    assert!(session.server.entity(&theirs).unwrap().is_hidden());

    // detaching destroys what the local client owned
    session.server.disconnect(&local);
    assert_eq!(session.server.local_connection(), None);
    assert!(session.server.entity(&mine).is_none());
    assert!(session.server.entity(&theirs).is_some());
    assert!(session.server.connect_local_client().is_ok());
}
