//! End-to-end session lifecycle: the EnterGame / Ready / NotReady handshake,
//! scene changes, ownership hand-over, server errors, disconnects and the
//! ping used for clock synchronisation.

use std::time::{SystemTime, UNIX_EPOCH};

use netsync_client::{
    ClientConfig, DisconnectEvent as ClientDisconnectEvent, EnterGameEvent as ClientEnterGameEvent,
    ErrorEvent as ClientErrorEvent, NetsyncClientError, OwnerChangeEvent,
    ReadyEvent as ClientReadyEvent, SceneChangeEvent, ServerErrorEvent,
};
use netsync_server::{
    ConnectEvent, DespawnEntityEvent, DisconnectEvent, EnterGameEvent, ErrorEvent,
    NetsyncServerError, NotReadyEvent, ReadyEvent, ServerConfig,
};
use netsync_shared::{
    ByteWriter, ConnectionId, DestroyReason, MessageType, ObjectId, ResponseCode, RpcReceiver,
    Serde, Transform,
};
use netsync_test::{
    frames_to,
    test_protocol::{build_crate, DURABILITY, INITIAL_DURABILITY, JUMP, PLAYER},
    TestSession, TICK,
};

const CRATE: ObjectId = ObjectId::new(500);

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn wait_until_ready(session: &mut TestSession, index: usize) {
    session.tick_until(|session| {
        session.client(index).is_ready() && session.server.is_ready(&session.client_id(index))
    });
}

#[test]
fn handshake_emits_events_on_both_sides() {
    init_logging();
    let mut session = TestSession::with_config(ServerConfig {
        initial_scene: "lobby".to_string(),
        ..Default::default()
    });
    let index = session.add_client();
    let id = session.client_id(index);

    let mut connects = Vec::new();
    let mut enters = Vec::new();
    let mut readies = Vec::new();
    let mut client_enters = Vec::new();
    let mut client_readies = 0;
    for _ in 0..4 {
        let mut events = session.tick();
        connects.extend(events.server.read::<ConnectEvent>());
        enters.extend(events.server.read::<EnterGameEvent>());
        readies.extend(events.server.read::<ReadyEvent>());
        client_enters.extend(events.clients[index].read::<ClientEnterGameEvent>());
        client_readies += events.clients[index].read::<ClientReadyEvent>().count();
    }

    assert_eq!(connects, vec![id]);
    assert_eq!(enters, vec![id]);
    assert_eq!(readies, vec![id]);
    assert_eq!(client_enters, vec![(id, "lobby".to_string())]);
    assert_eq!(client_readies, 1);

    let client = session.client(index);
    assert!(client.has_entered());
    assert!(client.is_ready());
    assert!(!client.is_ready_pending());
    assert_eq!(client.connection_id(), Some(id));
    assert_eq!(client.scene_name(), Some("lobby"));
    assert!(session.server.has_entered(&id));
    assert!(session.server.is_ready(&id));
}

#[test]
fn refused_enter_game_is_reported_to_the_client() {
    init_logging();
    let mut session = TestSession::new();
    session.server.set_enter_game_filter(|_| false);
    let index = session.add_client();
    let id = session.client_id(index);

    let mut errors = Vec::new();
    for _ in 0..4 {
        let mut events = session.tick();
        errors.extend(events.clients[index].read::<ClientErrorEvent>());
    }

    assert_eq!(
        errors,
        vec![NetsyncClientError::HandshakeFailed {
            request: "EnterGame",
            code: ResponseCode::Error,
        }]
    );
    assert!(!session.client(index).has_entered());
    assert!(session.client(index).connection_id().is_none());
    assert!(session.server.is_connected(&id));
    assert!(!session.server.has_entered(&id));
    assert!(!session.server.is_ready(&id));
}

#[test]
fn ready_requires_entering_first() {
    init_logging();
    let mut session = TestSession::new();
    let index = session.add_client_with_config(ClientConfig {
        enter_game_on_connect: false,
        ..Default::default()
    });
    let id = session.client_id(index);
    session.ticks(2);

    let now = session.now;
    assert_eq!(
        session.client_mut(index).send_ready(now),
        Err(NetsyncClientError::NotEntered)
    );

    // a raw ClientReady that skips the check is refused by the server
    let mut writer = ByteWriter::new();
    MessageType::CLIENT_READY.ser(&mut writer);
    77u32.ser(&mut writer);
    session.network.inject_to_server(id, writer.as_slice());
    let mut events = session.tick();
    assert_eq!(
        events.server.read::<ErrorEvent>().collect::<Vec<_>>(),
        vec![NetsyncServerError::NotEntered { connection: id }]
    );
    assert!(!session.server.is_ready(&id));

    let now = session.now;
    session.client_mut(index).send_enter_game(now).unwrap();
    wait_until_ready(&mut session, index);
    assert!(session.server.has_entered(&id));
}

#[test]
fn not_ready_drops_subscriptions_and_owned_entities() {
    init_logging();
    let mut session = TestSession::new();
    let leaving = session.add_ready_client();
    let staying = session.add_ready_client();
    let leaving_id = session.client_id(leaving);
    let owned = session
        .server
        .spawn(PLAYER, Transform::default(), Some(leaving_id))
        .unwrap();
    let shared = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    let now = session.now;
    session.client_mut(leaving).send_not_ready(now).unwrap();
    assert!(!session.client(leaving).is_ready());

    let mut not_readies = Vec::new();
    let mut despawns = Vec::new();
    let mut staying_despawns = Vec::new();
    for _ in 0..2 {
        let mut events = session.tick();
        not_readies.extend(events.server.read::<NotReadyEvent>());
        despawns.extend(events.server.read::<DespawnEntityEvent>());
        staying_despawns
            .extend(events.clients[staying].read::<netsync_client::DespawnEntityEvent>());
    }

    assert_eq!(not_readies, vec![leaving_id]);
    assert_eq!(despawns, vec![(leaving_id, owned)]);
    assert_eq!(staying_despawns, vec![(owned, DestroyReason::RequestedToDestroy)]);
    assert!(session.server.entity(&owned).is_none());
    assert!(session.server.subscriptions(&leaving_id).is_empty());
    assert!(session.client(leaving).visible_entity_ids().is_empty());
    assert_eq!(session.client(staying).visible_entity_ids(), vec![shared]);

    // ready again brings the remaining entities back
    let now = session.now;
    session.client_mut(leaving).send_ready(now).unwrap();
    wait_until_ready(&mut session, leaving);
    assert_eq!(session.client(leaving).visible_entity_ids(), vec![shared]);
}

#[test]
fn static_entities_are_revealed_under_their_placed_id() {
    init_logging();
    let mut session = TestSession::new();
    session
        .server
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    let index = session.add_client();
    session
        .client_mut(index)
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    assert!(session.client(index).visible_entity_ids().is_empty());

    wait_until_ready(&mut session, index);
    assert_eq!(session.client(index).visible_entity_ids(), vec![CRATE]);

    session.server.set_field(&CRATE, DURABILITY, 20).unwrap();
    session.tick();
    let durability = *session
        .client(index)
        .entity(&CRATE)
        .unwrap()
        .field(DURABILITY)
        .unwrap()
        .get();
    assert_eq!(durability, 20);

    // dynamic spawns never collide with placed ids
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    assert!(player > CRATE);
}

#[test]
fn scene_change_clears_replicas_and_waits_for_ready() {
    init_logging();
    let mut session = TestSession::new();
    session
        .server
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    let index = session.add_client();
    let id = session.client_id(index);
    session
        .client_mut(index)
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    wait_until_ready(&mut session, index);
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();
    assert_eq!(session.client(index).visible_entity_ids(), vec![CRATE, player]);

    session.server.change_scene("arena");
    assert_eq!(session.server.scene_name(), "arena");
    assert!(!session.server.is_ready(&id));
    assert!(session.server.entity(&player).is_none());
    assert!(session.server.entity(&CRATE).is_some());
    assert!(session.server.subscriptions(&id).is_empty());

    let mut events = session.tick();
    assert_eq!(
        events.clients[index].read::<SceneChangeEvent>().collect::<Vec<_>>(),
        vec!["arena".to_string()]
    );
    let client = session.client(index);
    assert_eq!(client.scene_name(), Some("arena"));
    assert!(client.entity_ids().is_empty());
    assert!(!client.is_ready());
    assert!(!client.is_ready_pending());

    // loading takes a while; the server holds everything back meanwhile
    session.network.take_sent();
    session.ticks(3);
    assert!(!session.server.is_ready(&id));
    assert!(session.server.subscriptions(&id).is_empty());
    assert!(frames_to(&session.network.take_sent(), id, MessageType::SPAWN_STATIC).is_empty());

    session
        .client_mut(index)
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    let now = session.now;
    session.client_mut(index).send_ready(now).unwrap();
    wait_until_ready(&mut session, index);
    session.tick();

    assert_eq!(session.client(index).visible_entity_ids(), vec![CRATE]);
    let durability = *session
        .client(index)
        .entity(&CRATE)
        .unwrap()
        .field(DURABILITY)
        .unwrap()
        .get();
    assert_eq!(durability, INITIAL_DURABILITY);
}

#[test]
fn statics_placed_late_after_a_scene_change_are_revealed() {
    init_logging();
    let mut session = TestSession::new();
    session
        .server
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    let index = session.add_client();
    session
        .client_mut(index)
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    wait_until_ready(&mut session, index);
    session.server.set_field(&CRATE, DURABILITY, 12).unwrap();

    session.server.change_scene("arena");
    session.ticks(3);
    session
        .client_mut(index)
        .place_static(CRATE, Transform::default(), build_crate)
        .unwrap();
    session.ticks(5);
    assert!(!session.client(index).is_ready());
    assert!(session.client(index).visible_entity_ids().is_empty());

    let now = session.now;
    session.client_mut(index).send_ready(now).unwrap();
    let mut errors = Vec::new();
    for _ in 0..5 {
        let mut events = session.tick();
        errors.extend(events.clients[index].read::<ClientErrorEvent>());
    }

    assert!(errors.is_empty(), "unexpected client errors: {errors:?}");
    assert!(session.client(index).is_ready());
    assert_eq!(session.client(index).visible_entity_ids(), vec![CRATE]);
    let durability = *session
        .client(index)
        .entity(&CRATE)
        .unwrap()
        .field(DURABILITY)
        .unwrap()
        .get();
    assert_eq!(durability, 12);
}

#[test]
fn ownership_hand_over_reaches_observers() {
    init_logging();
    let mut session = TestSession::new();
    let new_owner = session.add_ready_client();
    let observer = session.add_ready_client();
    let new_owner_id = session.client_id(new_owner);
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    assert!(session
        .client_mut(new_owner)
        .call_rpc(&player, JUMP, RpcReceiver::Server, &1)
        .is_err());

    session
        .server
        .set_owner(&player, Some(new_owner_id))
        .unwrap();
    let mut events = session.tick();
    for index in [new_owner, observer] {
        assert_eq!(
            events.clients[index].read::<OwnerChangeEvent>().collect::<Vec<_>>(),
            vec![(player, Some(new_owner_id))]
        );
        assert_eq!(
            session.client(index).entity(&player).unwrap().owner(),
            Some(new_owner_id)
        );
    }

    session
        .client_mut(new_owner)
        .call_rpc(&player, JUMP, RpcReceiver::Server, &1)
        .unwrap();
    session.ticks(2);
    assert_eq!(session.server_calls.borrow().len(), 1);

    assert_eq!(
        session
            .server
            .set_owner(&player, Some(ConnectionId::new(9_999))),
        Err(NetsyncServerError::ConnectionNotFound {
            connection: ConnectionId::new(9_999)
        })
    );
}

#[test]
fn server_error_can_disconnect_a_client() {
    init_logging();
    let mut session = TestSession::new();
    let warned = session.add_ready_client();
    let kicked = session.add_ready_client();
    let kicked_id = session.client_id(kicked);
    let owned = session
        .server
        .spawn(PLAYER, Transform::default(), Some(kicked_id))
        .unwrap();
    session.tick();

    session
        .server
        .send_error(&session.client_id(warned), false, "slow down")
        .unwrap();
    session.server.send_error(&kicked_id, true, "kicked").unwrap();
    let mut events = session.tick();

    let warnings: Vec<_> = events.clients[warned].read::<ServerErrorEvent>().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "slow down");
    assert!(!warnings[0].should_disconnect);
    assert!(session.client(warned).is_connected());

    let errors: Vec<_> = events.clients[kicked].read::<ServerErrorEvent>().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].should_disconnect);
    assert!(events.clients[kicked].has::<ClientDisconnectEvent>());
    assert!(!session.client(kicked).is_connected());
    assert!(session.client(kicked).entity_ids().is_empty());

    let mut events = session.tick();
    assert_eq!(
        events.server.read::<DisconnectEvent>().collect::<Vec<_>>(),
        vec![kicked_id]
    );
    assert_eq!(
        events.server.read::<DespawnEntityEvent>().collect::<Vec<_>>(),
        vec![(kicked_id, owned)]
    );
    assert!(!session.server.is_connected(&kicked_id));
    assert!(session.server.entity(&owned).is_none());
    assert!(session.client(warned).entity(&owned).is_none());
}

#[test]
fn ping_measures_round_trip_and_server_clock() {
    init_logging();
    let mut session = TestSession::new();
    let index = session.add_client();
    assert!(session.client(index).rtt().is_none());
    assert!(session.client(index).server_unix_time().is_none());

    session.ticks(2);

    let client = session.client(index);
    assert_eq!(client.rtt(), Some(TICK));
    let offset = client.server_clock_offset_millis().unwrap();
    assert!(offset.abs() < 1_000, "offset {offset}ms between two local clocks");

    let local = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    let estimate = client.server_unix_time().unwrap() as i64;
    assert!((estimate - local).abs() < 1_000);
}
