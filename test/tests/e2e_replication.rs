//! End-to-end replication between one server and several clients over the
//! in-memory transport.
//!
//! Covers spawning with initial state, SyncField coalescing and send
//! intervals, the reliable first update per connection, owner-only fields
//! and lists across ownership hand-over, SyncList replay and removing an
//! entity from a single connection.

use std::{cell::Cell, rc::Rc, time::Duration};

use netsync_client::{DespawnEntityEvent, SpawnEntityEvent};
use netsync_shared::{
    ChannelMode, ConnectionId, DestroyReason, Entity, MessageType, ObjectId, SyncFieldError,
    Transform,
};
use netsync_test::{
    assert_reliable_field, field_value, frames_to, object_id_of,
    test_protocol::{HEALTH, INITIAL_HEALTH, INVENTORY, NAME, PLAYER, SECRET, STASH},
    TestSession,
};

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn health(session: &TestSession, client: usize, object_id: &ObjectId) -> u32 {
    *session
        .client(client)
        .entity(object_id)
        .expect("replica exists")
        .field(HEALTH)
        .expect("health field")
        .get()
}

#[test]
fn spawn_reaches_every_ready_client_with_initial_state() {
    init_logging();
    let mut session = TestSession::new();
    let first = session.add_ready_client();
    let second = session.add_ready_client();
    session.network.take_sent();

    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    let mut events = session.tick();

    let sent = session.network.take_sent();
    for index in [first, second] {
        let connection = session.client_id(index);
        let spawns = frames_to(&sent, connection, MessageType::SPAWN_DYNAMIC);
        assert_eq!(spawns.len(), 1);
        assert_eq!(object_id_of(&spawns[0]), player);
        assert_eq!(spawns[0].mode, ChannelMode::OrderedReliable);

        // SECRET is owner-only and the entity has no owner
        let initial = frames_to(&sent, connection, MessageType::SYNC_FIELD_INITIAL);
        assert_eq!(initial.len(), 2);

        assert_eq!(
            events.clients[index].read::<SpawnEntityEvent>().collect::<Vec<_>>(),
            vec![player]
        );
        assert_eq!(session.client(index).visible_entity_ids(), vec![player]);
        assert_eq!(health(&session, index, &player), INITIAL_HEALTH);
        assert!(session.server.is_subscribed(&connection, &player));
    }
}

#[test]
fn changes_in_one_interval_coalesce_into_one_reliable_update() {
    init_logging();
    let mut session = TestSession::new();
    let first = session.add_ready_client();
    let second = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();
    session.network.take_sent();

    session.server.set_field(&player, HEALTH, 5).unwrap();
    session.server.set_field(&player, HEALTH, 7).unwrap();
    session.tick();

    let sent = session.network.take_sent();
    for index in [first, second] {
        let updates = frames_to(&sent, session.client_id(index), MessageType::SYNC_FIELD_UPDATE);
        assert_eq!(updates.len(), 1);
        assert_reliable_field!(updates[0], player, 7u32);
        assert_eq!(health(&session, index, &player), 7);
    }

    // later updates use the field's own mode
    session.advance(Duration::from_millis(100));
    session.server.set_field(&player, HEALTH, 9).unwrap();
    session.tick();

    let sent = session.network.take_sent();
    for index in [first, second] {
        let updates = frames_to(&sent, session.client_id(index), MessageType::SYNC_FIELD_UPDATE);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].mode, ChannelMode::SequencedUnreliable);
        assert_eq!(health(&session, index, &player), 9);
    }
}

#[test]
fn reverted_change_sends_nothing() {
    init_logging();
    let mut session = TestSession::new();
    let client = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();
    session.network.take_sent();

    session.server.set_field(&player, HEALTH, 1).unwrap();
    session
        .server
        .set_field(&player, HEALTH, INITIAL_HEALTH)
        .unwrap();
    session.ticks(3);

    let sent = session.network.take_sent();
    assert!(frames_to(&sent, session.client_id(client), MessageType::SYNC_FIELD_UPDATE).is_empty());
    assert_eq!(health(&session, client, &player), INITIAL_HEALTH);
}

#[test]
fn send_interval_delays_updates() {
    init_logging();
    let mut session = TestSession::new();
    let client = session.add_ready_client();
    let connection = session.client_id(client);
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    session.server.set_field(&player, HEALTH, 1).unwrap();
    session.tick();
    session.network.take_sent();

    // one tick after a send the interval has not elapsed yet
    session.server.set_field(&player, HEALTH, 2).unwrap();
    session.tick();
    let sent = session.network.take_sent();
    assert!(frames_to(&sent, connection, MessageType::SYNC_FIELD_UPDATE).is_empty());
    assert_eq!(health(&session, client, &player), 1);

    session.ticks(4);
    let sent = session.network.take_sent();
    let updates = frames_to(&sent, connection, MessageType::SYNC_FIELD_UPDATE);
    assert_eq!(updates.len(), 1);
    assert_eq!(field_value::<u32>(&updates[0]).1, 2);
    assert_eq!(health(&session, client, &player), 2);
}

#[test]
fn late_joiner_gets_current_state_and_a_reliable_first_update() {
    init_logging();
    let mut session = TestSession::new();
    let early = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.server.set_field(&player, HEALTH, 42).unwrap();
    session
        .server
        .set_field(&player, NAME, "scout".to_string())
        .unwrap();
    session.tick();
    session.network.take_sent();

    let late = session.add_ready_client();
    let late_id = session.client_id(late);
    let sent = session.network.take_sent();

    let initial = frames_to(&sent, late_id, MessageType::SYNC_FIELD_INITIAL);
    assert_reliable_field!(initial[0], player, 42u32);
    assert_eq!(health(&session, late, &player), 42);
    assert_eq!(
        session
            .client(late)
            .entity(&player)
            .unwrap()
            .field(NAME)
            .unwrap()
            .get(),
        "scout"
    );

    session.advance(Duration::from_millis(100));
    session.server.set_field(&player, HEALTH, 43).unwrap();
    session.tick();
    let sent = session.network.take_sent();

    let to_early = frames_to(&sent, session.client_id(early), MessageType::SYNC_FIELD_UPDATE);
    assert_eq!(to_early.len(), 1);
    assert_eq!(to_early[0].mode, ChannelMode::SequencedUnreliable);

    let to_late = frames_to(&sent, late_id, MessageType::SYNC_FIELD_UPDATE);
    assert_eq!(to_late.len(), 1);
    assert_reliable_field!(to_late[0], player, 43u32);
}

#[test]
fn owner_only_fields_reach_the_owner_alone() {
    init_logging();
    let mut session = TestSession::new();
    let owner = session.add_ready_client();
    let other = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), Some(session.client_id(owner)))
        .unwrap();
    session.tick();

    session.server.set_field(&player, SECRET, 1234).unwrap();
    session.tick();
    let sent = session.network.take_sent();

    let to_owner = frames_to(&sent, session.client_id(owner), MessageType::SYNC_FIELD_UPDATE);
    assert_eq!(to_owner.len(), 1);
    let (address, value) = field_value::<u32>(&to_owner[0]);
    assert_eq!((address.component, address.slot), (SECRET.component(), SECRET.slot()));
    assert_eq!(value, 1234);
    assert!(frames_to(&sent, session.client_id(other), MessageType::SYNC_FIELD_UPDATE).is_empty());

    let secret = |index: usize| {
        *session
            .client(index)
            .entity(&player)
            .unwrap()
            .field(SECRET)
            .unwrap()
            .get()
    };
    assert_eq!(secret(owner), 1234);
    assert_eq!(secret(other), 0);
}

#[test]
fn clients_cannot_set_fields() {
    init_logging();
    let mut session = TestSession::new();
    let client = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    let replica = session.client_mut(client).entity_mut(&player).unwrap();
    assert_eq!(
        replica.field_mut(HEALTH).unwrap().set(1),
        Err(SyncFieldError::ClientCannotSet)
    );
    assert_eq!(health(&session, client, &player), INITIAL_HEALTH);
}

#[test]
fn sync_list_operations_replay_on_clients() {
    init_logging();
    let mut session = TestSession::new();
    let early = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    {
        let inventory = session.server.list_mut(&player, INVENTORY).unwrap();
        inventory.add(3).unwrap();
        inventory.add_range([4, 5, 6]).unwrap();
        inventory.remove_at(0).unwrap();
        inventory.insert(1, 9).unwrap();
        inventory.set(0, 8).unwrap();
    }
    session.tick();

    let expected = vec![8u16, 9, 5, 6];
    let replica_items = |session: &TestSession, index: usize| {
        session
            .client(index)
            .entity(&player)
            .unwrap()
            .list(INVENTORY)
            .unwrap()
            .as_slice()
            .to_vec()
    };
    assert_eq!(replica_items(&session, early), expected);

    let late = session.add_ready_client();
    assert_eq!(replica_items(&session, late), expected);

    session
        .server
        .list_mut(&player, INVENTORY)
        .unwrap()
        .clear()
        .unwrap();
    session.tick();
    assert!(replica_items(&session, early).is_empty());
    assert!(replica_items(&session, late).is_empty());
}

#[test]
fn interest_change_removes_entity_from_one_connection_only() {
    init_logging();
    let mut session = TestSession::new();
    let kept = session.add_ready_client();
    let dropped = session.add_ready_client();
    let dropped_id = session.client_id(dropped);
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    let hide = Rc::new(Cell::new(false));
    let rule_hide = hide.clone();
    session
        .server
        .set_visibility_rule(move |connection: &ConnectionId, _: &Entity| {
            !(rule_hide.get() && *connection == dropped_id)
        });
    session.tick();
    assert!(session.server.is_subscribed(&dropped_id, &player));

    hide.set(true);
    session.server.mark_interest_dirty();
    let mut events = session.tick();

    let sent = session.network.take_sent();
    let destroys = frames_to(&sent, dropped_id, MessageType::DESTROY);
    assert_eq!(destroys.len(), 1);
    assert_eq!(object_id_of(&destroys[0]), player);
    assert!(frames_to(&sent, session.client_id(kept), MessageType::DESTROY).is_empty());

    assert_eq!(
        events.clients[dropped]
            .read::<DespawnEntityEvent>()
            .collect::<Vec<_>>(),
        vec![(player, DestroyReason::RemovedFromSubscribing)]
    );
    assert!(session.client(dropped).entity(&player).is_none());
    assert!(session.client(kept).entity(&player).is_some());
    assert!(session.server.entity(&player).is_some());
    assert!(session.server.subscriptions(&dropped_id).is_empty());

    // coming back into interest spawns it again with current state
    session.server.set_field(&player, HEALTH, 60).unwrap();
    hide.set(false);
    session.server.mark_interest_dirty();
    session.tick();
    assert_eq!(health(&session, dropped, &player), 60);
}

#[test]
fn destroy_reaches_every_observer() {
    init_logging();
    let mut session = TestSession::new();
    let first = session.add_ready_client();
    let second = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    session.server.destroy(&player).unwrap();
    let mut events = session.tick();

    assert!(session.server.entity(&player).is_none());
    for index in [first, second] {
        assert!(session.client(index).entity(&player).is_none());
        assert_eq!(
            events.clients[index]
                .read::<DespawnEntityEvent>()
                .collect::<Vec<_>>(),
            vec![(player, DestroyReason::RequestedToDestroy)]
        );
        assert!(session.server.subscriptions(&session.client_id(index)).is_empty());
    }
    assert!(session.server.destroy(&player).is_err());
}

#[test]
fn rebuilding_interest_twice_sends_nothing_new() {
    init_logging();
    let mut session = TestSession::new();
    let client = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();
    session.network.take_sent();

    session.server.mark_interest_dirty();
    session.server.update_interest();
    session.server.update_interest();
    session.tick();

    let sent = session.network.take_sent();
    let connection = session.client_id(client);
    assert!(frames_to(&sent, connection, MessageType::SPAWN_DYNAMIC).is_empty());
    assert!(frames_to(&sent, connection, MessageType::DESTROY).is_empty());
    assert_eq!(session.server.subscriptions(&connection), vec![player]);
}

#[test]
fn explicit_interest_rebuild_replays_pending_list_edits_once() {
    init_logging();
    let mut session = TestSession::new();
    let client = session.add_ready_client();
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session
        .server
        .list_mut(&player, INVENTORY)
        .unwrap()
        .add(7)
        .unwrap();

    session.server.update_interest();
    session.tick();

    let inventory = session
        .client(client)
        .entity(&player)
        .unwrap()
        .list(INVENTORY)
        .unwrap()
        .as_slice()
        .to_vec();
    assert_eq!(inventory, vec![7]);
}

#[test]
fn new_owner_receives_owner_only_state_it_already_observes() {
    init_logging();
    let mut session = TestSession::new();
    let heir = session.add_ready_client();
    let observer = session.add_ready_client();
    let heir_id = session.client_id(heir);
    let player = session
        .server
        .spawn(PLAYER, Transform::default(), None)
        .unwrap();
    session.tick();

    session.server.set_field(&player, SECRET, 9).unwrap();
    session.server.list_mut(&player, STASH).unwrap().add(4).unwrap();
    session.ticks(2);
    session.network.take_sent();

    session.server.set_owner(&player, Some(heir_id)).unwrap();
    session.ticks(3);
    let sent = session.network.take_sent();

    let initial = frames_to(&sent, heir_id, MessageType::SYNC_FIELD_INITIAL);
    assert_eq!(initial.len(), 1);
    assert_reliable_field!(initial[0], player, 9u32);
    let observer_id = session.client_id(observer);
    assert!(frames_to(&sent, observer_id, MessageType::SYNC_FIELD_INITIAL).is_empty());
    assert!(frames_to(&sent, observer_id, MessageType::SYNC_LIST_OPERATION).is_empty());

    let secret = |session: &TestSession, index: usize| {
        *session
            .client(index)
            .entity(&player)
            .unwrap()
            .field(SECRET)
            .unwrap()
            .get()
    };
    let stash = |session: &TestSession, index: usize| {
        session
            .client(index)
            .entity(&player)
            .unwrap()
            .list(STASH)
            .unwrap()
            .as_slice()
            .to_vec()
    };
    assert_eq!(secret(&session, heir), 9);
    assert_eq!(stash(&session, heir), vec![4]);
    assert_eq!(secret(&session, observer), 0);
    assert!(stash(&session, observer).is_empty());

    // later changes reach the new owner, first one reliably
    session.server.set_field(&player, SECRET, 10).unwrap();
    session.server.list_mut(&player, STASH).unwrap().add(5).unwrap();
    session.advance(Duration::from_millis(100));
    session.tick();
    let sent = session.network.take_sent();
    let updates = frames_to(&sent, heir_id, MessageType::SYNC_FIELD_UPDATE);
    assert_eq!(updates.len(), 1);
    assert_reliable_field!(updates[0], player, 10u32);
    assert_eq!(secret(&session, heir), 10);
    assert_eq!(stash(&session, heir), vec![4, 5]);
    assert_eq!(secret(&session, observer), 0);
}
