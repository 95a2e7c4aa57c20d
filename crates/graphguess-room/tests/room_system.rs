//! Integration tests for the room system: registry, actors, gateway and
//! timers working together.
//!
//! Fire-and-forget commands are followed by a snapshot request to the same
//! room; the actor handles its mailbox in order, so the snapshot doubles as
//! a barrier.

use std::sync::Arc;
use std::time::Duration;

use graphguess_protocol::{
    ClientEvent, ConnectionId, GameOptions, JoinUser, RoomId, RoundEndReason, ServerEvent,
};
use graphguess_room::{
    Gateway, RegistryConfig, RoomError, RoomRegistry, RoomState, RoundConfig, WordSource,
};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

struct FixedWord;

impl WordSource for FixedWord {
    fn next_word(&self) -> String {
        "elma".to_string()
    }
}

struct Client {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Client {
    /// Everything received so far, minus room-list broadcasts.
    fn game_events(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if !matches!(event, ServerEvent::RoomList(_)) {
                events.push(event);
            }
        }
        events
    }

    fn room_lists(&mut self) -> Vec<Vec<String>> {
        let mut lists = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if let ServerEvent::RoomList(rooms) = event {
                lists.push(rooms.into_iter().map(|r| r.name.to_string()).collect());
            }
        }
        lists
    }
}

fn registry_with(round: RoundConfig) -> RoomRegistry {
    let config = RegistryConfig {
        round,
        ..RegistryConfig::default()
    };
    RoomRegistry::new(Gateway::new(), config, Arc::new(FixedWord))
}

fn registry() -> RoomRegistry {
    registry_with(RoundConfig::default())
}

fn connect(registry: &RoomRegistry, id: u64) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = ConnectionId::new(id);
    registry.gateway().register(id, tx);
    Client { id, rx }
}

fn room(name: &str) -> RoomId {
    RoomId::from(name)
}

async fn create_and_join(registry: &RoomRegistry, name: &str, clients: &[&Client]) {
    registry
        .create(clients[0].id, &room(name), false, None)
        .await
        .unwrap();
    for client in clients {
        registry
            .join(client.id, &room(name), format!("p{}", client.id.into_inner()))
            .await
            .unwrap();
    }
}

// =========================================================================
// Creation and joining
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_two_players_start_a_round() {
    let registry = registry();
    let mut a = connect(&registry, 1);
    let mut b = connect(&registry, 2);
    create_and_join(&registry, "r1", &[&a, &b]).await;

    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Round);
    let painter = snapshot.painter.unwrap();
    assert!(painter == a.id || painter == b.id);

    let a_events = a.game_events();
    let b_events = b.game_events();
    assert!(a_events.iter().any(|e| matches!(e, ServerEvent::NewGame { .. })));
    assert!(b_events.iter().any(|e| matches!(e, ServerEvent::NewGame { .. })));

    let word_count = |events: &[ServerEvent]| {
        events
            .iter()
            .filter(|e| matches!(e, ServerEvent::WordForPainter(_)))
            .count()
    };
    let (painter_events, viewer_events) = if painter == a.id {
        (&a_events, &b_events)
    } else {
        (&b_events, &a_events)
    };
    assert_eq!(word_count(painter_events.as_slice()), 1);
    assert_eq!(word_count(viewer_events.as_slice()), 0);
}

#[tokio::test]
async fn test_join_unknown_room_is_not_found() {
    let registry = registry();
    let a = connect(&registry, 1);
    let err = registry
        .join(a.id, &room("nowhere"), "A".into())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NotFound(room("nowhere")));
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_join_full_room_is_rejected() {
    let registry = registry();
    let a = connect(&registry, 1);
    let b = connect(&registry, 2);
    let c = connect(&registry, 3);

    registry.create(a.id, &room("r1"), false, Some(2)).await.unwrap();
    registry.join(a.id, &room("r1"), "A".into()).await.unwrap();
    registry.join(b.id, &room("r1"), "B".into()).await.unwrap();

    let err = registry.join(c.id, &room("r1"), "C".into()).await.unwrap_err();
    assert_eq!(err, RoomError::RoomFull(room("r1")));
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.players.len(), 2);
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let registry = registry();
    let a = connect(&registry, 1);
    let b = connect(&registry, 2);

    registry.create(a.id, &room("r1"), false, Some(2)).await.unwrap();
    // A second create does not change the capacity.
    registry.create(b.id, &room("r1"), true, Some(10)).await.unwrap();
    assert_eq!(registry.room_count(), 1);

    let summaries = registry.list_public_summaries().await;
    assert_eq!(summaries.len(), 1);
}

#[tokio::test]
async fn test_actions_on_unknown_room_are_not_found() {
    let registry = registry();
    let a = connect(&registry, 1);
    let events = [
        ClientEvent::Guess {
            room: room("ghost"),
            guess: "elma".into(),
        },
        ClientEvent::ClearCanvas { room: room("ghost") },
        ClientEvent::AddGraph {
            room: room("ghost"),
            graph: serde_json::json!({ "expr": "x" }),
        },
        ClientEvent::GameStart {
            room: room("ghost"),
            options: GameOptions::default(),
        },
    ];
    for event in events {
        let err = registry.route(a.id, event).await.unwrap_err();
        assert_eq!(err.code(), "room-not-found");
    }
}

// =========================================================================
// Room list
// =========================================================================

#[tokio::test]
async fn test_private_rooms_are_never_listed() {
    let registry = registry();
    let a = connect(&registry, 1);

    registry.create(a.id, &room("secret"), true, None).await.unwrap();
    registry.create(a.id, &room("open"), false, None).await.unwrap();

    let names: Vec<String> = registry
        .list_public_summaries()
        .await
        .into_iter()
        .map(|s| s.name.to_string())
        .collect();
    assert_eq!(names, ["open"]);
}

#[tokio::test]
async fn test_room_list_reaches_every_connection() {
    let registry = registry();
    let a = connect(&registry, 1);
    let mut bystander = connect(&registry, 2);

    registry.create(a.id, &room("r1"), false, None).await.unwrap();
    let lists = bystander.room_lists();
    assert_eq!(lists.last(), Some(&vec!["r1".to_string()]));
}

#[tokio::test]
async fn test_get_rooms_broadcasts_fresh_summaries() {
    let registry = registry();
    let mut a = connect(&registry, 1);
    let b = connect(&registry, 2);

    registry.create(a.id, &room("r1"), false, None).await.unwrap();
    registry.join(b.id, &room("r1"), "B".into()).await.unwrap();
    a.room_lists();

    registry.route(a.id, ClientEvent::GetRooms).await.unwrap();
    let mut found = None;
    while let Ok(event) = a.rx.try_recv() {
        if let ServerEvent::RoomList(rooms) = event {
            found = rooms.into_iter().next();
        }
    }
    let summary = found.expect("roomList received");
    assert_eq!(summary.user_count, 1);
    assert!(summary.is_waiting);
    assert!(!summary.in_game);
}

// =========================================================================
// Rounds
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_viewer_guess_scores_and_ends_round() {
    let registry = registry();
    let mut a = connect(&registry, 1);
    let mut b = connect(&registry, 2);
    create_and_join(&registry, "r1", &[&a, &b]).await;

    let painter = registry.snapshot(&room("r1")).await.unwrap().painter.unwrap();
    let viewer = if painter == a.id { &mut b } else { &mut a };
    let viewer_id = viewer.id;
    viewer.game_events();

    // The painter guessing their own word is ignored.
    registry
        .route(
            painter,
            ClientEvent::Guess {
                room: room("r1"),
                guess: "elma".into(),
            },
        )
        .await
        .unwrap();
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Round);

    registry
        .route(
            viewer_id,
            ClientEvent::Guess {
                room: room("r1"),
                guess: "Elma".into(),
            },
        )
        .await
        .unwrap();
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Intermission);
    assert_eq!(snapshot.scores[&viewer_id], 10);
    assert_eq!(snapshot.scores[&painter], 0);

    let events = viewer.game_events();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::GuessResult(result) if result.correct
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::RoundEnd { reason: RoundEndReason::Guessed, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_hands_brush_to_other_player() {
    let registry = registry();
    let a = connect(&registry, 1);
    let mut b = connect(&registry, 2);
    create_and_join(&registry, "r1", &[&a, &b]).await;
    let first = registry.snapshot(&room("r1")).await.unwrap().painter.unwrap();
    b.game_events();

    tokio::time::sleep(Duration::from_secs(181)).await;
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Intermission);
    assert!(b.game_events().iter().any(|e| matches!(
        e,
        ServerEvent::RoundEnd { reason: RoundEndReason::Timeout, .. }
    )));

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Round);
    assert_ne!(snapshot.painter, Some(first));
}

#[tokio::test(start_paused = true)]
async fn test_painter_disconnect_ends_round_before_next_one() {
    let registry = registry();
    let a = connect(&registry, 1);
    let b = connect(&registry, 2);
    let c = connect(&registry, 3);
    create_and_join(&registry, "r1", &[&a, &b, &c]).await;

    let painter = registry.snapshot(&room("r1")).await.unwrap().painter.unwrap();
    let mut viewers: Vec<Client> = [a, b, c].into_iter().filter(|x| x.id != painter).collect();
    let watcher = &mut viewers[0];
    watcher.game_events();

    registry.disconnect(painter).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Round);
    assert_eq!(snapshot.players.len(), 2);
    assert_ne!(snapshot.painter, Some(painter));

    let events = watcher.game_events();
    let round_end = events
        .iter()
        .position(|e| matches!(e, ServerEvent::RoundEnd { reason: RoundEndReason::Timeout, .. }))
        .expect("round:end after painter left");
    let new_game = events
        .iter()
        .position(|e| matches!(e, ServerEvent::NewGame { .. }))
        .expect("next round started");
    assert!(round_end < new_game);
}

// =========================================================================
// Departures and deletion
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_both_players_leaving_mid_round_deletes_room() {
    let registry = registry();
    let a = connect(&registry, 1);
    let mut b = connect(&registry, 2);
    create_and_join(&registry, "r1", &[&a, &b]).await;
    b.game_events();

    registry.disconnect(a.id).await;
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.state, RoomState::GameOver);
    assert_eq!(snapshot.players.len(), snapshot.scores.len());
    assert!(b
        .game_events()
        .iter()
        .any(|e| matches!(e, ServerEvent::GameOver { .. })));

    registry.disconnect(b.id).await;
    assert_eq!(registry.room_count(), 0);
    assert!(matches!(
        registry.find(&room("r1")),
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_creator_leaving_unjoined_room_deletes_it() {
    let registry = registry();
    let a = connect(&registry, 1);
    registry.create(a.id, &room("r1"), false, None).await.unwrap();
    assert_eq!(registry.room_count(), 1);

    registry.disconnect(a.id).await;
    assert_eq!(registry.room_count(), 0);
    assert!(!registry.gateway().is_connected(a.id));
}

#[tokio::test]
async fn test_room_can_be_recreated_after_deletion() {
    let registry = registry();
    let a = connect(&registry, 1);
    let b = connect(&registry, 2);

    registry.create(a.id, &room("r1"), false, None).await.unwrap();
    registry.disconnect(a.id).await;

    registry.create(b.id, &room("r1"), false, None).await.unwrap();
    registry.join(b.id, &room("r1"), "B".into()).await.unwrap();
    let snapshot = registry.snapshot(&room("r1")).await.unwrap();
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.state, RoomState::Lobby);
}

#[tokio::test]
async fn test_remove_shuts_room_down() {
    let registry = registry();
    let a = connect(&registry, 1);
    registry.create(a.id, &room("r1"), false, None).await.unwrap();

    registry.remove(&room("r1")).await.unwrap();
    assert_eq!(registry.room_count(), 0);
    assert!(registry.remove(&room("r1")).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_rooms_run_independently() {
    let registry = registry();
    let a = connect(&registry, 1);
    let b = connect(&registry, 2);
    let c = connect(&registry, 3);
    create_and_join(&registry, "r1", &[&a, &b]).await;
    registry.create(c.id, &room("r2"), false, None).await.unwrap();
    registry
        .route(
            c.id,
            ClientEvent::Join {
                room: room("r2"),
                user: JoinUser { name: "C".into() },
            },
        )
        .await
        .unwrap();

    let r1 = registry.snapshot(&room("r1")).await.unwrap();
    let r2 = registry.snapshot(&room("r2")).await.unwrap();
    assert_eq!(r1.state, RoomState::Round);
    assert_eq!(r2.state, RoomState::Lobby);
    assert_eq!(r2.players.len(), 1);
}
