//! Integration tests for the networked host and player
//!
//! These tests exercise the wire format and a real host/player session over
//! loopback TCP.

use host::HostServer;
use player::PlayerClient;
use shared::codec;
use shared::command::LocalCommand;
use shared::join::JoinLink;
use shared::{Color, Message, MoveDescriptor, Peer, PeerEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Field names on the wire are camelCase and `type` carries the kind
    #[test]
    fn wire_field_names() {
        let frame = codec::encode(&Message::PlayerSelected {
            player_index: 2,
            player_id: "abc".to_string(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "playerSelected");
        assert_eq!(value["playerIndex"], 2);
        assert_eq!(value["playerId"], "abc");

        let frame = codec::encode(&Message::DiceRolled {
            roll: 6,
            selectable_tokens: [1, 3].into_iter().collect(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["selectableTokens"], serde_json::json!([1, 3]));
    }

    /// A hand-written frame from another implementation decodes
    #[test]
    fn foreign_frames_decode() {
        let frame = r#"{"type":"turnChanged","turn":"blue"}"#;
        assert_eq!(
            codec::decode(frame).unwrap(),
            Message::TurnChanged { turn: Color::Blue }
        );

        let frame = r#"{"type":"requestGameState"}"#;
        assert_eq!(
            codec::decode(frame).unwrap(),
            Message::RequestGameState { player_id: None }
        );
    }

    /// The move descriptor is optional on `tokenMoved`
    #[test]
    fn token_moved_descriptor_optional() {
        let state = shared::GameState::new();
        let bare = codec::encode(&Message::TokenMoved {
            state: state.clone(),
            applied: None,
        })
        .unwrap();
        assert!(!bare.contains("\"move\""));

        let described = codec::encode(&Message::TokenMoved {
            state,
            applied: Some(MoveDescriptor {
                color: Color::Green,
                token_id: 3,
            }),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&described).unwrap();
        assert_eq!(value["move"]["color"], "green");
        assert_eq!(value["move"]["tokenId"], 3);
    }

    /// Unknown kinds and broken frames are reported, not panicked on
    #[test]
    fn malformed_frame_handling() {
        assert!(matches!(
            codec::decode(r#"{"type":"chat","text":"hi"}"#),
            Err(shared::CodecError::UnknownType(kind)) if kind == "chat"
        ));
        assert!(matches!(
            codec::decode(r#"{"roll":3}"#),
            Err(shared::CodecError::MissingType)
        ));
        assert!(codec::decode("{\"type\":\"diceRolled\"").is_err());
        assert!(codec::decode(r#"{"type":"diceRolled","roll":"six"}"#).is_err());
    }

    /// Join links survive a trip through text
    #[test]
    fn join_link_text() {
        let link = JoinLink::for_endpoint("192.168.1.20:7878");
        let parsed = JoinLink::parse(&link.to_string()).unwrap();
        assert_eq!(parsed, link);
        assert_eq!(JoinLink::parse("192.168.1.20:7878").unwrap(), link);
    }
}

/// HOST-PLAYER NETWORK TESTS
mod network_tests {
    use super::*;

    const STEP: Duration = Duration::from_secs(5);

    async fn next_event(events: &mut mpsc::UnboundedReceiver<PeerEvent>) -> PeerEvent {
        timeout(STEP, events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream closed")
    }

    async fn wait_for(
        events: &mut mpsc::UnboundedReceiver<PeerEvent>,
        wanted: impl Fn(&PeerEvent) -> bool,
    ) -> PeerEvent {
        loop {
            let event = next_event(events).await;
            if wanted(&event) {
                return event;
            }
        }
    }

    /// A remote red player takes a full turn, then the host rolls for yellow
    #[tokio::test]
    async fn first_turn_over_tcp() {
        let mut server = HostServer::bind("127.0.0.1:0", Peer::host("host").with_seed(11), 4)
            .await
            .unwrap();
        server.peer_mut().add_slot(Some("Red Player")).unwrap();
        server.peer_mut().add_slot(Some("Yellow Player")).unwrap();
        server.peer_mut().recolor_slot(1, Color::Yellow).unwrap();
        let link = server.join_link();
        let mut host_events = server.subscribe();

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let host_task = tokio::spawn(async move { server.run(host_rx).await });

        let mut client = PlayerClient::connect(&link, Peer::player("red-endpoint").with_seed(7))
            .await
            .unwrap()
            .with_preferred_slot("Red Player");
        let mut player_events = client.subscribe();
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let player_task = tokio::spawn(async move { client.run(player_rx).await });

        wait_for(&mut player_events, |e| matches!(e, PeerEvent::SlotChosen { index: 0 })).await;
        wait_for(&mut host_events, |e| *e == PeerEvent::LobbyChanged).await;
        host_tx.send(LocalCommand::Start).unwrap();

        let started = wait_for(&mut player_events, |e| {
            matches!(e, PeerEvent::GameStarted { .. })
        })
        .await;
        assert_eq!(
            started,
            PeerEvent::GameStarted {
                my_color: Some(Color::Red)
            }
        );

        // Roll until red's turn ends, moving the first token offered.
        loop {
            match next_event(&mut player_events).await {
                PeerEvent::YourTurn | PeerEvent::RollAgain => {
                    player_tx.send(LocalCommand::Roll).unwrap();
                }
                PeerEvent::ChooseToken { tokens } => {
                    let token = *tokens.iter().next().unwrap();
                    player_tx.send(LocalCommand::Move(token)).unwrap();
                }
                PeerEvent::TurnChanged { turn } => {
                    assert_eq!(turn, Color::Yellow);
                    break;
                }
                _ => {}
            }
        }

        wait_for(&mut host_events, |e| *e == PeerEvent::YourTurn).await;
        host_tx.send(LocalCommand::Roll).unwrap();
        let rolled = wait_for(&mut host_events, |e| matches!(e, PeerEvent::DiceRolled { .. })).await;
        match rolled {
            PeerEvent::DiceRolled { color, roll, .. } => {
                assert_eq!(color, Color::Yellow);
                assert!((1..=6).contains(&roll));
            }
            other => panic!("expected a roll, got {:?}", other),
        }

        // The player sees the host's roll too.
        let seen = wait_for(&mut player_events, |e| {
            matches!(e, PeerEvent::DiceRolled { color: Color::Yellow, .. })
        })
        .await;
        assert_eq!(seen, rolled);

        player_tx.send(LocalCommand::Quit).unwrap();
        timeout(STEP, player_task).await.unwrap().unwrap().unwrap();
        host_tx.send(LocalCommand::Quit).unwrap();
        timeout(STEP, host_task).await.unwrap().unwrap().unwrap();
    }

    /// A spectator that joins after the start is told so and follows along
    #[tokio::test]
    async fn late_joiner_over_tcp() {
        let mut server = HostServer::bind("127.0.0.1:0", Peer::host("host"), 4)
            .await
            .unwrap();
        server.peer_mut().add_slot(Some("A")).unwrap();
        server.peer_mut().add_slot(Some("B")).unwrap();
        server.peer_mut().select_slot(0).unwrap();
        let link = server.join_link();

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let host_task = tokio::spawn(async move { server.run(host_rx).await });

        let mut first = PlayerClient::connect(&link, Peer::player("first"))
            .await
            .unwrap()
            .with_preferred_slot("B");
        let mut first_events = first.subscribe();
        let (first_tx, first_rx) = mpsc::unbounded_channel();
        let first_task = tokio::spawn(async move { first.run(first_rx).await });

        wait_for(&mut first_events, |e| matches!(e, PeerEvent::SlotChosen { index: 1 })).await;
        host_tx.send(LocalCommand::Start).unwrap();
        wait_for(&mut first_events, |e| matches!(e, PeerEvent::GameStarted { .. })).await;

        let mut late = PlayerClient::connect(&link, Peer::player("late")).await.unwrap();
        let mut late_events = late.subscribe();
        let (late_tx, late_rx) = mpsc::unbounded_channel();
        let late_task = tokio::spawn(async move { late.run(late_rx).await });

        wait_for(&mut late_events, |e| *e == PeerEvent::AlreadyStarted).await;

        late_tx.send(LocalCommand::Quit).unwrap();
        first_tx.send(LocalCommand::Quit).unwrap();
        timeout(STEP, late_task).await.unwrap().unwrap().unwrap();
        timeout(STEP, first_task).await.unwrap().unwrap().unwrap();
        host_tx.send(LocalCommand::Quit).unwrap();
        timeout(STEP, host_task).await.unwrap().unwrap().unwrap();
    }
}
