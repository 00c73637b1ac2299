//! End-to-end tests: two headless clients against a real server.

use std::time::Duration;

use mathdrop::MathdropServer;
use mathdrop_client::{ClientError, ClientEvent, MultiplayerClient, Screen};
use mathdrop_countdown::CountdownConfig;
use mathdrop_session::SessionConfig;

// =========================================================================
// Helpers
// =========================================================================

async fn start_server() -> String {
    let config = SessionConfig {
        grace_delay: Duration::from_millis(50),
        countdown: CountdownConfig {
            from: 3,
            interval: Duration::from_millis(20),
        },
        ..SessionConfig::default()
    };
    let server = MathdropServer::builder()
        .bind("127.0.0.1:0")
        .session_config(config)
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr");

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    format!("ws://{addr}")
}

/// Pumps events until one matches, failing after two seconds.
async fn wait_for(
    client: &mut MultiplayerClient,
    mut pred: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
    let pump = async {
        loop {
            let events = client
                .next_events()
                .await
                .expect("next_events")
                .expect("connection closed");
            if let Some(event) = events.into_iter().find(|e| pred(e)) {
                return event;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), pump)
        .await
        .expect("timed out waiting for event")
}

fn roster_of(n: usize) -> impl FnMut(&ClientEvent) -> bool {
    move |e| matches!(e, ClientEvent::RosterUpdated(players) if players.len() == n)
}

/// Both players joined and both saw the full roster.
async fn two_players(url: &str) -> (MultiplayerClient, MultiplayerClient) {
    let mut alice = MultiplayerClient::connect(url, "Alice").await.expect("alice");
    wait_for(&mut alice, roster_of(1)).await;
    let mut bob = MultiplayerClient::connect(url, "Bob").await.expect("bob");
    wait_for(&mut bob, roster_of(2)).await;
    wait_for(&mut alice, roster_of(2)).await;
    (alice, bob)
}

async fn start_match(alice: &mut MultiplayerClient, bob: &mut MultiplayerClient) {
    alice.ready().await.expect("ready");
    bob.ready().await.expect("ready");
    wait_for(alice, |e| *e == ClientEvent::GameStarted).await;
    wait_for(bob, |e| *e == ClientEvent::GameStarted).await;
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_blank_name_is_rejected_before_dialing() {
    // Nothing listens here; validation must fail first.
    let result = MultiplayerClient::connect("ws://127.0.0.1:1", "  ").await;
    assert!(matches!(result, Err(ClientError::EmptyScreenName)));
}

#[tokio::test]
async fn test_join_reaches_waiting_room() {
    let url = start_server().await;
    let mut alice = MultiplayerClient::connect(&url, "Alice").await.expect("connect");

    wait_for(&mut alice, |e| matches!(e, ClientEvent::Welcomed(_))).await;
    let event = wait_for(&mut alice, roster_of(1)).await;

    let ClientEvent::RosterUpdated(players) = event else {
        unreachable!()
    };
    assert_eq!(players[0].screen_name, "Alice");
    assert_eq!(Some(&players[0].id), alice.handler().player_id());
    assert_eq!(alice.handler().screen(), Screen::WaitingRoom);
}

#[tokio::test]
async fn test_two_clients_count_down_and_start() {
    let url = start_server().await;
    let (mut alice, mut bob) = two_players(&url).await;

    start_match(&mut alice, &mut bob).await;

    assert!(alice.handler().is_multiplayer_mode());
    assert!(bob.handler().is_multiplayer_mode());
}

#[tokio::test]
async fn test_question_and_win_relay_between_clients() {
    let url = start_server().await;
    let (mut alice, mut bob) = two_players(&url).await;
    start_match(&mut alice, &mut bob).await;

    alice
        .send_question_to_opponent("3 + 4 = ?", "7")
        .await
        .expect("send question");
    let event = wait_for(&mut bob, |e| {
        matches!(e, ClientEvent::QuestionFromOpponent(_))
    })
    .await;
    let ClientEvent::QuestionFromOpponent(relay) = event else {
        unreachable!()
    };
    assert_eq!(relay.question, "3 + 4 = ?");
    assert_eq!(relay.answer, "7");
    assert_eq!(relay.from_player, "Alice");

    bob.send_game_won().await.expect("send won");
    let event = wait_for(&mut alice, |e| matches!(e, ClientEvent::OpponentWon(_))).await;
    assert_eq!(event, ClientEvent::OpponentWon("Bob".into()));
    assert_eq!(alice.handler().opponent_won(), Some("Bob"));
}

#[tokio::test]
async fn test_opponent_leaving_returns_to_lobby_and_allows_ready_again() {
    let url = start_server().await;
    let (mut alice, mut bob) = two_players(&url).await;
    start_match(&mut alice, &mut bob).await;

    bob.leave().await.expect("leave");

    wait_for(&mut alice, |e| *e == ClientEvent::ReturnedToLobby).await;
    assert_eq!(alice.handler().screen(), Screen::WaitingRoom);
    assert!(!alice.handler().is_ready());
    assert!(!alice.handler().is_multiplayer_mode());
}
