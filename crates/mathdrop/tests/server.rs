//! Integration tests for the Mathdrop server, handler, and full connection flow.
//!
//! Every test binds its own server to `127.0.0.1:0` and talks to it with
//! plain `tokio-tungstenite` clients sending the same JSON the browser does.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mathdrop::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn fast_config() -> SessionConfig {
    SessionConfig {
        grace_delay: Duration::from_millis(50),
        countdown: CountdownConfig {
            from: 3,
            interval: Duration::from_millis(20),
        },
        ..SessionConfig::default()
    }
}

/// Starts a server on a random port and returns its address and a
/// session handle for inspection.
async fn start_server(config: SessionConfig) -> (String, SessionHandle) {
    let server = MathdropServer::builder()
        .bind("127.0.0.1:0")
        .session_config(config)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let session = server.session();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, session)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Receives the next JSON envelope, skipping control frames.
async fn recv_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("recv error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("server sent invalid JSON");
        }
    }
}

/// Receives envelopes until one with `kind` arrives and returns it.
async fn recv_type(ws: &mut ClientWs, kind: &str) -> Value {
    loop {
        let msg = recv_json(ws).await;
        if msg["type"] == kind {
            return msg;
        }
    }
}

/// Asserts nothing arrives within `window`.
async fn assert_silent(ws: &mut ClientWs, window: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(window, ws.next()).await {
        panic!("expected silence, got {text}");
    }
}

/// Connects, reads `welcome`, and returns the socket and player token.
async fn connect_player(addr: &str) -> (ClientWs, String) {
    let mut ws = connect(addr).await;
    let welcome = recv_json(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");
    let id = welcome["playerId"].as_str().expect("playerId").to_string();
    (ws, id)
}

async fn join(ws: &mut ClientWs, name: &str) {
    send_json(ws, json!({"type": "joinGame", "screenName": name})).await;
}

async fn ready(ws: &mut ClientWs) {
    send_json(ws, json!({"type": "ready"})).await;
}

/// Two joined players, each having seen the two-player roster.
async fn lobby_of_two(addr: &str) -> ((ClientWs, String), (ClientWs, String)) {
    let (mut alice, alice_id) = connect_player(addr).await;
    join(&mut alice, "Alice").await;
    recv_type(&mut alice, "gameStatus").await;

    let (mut bob, bob_id) = connect_player(addr).await;
    join(&mut bob, "Bob").await;
    let status = recv_type(&mut bob, "gameStatus").await;
    assert_eq!(status["players"].as_array().map(Vec::len), Some(2));
    recv_type(&mut alice, "gameStatus").await;

    ((alice, alice_id), (bob, bob_id))
}

fn roster_names(status: &Value) -> Vec<String> {
    status["players"]
        .as_array()
        .expect("players array")
        .iter()
        .map(|p| p["screenName"].as_str().unwrap_or_default().to_string())
        .collect()
}

// =========================================================================
// Connect / join
// =========================================================================

#[tokio::test]
async fn test_welcome_carries_fresh_token() {
    let (addr, _) = start_server(fast_config()).await;

    let (_a, first) = connect_player(&addr).await;
    let (_b, second) = connect_player(&addr).await;

    assert_eq!(first.len(), 9);
    assert!(first.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_join_broadcasts_roster_to_joined_players() {
    let (addr, _) = start_server(fast_config()).await;

    let (mut alice, alice_id) = connect_player(&addr).await;
    join(&mut alice, "Alice").await;
    let status = recv_json(&mut alice).await;
    assert_eq!(status["type"], "gameStatus");
    assert_eq!(status["players"][0]["id"], alice_id.as_str());
    assert_eq!(status["players"][0]["ready"], false);
    assert_eq!(status["gameStarted"], false);
    assert_eq!(status["countdownActive"], false);

    let (mut bob, _) = connect_player(&addr).await;
    join(&mut bob, "  Bob  ").await;

    let for_alice = recv_json(&mut alice).await;
    let for_bob = recv_json(&mut bob).await;
    assert_eq!(for_alice, for_bob);
    assert_eq!(roster_names(&for_alice), vec!["Alice", "Bob"]);
}

#[tokio::test]
async fn test_unjoined_connection_gets_no_broadcasts() {
    let (addr, _) = start_server(fast_config()).await;

    let (mut lurker, _) = connect_player(&addr).await;
    let (mut alice, _) = connect_player(&addr).await;
    join(&mut alice, "Alice").await;
    recv_type(&mut alice, "gameStatus").await;

    assert_silent(&mut lurker, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let (addr, session) = start_server(fast_config()).await;
    let (mut alice, _) = connect_player(&addr).await;

    alice
        .send(Message::Text("not json at all".into()))
        .await
        .expect("send");
    send_json(&mut alice, json!({"type": "teleport", "x": 1})).await;
    send_json(&mut alice, json!({"type": "joinGame"})).await;

    join(&mut alice, "Alice").await;
    let status = recv_json(&mut alice).await;
    assert_eq!(roster_names(&status), vec!["Alice"]);

    let info = session.info().await.expect("info");
    assert_eq!(info.connections, 1);
}

// =========================================================================
// Ready and countdown
// =========================================================================

#[tokio::test]
async fn test_single_ready_player_does_not_start_countdown() {
    let (addr, session) = start_server(fast_config()).await;
    let (mut alice, _) = connect_player(&addr).await;
    join(&mut alice, "Alice").await;
    recv_type(&mut alice, "gameStatus").await;

    ready(&mut alice).await;
    let status = recv_json(&mut alice).await;
    assert_eq!(status["players"][0]["ready"], true);
    assert_eq!(status["countdownActive"], false);

    assert_silent(&mut alice, Duration::from_millis(100)).await;
    assert_eq!(session.info().await.expect("info").phase, Phase::Lobby);
}

#[tokio::test]
async fn test_both_ready_runs_countdown_then_starts_game() {
    let (addr, session) = start_server(fast_config()).await;
    let ((mut alice, _), (mut bob, _)) = lobby_of_two(&addr).await;

    ready(&mut alice).await;
    recv_type(&mut alice, "gameStatus").await;
    recv_type(&mut bob, "gameStatus").await;
    ready(&mut bob).await;

    for ws in [&mut alice, &mut bob] {
        let status = recv_json(ws).await;
        assert_eq!(status["type"], "gameStatus");
        assert_eq!(status["countdownActive"], true);
        assert_eq!(status["countdownValue"], 3);

        let mut values = Vec::new();
        loop {
            let msg = recv_json(ws).await;
            match msg["type"].as_str() {
                Some("countdown") => values.push(msg["value"].clone()),
                Some("gameStart") => break,
                other => panic!("unexpected {other:?} during countdown"),
            }
        }
        assert_eq!(values, vec![json!(3), json!(2), json!(1), json!("Go!")]);

        let status = recv_json(ws).await;
        assert_eq!(status["gameStarted"], true);
        assert_eq!(status["countdownActive"], false);
    }

    assert_eq!(session.info().await.expect("info").phase, Phase::Active);
}

// =========================================================================
// Relay
// =========================================================================

#[tokio::test]
async fn test_add_question_reaches_opponent_but_not_sender() {
    let (addr, _) = start_server(fast_config()).await;
    let ((mut alice, _), (mut bob, _)) = lobby_of_two(&addr).await;

    let relay = json!({
        "type": "addQuestion",
        "question": "6 x 7",
        "answer": "42",
        "fromPlayer": "Alice",
    });
    send_json(&mut alice, relay.clone()).await;

    assert_eq!(recv_json(&mut bob).await, relay);
    assert_silent(&mut alice, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_game_won_reaches_opponent() {
    let (addr, _) = start_server(fast_config()).await;
    let ((mut alice, _), (mut bob, _)) = lobby_of_two(&addr).await;

    send_json(&mut bob, json!({"type": "gameWon", "winner": "Bob"})).await;

    let msg = recv_json(&mut alice).await;
    assert_eq!(msg, json!({"type": "gameWon", "winner": "Bob"}));
}

#[tokio::test]
async fn test_relay_before_join_is_dropped() {
    let (addr, _) = start_server(fast_config()).await;
    let (mut lurker, _) = connect_player(&addr).await;
    let (mut alice, _) = connect_player(&addr).await;
    join(&mut alice, "Alice").await;
    recv_type(&mut alice, "gameStatus").await;

    send_json(&mut lurker, json!({"type": "gameWon", "winner": "me"})).await;

    assert_silent(&mut alice, Duration::from_millis(100)).await;
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_disconnect_during_countdown_returns_to_lobby() {
    let config = SessionConfig {
        countdown: CountdownConfig {
            from: 3,
            interval: Duration::from_millis(150),
        },
        grace_delay: Duration::from_secs(5),
        ..SessionConfig::default()
    };
    let (addr, session) = start_server(config).await;
    let ((mut alice, _), (mut bob, _)) = lobby_of_two(&addr).await;

    ready(&mut alice).await;
    ready(&mut bob).await;
    let first = recv_type(&mut alice, "countdown").await;
    assert_eq!(first["value"], 3);

    bob.close(None).await.expect("close");
    drop(bob);

    // The abort shows up as a lobby status with Bob flagged offline.
    let status = loop {
        let msg = recv_json(&mut alice).await;
        if msg["type"] == "gameStatus" && msg["countdownActive"] == false {
            break msg;
        }
    };
    assert_eq!(status["gameStarted"], false);
    assert_eq!(status["players"][1]["connected"], false);
    assert_eq!(status["players"][0]["ready"], false);

    // No tick from the aborted sequence may follow.
    assert_silent(&mut alice, Duration::from_millis(500)).await;

    let info = session.info().await.expect("info");
    assert_eq!(info.phase, Phase::Lobby);
    assert!(!info.countdown_running);
}

#[tokio::test]
async fn test_disconnected_player_is_purged_after_grace() {
    let (addr, session) = start_server(fast_config()).await;
    let ((mut alice, _), (bob, bob_id)) = lobby_of_two(&addr).await;

    drop(bob);

    let status = recv_type(&mut alice, "gameStatus").await;
    assert_eq!(roster_names(&status), vec!["Alice"]);
    assert!(
        status["players"]
            .as_array()
            .expect("players")
            .iter()
            .all(|p| p["id"] != bob_id.as_str())
    );

    let info = session.info().await.expect("info");
    assert_eq!(info.connections, 1);
}

#[tokio::test]
async fn test_disconnect_during_match_resets_to_lobby() {
    let (addr, session) = start_server(fast_config()).await;
    let ((mut alice, _), (mut bob, _)) = lobby_of_two(&addr).await;

    ready(&mut alice).await;
    ready(&mut bob).await;
    recv_type(&mut alice, "gameStart").await;
    recv_type(&mut alice, "gameStatus").await;

    drop(bob);

    let status = recv_type(&mut alice, "gameStatus").await;
    assert_eq!(status["gameStarted"], false);
    assert_eq!(session.info().await.expect("info").phase, Phase::Lobby);
}
