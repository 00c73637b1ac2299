//! Tests for the session actor with in-memory outboxes and a paused clock.
//!
//! No sockets here: each "connection" is just the receiving end of an
//! outbox, so the countdown cadence and the grace delay can be checked
//! against Tokio's virtual time.

use std::time::Duration;

use mathdrop::{Frame, SessionHandle, spawn_session};
use mathdrop_countdown::CountdownConfig;
use mathdrop_protocol::{
    ClientMessage, Codec, CountdownValue, JsonCodec, PlayerId, ServerMessage,
};
use mathdrop_session::{Phase, SessionConfig};
use mathdrop_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

struct Player {
    id: PlayerId,
    inbox: mpsc::UnboundedReceiver<Frame>,
}

impl Player {
    async fn next(&mut self) -> ServerMessage {
        let frame = self.inbox.recv().await.expect("outbox closed");
        JsonCodec.decode(&frame).expect("valid envelope")
    }

    fn try_next(&mut self) -> Option<ServerMessage> {
        self.inbox
            .try_recv()
            .ok()
            .map(|frame| JsonCodec.decode(&frame).expect("valid envelope"))
    }
}

fn spawn(config: SessionConfig) -> SessionHandle {
    spawn_session(config, JsonCodec, 16)
}

async fn connect(session: &SessionHandle, conn: u64) -> Player {
    let (tx, mut inbox) = mpsc::unbounded_channel();
    let id = session
        .connect(ConnectionId::new(conn), tx)
        .await
        .expect("connect");
    let welcome: ServerMessage =
        JsonCodec.decode(&inbox.recv().await.expect("welcome")).expect("decode");
    assert_eq!(
        welcome,
        ServerMessage::Welcome {
            player_id: id.clone()
        }
    );
    Player { id, inbox }
}

async fn joined(session: &SessionHandle, conn: u64, name: &str) -> Player {
    let mut player = connect(session, conn).await;
    session
        .send_message(
            player.id.clone(),
            ClientMessage::JoinGame {
                screen_name: name.into(),
            },
        )
        .await
        .expect("join");
    assert!(matches!(player.next().await, ServerMessage::GameStatus(_)));
    player
}

async fn ready(session: &SessionHandle, player: &Player) {
    session
        .send_message(player.id.clone(), ClientMessage::Ready)
        .await
        .expect("ready");
}

/// Drains everything queued for `player` after a round trip through the
/// actor, so earlier commands have been fully processed.
async fn drain(session: &SessionHandle, player: &mut Player) -> Vec<ServerMessage> {
    session.info().await.expect("info");
    std::iter::from_fn(|| player.try_next()).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_follow_interval() {
    let session = spawn(SessionConfig::default());
    let mut alice = joined(&session, 1, "Alice").await;
    let mut bob = joined(&session, 2, "Bob").await;
    drain(&session, &mut alice).await;

    ready(&session, &alice).await;
    ready(&session, &bob).await;
    let started = Instant::now();

    let before = drain(&session, &mut alice).await;
    assert!(before.contains(&ServerMessage::Countdown {
        value: CountdownValue::Number(3)
    }));

    for (secs, expected) in [
        (1, CountdownValue::Number(2)),
        (2, CountdownValue::Number(1)),
        (3, CountdownValue::Go),
    ] {
        assert_eq!(alice.next().await, ServerMessage::Countdown { value: expected });
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs)
                && elapsed < Duration::from_secs(secs) + Duration::from_millis(5),
            "tick {expected} at {elapsed:?}"
        );
    }
    assert_eq!(alice.next().await, ServerMessage::GameStart);

    let info = session.info().await.expect("info");
    assert_eq!(info.phase, Phase::Active);
    assert!(!info.countdown_running);

    let bob_msgs = drain(&session, &mut bob).await;
    assert!(bob_msgs.contains(&ServerMessage::GameStart));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_countdown_never_ticks_again() {
    let session = spawn(SessionConfig {
        grace_delay: Duration::from_secs(60),
        ..SessionConfig::default()
    });
    let mut alice = joined(&session, 1, "Alice").await;
    let bob = joined(&session, 2, "Bob").await;
    ready(&session, &alice).await;
    ready(&session, &bob).await;
    drain(&session, &mut alice).await;

    session.disconnect(bob.id.clone()).await.expect("disconnect");
    let after_abort = drain(&session, &mut alice).await;
    assert!(matches!(
        after_abort.as_slice(),
        [ServerMessage::GameStatus(status)] if !status.countdown_active
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain(&session, &mut alice).await.is_empty());
    assert_eq!(session.info().await.expect("info").phase, Phase::Lobby);
}

#[tokio::test(start_paused = true)]
async fn test_purge_fires_after_grace_delay() {
    let session = spawn(SessionConfig {
        grace_delay: Duration::from_millis(1000),
        ..SessionConfig::default()
    });
    let mut alice = joined(&session, 1, "Alice").await;
    let bob = joined(&session, 2, "Bob").await;
    drain(&session, &mut alice).await;

    session.disconnect(bob.id.clone()).await.expect("disconnect");
    let disconnected_at = Instant::now();
    assert_eq!(session.info().await.expect("info").connections, 2);

    let ServerMessage::GameStatus(status) = alice.next().await else {
        panic!("expected gameStatus after purge");
    };
    assert!(disconnected_at.elapsed() >= Duration::from_millis(1000));
    assert_eq!(status.players.len(), 1);
    assert_eq!(status.players[0].screen_name, "Alice");
    assert_eq!(session.info().await.expect("info").connections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_outbox_does_not_stop_broadcast() {
    let session = spawn(SessionConfig::default());
    let mut alice = joined(&session, 1, "Alice").await;
    let bob = joined(&session, 2, "Bob").await;
    let mut carol = joined(&session, 3, "Carol").await;
    drain(&session, &mut alice).await;
    drain(&session, &mut carol).await;

    // Bob's writer is gone but his transport close hasn't been seen yet.
    drop(bob.inbox);

    ready(&session, &alice).await;

    assert_eq!(drain(&session, &mut alice).await.len(), 1);
    assert_eq!(drain(&session, &mut carol).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connecting_same_connection_twice_fails() {
    let session = spawn(SessionConfig::default());
    connect(&session, 7).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = session.connect(ConnectionId::new(7), tx).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let session = spawn(SessionConfig::default());
    session.shutdown().await.expect("shutdown");

    // Give the actor a chance to exit and drop its receiver.
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(session.info().await.is_err());
}
