//! Session actor: the one Tokio task that owns all match state.
//!
//! Connection tasks never touch the registry or the phase directly. They
//! send a [`SessionCommand`] through a [`SessionHandle`] and the actor
//! processes commands one at a time, so every handler runs to completion
//! before the next one starts. The countdown and the purge-after-grace
//! timers are branches of the same `select!` loop, which makes cancelling
//! the countdown a plain state change with no tick left in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use mathdrop_countdown::Countdown;
use mathdrop_protocol::{ClientMessage, Codec, GameStatus, PlayerId, Recipient, ServerMessage};
use mathdrop_session::{Effect, Event, Phase, RegistryError, Session, SessionConfig};
use mathdrop_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::MathdropError;

/// One encoded envelope, shared by every recipient of a broadcast.
pub type Frame = Arc<[u8]>;

/// The outbound half of a player's connection, stored in the registry.
///
/// A writer task drains the receiving end into the socket.
pub type Outbox = mpsc::UnboundedSender<Frame>;

/// Commands sent to the session actor through its channel.
///
/// The `oneshot::Sender` in some variants is a "reply channel": the
/// caller sends a command and waits for the response on that channel.
pub(crate) enum SessionCommand {
    /// Register a freshly opened connection.
    Connect {
        connection_id: ConnectionId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<PlayerId, RegistryError>>,
    },

    /// Deliver a decoded envelope from a player.
    Message {
        from: PlayerId,
        message: ClientMessage,
    },

    /// The player's transport closed.
    Disconnected { player_id: PlayerId },

    /// Request a snapshot of the session.
    Info { reply: oneshot::Sender<SessionInfo> },

    /// Stop the actor.
    Shutdown,
}

/// A snapshot of the session, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// The same roster/phase payload clients receive as `gameStatus`.
    pub status: GameStatus,
    /// Registry records in any state, joined or not.
    pub connections: usize,
    /// Whether a countdown sequence is scheduled.
    pub countdown_running: bool,
}

/// Handle to the running session actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. Every connection
/// task holds one.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Registers a connection and returns the player token it was given.
    ///
    /// The actor greets the new connection with `welcome` through
    /// `outbox` before this returns.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<PlayerId, MathdropError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(SessionCommand::Connect {
            connection_id,
            outbox,
            reply: reply_tx,
        })
        .await?;
        let player_id = reply_rx
            .await
            .map_err(|_| MathdropError::SessionUnavailable)??;
        Ok(player_id)
    }

    /// Forwards a decoded client envelope (fire-and-forget).
    pub async fn send_message(
        &self,
        from: PlayerId,
        message: ClientMessage,
    ) -> Result<(), MathdropError> {
        self.command(SessionCommand::Message { from, message }).await
    }

    /// Reports that a player's transport closed.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), MathdropError> {
        self.command(SessionCommand::Disconnected { player_id })
            .await
    }

    /// Requests a snapshot of the session.
    pub async fn info(&self) -> Result<SessionInfo, MathdropError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(SessionCommand::Info { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| MathdropError::SessionUnavailable)
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), MathdropError> {
        self.command(SessionCommand::Shutdown).await
    }

    async fn command(&self, cmd: SessionCommand) -> Result<(), MathdropError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| MathdropError::SessionUnavailable)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor<C: Codec> {
    session: Session<Outbox>,
    countdown: Countdown,
    /// Pending purges in deadline order. The grace delay is fixed, so
    /// pushing to the back keeps the queue sorted.
    purges: VecDeque<(Instant, PlayerId)>,
    codec: C,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<C: Codec> SessionActor<C> {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(
            min_players = self.session.config().min_players,
            "session actor started"
        );

        loop {
            let next_purge = self.purges.front().map(|(at, _)| *at);

            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                tick = self.countdown.wait_for_tick() => {
                    let effects = self.session.apply(Event::CountdownTick(tick));
                    self.execute(effects);
                }
                () = time::sleep_until(next_purge.unwrap_or_else(Instant::now)),
                    if next_purge.is_some() =>
                {
                    self.purge_due();
                }
            }
        }

        self.countdown.cancel();
        tracing::info!("session actor stopped");
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect {
                connection_id,
                outbox,
                reply,
            } => {
                let result = match self.session.connect(connection_id, outbox) {
                    Ok((player_id, effects)) => {
                        self.execute(effects);
                        Ok(player_id)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Message { from, message } => {
                tracing::trace!(player_id = %from, kind = message.kind(), "inbound");
                let effects = self.session.apply(Event::Message { from, message });
                self.execute(effects);
            }
            SessionCommand::Disconnected { player_id } => {
                let effects = self.session.apply(Event::Disconnected(player_id));
                self.execute(effects);
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn purge_due(&mut self) {
        let now = Instant::now();
        while let Some((at, _)) = self.purges.front() {
            if *at > now {
                break;
            }
            if let Some((_, player_id)) = self.purges.pop_front() {
                let effects = self.session.apply(Event::PurgeDue(player_id));
                self.execute(effects);
            }
        }
    }

    /// Runs effects in order. Starting the countdown feeds its first tick
    /// straight back into the state machine.
    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => self.deliver(&to, &message),
                Effect::StartCountdown => match self.countdown.start() {
                    Ok(tick) => {
                        let follow_up = self.session.apply(Event::CountdownTick(tick));
                        self.execute(follow_up);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "countdown not started");
                    }
                },
                Effect::CancelCountdown => {
                    self.countdown.cancel();
                }
                Effect::SchedulePurge(player_id) => {
                    let at = Instant::now() + self.session.config().grace_delay;
                    tracing::debug!(%player_id, "purge scheduled");
                    self.purges.push_back((at, player_id));
                }
            }
        }
    }

    /// Encodes once and pushes the frame into every recipient's outbox.
    ///
    /// A closed outbox is logged and skipped; the rest still get the frame.
    fn deliver(&self, to: &Recipient, message: &ServerMessage) {
        let frame: Frame = match self.codec.encode(message) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                tracing::warn!(kind = message.kind(), error = %e, "encode failed");
                return;
            }
        };

        let mut delivered = 0usize;
        for record in self.session.registry().recipients(to) {
            if record.handle().send(Arc::clone(&frame)).is_err() {
                tracing::warn!(
                    player_id = %record.id(),
                    kind = message.kind(),
                    "outbox closed, skipping recipient"
                );
                continue;
            }
            delivered += 1;
        }
        tracing::trace!(kind = message.kind(), delivered, "delivered");
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            phase: self.session.phase(),
            status: self.session.status(),
            connections: self.session.registry().len(),
            countdown_running: self.countdown.is_running(),
        }
    }
}

/// Spawns the session actor and returns a handle to talk to it.
///
/// `channel_size` bounds the command channel. When it fills up, senders
/// wait.
pub fn spawn_session<C: Codec>(
    config: SessionConfig,
    codec: C,
    channel_size: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let session = Session::new(config);
    let countdown = Countdown::new(session.config().countdown.clone());
    let actor = SessionActor {
        session,
        countdown,
        purges: VecDeque::new(),
        codec,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle { sender: tx }
}
