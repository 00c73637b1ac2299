//! Async WebSocket client wrapping a [`ClientProtocolHandler`].

use mathdrop_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
use mathdrop_transport::{ClientConnection, Connection};
use tokio::time::{self, Instant};

use crate::{ClientError, ClientEvent, ClientProtocolHandler, GO_DELAY, Screen};

/// One player's connection to a Mathdrop server.
///
/// ```rust,no_run
/// use mathdrop_client::{ClientEvent, MultiplayerClient};
///
/// # async fn run() -> Result<(), mathdrop_client::ClientError> {
/// let mut client = MultiplayerClient::connect("ws://127.0.0.1:3000", "Alice").await?;
/// while let Some(events) = client.next_events().await? {
///     for event in events {
///         if let ClientEvent::Welcomed(_) = event {
///             client.ready().await?;
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct MultiplayerClient {
    conn: ClientConnection,
    handler: ClientProtocolHandler,
    codec: JsonCodec,
    go_deadline: Option<Instant>,
    closed: bool,
}

impl MultiplayerClient {
    /// Validates the name, dials the server, and sends `joinGame`.
    ///
    /// # Errors
    /// [`ClientError::EmptyScreenName`] before any network activity, or a
    /// transport error if the server can't be reached.
    pub async fn connect(url: &str, screen_name: &str) -> Result<Self, ClientError> {
        let mut handler = ClientProtocolHandler::new();
        handler.join(screen_name)?;

        let conn = ClientConnection::connect(url).await?;
        tracing::info!(url, screen_name = handler.screen_name(), "connected to server");

        let mut client = Self {
            conn,
            handler,
            codec: JsonCodec,
            go_deadline: None,
            closed: false,
        };
        let join = client.handler.on_open();
        client.send(join).await?;
        Ok(client)
    }

    /// Read access to the local session view.
    pub fn handler(&self) -> &ClientProtocolHandler {
        &self.handler
    }

    /// Marks this player ready. No-op if the handler says so.
    pub async fn ready(&mut self) -> Result<(), ClientError> {
        let msg = self.handler.ready();
        self.send(msg).await
    }

    /// Relays a correctly answered question to the opponent(s).
    pub async fn send_question_to_opponent(
        &mut self,
        question: &str,
        answer: &str,
    ) -> Result<(), ClientError> {
        let msg = self.handler.send_question_to_opponent(question, answer);
        self.send(msg).await
    }

    /// Tells the opponent(s) this player won.
    pub async fn send_game_won(&mut self) -> Result<(), ClientError> {
        let msg = self.handler.send_game_won();
        self.send(msg).await
    }

    /// Leaves the session and closes the socket without an alert.
    pub async fn leave(mut self) -> Result<(), ClientError> {
        self.handler.leave();
        self.closed = true;
        self.conn.close().await?;
        Ok(())
    }

    /// Waits for the next server envelope (or the `"Go!"` delay) and
    /// returns the events it produced.
    ///
    /// Undecodable frames yield an empty batch. Returns `Ok(None)` once
    /// the connection is gone; the batch before that ends with
    /// [`ClientEvent::ConnectionLost`].
    pub async fn next_events(&mut self) -> Result<Option<Vec<ClientEvent>>, ClientError> {
        if self.closed {
            return Ok(None);
        }

        let go_deadline = self.go_deadline;
        tokio::select! {
            frame = self.conn.recv() => match frame {
                Ok(Some(data)) => Ok(Some(self.on_frame(&data))),
                Ok(None) => Ok(Some(self.on_closed())),
                Err(e) => {
                    tracing::debug!(error = %e, "recv error");
                    Ok(Some(self.on_closed()))
                }
            },
            () = time::sleep_until(go_deadline.unwrap_or_else(Instant::now)),
                if go_deadline.is_some() =>
            {
                self.go_deadline = None;
                Ok(Some(self.handler.go_delay_elapsed().into_iter().collect()))
            }
        }
    }

    fn on_frame(&mut self, data: &[u8]) -> Vec<ClientEvent> {
        let message: ServerMessage = match self.codec.decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "error parsing server message");
                return Vec::new();
            }
        };

        let events = self.handler.handle(message);
        self.go_deadline = match self.handler.screen() {
            Screen::Countdown(value) if value.is_go() => {
                self.go_deadline.or_else(|| Some(Instant::now() + GO_DELAY))
            }
            _ => None,
        };
        events
    }

    fn on_closed(&mut self) -> Vec<ClientEvent> {
        self.closed = true;
        self.go_deadline = None;
        self.handler.on_close().into_iter().collect()
    }

    async fn send(&mut self, msg: Option<ClientMessage>) -> Result<(), ClientError> {
        let Some(msg) = msg else {
            return Ok(());
        };
        if self.closed {
            return Err(ClientError::Closed);
        }
        let bytes = self.codec.encode(&msg)?;
        self.conn.send(&bytes).await?;
        tracing::debug!(kind = msg.kind(), "sent");
        Ok(())
    }
}
