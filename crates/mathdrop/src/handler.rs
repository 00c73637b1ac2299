//! Per-connection handler: registration, inbound routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the session actor → get the player token
//!      (the actor sends `welcome` through the new outbox)
//!   2. Spawn a writer task that drains the outbox into the socket
//!   3. Loop: receive frames → decode → forward to the actor
//!   4. On close, report the disconnect and stop the writer

use std::sync::Arc;

use mathdrop_protocol::{ClientMessage, Codec, PlayerId};
use mathdrop_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actor::{Frame, SessionHandle};
use crate::MathdropError;

/// Drop guard that reports the disconnect when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async send.
struct DisconnectGuard {
    player_id: PlayerId,
    session: SessionHandle,
    writer: JoinHandle<()>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.writer.abort();
        let player_id = self.player_id.clone();
        let session = self.session.clone();
        tokio::spawn(async move {
            if let Err(e) = session.disconnect(player_id.clone()).await {
                tracing::debug!(%player_id, error = %e, "disconnect not delivered");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    session: SessionHandle,
    codec: Arc<C>,
) -> Result<(), MathdropError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Register ---
    let (outbox, outbox_rx) = mpsc::unbounded_channel();
    let player_id = session.connect(conn_id, outbox).await?;

    // --- Step 2: Writer ---
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        player_id.clone(),
        outbox_rx,
    ));
    let _guard = DisconnectGuard {
        player_id: player_id.clone(),
        session: session.clone(),
        writer,
    };

    // --- Step 3: Message loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let message: ClientMessage = match codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(
                    %player_id,
                    error = %e,
                    "dropping undecodable frame"
                );
                continue;
            }
        };

        session.send_message(player_id.clone(), message).await?;
    }

    // _guard drops here → writer stops, disconnect reaches the actor.
    Ok(())
}

/// Drains a player's outbox into the socket until the outbox closes or
/// a send fails.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    player_id: PlayerId,
    mut outbox: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::warn!(%player_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
    tracing::trace!(%player_id, "writer stopped");
}
