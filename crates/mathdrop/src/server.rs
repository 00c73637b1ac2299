//! `MathdropServer` builder and accept loop.
//!
//! This is the entry point for running a Mathdrop match server. It ties
//! together all the layers: transport → protocol → session actor.

use std::sync::Arc;

use mathdrop_protocol::{Codec, JsonCodec};
use mathdrop_session::SessionConfig;
use mathdrop_transport::{Transport, WebSocketTransport};

use crate::actor::{SessionHandle, spawn_session};
use crate::handler::handle_connection;
use crate::MathdropError;

/// Default capacity of the session actor's command channel.
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Builder for configuring and starting a Mathdrop server.
///
/// # Example
///
/// ```rust,no_run
/// use mathdrop::prelude::*;
///
/// # async fn run() -> Result<(), MathdropError> {
/// let server = MathdropServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MathdropServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    channel_size: usize,
}

impl MathdropServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            session_config: SessionConfig::default(),
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the session actor's command channel capacity.
    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size;
        self
    }

    /// Binds the listener and starts the session actor.
    ///
    /// Uses `JsonCodec` on the wire, which is what the browser client
    /// speaks.
    pub async fn build(self) -> Result<MathdropServer<JsonCodec>, MathdropError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let codec = Arc::new(JsonCodec);
        let session = spawn_session(self.session_config, JsonCodec, self.channel_size);

        Ok(MathdropServer {
            transport,
            session,
            codec,
        })
    }
}

impl Default for MathdropServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Mathdrop server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MathdropServer<C: Codec> {
    transport: WebSocketTransport,
    session: SessionHandle,
    codec: Arc<C>,
}

impl MathdropServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> MathdropServerBuilder {
        MathdropServerBuilder::new()
    }
}

impl<C: Codec> MathdropServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the session actor, for inspection.
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// A failed accept (including a failed WebSocket upgrade) is logged
    /// and the loop keeps going. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), MathdropError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Mathdrop server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let session = self.session.clone();
                    let codec = Arc::clone(&self.codec);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, session, codec).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
