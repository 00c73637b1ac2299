//! Mathdrop match server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin mathdrop-server
//! cargo run --bin mathdrop-server -- --host 0.0.0.0 --port 3000
//! RUST_LOG=mathdrop=debug cargo run --bin mathdrop-server
//! ```

use std::time::Duration;

use clap::Parser;
use mathdrop::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mathdrop-server")]
#[command(about = "Lobby, countdown and relay server for Mathdrop", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Joined players that must all be ready before the countdown starts
    #[arg(long, default_value_t = 2)]
    min_players: usize,

    /// Milliseconds a disconnected player stays on the roster
    #[arg(long, default_value_t = 1000)]
    grace_ms: u64,

    /// Milliseconds between countdown ticks
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,

    /// Keep ready flags set when a countdown or match is aborted
    #[arg(long)]
    keep_ready_on_abort: bool,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            min_players: self.min_players,
            grace_delay: Duration::from_millis(self.grace_ms),
            reset_ready_on_abort: !self.keep_ready_on_abort,
            countdown: CountdownConfig {
                interval: Duration::from_millis(self.tick_ms),
                ..CountdownConfig::default()
            },
        }
    }
}

fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                [
                    "mathdrop",
                    "mathdrop_transport",
                    "mathdrop_countdown",
                    "mathdrop_session",
                    env!("CARGO_BIN_NAME"),
                ]
                .iter()
                .map(|target| format!("{}={default_level}", target.replace('-', "_")))
                .collect::<Vec<_>>()
                .join(",")
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    setup_logger("info");

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let server = match MathdropServer::builder()
        .bind(&addr)
        .session_config(args.session_config())
        .build()
        .await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
