//! Headless Mathdrop client.
//!
//! Joins a lobby, optionally readies up, and logs everything the server
//! sends. Useful for filling the second seat while testing a browser.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin mathdrop-client -- --name Bot --auto-ready
//! cargo run --bin mathdrop-client -- -u ws://example.com:3000 -n Alice
//! ```

use clap::Parser;
use mathdrop_client::{ClientError, ClientEvent, MultiplayerClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mathdrop-client")]
#[command(about = "Headless Mathdrop player", long_about = None)]
struct Args {
    /// Screen name shown on the roster
    #[arg(short = 'n', long)]
    name: String,

    /// WebSocket server URL
    #[arg(short = 'u', long, env = "MATHDROP_URL", default_value = "ws://127.0.0.1:3000")]
    url: String,

    /// Send `ready` as soon as the roster shows this player
    #[arg(long)]
    auto_ready: bool,
}

fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "mathdrop_client={default_level},{}={default_level}",
                    env!("CARGO_BIN_NAME").replace('-', "_")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(args: Args) -> Result<(), ClientError> {
    let mut client = MultiplayerClient::connect(&args.url, &args.name).await?;

    loop {
        let batch = tokio::select! {
            batch = client.next_events() => batch?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("leaving");
                return client.leave().await;
            }
        };
        let Some(events) = batch else {
            return Ok(());
        };

        for event in events {
            match event {
                ClientEvent::Welcomed(id) => tracing::info!(%id, "welcomed"),
                ClientEvent::RosterUpdated(players) => {
                    let names: Vec<_> = players
                        .iter()
                        .map(|p| format!("{}{}", p.screen_name, if p.ready { " (ready)" } else { "" }))
                        .collect();
                    tracing::info!(roster = ?names, "roster");
                    if args.auto_ready {
                        client.ready().await?;
                    }
                }
                ClientEvent::CountdownShown(value) => tracing::info!(%value, "countdown"),
                ClientEvent::GameStarted => tracing::info!("game started"),
                ClientEvent::ReturnedToLobby => tracing::info!("back in the lobby"),
                ClientEvent::QuestionFromOpponent(relay) => tracing::info!(
                    question = %relay.question,
                    answer = %relay.answer,
                    from = %relay.from_player,
                    "question from opponent"
                ),
                ClientEvent::OpponentWon(winner) => tracing::info!(%winner, "opponent won"),
                ClientEvent::ConnectionLost => tracing::warn!("disconnected from server"),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logger("info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
