// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use std::rc::Rc;

use server::stats::StatCounters;
use server::storage::Database;
use server::{HashCommands, Server, config::ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// The whole server is one task on a current-thread runtime: index,
// codec, and dispatch all run on the event-loop thread.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Loaded configuration: listen_port={}", config.listen_port);

    // One process-scoped context: statistics shared between the
    // database and the event loop, no global mutable state.
    let stats = Rc::new(StatCounters::default());
    let database = Database::new(Rc::clone(&stats));
    let handler = HashCommands::new(database);

    let server = match Server::bind(config.listen_port, handler, stats).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("listening on port {}", config.listen_port);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
