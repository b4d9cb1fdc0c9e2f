// Habit Tracker - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use habit_tracker::api::{router, AppState};
use habit_tracker::config::{init_tracing, ServerArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing(&args.log.log_level);

    info!(version = habit_tracker::VERSION, "starting habit-server");

    let tracker = args
        .store
        .open_tracker()
        .with_context(|| format!("Failed to open database {:?}", args.store.database))?;
    info!(database = ?args.store.database, "database opened");

    let app = router(AppState::new(tracker));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", args.listen))?;

    info!(listen = %args.listen, "server running");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
