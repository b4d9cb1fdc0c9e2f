//! Configuration shared by the CLI and the server
//!
//! Command line flags with environment variable fallbacks, plus logging setup.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::db::SqliteStore;
use crate::error::Result;
use crate::tracker::HabitTracker;

/// Where habits live and who administers them
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite database path
    #[arg(long, env = "HABIT_DB", default_value = "habits.db", global = true)]
    pub database: PathBuf,

    /// Users registering with this email are granted admin access
    #[arg(long, env = "ADMIN_EMAIL", global = true)]
    pub admin_email: Option<String>,
}

impl StoreArgs {
    pub fn open_tracker(&self) -> Result<HabitTracker<SqliteStore>> {
        let store = SqliteStore::open(&self.database)?;
        let tracker = HabitTracker::new(store);

        Ok(match &self.admin_email {
            Some(email) => tracker.with_admin_email(email.clone()),
            None => tracker,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

/// habit-server - HTTP API for habit completion tracking
#[derive(Parser, Debug, Clone)]
#[command(name = "habit-server")]
#[command(about = "HTTP API for habit completion tracking")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("habit_tracker={},info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
