//! CLI subcommands and their handlers.
//!
//! [`dispatch`] routes a parsed [`Command`] to its handler. Handlers that act
//! on behalf of a user call [`require_user`] first and receive the resolved
//! [`User`] as a parameter.

mod aggregate;
mod feeds;
mod users;

use clap::Subcommand;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::aggregator::SchedulerError;
use crate::config::{Config, ConfigError};
use crate::feed::FetchError;
use crate::shutdown::Shutdown;
use crate::storage::{Database, DatabaseError, User};

pub use aggregate::parse_duration;

/// Posts shown by `browse` when no limit is given
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No user logged in. Run `gator register <name>` or `gator login <name>` first.")]
    NotLoggedIn,

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("No feed registered with URL: {0}")]
    UnknownFeed(String),

    #[error("Invalid duration {0:?} (expected e.g. 30s, 1m, 1h30m, 500ms)")]
    InvalidDuration(String),

    #[error("Invalid feed URL {0:?}: {1}")]
    InvalidUrl(String, String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// List all users
    Users,
    /// Delete every user, feed, follow, and post
    Reset,
    /// Register a feed and follow it
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List all feeds with the user who added them
    Feeds,
    /// Follow an already registered feed
    Follow { url: String },
    /// Stop following a feed
    Unfollow { url: String },
    /// List feeds the current user follows
    Following,
    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: i64,
    },
    /// Poll feeds at a fixed interval until interrupted
    Agg {
        /// Time between cycles, e.g. 30s, 1m, 1h30m
        interval: String,
    },
}

/// Everything a handler may touch. Built once in `main`.
pub struct AppContext {
    pub config: Config,
    /// Where `config` is persisted when the current user changes
    pub config_path: PathBuf,
    pub db: Database,
}

/// Resolve the logged-in user from the config.
pub async fn require_user(ctx: &AppContext) -> Result<User, CommandError> {
    let name = ctx
        .config
        .current_user_name
        .as_deref()
        .ok_or(CommandError::NotLoggedIn)?;

    ctx.db
        .get_user_by_name(name)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(name.to_string()))
}

/// Run `command`, writing human-readable output to `out`.
///
/// `shutdown` is only consulted by `agg`.
pub async fn dispatch<W: Write>(
    ctx: &mut AppContext,
    command: Command,
    out: &mut W,
    shutdown: Shutdown,
) -> Result<(), CommandError> {
    match command {
        Command::Register { name } => users::register(ctx, &name, out).await,
        Command::Login { name } => users::login(ctx, &name, out).await,
        Command::Users => users::list(ctx, out).await,
        Command::Reset => users::reset(ctx, out).await,
        Command::AddFeed { name, url } => {
            let user = require_user(ctx).await?;
            feeds::add(ctx, &user, &name, &url, out).await
        }
        Command::Feeds => feeds::list(ctx, out).await,
        Command::Follow { url } => {
            let user = require_user(ctx).await?;
            feeds::follow(ctx, &user, &url, out).await
        }
        Command::Unfollow { url } => {
            let user = require_user(ctx).await?;
            feeds::unfollow(ctx, &user, &url, out).await
        }
        Command::Following => {
            let user = require_user(ctx).await?;
            feeds::following(ctx, &user, out).await
        }
        Command::Browse { limit } => {
            let user = require_user(ctx).await?;
            feeds::browse(ctx, &user, limit, out).await
        }
        Command::Agg { interval } => aggregate::run(ctx, &interval, out, shutdown).await,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{context, run};
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn test_subcommand_names() {
        let cli = Cli::try_parse_from(["gator", "addfeed", "HN", "https://hnrss.org/newest"]).unwrap();
        assert!(matches!(cli.command, Command::AddFeed { .. }));

        let cli = Cli::try_parse_from(["gator", "browse"]).unwrap();
        assert!(matches!(cli.command, Command::Browse { limit: 2 }));

        let cli = Cli::try_parse_from(["gator", "browse", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Browse { limit: 10 }));

        assert!(Cli::try_parse_from(["gator", "agg"]).is_err());
    }

    #[tokio::test]
    async fn test_logged_in_commands_require_user() {
        let mut ctx = context("require_user").await;
        let err = run(&mut ctx, Command::Following).await.unwrap_err();
        assert!(matches!(err, CommandError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_stale_current_user_is_unknown() {
        let mut ctx = context("stale_user").await;
        ctx.config.current_user_name = Some("ghost".to_string());
        let err = require_user(&ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::UnknownUser(name) if name == "ghost"));
    }
}
