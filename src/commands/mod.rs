//! Command-line surface.
//!
//! Every subcommand is a variant of [`Command`]; [`Session::execute`]
//! dispatches on it with a plain `match`. Handlers write their output to a
//! caller-provided writer so they can be exercised without a terminal.
//!
//! - [`users`] - `register`, `login`, `reset`, `users`
//! - [`feeds`] - `addfeed`, `feeds`, `follow`, `following`, `unfollow`
//! - [`browse`] - `browse`
//! - [`agg`] - `agg`, the long-running poll loop

mod agg;
mod browse;
mod feeds;
mod users;

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::feed::FetchError;
use crate::storage::{Database, DatabaseError, User};
use crate::util::{parse_duration, UrlValidationError};

/// Number of posts `browse` shows when no limit is given
pub const DEFAULT_BROWSE_LIMIT: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Multi-user RSS feed aggregator")]
pub struct Cli {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user and make it the current one
    Register { name: String },

    /// Switch to an existing user
    Login { name: String },

    /// Delete all users along with their feeds, follows and posts
    Reset,

    /// List users
    Users,

    /// Poll feeds forever, one feed per interval (e.g. 30s, 1m, 1h30m)
    Agg {
        #[arg(value_parser = parse_duration)]
        time_between_reqs: Duration,
    },

    /// Add a feed and follow it
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },

    /// List every feed with the user who added it
    Feeds,

    /// Follow an existing feed by URL
    Follow { url: String },

    /// List the feeds the current user follows
    Following,

    /// Stop following a feed by URL
    Unfollow { url: String },

    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: u32,
    },
}

/// User-facing command failures
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Not logged in: run `gator register <name>` or `gator login <name>` first")]
    NotLoggedIn,

    #[error("User {0:?} does not exist")]
    UnknownUser(String),

    #[error("User {0:?} already exists")]
    UserExists(String),

    #[error("No feed with URL {0:?}")]
    UnknownFeed(String),

    #[error("A feed with URL {0:?} already exists")]
    FeedExists(String),

    #[error("Already following {0:?}")]
    AlreadyFollowing(String),

    #[error("Not following {0:?}")]
    NotFollowing(String),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up HTTP client: {0}")]
    Http(#[from] FetchError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Everything a command runs against: the database plus the loaded config
/// and where it lives, so `login`/`register` can write it back.
pub struct Session {
    db: Database,
    config: Config,
    config_path: PathBuf,
}

impl Session {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one command. `shutdown` is only awaited by `agg`.
    pub async fn execute<W, F>(
        &mut self,
        command: Command,
        out: &mut W,
        shutdown: F,
    ) -> Result<(), CommandError>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        tracing::debug!(?command, "Executing command");
        match command {
            Command::Register { name } => self.register(&name, out).await,
            Command::Login { name } => self.login(&name, out).await,
            Command::Reset => self.reset(out).await,
            Command::Users => self.users(out).await,
            Command::Agg { time_between_reqs } => self.agg(time_between_reqs, out, shutdown).await,
            Command::AddFeed { name, url } => {
                let user = self.current_user().await?;
                self.add_feed(&user, &name, &url, out).await
            }
            Command::Feeds => self.feeds(out).await,
            Command::Follow { url } => {
                let user = self.current_user().await?;
                self.follow(&user, &url, out).await
            }
            Command::Following => {
                let user = self.current_user().await?;
                self.following(&user, out).await
            }
            Command::Unfollow { url } => {
                let user = self.current_user().await?;
                self.unfollow(&user, &url, out).await
            }
            Command::Browse { limit } => {
                let user = self.current_user().await?;
                self.browse(&user, limit, out).await
            }
        }
    }

    /// Resolve the configured current user
    async fn current_user(&self) -> Result<User, CommandError> {
        let name = self
            .config
            .current_user_name
            .as_deref()
            .ok_or(CommandError::NotLoggedIn)?;

        self.db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| CommandError::UnknownUser(name.to_string()))
    }
}
