use clap::{Parser, Subcommand};
use redact::Secret;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
/// Administrative tasks for the `unsafe` application databases.
pub struct Cli {
    /// A YAML configuration file.
    ///
    /// Its values can be overridden with `UNSAFE_`-prefixed environment variables,
    /// using `__` to separate nested keys (e.g. `UNSAFE_DB__SESSIONS`).
    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect and clean up the session store.
    Sessions {
        /// The session database.
        /// It takes precedence over the configured one.
        #[clap(long, value_parser)]
        db: Option<PathBuf>,
        #[clap(subcommand)]
        command: SessionsCommand,
    },
    /// Manage user accounts.
    Users {
        /// The application database.
        /// It takes precedence over the configured one.
        #[clap(long, value_parser)]
        db: Option<PathBuf>,
        #[clap(subcommand)]
        command: UsersCommand,
    },
    /// Create the tables of the application and session databases.
    Initdb {
        /// Drop the existing tables, and everything in them, first.
        #[clap(short, long)]
        reset: bool,
        /// The application database.
        /// It takes precedence over the configured one.
        #[clap(long, value_parser)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionsCommand {
    /// Delete the sessions that expire at or after a point in time.
    Expire {
        /// `now`, seconds since the Unix epoch, an RFC 3339 timestamp,
        /// or a date/date-time in the system time zone.
        ///
        /// Defaults to `now`.
        #[clap(long)]
        time: Option<String>,
    },
    /// Delete every session.
    Purge {
        /// Only delete the sessions that haven't expired yet.
        #[clap(long)]
        unexpired: bool,
    },
    /// Delete the sessions that have already expired.
    Cleanup,
    /// Delete specific sessions.
    Remove {
        /// The ids of the sessions to delete.
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// Create a new user.
    Add {
        #[arg(index = 1)]
        username: String,
        /// The password of the new user.
        #[clap(long, env = "UNSAFE_USER_PASSWORD")]
        password: Secret<String>,
        #[clap(long)]
        email: Option<String>,
        /// A group the user belongs to. Can be repeated.
        #[clap(long = "group")]
        groups: Vec<String>,
    },
}
