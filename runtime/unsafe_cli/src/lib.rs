//! The building blocks of `unsafectl`.
//!
//! Every subcommand is a plain async function, so that it can be exercised
//! without spawning the binary.
pub mod command;
pub mod configuration;
pub mod database;
pub mod sessions;
pub mod users;
