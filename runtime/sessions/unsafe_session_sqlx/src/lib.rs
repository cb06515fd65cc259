#![deny(missing_docs)]
//! A SQLite storage backend for [`unsafe_session`],
//! implemented using the [`sqlx`](https://crates.io/crates/sqlx) crate.
pub mod sqlite;

#[doc(inline)]
pub use sqlite::SqliteSessionStore;
