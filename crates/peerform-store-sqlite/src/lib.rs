//! SQLite backend for the peerform survey store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Errors surface as the shared
//! [`peerform_core::Error`] so callers can map variants precisely.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;
