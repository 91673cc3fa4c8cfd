//! # parley-memory
//!
//! Durable SQLite store, the in-process ephemeral cache used when the store
//! is unavailable, and the memory merge engine.

pub mod cache;
pub mod merge;
pub mod store;

pub use cache::EphemeralCache;
pub use store::SqliteStore;
