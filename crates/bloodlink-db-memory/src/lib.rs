//! In-memory storage backend.
//!
//! Backs the storage and notification-log traits with concurrent maps.
//! Alert updates are compare-and-swap on the alert's version under the
//! map's per-entry lock, which gives the per-alert write serialization the
//! engine's retry loop relies on.

pub mod store;

pub use store::MemoryStore;
