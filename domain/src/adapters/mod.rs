//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory store backs unit tests, the demo CLI, and the api-server's
//! `memory` storage mode. Durable adapters (SQLite) live in separate crates.

pub mod memory_repo;
