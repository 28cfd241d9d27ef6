//! # Lectern Core
//!
//! Shared, runtime-free logic for Lectern: course data models, the
//! lesson-aware chunker, the store abstraction, result ranking, and the
//! embedding trait.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network
//! dependencies. Everything here is deterministic and directly testable;
//! the application crate supplies the SQLite store, the HTTP embedding
//! providers, and the chat-model client.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod rank;
pub mod store;
