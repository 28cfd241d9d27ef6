//! # Lectern
//!
//! **A retrieval-augmented assistant for course materials.**
//!
//! Lectern ingests plain-text course documents into two vector
//! collections — a *catalog* (one record per course, for fuzzy
//! course-name resolution) and a *content* collection (one record per
//! chunk, for semantic search) — and answers questions by letting a chat
//! model request searches through a structured tool contract inside a
//! bounded multi-round loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Course docs │──▶│   Pipeline   │──▶│    SQLite      │
//! │ (txt / md)  │   │ Chunk+Embed  │   │ catalog+chunks │
//! └────────────┘   └──────────────┘   └───────┬───────┘
//!                                             │
//!                    ┌────────────┐   ┌───────▼───────┐
//!      user query ──▶│ Assistant  │◀─▶│  Course tools  │
//!                    │ (tool loop)│   │ search/outline │
//!                    └─────┬──────┘   └───────────────┘
//!                          ▼
//!                   chat model (OpenAI-compatible)
//! ```
//!
//! ## Query Flow
//!
//! 1. The **assistant** ([`assistant`]) sends system instructions, the
//!    conversation history, the user query, and the tool schemas to the
//!    **chat model** ([`llm`]).
//! 2. The model either answers directly or requests tool calls, which
//!    are executed sequentially by the **tool registry** ([`tools`]).
//! 3. `search_course_content` resolves a fuzzy course name against the
//!    catalog, then runs a filtered semantic search through the
//!    **course index** ([`index`]) and **store** backends.
//! 4. Results are fed back to the model; after a bounded number of tool
//!    rounds the answer is finalized with citations from the most recent
//!    round, and the exchange is recorded in the **session store**
//!    ([`session`]).
//!
//! Ingestion ([`ingest`]) is independent of the query flow: it parses
//! course documents, chunks them with the lesson-aware chunker, embeds
//! them ([`embedding`]), and replaces each course's records atomically.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool (WAL) and schema init |
//! | [`sqlite_store`] | SQLite-backed course/chunk vector store |
//! | [`embedding`] | Embedding providers: OpenAI, Ollama, disabled |
//! | [`index`] | Ingestion + query surface over the two collections |
//! | [`ingest`] | Course-document parsing and folder sync |
//! | [`tools`] | Tool trait, registry, and the built-in course tools |
//! | [`session`] | Bounded per-conversation message history |
//! | [`llm`] | Chat-model trait and OpenAI-compatible client |
//! | [`assistant`] | The bounded tool-calling orchestration loop |
//! | [`error`] | Typed failure taxonomy |
//!
//! Core data models, the chunker, the store trait, and the in-memory
//! store live in the `lectern-core` crate.

pub mod assistant;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod session;
pub mod sqlite_store;
pub mod tools;

pub use assistant::{Assistant, AssistantAnswer};
pub use index::CourseIndex;
pub use lectern_core::models::{Course, CourseChunk, Lesson, SourceRef};
pub use lectern_core::store::{self, CourseStore};
