//! A local AI alter-ego: a chat assistant that remembers you.
//!
//! Every chat turn is composed from what the assistant remembers about the
//! user, from any matching passages in a personal document folder, and from
//! the recent conversation, then sent to a local Ollama model. Turns are
//! written back to long-term memory off the request path. A background
//! scheduler sends an evening reminder when the day's memories lack a
//! practice keyword, and writes one summary of the day shortly after 01:00.
//!
//! An independent TOEFL speaking scorer is bundled as a separate HTTP service.
//!
//! # Architecture
//!
//! - **Memory**: a flat text file, SQLite with FTS5 keyword ranking, or a
//!   remote mem0-compatible memory service
//! - **Retrieval**: documents chunked into an in-memory FTS5 index, rebuilt
//!   whole and swapped in under a lock
//! - **Model**: Ollama `/api/chat` with fixed decoding options
//! - **Scheduler**: cancellable interval loops guarded by once-per-day latches
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`user`]: the `{name, bio}` user record
//! - [`db`]: SQLite schema and version check for the profile store
//! - [`profile`]: long-term memory backends and the error-absorbing facade
//! - [`model`]: chat model providers
//! - [`retrieval`]: document index and answer-from-context augmentation
//! - [`chat`]: the chat turn pipeline
//! - [`notify`]: desktop notifications
//! - [`scheduler`]: reminder and daily-summary tasks
//! - [`context`]: shared application state
//! - [`server`]: JSON HTTP API
//! - [`scoring`]: TOEFL speaking scorer
//! - [`cli`]: terminal commands

pub mod chat;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod model;
pub mod notify;
pub mod profile;
pub mod retrieval;
pub mod scheduler;
pub mod scoring;
pub mod server;
pub mod text;
pub mod user;
