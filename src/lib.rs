//! kb - a kanban task board
//!
//! This library holds the board engine behind the `kb` CLI: ordered
//! status columns of tasks, persisted as one JSON snapshot after every
//! change.
//!
//! # Core Concepts
//!
//! - **Board**: columns keyed by status, each an ordered list of tasks
//! - **Snapshot**: the whole board serialized under a single store key
//! - **Projection**: filtered and sorted read-only views for display
//! - **Drag session**: pointer gesture that resolves to one move
//! - **Exchange**: CSV import and export
//!
//! # Module Organization
//!
//! - `board`: the board engine and its mutations
//! - `cli`: Command-line interface using clap
//! - `codec`: snapshot JSON and CSV encoding
//! - `config`: Configuration loading from `kb.toml`
//! - `drag`: drop-slot resolution for pointer drags
//! - `error`: Error types and result aliases
//! - `events`: board change events and the JSONL sink
//! - `expiry`: due date evaluation against the current day
//! - `lock`: File locking and atomic writes
//! - `output`: human and JSON command output
//! - `projection`: filters, sorting, counts and the calendar
//! - `storage`: key-value stores and directory layout
//! - `task`: task records, drafts and validation rules
//! - `ui`: the interactive terminal board

pub mod board;
pub mod cli;
pub mod codec;
pub mod config;
pub mod drag;
pub mod error;
pub mod events;
pub mod expiry;
pub mod lock;
pub mod output;
pub mod projection;
pub mod storage;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
