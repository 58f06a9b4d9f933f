//! Library root: re-exports the coordination core's modules so both
//! `main.rs` and the integration tests in `tests/` can depend on the same
//! crate, the same bin/lib split the pack uses throughout (e.g. the
//! teacher's own workspace `core` crate backing its `src/main.rs`).

pub mod acceptance;
pub mod adapters;
pub mod app;
pub mod config;
pub mod database;
pub mod domain;
pub mod draft;
pub mod error;
pub mod events;
pub mod game;
pub mod janitor;
pub mod kv;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod types;
