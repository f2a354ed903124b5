//! vocalog-lib — Transcript service engine.
//!
//! SQLite transcript store, Google TTS adapter, HTML views, the HTTP API,
//! and a client for talking to a running server.
//! Depends on vocalog-core for pure types and text processing.

pub mod client;
pub mod server;
pub mod store;
pub mod tts;
pub mod views;

// Re-export vocalog-core for convenience
pub use vocalog_core;
