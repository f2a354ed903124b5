//! vocalog-core — Pure types, language mapping and text preparation.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod error;
pub mod lang;
pub mod text_prep;
pub mod types;

pub use error::{Result, VocalogError};
