//! Stable JSON encoding for the storage file.
//!
//! Keys come out sorted and indented by two spaces so the file diffs cleanly
//! between sessions.

mod json;

pub use json::*;
