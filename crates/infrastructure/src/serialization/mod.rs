//! Deterministic JSON serialization for files written by the console.
//!
//! Keeps stored files readable and diff-friendly:
//! - Sorted object keys (via `BTreeMap` in stored types)
//! - 2-space indentation
//! - Trailing newline

mod json;

pub use json::*;
