//! Recursive snapshotting and history traversal
//!
//! This crate provides:
//! - `current`: walk a filesystem path and produce its snapshot DAG
//! - `read_log`: breadth-first enumeration of a snapshot's ancestors
//! - `is_ancestor` / `merge_base`: the DAG relations the merger builds on

pub mod current;
pub mod log;

// Re-exports
pub use current::{current, current_with_additional_parents};
pub use log::{is_ancestor, merge_base, read_log, LogEntry};
