//! Recursive three-way merge of snapshot DAGs
//!
//! The merger never guesses: every disagreement it cannot resolve
//! mechanically is surfaced as a [`ManualMergeRequired`] carrying the
//! offending sub-path, and conflicts found across a tree are reported
//! jointly rather than one at a time.

pub mod checkout;
pub mod error;
pub mod helper;
pub mod merge;

// Re-exports
pub use checkout::checkout;
pub use error::{ManualMergeRequired, MergeConflicts};
pub use helper::MergeOptions;
pub use merge::{merge, merge_with_base};
