//! CLI command implementations

pub mod add_mirror;
pub mod log;
pub mod merge;
pub mod publish;
pub mod remove_mirror;
pub mod snapshot;
