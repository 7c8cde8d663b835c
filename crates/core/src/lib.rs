//! Snapshot object model and content-addressed store
//!
//! This crate provides:
//! - Typed hashes (`<algo>:<hex>`) and canonical paths
//! - The snapshot File record and directory Tree with their canonical
//!   byte layouts
//! - Identity and mirror primitives
//! - The on-disk store: objects, path-latest index, identity index,
//!   path-info cache

pub mod error;
pub mod file;
pub mod hash;
pub mod identity;
pub mod path;
pub mod store;
pub mod tree;

// Re-exports
pub use error::{HelperFailed, InvalidHash, InvalidIdentity, InvalidMirrorUrl, ObjectNotFound};
pub use file::{File, ModeLine};
pub use hash::Hash;
pub use identity::{Identity, Mirror};
pub use path::Path;
pub use store::{PathInfo, Store};
pub use tree::Tree;
