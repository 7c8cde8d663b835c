//! On-disk content-addressed store, mutable indices, and path-info cache
//!
//! Layout under the store root (default `~/.rvcs`):
//!
//! ```text
//! <root>/
//!   objects/<aa>/<hex…>        immutable content-addressed objects
//!   refs/paths/<aa>/<key>      latest snapshot hash per tracked path
//!   refs/identities/<aa>/<key> latest signature hash per identity
//!   cache/paths/<aa>/<key>     path-info cache entries (JSON)
//!   locks/                     per-key lock files
//!   tmp/                       staging area for atomic writes
//!   settings.json              mirror configuration
//! ```
//!
//! Objects are append-only and idempotent to write. The three indices are
//! the only mutable state; every update is a temp-file + fsync + rename
//! pointer swap, serialized by a per-key `flock`, so a crash leaves either
//! the old or the new pointer.

use crate::error::ObjectNotFound;
use crate::file::File;
use crate::hash::{hash_reader_into, Hash};
use crate::path::Path;
use crate::tree::Tree;
use crate::Identity;
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// The stat tuple recorded by the path-info cache.
///
/// Matching is conservative: every field must be identical, and any
/// missing or unreadable cache entry counts as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub mode: u32,
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: i64,
    pub inode: u64,
}

impl PathInfo {
    pub fn from_metadata(md: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            mode: md.mode(),
            size: md.size(),
            mtime_secs: md.mtime(),
            mtime_nanos: md.mtime_nsec(),
            inode: md.ino(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedPathInfo {
    info: PathInfo,
    /// The snapshot that was current when the entry was written. Kept for
    /// debugging; `find_snapshot` stays authoritative on a cache hit.
    snapshot: Option<Hash>,
}

/// Held for the duration of an index read-modify-write. The `flock` is
/// released when the file handle drops.
struct KeyLock {
    _file: fs::File,
}

/// Handle on an rvcs store rooted at a single directory.
pub struct Store {
    root: PathBuf,
    root_path: Path,
    file_cache: DashMap<Hash, File>,
}

impl Store {
    /// Open the store at `root`, creating the directory skeleton on first
    /// use.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [
            "objects",
            "refs/paths",
            "refs/identities",
            "cache/paths",
            "locks",
            "tmp",
        ] {
            fs::create_dir_all(root.join(dir))
                .with_context(|| format!("failed to create store directory {:?}", dir))?;
        }
        let root = fs::canonicalize(&root)
            .with_context(|| format!("failed to resolve store root {}", root.display()))?;
        let root_path = Path::from_std(&root);
        Ok(Self {
            root,
            root_path,
            file_cache: DashMap::new(),
        })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Where the mirror configuration lives.
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Paths that must never be snapshotted: the store's own tree.
    pub fn exclude(&self, path: &Path) -> bool {
        path.starts_with(&self.root_path)
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// Drain at most `size` bytes from `reader`, persist them under their
    /// SHA-256 digest, and return the resulting hash.
    ///
    /// Storing the same bytes twice is a no-op beyond the second read.
    pub fn store_object(&self, size: u64, reader: impl Read) -> Result<Hash> {
        let tmp_path = self.tmp_file_path();
        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create staging file {}", tmp_path.display()))?;
        let hash = hash_reader_into(reader, size, &mut tmp)
            .context("failure storing an object")?;
        tmp.sync_all()?;
        drop(tmp);

        let target = self.object_path(&hash);
        if target.exists() {
            let _ = fs::remove_file(&tmp_path);
            return Ok(hash);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&tmp_path, &target)?;
        sync_parent_dir(&target);
        Ok(hash)
    }

    /// Load an object's bytes, failing with [`ObjectNotFound`] when the
    /// hash is unknown.
    pub fn load_object(&self, hash: &Hash) -> Result<Vec<u8>> {
        let path = self.object_path(hash);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectNotFound(hash.clone()).into())
            }
            Err(e) => Err(e).with_context(|| format!("failure reading object {}", hash)),
        }
    }

    pub fn object_exists(&self, hash: &Hash) -> bool {
        self.object_path(hash).exists()
    }

    /// Parse the object at `hash` as a snapshot File record.
    pub fn read_snapshot(&self, hash: &Hash) -> Result<File> {
        if let Some(cached) = self.file_cache.get(hash) {
            return Ok(cached.value().clone());
        }
        let bytes = self.load_object(hash)?;
        let file = File::parse(&bytes)
            .with_context(|| format!("failure parsing the snapshot record {}", hash))?;
        self.file_cache.insert(hash.clone(), file.clone());
        Ok(file)
    }

    /// Parse a directory snapshot's contents object as a Tree.
    pub fn list_directory_contents(&self, file: &File) -> Result<Tree> {
        let bytes = self.load_object(&file.contents)?;
        Tree::parse(&bytes)
            .with_context(|| format!("failure parsing the tree object {}", file.contents))
    }

    // ------------------------------------------------------------------
    // Path-latest index
    // ------------------------------------------------------------------

    /// The latest snapshot recorded for `path`, if any.
    pub fn find_snapshot(&self, path: &Path) -> Result<Option<(Hash, File)>> {
        let Some(hash) = self.read_ref("paths", path.as_str())? else {
            return Ok(None);
        };
        let file = self
            .read_snapshot(&hash)
            .with_context(|| format!("failure reading the latest snapshot for {}", path))?;
        Ok(Some((hash, file)))
    }

    /// Persist `file` as an object and advance the path-latest pointer.
    pub fn store_snapshot(&self, path: &Path, file: &File) -> Result<Hash> {
        let bytes = file.to_canonical_bytes();
        let hash = self.store_object(bytes.len() as u64, &bytes[..])?;
        let _lock = self.lock_key("paths", path.as_str())?;
        self.write_ref("paths", path.as_str(), &hash)?;
        self.file_cache.insert(hash.clone(), file.clone());
        Ok(hash)
    }

    // ------------------------------------------------------------------
    // Path-info cache
    // ------------------------------------------------------------------

    /// Record the stat tuple for `path` so an unchanged file can skip
    /// rehashing next time. Callers are responsible for the concurrent
    /// modification guard; see the snapshotter.
    pub fn cache_path_info(&self, path: &Path, info: &PathInfo) -> Result<()> {
        let snapshot = self.read_ref("paths", path.as_str())?;
        let entry = CachedPathInfo {
            info: info.clone(),
            snapshot,
        };
        let bytes = serde_json::to_vec(&entry)?;
        let target = self.keyed_path("cache/paths", path.as_str());
        self.atomic_write(&target, &bytes)
    }

    /// Whether `info` matches the cached stat tuple for `path`. Any
    /// uncertainty (missing entry, unreadable JSON) yields `false`.
    pub fn path_info_matches_cache(&self, path: &Path, info: &PathInfo) -> bool {
        let target = self.keyed_path("cache/paths", path.as_str());
        let Ok(bytes) = fs::read(&target) else {
            return false;
        };
        match serde_json::from_slice::<CachedPathInfo>(&bytes) {
            Ok(entry) => entry.info == *info,
            Err(e) => {
                tracing::warn!("discarding unreadable cache entry for {}: {}", path, e);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Identity index
    // ------------------------------------------------------------------

    /// The most recently recorded signature for `identity`, if any.
    pub fn latest_signature_for_identity(&self, identity: &Identity) -> Result<Option<Hash>> {
        self.read_ref("identities", &identity.to_string())
    }

    /// Advance the identity index to `signature`.
    pub fn update_signature_for_identity(
        &self,
        identity: &Identity,
        signature: &Hash,
    ) -> Result<()> {
        let key = identity.to_string();
        let _lock = self.lock_key("identities", &key)?;
        self.write_ref("identities", &key, signature)
    }

    // ------------------------------------------------------------------
    // Internal plumbing
    // ------------------------------------------------------------------

    fn object_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash.hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    /// Index and cache files are keyed by the SHA-256 of the path or
    /// identity string, with the same two-character fan-out as objects,
    /// so arbitrary path bytes never escape the store tree.
    fn keyed_path(&self, kind: &str, key: &str) -> PathBuf {
        let hex = Hash::of_bytes(key.as_bytes()).hex().to_string();
        self.root
            .join(kind)
            .join(&hex[..2])
            .join(&hex[2..])
    }

    fn ref_path(&self, kind: &str, key: &str) -> PathBuf {
        self.keyed_path(&format!("refs/{}", kind), key)
    }

    fn read_ref(&self, kind: &str, key: &str) -> Result<Option<Hash>> {
        let path = self.ref_path(kind, key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(Hash::parse(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failure reading the {} index", kind)),
        }
    }

    fn write_ref(&self, kind: &str, key: &str, hash: &Hash) -> Result<()> {
        let path = self.ref_path(kind, key);
        self.atomic_write(&path, format!("{}\n", hash).as_bytes())
    }

    fn lock_key(&self, kind: &str, key: &str) -> Result<KeyLock> {
        use nix::fcntl::{flock, FlockArg};
        use std::os::unix::io::AsRawFd;

        let name = format!("{}-{}", kind, Hash::of_bytes(key.as_bytes()).hex());
        let path = self.root.join("locks").join(name);
        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;
        flock(file.as_raw_fd(), FlockArg::LockExclusive)
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(KeyLock { _file: file })
    }

    fn tmp_file_path(&self) -> PathBuf {
        self.root
            .join("tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Atomic write: staging file in `tmp/`, fsync, rename over the target.
    pub fn atomic_write(&self, target: &std::path::Path, data: &[u8]) -> Result<()> {
        let tmp_path = self.tmp_file_path();
        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create staging file {}", tmp_path.display()))?;
        tmp.write_all(data)?;
        tmp.sync_all()?;
        drop(tmp);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&tmp_path, target)
            .with_context(|| format!("failed to commit {}", target.display()))?;
        sync_parent_dir(target);
        Ok(())
    }
}

fn sync_parent_dir(path: &std::path::Path) {
    // Best effort; some filesystems refuse to fsync directories.
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
