//! Recursive filesystem walk producing snapshots
//!
//! `current` visits one path and returns the hash of its latest snapshot,
//! storing whatever objects are needed along the way. Directories recurse
//! into their entries, so the same machinery tracks a single file or an
//! entire subtree.

use anyhow::{Context, Result};
use rvcs_core::store::PathInfo;
use rvcs_core::{File, Hash, ModeLine, Path, Store};
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generate a snapshot of the current state of `path`.
///
/// Returns `None` when the path does not exist, vanished mid-walk, or is
/// excluded from storage (e.g. the store's own directory).
pub fn current(store: &Store, path: &Path) -> Result<Option<(Hash, File)>> {
    current_at(store, path, SystemTime::now())
}

/// Like [`current`], but additionally records `extra` hashes as parents of
/// the resulting snapshot.
///
/// The listed hashes are taken verbatim, with no ancestry checks; the
/// caller is responsible for them being well-formed history. This is the
/// escape hatch for concluding a manual merge.
pub fn current_with_additional_parents(
    store: &Store,
    path: &Path,
    extra: &[Hash],
) -> Result<Option<(Hash, File)>> {
    let Some((hash, file)) = current(store, path)? else {
        return Ok(None);
    };
    // The fresh snapshot becomes the first parent so the path's history
    // stays connected; the extras follow in the order given.
    let mut parents = vec![hash.clone()];
    for h in extra {
        if *h != hash && !parents.contains(h) {
            parents.push(h.clone());
        }
    }
    if parents.len() == 1 {
        return Ok(Some((hash, file)));
    }
    let merged = File {
        mode: file.mode.clone(),
        contents: file.contents.clone(),
        parents,
    };
    let new_hash = store.store_snapshot(path, &merged)?;
    Ok(Some((new_hash, merged)))
}

fn current_at(store: &Store, path: &Path, start: SystemTime) -> Result<Option<(Hash, File)>> {
    if store.exclude(path) {
        // We are not supposed to store snapshots for this path, so pretend
        // it does not exist.
        return Ok(None);
    }
    let lstat = match fs::symlink_metadata(path.as_std()) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failure reading the file stat for {}", path))
        }
    };
    if lstat.file_type().is_symlink() {
        return snapshot_link(store, path, &lstat).map(Some);
    }
    let handle = match fs::File::open(path.as_std()) {
        Ok(f) => f,
        // The file was deleted between lstat and open; treat it as absent.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failure opening {}", path)),
    };
    // Stat through the open handle so metadata and contents are observed
    // at the same instant.
    let info = handle
        .metadata()
        .with_context(|| format!("failure reading the filesystem metadata for {}", path))?;
    if info.is_dir() {
        drop(handle);
        snapshot_directory(store, path, &info, start).map(Some)
    } else {
        snapshot_regular_file(store, path, &info, handle, start).map(Some)
    }
}

fn snapshot_link(store: &Store, path: &Path, lstat: &fs::Metadata) -> Result<(Hash, File)> {
    let target = fs::read_link(path.as_std())
        .with_context(|| format!("failure reading the link target for {}", path))?;
    let target_bytes = target.to_string_lossy().into_owned().into_bytes();
    let contents = store.store_object(target_bytes.len() as u64, &target_bytes[..])?;
    snapshot_file_metadata(store, path, ModeLine::from_metadata(lstat), contents)
}

fn snapshot_directory(
    store: &Store,
    path: &Path,
    info: &fs::Metadata,
    start: SystemTime,
) -> Result<(Hash, File)> {
    let mut tree = rvcs_core::Tree::new();
    let entries = fs::read_dir(path.as_std())
        .with_context(|| format!("failure reading the contents of the directory {}", path))?;
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {}", path, e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let child_path = path.join(&name);
        match current_at(store, &child_path, start) {
            Ok(Some((child_hash, _))) => tree.insert(name, child_hash)?,
            // Entry vanished mid-walk; it is simply omitted from the tree.
            Ok(None) => {}
            Err(e) if is_transient_child_error(&e) => {
                tracing::warn!("omitting unreadable child {}: {}", child_path, e);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failure snapshotting {}", child_path))
            }
        }
    }
    let tree_bytes = tree.to_canonical_bytes();
    let contents = store.store_object(tree_bytes.len() as u64, &tree_bytes[..])?;
    snapshot_file_metadata(store, path, ModeLine::from_metadata(info), contents)
}

/// Children the walk omits rather than failing over: permission problems
/// and races where the node disappears under us.
fn is_transient_child_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .map(|io| {
                matches!(
                    io.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                )
            })
            .unwrap_or(false)
    })
}

fn snapshot_regular_file(
    store: &Store,
    path: &Path,
    info: &fs::Metadata,
    handle: fs::File,
    start: SystemTime,
) -> Result<(Hash, File)> {
    let path_info = PathInfo::from_metadata(info);
    if store.path_info_matches_cache(path, &path_info) {
        if let Some(found) = store.find_snapshot(path)? {
            return Ok(found);
        }
    }
    let contents = store
        .store_object(info.len(), handle)
        .context("failure storing an object")?;
    let result = snapshot_file_metadata(store, path, ModeLine::from_metadata(info), contents)?;
    maybe_cache_path_info(store, path, info, &path_info, start);
    Ok(result)
}

/// Record the stat tuple only when we can prove no modification raced the
/// snapshot: the post-read mtime must equal the pre-read mtime, and that
/// mtime must be strictly older than one second before the operation
/// started. Filesystems with second-granularity timestamps make anything
/// newer ambiguous, and a miss here is only a wasted rehash later.
fn maybe_cache_path_info(
    store: &Store,
    path: &Path,
    info: &fs::Metadata,
    path_info: &PathInfo,
    start: SystemTime,
) {
    let Ok(pre_mtime) = info.modified() else {
        return;
    };
    let Ok(latest) = fs::symlink_metadata(path.as_std()) else {
        // Cannot tell whether the file changed during snapshotting.
        return;
    };
    let Ok(post_mtime) = latest.modified() else {
        return;
    };
    if post_mtime != pre_mtime {
        return;
    }
    let Some(threshold) = truncate_to_seconds(start).checked_sub(Duration::from_secs(1)) else {
        return;
    };
    if pre_mtime >= threshold {
        return;
    }
    if let Err(e) = store.cache_path_info(path, path_info) {
        tracing::warn!("failed to cache path info for {}: {}", path, e);
    }
}

fn truncate_to_seconds(t: SystemTime) -> SystemTime {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// The shared tail of every snapshot branch: reuse the previous record if
/// nothing changed, otherwise store a new one linking the previous as its
/// parent.
fn snapshot_file_metadata(
    store: &Store,
    path: &Path,
    mode: ModeLine,
    contents: Hash,
) -> Result<(Hash, File)> {
    let prev = store
        .find_snapshot(path)
        .context("failure looking up the previous file snapshot")?;
    if let Some((prev_hash, prev_file)) = &prev {
        if prev_file.mode == mode && prev_file.contents == contents {
            // Unchanged since the last snapshot; keep history minimal.
            return Ok((prev_hash.clone(), prev_file.clone()));
        }
    }
    let file = File {
        mode,
        contents,
        parents: prev.map(|(h, _)| vec![h]).unwrap_or_default(),
    };
    let hash = store
        .store_snapshot(path, &file)
        .with_context(|| format!("failure saving the latest file metadata for {}", path))?;
    Ok((hash, file))
}
