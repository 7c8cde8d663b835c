//! The recursive three-way merge algorithm

use crate::checkout::checkout;
use crate::error::{ManualMergeRequired, MergeConflicts};
use crate::helper::{merge_with_helper, MergeOptions};
use anyhow::{Context, Result};
use rvcs_core::{File, Hash, Path, Store, Tree};
use rvcs_snapshot::{current, is_ancestor, merge_base};
use std::collections::BTreeSet;
use std::fs;

/// Merge the snapshot `src` into the local filesystem at `dest`.
///
/// On any conflict the filesystem is left untouched and the joined list
/// of conflicts is returned. If the destination does not exist yet, the
/// source is simply checked out there.
pub fn merge(store: &Store, opts: &MergeOptions, src: &Hash, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        use std::os::unix::fs::DirBuilderExt;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true).mode(0o700);
        builder
            .create(parent.as_std())
            .with_context(|| format!("failure ensuring the parent directory of {} exists", dest))?;
    }

    let dest_prev = current(store, dest)
        .with_context(|| format!("failure snapshotting the destination {} before merging", dest))?;
    let Some((dest_prev_hash, _)) = dest_prev else {
        return checkout(store, src, dest);
    };

    let base = merge_base(store, src, &dest_prev_hash).with_context(|| {
        format!(
            "failure determining the merge base for {} and {}",
            src, dest_prev_hash
        )
    })?;
    if base.as_ref() == Some(src) {
        // The source has already been merged in.
        return Ok(());
    }

    let merged = merge_with_base(
        store,
        opts,
        dest,
        base.as_ref(),
        Some(src),
        Some(&dest_prev_hash),
        false,
    )
    .context("unable to automatically merge the two snapshots")?
    .context("merging two present snapshots produced no result")?;

    // Replace the destination with the merged result.
    match fs::symlink_metadata(dest.as_std()) {
        Ok(md) if md.is_dir() => fs::remove_dir_all(dest.as_std())?,
        Ok(_) => fs::remove_file(dest.as_std())?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("failure clearing {}", dest)),
    }
    checkout(store, &merged, dest)
}

/// Merge `src` and `dest` relative to their common ancestor `base`,
/// returning the hash of the merged snapshot.
///
/// `None` inputs mean "no snapshot at this sub-path"; a `None` result
/// means the merged tree has nothing there either. Conflicts across a
/// directory are accumulated and reported jointly as [`MergeConflicts`].
pub fn merge_with_base(
    store: &Store,
    opts: &MergeOptions,
    sub_path: &Path,
    base: Option<&Hash>,
    src: Option<&Hash>,
    dest: Option<&Hash>,
    force_keep_mode: bool,
) -> Result<Option<Hash>> {
    // Trivial cases: the result is one of the inputs.
    if src == dest {
        return Ok(src.cloned());
    }
    if src == base {
        return Ok(dest.cloned());
    }
    if dest == base {
        return Ok(src.cloned());
    }

    let (Some(src), Some(dest)) = (src, dest) else {
        return Err(ManualMergeRequired::new(
            sub_path,
            "the nested snapshot was deleted in either the source or destination snapshot",
        )
        .into());
    };

    // A base that is not an ancestor means its changes were rolled back on
    // that side; choosing automatically could silently re-introduce them.
    if !is_ancestor(store, base, src)? {
        return Err(ManualMergeRequired::new(
            sub_path,
            "nested changes were rolled back in the source snapshot",
        )
        .into());
    }
    if !is_ancestor(store, base, dest)? {
        return Err(ManualMergeRequired::new(
            sub_path,
            "nested changes were rolled back in the destination snapshot",
        )
        .into());
    }

    let src_file = store
        .read_snapshot(src)
        .with_context(|| format!("failure reading the file snapshot for {}", src))?;
    let dest_file = store
        .read_snapshot(dest)
        .with_context(|| format!("failure reading the file snapshot for {}", dest))?;
    let base_file = base.map(|h| store.read_snapshot(h)).transpose()?;

    if src_file.is_symlink() || dest_file.is_symlink() {
        return Err(ManualMergeRequired::new(
            sub_path,
            "one or both versions of the snapshot represent a symbolic link",
        )
        .into());
    }

    if !(src_file.is_dir() && dest_file.is_dir()) {
        return merge_with_helper(store, opts, sub_path, &dest_file.mode, base, src, dest)
            .map(Some);
    }

    // Both sides are directories: recursively merge every nested path,
    // using the corresponding base entry as the reference point.
    let src_tree = store.list_directory_contents(&src_file)?;
    let dest_tree = store.list_directory_contents(&dest_file)?;
    let base_tree = match &base_file {
        Some(f) if f.is_dir() => store.list_directory_contents(f)?,
        _ => Tree::new(),
    };

    let mut names: BTreeSet<&str> = BTreeSet::new();
    names.extend(src_tree.names());
    names.extend(dest_tree.names());

    let mut merged_tree = Tree::new();
    let mut conflicts: Vec<ManualMergeRequired> = Vec::new();
    for name in names {
        let child = merge_with_base(
            store,
            opts,
            &sub_path.join(name),
            base_tree.get(name),
            src_tree.get(name),
            dest_tree.get(name),
            force_keep_mode,
        );
        match child {
            Ok(Some(hash)) => merged_tree.insert(name, hash)?,
            Ok(None) => {}
            Err(err) => {
                if let Some(list) = err.downcast_ref::<MergeConflicts>() {
                    conflicts.extend(list.0.iter().cloned());
                } else if let Some(single) = err.downcast_ref::<ManualMergeRequired>() {
                    conflicts.push(single.clone());
                } else {
                    return Err(err);
                }
            }
        }
    }

    if src_file.mode != dest_file.mode && !force_keep_mode {
        conflicts.push(ManualMergeRequired::new(
            sub_path,
            format!(
                "file permissions do not match between versions (source {:?}, destination {:?}); \
                 update the source permissions to the desired result and re-run the merge",
                src_file.mode.as_str(),
                dest_file.mode.as_str()
            ),
        ));
    }

    if !conflicts.is_empty() {
        return Err(MergeConflicts(conflicts).into());
    }

    let tree_bytes = merged_tree.to_canonical_bytes();
    let contents = store
        .store_object(tree_bytes.len() as u64, &tree_bytes[..])
        .context("failure storing the contents of a merged tree")?;
    let merged = File {
        mode: src_file.mode.clone(),
        contents,
        parents: vec![src.clone(), dest.clone()],
    };
    let bytes = merged.to_canonical_bytes();
    let hash = store
        .store_object(bytes.len() as u64, &bytes[..])
        .context("failure storing the merged snapshot")?;
    Ok(Some(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvcs_core::ModeLine;

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    fn store_record(store: &Store, file: &File) -> Hash {
        let bytes = file.to_canonical_bytes();
        store.store_object(bytes.len() as u64, &bytes[..]).unwrap()
    }

    fn file_snap(store: &Store, contents: &str, parents: &[&Hash]) -> Hash {
        let contents = store
            .store_object(contents.len() as u64, contents.as_bytes())
            .unwrap();
        store_record(
            store,
            &File {
                mode: ModeLine::parse("-rw-r--r--").unwrap(),
                contents,
                parents: parents.iter().map(|h| (*h).clone()).collect(),
            },
        )
    }

    fn dir_snap(store: &Store, entries: &[(&str, &Hash)], parents: &[&Hash]) -> Hash {
        dir_snap_with_mode(store, "drwxr-xr-x", entries, parents)
    }

    fn dir_snap_with_mode(
        store: &Store,
        mode: &str,
        entries: &[(&str, &Hash)],
        parents: &[&Hash],
    ) -> Hash {
        let mut tree = Tree::new();
        for (name, hash) in entries {
            tree.insert(*name, (*hash).clone()).unwrap();
        }
        let bytes = tree.to_canonical_bytes();
        let contents = store.store_object(bytes.len() as u64, &bytes[..]).unwrap();
        store_record(
            store,
            &File {
                mode: ModeLine::parse(mode).unwrap(),
                contents,
                parents: parents.iter().map(|h| (*h).clone()).collect(),
            },
        )
    }

    fn run_merge(
        store: &Store,
        base: Option<&Hash>,
        src: Option<&Hash>,
        dest: Option<&Hash>,
    ) -> Result<Option<Hash>> {
        merge_with_base(
            store,
            &MergeOptions::default(),
            &Path::new("/m"),
            base,
            src,
            dest,
            false,
        )
    }

    #[test]
    fn test_trivial_cases() {
        let (_dir, store) = test_store();
        let base = file_snap(&store, "base", &[]);
        let edit = file_snap(&store, "edit", &[&base]);

        // src == dest
        assert_eq!(
            run_merge(&store, Some(&base), Some(&edit), Some(&edit)).unwrap(),
            Some(edit.clone())
        );
        // src == base: keep dest
        assert_eq!(
            run_merge(&store, Some(&base), Some(&base), Some(&edit)).unwrap(),
            Some(edit.clone())
        );
        // dest == base: take src
        assert_eq!(
            run_merge(&store, Some(&base), Some(&edit), Some(&base)).unwrap(),
            Some(edit)
        );
    }

    #[test]
    fn test_deleted_side_requires_manual_merge() {
        let (_dir, store) = test_store();
        let base = file_snap(&store, "base", &[]);
        let edit = file_snap(&store, "edit", &[&base]);

        let err = run_merge(&store, Some(&base), None, Some(&edit)).unwrap_err();
        let conflict = err.downcast_ref::<ManualMergeRequired>().unwrap();
        assert!(conflict.reason.contains("deleted"));
    }

    #[test]
    fn test_rollback_in_source_is_detected() {
        let (_dir, store) = test_store();
        // The child's base is not an ancestor of the child's source version.
        let child_base = file_snap(&store, "x original", &[]);
        let child_src = file_snap(&store, "x rewritten from scratch", &[]);
        let child_dest = file_snap(&store, "x edited", &[&child_base]);

        let base_dir = dir_snap(&store, &[("x", &child_base)], &[]);
        let src_dir = dir_snap(&store, &[("x", &child_src)], &[&base_dir]);
        let dest_dir = dir_snap(&store, &[("x", &child_dest)], &[&base_dir]);

        let err = run_merge(&store, Some(&base_dir), Some(&src_dir), Some(&dest_dir)).unwrap_err();
        let conflicts = err.downcast_ref::<MergeConflicts>().unwrap();
        assert_eq!(conflicts.0.len(), 1);
        assert!(conflicts.0[0].reason.contains("source"));
        assert_eq!(conflicts.0[0].path.as_str(), "/m/x");
    }

    #[test]
    fn test_symlink_requires_manual_merge() {
        let (_dir, store) = test_store();
        let base = file_snap(&store, "base", &[]);
        let target = store.store_object(6, &b"target"[..]).unwrap();
        let link = store_record(
            &store,
            &File {
                mode: ModeLine::parse("Lrwxrwxrwx").unwrap(),
                contents: target,
                parents: vec![base.clone()],
            },
        );
        let edit = file_snap(&store, "edit", &[&base]);

        let err = run_merge(&store, Some(&base), Some(&link), Some(&edit)).unwrap_err();
        let conflict = err.downcast_ref::<ManualMergeRequired>().unwrap();
        assert!(conflict.reason.contains("symbolic link"));
    }

    #[test]
    fn test_directory_merge_combines_independent_changes() {
        let (_dir, store) = test_store();
        let a1 = file_snap(&store, "a v1", &[]);
        let a2 = file_snap(&store, "a v2", &[&a1]);
        let b = file_snap(&store, "b", &[]);
        let c = file_snap(&store, "c", &[]);

        let base_dir = dir_snap(&store, &[("a", &a1), ("b", &b)], &[]);
        // src adds c, dest modifies a
        let src_dir = dir_snap(&store, &[("a", &a1), ("b", &b), ("c", &c)], &[&base_dir]);
        let dest_dir = dir_snap(&store, &[("a", &a2), ("b", &b)], &[&base_dir]);

        let merged = run_merge(&store, Some(&base_dir), Some(&src_dir), Some(&dest_dir))
            .unwrap()
            .unwrap();
        let merged_file = store.read_snapshot(&merged).unwrap();
        assert_eq!(merged_file.parents, vec![src_dir, dest_dir]);

        let tree = store.list_directory_contents(&merged_file).unwrap();
        assert_eq!(tree.get("a"), Some(&a2));
        assert_eq!(tree.get("b"), Some(&b));
        assert_eq!(tree.get("c"), Some(&c));
    }

    #[test]
    fn test_mode_mismatch_is_a_conflict() {
        let (_dir, store) = test_store();
        let child = file_snap(&store, "same", &[]);
        let base_dir = dir_snap(&store, &[("f", &child)], &[]);
        let src_dir = dir_snap_with_mode(&store, "drwx------", &[("f", &child)], &[&base_dir]);
        let dest_dir = dir_snap_with_mode(&store, "drwxrwxr-x", &[("f", &child)], &[&base_dir]);

        let err = run_merge(&store, Some(&base_dir), Some(&src_dir), Some(&dest_dir)).unwrap_err();
        let conflicts = err.downcast_ref::<MergeConflicts>().unwrap();
        assert!(conflicts.0[0].reason.contains("permissions"));
    }

    #[test]
    fn test_conflicts_are_accumulated_across_children() {
        let (_dir, store) = test_store();
        let xb = file_snap(&store, "x base", &[]);
        let yb = file_snap(&store, "y base", &[]);
        let xd = file_snap(&store, "x edited", &[&xb]);
        let yd = file_snap(&store, "y edited", &[&yb]);

        let base_dir = dir_snap(&store, &[("x", &xb), ("y", &yb)], &[]);
        // src deletes both children that dest edited
        let src_dir = dir_snap(&store, &[], &[&base_dir]);
        let dest_dir = dir_snap(&store, &[("x", &xd), ("y", &yd)], &[&base_dir]);

        let err = run_merge(&store, Some(&base_dir), Some(&src_dir), Some(&dest_dir)).unwrap_err();
        let conflicts = err.downcast_ref::<MergeConflicts>().unwrap();
        assert_eq!(conflicts.0.len(), 2);
        let paths: Vec<_> = conflicts.0.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/m/x", "/m/y"]);
    }
}
