//! Materializing a snapshot back onto the filesystem

use anyhow::{Context, Result};
use rvcs_core::{Hash, Path, Store};
use std::fs;
use std::os::unix::fs::PermissionsExt;

/// Write the snapshot `hash` out at `path`.
///
/// Directories are created with their recorded permissions and filled
/// recursively; symlinks are re-created pointing at their stored target;
/// regular files get their bytes and mode back. Every materialized path
/// also has its latest-snapshot index entry advanced, so a later snapshot
/// or merge of the same path links into the restored history instead of
/// starting a parallel one.
pub fn checkout(store: &Store, hash: &Hash, path: &Path) -> Result<()> {
    let file = store
        .read_snapshot(hash)
        .with_context(|| format!("failure reading the snapshot {} to check out", hash))?;

    if file.is_symlink() {
        let target = store.load_object(&file.contents)?;
        let target = std::str::from_utf8(&target)
            .with_context(|| format!("stored symlink target for {} is not UTF-8", path))?
            .to_string();
        if fs::symlink_metadata(path.as_std()).is_ok() {
            fs::remove_file(path.as_std())?;
        }
        std::os::unix::fs::symlink(&target, path.as_std())
            .with_context(|| format!("failure creating the symlink {}", path))?;
    } else if file.is_dir() {
        fs::create_dir_all(path.as_std())
            .with_context(|| format!("failure creating the directory {}", path))?;
        fs::set_permissions(
            path.as_std(),
            fs::Permissions::from_mode(file.mode.permission_bits()),
        )?;
        let tree = store.list_directory_contents(&file)?;
        for (name, child) in tree.iter() {
            checkout(store, child, &path.join(name))?;
        }
    } else {
        let bytes = store.load_object(&file.contents)?;
        fs::write(path.as_std(), &bytes)
            .with_context(|| format!("failure writing the file {}", path))?;
        fs::set_permissions(
            path.as_std(),
            fs::Permissions::from_mode(file.mode.permission_bits()),
        )?;
    }

    store.store_snapshot(path, &file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvcs_snapshot::current;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Store,
        work: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store")).unwrap();
        let work = fs::canonicalize(dir.path()).unwrap().join("work");
        fs::create_dir(&work).unwrap();
        Fixture {
            _dir: dir,
            store,
            work,
        }
    }

    #[test]
    fn test_checkout_roundtrips_a_tree() {
        let fx = fixture();
        let src = fx.work.join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        fs::create_dir(src.join("sub")).unwrap();
        fs::write(src.join("sub/b.txt"), "beta").unwrap();
        std::os::unix::fs::symlink("a.txt", src.join("link")).unwrap();

        let (hash, _) = current(&fx.store, &Path::from_std(&src)).unwrap().unwrap();

        let dest = fx.work.join("dest");
        checkout(&fx.store, &hash, &Path::from_std(&dest)).unwrap();

        assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(dest.join("sub/b.txt")).unwrap(), "beta");
        assert_eq!(
            fs::read_link(dest.join("link")).unwrap(),
            std::path::PathBuf::from("a.txt")
        );

        // The checked-out copy snapshots to the identical hash
        let (again, _) = current(&fx.store, &Path::from_std(&dest)).unwrap().unwrap();
        assert_eq!(again, hash);
    }

    #[test]
    fn test_checkout_preserves_permissions() {
        let fx = fixture();
        let file = fx.work.join("script.sh");
        fs::write(&file, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();

        let (hash, _) = current(&fx.store, &Path::from_std(&file)).unwrap().unwrap();

        let dest = fx.work.join("restored.sh");
        checkout(&fx.store, &hash, &Path::from_std(&dest)).unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_checkout_updates_path_index() {
        let fx = fixture();
        let file = fx.work.join("f");
        fs::write(&file, "tracked").unwrap();
        let (hash, _) = current(&fx.store, &Path::from_std(&file)).unwrap().unwrap();

        let dest_path = Path::from_std(&fx.work.join("copy"));
        checkout(&fx.store, &hash, &dest_path).unwrap();

        let (indexed, _) = fx.store.find_snapshot(&dest_path).unwrap().unwrap();
        assert_eq!(indexed, hash);
    }
}
