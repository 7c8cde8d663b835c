//! End-to-end tests driving the rvcs binary

use anyhow::Result;
use std::fs;
use std::process::{Command, Output};

struct CliFixture {
    dir: tempfile::TempDir,
}

impl CliFixture {
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("work"))?;
        Ok(Self { dir })
    }

    fn work(&self) -> std::path::PathBuf {
        self.dir.path().join("work")
    }

    fn rvcs(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new(env!("CARGO_BIN_EXE_rvcs"))
            .args(args)
            .env("RVCS_STORE_DIR", self.dir.path().join("store"))
            .current_dir(self.work())
            .output()?;
        Ok(output)
    }

    fn rvcs_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.rvcs(args)?;
        assert!(
            output.status.success(),
            "rvcs {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[test]
fn test_snapshot_prints_a_stable_hash() -> Result<()> {
    let fx = CliFixture::new()?;
    fs::write(fx.work().join("f.txt"), "contents")?;

    let first = fx.rvcs_ok(&["snapshot", "f.txt"])?;
    assert!(first.trim().starts_with("sha256:"), "got {first:?}");

    let second = fx.rvcs_ok(&["snapshot", "f.txt"])?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_log_walks_edits() -> Result<()> {
    let fx = CliFixture::new()?;
    let file = fx.work().join("notes.txt");

    fs::write(&file, "v1")?;
    fx.rvcs_ok(&["snapshot", "notes.txt"])?;
    fs::write(&file, "v2")?;
    fx.rvcs_ok(&["snapshot", "notes.txt"])?;

    let log = fx.rvcs_ok(&["log", "notes.txt"])?;
    assert!(log.contains("initial"));
    // Two history lines plus the header
    assert!(log.lines().count() >= 3, "unexpected log output: {log}");
    Ok(())
}

#[test]
fn test_log_without_snapshots_is_friendly() -> Result<()> {
    let fx = CliFixture::new()?;
    fs::write(fx.work().join("untracked.txt"), "x")?;
    let out = fx.rvcs_ok(&["log", "untracked.txt"])?;
    assert!(out.contains("No snapshots yet"));
    Ok(())
}

#[test]
fn test_invalid_additional_parent_is_a_user_error() -> Result<()> {
    let fx = CliFixture::new()?;
    fs::write(fx.work().join("f.txt"), "x")?;

    let output = fx.rvcs(&["snapshot", "f.txt", "--additional-parents=garbage"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid hash"));
    Ok(())
}

#[test]
fn test_mirror_management_round_trip() -> Result<()> {
    let fx = CliFixture::new()?;

    fx.rvcs_ok(&["add-mirror", "--read-only", "ex::alice", "sftp://host/a"])?;
    fx.rvcs_ok(&["remove-mirror", "ex::alice", "sftp://host/a"])?;

    // Removing again fails as a user error
    let output = fx.rvcs(&["remove-mirror", "ex::alice", "sftp://host/a"])?;
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn test_invalid_mirror_url_is_rejected() -> Result<()> {
    let fx = CliFixture::new()?;
    let output = fx.rvcs(&["add-mirror", "ex::alice", "not-a-url"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid mirror url"));
    Ok(())
}

#[test]
fn test_merge_by_hash_between_directories() -> Result<()> {
    let fx = CliFixture::new()?;
    let src = fx.work().join("src");
    fs::create_dir(&src)?;
    fs::write(src.join("a"), "alpha")?;

    let hash = fx.rvcs_ok(&["snapshot", "src"])?;
    let hash = hash.trim();

    fx.rvcs_ok(&["merge", hash, "dest"])?;
    assert_eq!(fs::read_to_string(fx.work().join("dest/a"))?, "alpha");
    Ok(())
}
