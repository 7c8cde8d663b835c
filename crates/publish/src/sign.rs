//! Signing snapshots and verifying signatures via identity helpers

use crate::helper::{run_helper, PublishOptions};
use anyhow::{Context, Result};
use rvcs_core::{Hash, Identity, Store};

/// Ask the identity's sign helper to attest `hash`, chaining from
/// `prev_signature` when there is one, and record the new signature as
/// the identity's latest.
///
/// Helper argv: `<id_full> <snapshot_hash> [<prev_signature_hash>]`. The
/// helper prints the hash of the signature object it produced; the object
/// itself reaches the store through the shared filesystem.
pub fn sign(
    store: &Store,
    opts: &PublishOptions,
    identity: &Identity,
    hash: &Hash,
    prev_signature: Option<&Hash>,
) -> Result<Hash> {
    let helper = format!("rvcs-sign-{}", identity.namespace());
    let mut args = vec![identity.to_string(), hash.to_string()];
    if let Some(prev) = prev_signature {
        args.push(prev.to_string());
    }
    let signature = run_helper(opts, &helper, &args)
        .with_context(|| format!("failure signing {} as {}", hash, identity))?;
    store
        .update_signature_for_identity(identity, &signature)
        .with_context(|| {
            format!(
                "failure updating the latest signature for {} to {}",
                identity, signature
            )
        })?;
    Ok(signature)
}

/// Recover the snapshot hash attested by `signature`.
///
/// Helper argv: `<id_full> <signature_hash>`.
pub fn verify(opts: &PublishOptions, identity: &Identity, signature: &Hash) -> Result<Hash> {
    let helper = format!("rvcs-verify-{}", identity.namespace());
    let args = vec![identity.to_string(), signature.to_string()];
    run_helper(opts, &helper, &args)
        .with_context(|| format!("failure verifying the signature {} for {}", signature, identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::testing::install_helper;

    fn setup() -> (tempfile::TempDir, Store, PublishOptions) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store")).unwrap();
        let helpers = dir.path().join("helpers");
        std::fs::create_dir(&helpers).unwrap();
        let opts = PublishOptions {
            helper_dir: Some(helpers),
        };
        (dir, store, opts)
    }

    #[test]
    fn test_sign_records_latest_signature() {
        let (dir, store, opts) = setup();
        let id = Identity::parse("ex::alice").unwrap();
        let snapshot = Hash::of_bytes(b"snapshot");
        let signature = Hash::of_bytes(b"signature");

        install_helper(
            dir.path().join("helpers").as_path(),
            "rvcs-sign-ex",
            &format!("echo {}", signature),
        );

        let got = sign(&store, &opts, &id, &snapshot, None).unwrap();
        assert_eq!(got, signature);
        assert_eq!(
            store.latest_signature_for_identity(&id).unwrap(),
            Some(signature)
        );
    }

    #[test]
    fn test_sign_passes_previous_signature() {
        let (dir, store, opts) = setup();
        let id = Identity::parse("ex::alice").unwrap();
        let helpers = dir.path().join("helpers");
        let marker = dir.path().join("argv.txt");
        let out = Hash::of_bytes(b"new-signature");
        install_helper(
            &helpers,
            "rvcs-sign-ex",
            &format!("printf '%s\\n' \"$@\" > {}; echo {}", marker.display(), out),
        );

        let snapshot = Hash::of_bytes(b"snap");
        let prev = Hash::of_bytes(b"prev-sig");
        sign(&store, &opts, &id, &snapshot, Some(&prev)).unwrap();

        let argv = std::fs::read_to_string(&marker).unwrap();
        let lines: Vec<_> = argv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ex::alice".to_string(),
                snapshot.to_string(),
                prev.to_string()
            ]
        );
    }

    #[test]
    fn test_failed_sign_does_not_advance_index() {
        let (dir, store, opts) = setup();
        let id = Identity::parse("ex::alice").unwrap();
        install_helper(
            dir.path().join("helpers").as_path(),
            "rvcs-sign-ex",
            "exit 1",
        );

        let snapshot = Hash::of_bytes(b"snap");
        assert!(sign(&store, &opts, &id, &snapshot, None).is_err());
        assert!(store.latest_signature_for_identity(&id).unwrap().is_none());
    }

    #[test]
    fn test_verify_returns_signed_hash() {
        let (dir, _store, opts) = setup();
        let id = Identity::parse("ex::alice").unwrap();
        let signed = Hash::of_bytes(b"the-snapshot");
        install_helper(
            dir.path().join("helpers").as_path(),
            "rvcs-verify-ex",
            &format!("echo {}", signed),
        );

        let sig = Hash::of_bytes(b"sig");
        assert_eq!(verify(&opts, &id, &sig).unwrap(), signed);
    }
}
