//! Pulling newer signatures from configured mirrors
//!
//! Pull is a ratchet over the identity index: each mirror may propose a
//! newer signature, every new proposal must verify, and only the final
//! verified state is recorded. A mirror that fails aborts the whole pull
//! so the index never advances past an unverified signature.

use crate::helper::{run_helper, PublishOptions};
use crate::settings::Settings;
use crate::sign::verify;
use anyhow::{Context, Result};
use rvcs_core::{Hash, Identity, Mirror, ObjectNotFound, Store};

/// Consult every pull mirror configured for `identity` and return the
/// resulting `(signature, signed_snapshot)` pair, updating the identity
/// index to match.
pub fn pull(
    store: &Store,
    settings: &Settings,
    opts: &PublishOptions,
    identity: &Identity,
) -> Result<(Option<Hash>, Option<Hash>)> {
    let mut signature = store
        .latest_signature_for_identity(identity)
        .with_context(|| format!("failure looking up the previous signature for {}", identity))?;
    let mut signed = match &signature {
        Some(sig) => Some(verify(opts, identity, sig).with_context(|| {
            format!("failure verifying the previous signature for {}", identity)
        })?),
        None => None,
    };

    for mirror in settings.pull_mirrors_for(identity) {
        (signature, signed) =
            pull_from_and_verify(store, opts, identity, mirror, signature, signed).with_context(
                || format!("failure pulling the latest snapshot for {} from {}", identity, mirror),
            )?;
    }

    if let Some(sig) = &signature {
        store
            .update_signature_for_identity(identity, sig)
            .with_context(|| {
                format!("failure updating the latest signature for {} to {}", identity, sig)
            })?;
    }
    Ok((signature, signed))
}

/// Invoke one mirror's pull helper.
///
/// Helper argv: `<helper_flags…> <mirror_url> <id_full>
/// [<prev_signature_hash>]`; stdout is the signature the mirror considers
/// latest (possibly the one we sent).
fn pull_from(
    opts: &PublishOptions,
    identity: &Identity,
    mirror: &Mirror,
    prev: Option<&Hash>,
) -> Result<Hash> {
    let helper = format!("rvcs-pull-{}", mirror.scheme());
    let mut args = mirror.helper_flags.clone();
    args.push(mirror.url.clone());
    args.push(identity.to_string());
    if let Some(prev) = prev {
        args.push(prev.to_string());
    }
    run_helper(opts, &helper, &args)
}

fn pull_from_and_verify(
    store: &Store,
    opts: &PublishOptions,
    identity: &Identity,
    mirror: &Mirror,
    prev_signature: Option<Hash>,
    prev_signed: Option<Hash>,
) -> Result<(Option<Hash>, Option<Hash>)> {
    let new_signature = pull_from(opts, identity, mirror, prev_signature.as_ref())?;
    if Some(&new_signature) == prev_signature.as_ref() {
        return Ok((prev_signature, prev_signed));
    }
    // The helper must have delivered the signature object through the
    // shared store before announcing its hash.
    if !store.object_exists(&new_signature) {
        return Err(ObjectNotFound(new_signature.clone())).with_context(|| {
            format!(
                "the pull helper for {} announced a signature that is not in the local store",
                mirror
            )
        });
    }
    let new_signed = verify(opts, identity, &new_signature)?;
    Ok((Some(new_signature), Some(new_signed)))
}
