//! Pushing a signature out to configured mirrors
//!
//! Push has at-least-one-mirror semantics: every configured mirror is
//! attempted, individual failures are collected and logged, and the
//! operation only fails as a whole when no mirror accepted the signature.

use crate::helper::{run_helper_raw, PublishOptions};
use crate::settings::Settings;
use anyhow::{bail, Result};
use rvcs_core::{Hash, Identity, Mirror};

/// Which mirrors accepted the push and which did not.
#[derive(Debug, Default)]
pub struct PushReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl PushReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }
}

/// Send `signature` to every push mirror configured for `identity`.
///
/// Helper argv: `<helper_flags…> <mirror_url> <id_full> <signature_hash>`.
pub fn push(
    settings: &Settings,
    opts: &PublishOptions,
    identity: &Identity,
    signature: &Hash,
) -> Result<PushReport> {
    let mirrors = settings.push_mirrors_for(identity);
    let mut report = PushReport::default();

    for mirror in &mirrors {
        match push_to(opts, identity, mirror, signature) {
            Ok(()) => report.succeeded.push(mirror.url.clone()),
            Err(e) => {
                tracing::warn!("push to {} failed for {}: {:#}", mirror, identity, e);
                report.failed.push((mirror.url.clone(), format!("{:#}", e)));
            }
        }
    }

    if !mirrors.is_empty() && report.succeeded.is_empty() {
        let reasons: Vec<String> = report
            .failed
            .iter()
            .map(|(url, err)| format!("{}: {}", url, err))
            .collect();
        bail!(
            "failure pushing {} to every configured mirror:\n{}",
            identity,
            reasons.join("\n")
        );
    }
    Ok(report)
}

fn push_to(
    opts: &PublishOptions,
    identity: &Identity,
    mirror: &Mirror,
    signature: &Hash,
) -> Result<()> {
    let helper = format!("rvcs-push-{}", mirror.scheme());
    let mut args = mirror.helper_flags.clone();
    args.push(mirror.url.clone());
    args.push(identity.to_string());
    args.push(signature.to_string());
    run_helper_raw(opts, &helper, &args)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::testing::install_helper;
    use rvcs_core::Mirror;

    struct Fixture {
        dir: tempfile::TempDir,
        opts: PublishOptions,
        id: Identity,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let helpers = dir.path().join("helpers");
        std::fs::create_dir(&helpers).unwrap();
        Fixture {
            opts: PublishOptions {
                helper_dir: Some(helpers),
            },
            id: Identity::parse("ex::u").unwrap(),
            dir,
        }
    }

    impl Fixture {
        fn helpers(&self) -> std::path::PathBuf {
            self.dir.path().join("helpers")
        }

        fn settings_with_mirrors(&self, urls: &[&str]) -> Settings {
            let mut settings = Settings::default();
            for url in urls {
                settings.add_mirror(&self.id, Mirror::parse(url).unwrap(), false);
            }
            settings
        }
    }

    #[test]
    fn test_push_with_no_mirrors_is_a_noop() {
        let fx = fixture();
        let report = push(
            &Settings::default(),
            &fx.opts,
            &fx.id,
            &Hash::of_bytes(b"sig"),
        )
        .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_push_reaches_every_mirror() {
        let fx = fixture();
        let log = fx.dir.path().join("pushed");
        install_helper(
            &fx.helpers(),
            "rvcs-push-mem",
            &format!("echo \"$1 $2 $3\" >> {}", log.display()),
        );

        let settings = fx.settings_with_mirrors(&["mem://a", "mem://b"]);
        let sig = Hash::of_bytes(b"sig");
        let report = push(&settings, &fx.opts, &fx.id, &sig).unwrap();

        assert_eq!(report.succeeded, vec!["mem://a", "mem://b"]);
        assert!(report.failed.is_empty());

        let lines: Vec<String> = std::fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(lines[0], format!("mem://a ex::u {}", sig));
        assert_eq!(lines[1], format!("mem://b ex::u {}", sig));
    }

    #[test]
    fn test_partial_failure_is_reported_not_fatal() {
        let fx = fixture();
        // Fails for mirror a, succeeds for anything else
        install_helper(
            &fx.helpers(),
            "rvcs-push-mem",
            "if [ \"$1\" = mem://a ]; then echo nope >&2; exit 1; fi",
        );

        let settings = fx.settings_with_mirrors(&["mem://a", "mem://b"]);
        let report = push(&settings, &fx.opts, &fx.id, &Hash::of_bytes(b"sig")).unwrap();

        assert_eq!(report.succeeded, vec!["mem://b"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "mem://a");
        assert!(report.failed[0].1.contains("nope"));
    }

    #[test]
    fn test_all_mirrors_failing_is_an_error() {
        let fx = fixture();
        install_helper(&fx.helpers(), "rvcs-push-mem", "exit 1");

        let settings = fx.settings_with_mirrors(&["mem://a", "mem://b"]);
        let err = push(&settings, &fx.opts, &fx.id, &Hash::of_bytes(b"sig")).unwrap_err();
        assert!(err.to_string().contains("every configured mirror"));
    }
}
