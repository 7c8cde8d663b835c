//! Mirror configuration
//!
//! Stored as JSON at `<store>/settings.json` and written with the same
//! atomic rename pattern as every other piece of mutable state.

use anyhow::{Context, Result};
use rvcs_core::{Identity, Mirror, Store};
use serde::{Deserialize, Serialize};
use std::fs;

/// Mirrors configured for one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    pub name: String,
    #[serde(default)]
    pub pull_mirrors: Vec<Mirror>,
    #[serde(default)]
    pub push_mirrors: Vec<Mirror>,
}

/// The full mirror configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub identities: Vec<IdentitySettings>,
    /// Mirrors consulted for every identity, after the identity-specific
    /// ones.
    pub additional_pull_mirrors: Vec<Mirror>,
    pub additional_push_mirrors: Vec<Mirror>,
}

impl Settings {
    /// Read the configuration next to the store; absent file means empty
    /// configuration.
    pub fn load(store: &Store) -> Result<Self> {
        let path = store.settings_path();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("failure parsing {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("failure reading {}", path.display())),
        }
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        store.atomic_write(&store.settings_path(), &bytes)
    }

    /// Register a mirror for `identity`. Read-only mirrors are only ever
    /// pulled from.
    pub fn add_mirror(&mut self, identity: &Identity, mirror: Mirror, read_only: bool) {
        let entry = self.entry_mut(identity);
        if !entry.pull_mirrors.iter().any(|m| m.url == mirror.url) {
            entry.pull_mirrors.push(mirror.clone());
        }
        if !read_only && !entry.push_mirrors.iter().any(|m| m.url == mirror.url) {
            entry.push_mirrors.push(mirror);
        }
    }

    /// Drop `url` from both mirror lists of `identity`. Returns whether
    /// anything was removed.
    pub fn remove_mirror(&mut self, identity: &Identity, url: &str) -> bool {
        let name = identity.to_string();
        let Some(entry) = self.identities.iter_mut().find(|i| i.name == name) else {
            return false;
        };
        let before = entry.pull_mirrors.len() + entry.push_mirrors.len();
        entry.pull_mirrors.retain(|m| m.url != url);
        entry.push_mirrors.retain(|m| m.url != url);
        let removed = entry.pull_mirrors.len() + entry.push_mirrors.len() < before;
        if entry.pull_mirrors.is_empty() && entry.push_mirrors.is_empty() {
            self.identities.retain(|i| i.name != name);
        }
        removed
    }

    /// Pull mirrors in consultation order: identity-specific first, then
    /// the additional ones.
    pub fn pull_mirrors_for(&self, identity: &Identity) -> Vec<&Mirror> {
        self.mirrors_for(identity, |i| &i.pull_mirrors, &self.additional_pull_mirrors)
    }

    pub fn push_mirrors_for(&self, identity: &Identity) -> Vec<&Mirror> {
        self.mirrors_for(identity, |i| &i.push_mirrors, &self.additional_push_mirrors)
    }

    fn mirrors_for<'a>(
        &'a self,
        identity: &Identity,
        select: impl Fn(&'a IdentitySettings) -> &'a Vec<Mirror>,
        additional: &'a [Mirror],
    ) -> Vec<&'a Mirror> {
        let name = identity.to_string();
        let mut out: Vec<&Mirror> = Vec::new();
        for entry in self.identities.iter().filter(|i| i.name == name) {
            out.extend(select(entry));
        }
        out.extend(additional);
        out
    }

    fn entry_mut(&mut self, identity: &Identity) -> &mut IdentitySettings {
        let name = identity.to_string();
        if let Some(idx) = self.identities.iter().position(|i| i.name == name) {
            return &mut self.identities[idx];
        }
        self.identities.push(IdentitySettings {
            name,
            pull_mirrors: Vec::new(),
            push_mirrors: Vec::new(),
        });
        self.identities.last_mut().unwrap()
    }
}
