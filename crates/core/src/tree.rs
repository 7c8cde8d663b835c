//! Directory trees: name-to-snapshot mappings with a sorted byte layout

use crate::hash::Hash;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;

/// The contents of a directory snapshot.
///
/// Keys are single path components. Serialization is one
/// `<name>\t<hash>\n` line per entry, ascending byte-wise by name; the
/// sort order is part of the content hash and must never change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, Hash>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a child snapshot under `name`.
    ///
    /// Names are single components: separators, tabs and newlines would
    /// corrupt the canonical layout and are rejected.
    pub fn insert(&mut self, name: impl Into<String>, hash: Hash) -> Result<()> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\t', '\n']) {
            bail!("invalid tree entry name {:?}", name);
        }
        self.entries.insert(name, hash);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Hash> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hash)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Canonical bytes. Identical mappings serialize identically no matter
    /// the insertion order.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (name, hash) in &self.entries {
            out.push_str(name);
            out.push('\t');
            out.push_str(&hash.to_string());
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Inverse of [`Tree::to_canonical_bytes`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).context("tree object is not UTF-8")?;
        let mut tree = Tree::new();
        for line in text.lines() {
            let (name, hash) = line
                .split_once('\t')
                .with_context(|| format!("malformed tree entry {:?}", line))?;
            tree.insert(name, Hash::parse(hash)?)?;
        }
        Ok(tree)
    }
}
