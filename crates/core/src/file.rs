//! Snapshot File records and their canonical byte layout
//!
//! The serialized form is part of the identity contract: the same record
//! must produce the same bytes (and therefore the same hash) on every
//! implementation.
//!
//! ```text
//! mode <modeline>\n
//! contents <hash>\n
//! parent <hash>\n        (zero or more, construction order)
//! ```

use crate::hash::Hash;
use anyhow::{bail, Context, Result};
use std::fmt;

/// An `ls`-style textual mode descriptor, e.g. `drwxr-xr-x` or
/// `-rw-r--r--`. The leading byte encodes the node type: `d` for
/// directories, `L` for symbolic links, `-` for regular files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeLine(String);

impl ModeLine {
    /// Build the descriptor from filesystem metadata (Unix).
    pub fn from_metadata(md: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let kind = if md.file_type().is_symlink() {
            'L'
        } else if md.is_dir() {
            'd'
        } else {
            '-'
        };
        let bits = md.permissions().mode();
        Self(format!("{}{}", kind, render_permissions(bits)))
    }

    /// Accept a previously serialized descriptor.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != 10 || !matches!(s.as_bytes()[0], b'd' | b'L' | b'-') {
            bail!("invalid mode line {:?}", s);
        }
        Ok(Self(s.to_string()))
    }

    pub fn is_dir(&self) -> bool {
        self.0.starts_with('d')
    }

    pub fn is_symlink(&self) -> bool {
        self.0.starts_with('L')
    }

    /// Recover the numeric permission bits (including setuid/setgid/sticky)
    /// for materializing a snapshot back onto the filesystem.
    pub fn permission_bits(&self) -> u32 {
        parse_permissions(&self.0.as_bytes()[1..])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn render_permissions(bits: u32) -> String {
    let mut out = String::with_capacity(9);
    let triads = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];
    for (r, w, x, special, special_char) in triads {
        out.push(if bits & r != 0 { 'r' } else { '-' });
        out.push(if bits & w != 0 { 'w' } else { '-' });
        out.push(match (bits & x != 0, bits & special != 0) {
            (true, false) => 'x',
            (false, false) => '-',
            (true, true) => special_char,
            (false, true) => special_char.to_ascii_uppercase(),
        });
    }
    out
}

fn parse_permissions(chars: &[u8]) -> u32 {
    let mut bits = 0u32;
    let positions = [
        (0o400, 0o200, 0o100, 0o4000),
        (0o040, 0o020, 0o010, 0o2000),
        (0o004, 0o002, 0o001, 0o1000),
    ];
    for (i, (r, w, x, special)) in positions.into_iter().enumerate() {
        let triad = &chars[i * 3..i * 3 + 3];
        if triad[0] == b'r' {
            bits |= r;
        }
        if triad[1] == b'w' {
            bits |= w;
        }
        match triad[2] {
            b'x' => bits |= x,
            b's' | b't' => bits |= x | special,
            b'S' | b'T' => bits |= special,
            _ => {}
        }
    }
    bits
}

/// One snapshot of one filesystem node.
///
/// `contents` points at raw file bytes, a symlink target string, or a
/// serialized [`crate::tree::Tree`], depending on `mode`. `parents` are
/// the immediately preceding snapshots of the same path: empty for an
/// initial snapshot, one entry for an ordinary edit, several for a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub mode: ModeLine,
    pub contents: Hash,
    pub parents: Vec<Hash>,
}

impl File {
    /// Canonical bytes; their SHA-256 is the snapshot's identity.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("mode ");
        out.push_str(self.mode.as_str());
        out.push('\n');
        out.push_str("contents ");
        out.push_str(&self.contents.to_string());
        out.push('\n');
        for parent in &self.parents {
            out.push_str("parent ");
            out.push_str(&parent.to_string());
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Inverse of [`File::to_canonical_bytes`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).context("snapshot record is not UTF-8")?;
        let mut lines = text.lines();

        let mode_line = lines
            .next()
            .and_then(|l| l.strip_prefix("mode "))
            .context("snapshot record is missing the mode line")?;
        let contents_line = lines
            .next()
            .and_then(|l| l.strip_prefix("contents "))
            .context("snapshot record is missing the contents line")?;

        let mode = ModeLine::parse(mode_line)?;
        let contents = Hash::parse(contents_line)?;
        let mut parents = Vec::new();
        for line in lines {
            let parent = line
                .strip_prefix("parent ")
                .with_context(|| format!("unexpected line {:?} in snapshot record", line))?;
            parents.push(Hash::parse(parent)?);
        }
        Ok(Self {
            mode,
            contents,
            parents,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }
}
