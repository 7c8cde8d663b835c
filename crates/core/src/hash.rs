//! Content-address primitives for snapshot objects

use crate::error::InvalidHash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};

/// The only digest algorithm the store currently produces.
pub const SHA256: &str = "sha256";

/// A content address of the form `<algo>:<hex>`.
///
/// Two hashes are equal iff both the algorithm and the (lowercase) hex
/// digest match. Absence of an object is modeled as `Option<Hash>`, never
/// as a sentinel value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash {
    algorithm: String,
    hex: String,
}

impl Hash {
    /// Parse the textual form `<algo>:<hex>`.
    ///
    /// Surrounding whitespace (including a trailing newline from helper
    /// output) is ignored. Unknown algorithms and malformed digests are
    /// rejected with [`InvalidHash`].
    pub fn parse(s: &str) -> Result<Self, InvalidHash> {
        let trimmed = s.trim();
        let (algorithm, hex) = trimmed
            .split_once(':')
            .ok_or_else(|| InvalidHash(trimmed.to_string()))?;
        if algorithm != SHA256 {
            return Err(InvalidHash(trimmed.to_string()));
        }
        if hex.len() != 64 || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(InvalidHash(trimmed.to_string()));
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// Hash of an in-memory byte string.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self::from_digest(hasher)
    }

    pub(crate) fn from_digest(hasher: Sha256) -> Self {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        Self {
            algorithm: SHA256.to_string(),
            hex,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Lowercase hex digest without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// First eight hex characters, for compact display.
    pub fn short(&self) -> &str {
        &self.hex[..8]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}:{})", self.algorithm, &self.hex[..8])
    }
}

impl TryFrom<String> for Hash {
    type Error = InvalidHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Hash::parse(&s)
    }
}

impl From<Hash> for String {
    fn from(h: Hash) -> String {
        h.to_string()
    }
}

/// Streaming SHA-256 over a reader, consuming at most `limit` bytes.
///
/// Everything read is forwarded to `sink`, so callers can hash and persist
/// in a single pass.
pub fn hash_reader_into(
    mut reader: impl Read,
    limit: u64,
    mut sink: impl Write,
) -> std::io::Result<Hash> {
    let mut hasher = Sha256::new();
    let mut remaining = limit;
    let mut buf = [0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        sink.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(Hash::from_digest(hasher))
}
