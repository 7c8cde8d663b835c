//! Ancestry enumeration over the snapshot parent DAG

use ahash::AHashSet;
use anyhow::Result;
use rvcs_core::{File, Hash, Store};
use std::collections::VecDeque;

/// One visited snapshot in a history walk.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub hash: Hash,
    pub file: File,
}

/// Enumerate the ancestors of `head`, inclusive, breadth-first.
///
/// Parents are visited in record order, each snapshot exactly once; the
/// content-addressed DAG plus the visited set guarantee termination. A
/// negative `limit` means unbounded.
pub fn read_log(store: &Store, head: &Hash, limit: i64) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    let mut visited: AHashSet<Hash> = AHashSet::new();
    let mut queue: VecDeque<Hash> = VecDeque::new();
    visited.insert(head.clone());
    queue.push_back(head.clone());

    while let Some(hash) = queue.pop_front() {
        if limit >= 0 && entries.len() as i64 >= limit {
            break;
        }
        let file = store.read_snapshot(&hash)?;
        for parent in &file.parents {
            if visited.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }
        entries.push(LogEntry { hash, file });
    }
    Ok(entries)
}

/// Whether `base` appears in the ancestry of `head`.
///
/// The absent snapshot (`None`) is an ancestor of every snapshot.
pub fn is_ancestor(store: &Store, base: Option<&Hash>, head: &Hash) -> Result<bool> {
    let Some(base) = base else {
        return Ok(true);
    };
    if base == head {
        return Ok(true);
    }
    for entry in read_log(store, head, -1)? {
        if entry.hash == *base {
            return Ok(true);
        }
    }
    Ok(false)
}

struct Walker {
    queue: VecDeque<Hash>,
    seen: AHashSet<Hash>,
}

impl Walker {
    fn new(start: &Hash) -> Self {
        let mut seen = AHashSet::new();
        seen.insert(start.clone());
        let mut queue = VecDeque::new();
        queue.push_back(start.clone());
        Self { queue, seen }
    }

    fn step(&mut self, store: &Store) -> Result<Option<Hash>> {
        let Some(hash) = self.queue.pop_front() else {
            return Ok(None);
        };
        let file = store.read_snapshot(&hash)?;
        for parent in &file.parents {
            if self.seen.insert(parent.clone()) {
                self.queue.push_back(parent.clone());
            }
        }
        Ok(Some(hash))
    }

    fn exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Lowest common ancestor of `a` and `b` in the parent DAG.
///
/// Both ancestor sets are expanded in interleaved breadth-first fashion;
/// the first snapshot discovered from both sides is the most specific
/// common ancestor. Disjoint histories yield `None`, never an error.
pub fn merge_base(store: &Store, a: &Hash, b: &Hash) -> Result<Option<Hash>> {
    let mut walk_a = Walker::new(a);
    let mut walk_b = Walker::new(b);
    loop {
        if let Some(h) = walk_a.step(store)? {
            if walk_b.seen.contains(&h) {
                return Ok(Some(h));
            }
        }
        if let Some(h) = walk_b.step(store)? {
            if walk_a.seen.contains(&h) {
                return Ok(Some(h));
            }
        }
        if walk_a.exhausted() && walk_b.exhausted() {
            return Ok(None);
        }
    }
}
