//! Peer registry — the local view of which peers have been greeted.
//!
//! Owned by the reconciler and mutated only there, so it is a plain map
//! with no locking. Entries are never removed.

use std::collections::hash_map::{self, HashMap};
use std::time::Instant;

/// A peer that answered our greeting.
#[derive(Debug)]
pub struct PeerEntry<H> {
    /// Open transport session to the peer.
    pub handle: H,
    /// Address the greeting went to.
    pub address: String,
    /// Greeting text the peer replied with.
    pub greeting: String,
    pub greeted_at: Instant,
}

#[derive(Debug)]
pub struct PeerRegistry<H> {
    peers: HashMap<String, PeerEntry<H>>,
}

impl<H> Default for PeerRegistry<H> {
    fn default() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }
}

impl<H> PeerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    /// Record a greeted peer. A second `put` for the same name replaces the
    /// entry and hands the old one back so its handle can be released.
    pub fn put(&mut self, name: impl Into<String>, entry: PeerEntry<H>) -> Option<PeerEntry<H>> {
        self.peers.insert(name.into(), entry)
    }

    pub fn get(&self, name: &str) -> Option<&PeerEntry<H>> {
        self.peers.get(name)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Known peer names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.peers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, PeerEntry<H>> {
        self.peers.iter()
    }
}

impl<'a, H> IntoIterator for &'a PeerRegistry<H> {
    type Item = (&'a String, &'a PeerEntry<H>);
    type IntoIter = hash_map::Iter<'a, String, PeerEntry<H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
