use std::collections::{HashMap, VecDeque};

use crate::game::LegalityMode;
use crate::lobby::ConnId;

/// FIFO of connections waiting for an opponent, one pool per legality mode.
#[derive(Debug, Default)]
pub struct MatchQueue {
    pools: HashMap<LegalityMode, VecDeque<ConnId>>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` at the back of its mode's pool. A connection is only ever
    /// waiting once; re-joining moves it to the back of the new pool.
    pub fn enqueue(&mut self, conn: ConnId, mode: LegalityMode) {
        self.remove(conn);
        self.pools.entry(mode).or_default().push_back(conn);
    }

    pub fn remove(&mut self, conn: ConnId) -> bool {
        let mut removed = false;
        for pool in self.pools.values_mut() {
            let before = pool.len();
            pool.retain(|&waiting| waiting != conn);
            removed |= pool.len() != before;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops closed connections; returns how many were removed.
    pub fn purge(&mut self, is_open: impl Fn(ConnId) -> bool) -> usize {
        let mut purged = 0;
        for pool in self.pools.values_mut() {
            let before = pool.len();
            pool.retain(|&conn| is_open(conn));
            purged += before - pool.len();
        }
        purged
    }

    /// Removes and returns the two oldest live entries of the first pool
    /// that has two.
    pub fn take_pair(&mut self, is_open: impl Fn(ConnId) -> bool) -> Option<(ConnId, ConnId, LegalityMode)> {
        self.purge(&is_open);
        for mode in LegalityMode::ALL {
            let Some(pool) = self.pools.get_mut(&mode) else {
                continue;
            };
            if pool.len() < 2 {
                continue;
            }
            let first = pool.pop_front()?;
            let second = pool.pop_front()?;
            debug_assert_ne!(first, second);
            return Some((first, second, mode));
        }
        None
    }
}
