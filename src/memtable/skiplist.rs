//! Arena-backed skip list
//!
//! ```text
//! Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
//! ```
//!
//! Nodes live in a `Vec` and link to each other by index, so there is no
//! unsafe code and `clear()` is a plain arena reset. Level 0 always chains
//! every node in ascending key order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum tower height
pub const MAX_HEIGHT: usize = 12;

/// Probability of granting each additional level
const BRANCH_PROBABILITY: f64 = 0.5;

type Links = [Option<usize>; MAX_HEIGHT];

struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    next: Links,
}

/// Sorted map from byte keys to byte values with upsert semantics
pub struct SkipList {
    nodes: Vec<Node>,
    head: Links,
    /// Number of levels currently in use (at least 1)
    height: usize,
    rng: StdRng,
}

impl SkipList {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic tower heights, for tests and benchmarks
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            nodes: Vec::new(),
            head: [None; MAX_HEIGHT],
            height: 1,
            rng,
        }
    }

    /// Insert or overwrite. Returns the previous value when the key existed.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        // update[level] = rightmost node with key < target (None = head)
        let mut update: [Option<usize>; MAX_HEIGHT] = [None; MAX_HEIGHT];
        let mut current: Option<usize> = None;

        for level in (0..self.height).rev() {
            while let Some(next) = self.next_of(current, level) {
                if self.nodes[next].key.as_slice() < key.as_slice() {
                    current = Some(next);
                } else {
                    break;
                }
            }
            update[level] = current;
        }

        if let Some(candidate) = self.next_of(current, 0) {
            if self.nodes[candidate].key == key {
                return Some(std::mem::replace(&mut self.nodes[candidate].value, value));
            }
        }

        let height = self.random_height();
        if height > self.height {
            // update[] is already None (head) for the new levels
            self.height = height;
        }

        let index = self.nodes.len();
        let mut next: Links = [None; MAX_HEIGHT];
        for (level, link) in next.iter_mut().enumerate().take(height) {
            *link = self.next_of(update[level], level);
        }
        self.nodes.push(Node { key, value, next });

        for (level, pred) in update.iter().enumerate().take(height) {
            match *pred {
                Some(pred) => self.nodes[pred].next[level] = Some(index),
                None => self.head[level] = Some(index),
            }
        }

        None
    }

    /// Look up a key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let mut current: Option<usize> = None;

        for level in (0..self.height).rev() {
            while let Some(next) = self.next_of(current, level) {
                if self.nodes[next].key.as_slice() < key {
                    current = Some(next);
                } else {
                    break;
                }
            }
        }

        self.next_of(current, 0)
            .map(|index| &self.nodes[index])
            .filter(|node| node.key == key)
            .map(|node| node.value.as_slice())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ascending iteration along level 0. Each call starts from the front.
    pub fn iter(&self) -> SkipListIter<'_> {
        SkipListIter {
            list: self,
            next: self.head[0],
        }
    }

    /// Drop every entry but keep the arena's allocation
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = [None; MAX_HEIGHT];
        self.height = 1;
    }

    /// Current number of levels in use
    pub fn height(&self) -> usize {
        self.height
    }

    fn next_of(&self, node: Option<usize>, level: usize) -> Option<usize> {
        match node {
            Some(index) => self.nodes[index].next[level],
            None => self.head[level],
        }
    }

    fn random_height(&mut self) -> usize {
        let mut height = 1;
        while height < MAX_HEIGHT && self.rng.gen_bool(BRANCH_PROBABILITY) {
            height += 1;
        }
        height
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over skip list entries in ascending key order
pub struct SkipListIter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
}

impl<'a> Iterator for SkipListIter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let node = &list.nodes[self.next?];
        self.next = node.next[0];
        Some((node.key.as_slice(), node.value.as_slice()))
    }
}
