//! Seeded ordering keys for k-mer encodings
//!
//! With `hash_representations` on, a window picks its minimum over these
//! keys instead of the raw 2-bit encodings, so poly-A runs and other low
//! complexity k-mers stop crowding the front of the order. Keys depend on
//! the seed alone: indices built with the same seed group identically.

use ahash::RandomState;
use std::hash::BuildHasher;

use crate::types::Representation;

/// Maps k-mer encodings to seeded representation keys
#[derive(Clone)]
pub struct RepresentationHasher {
    seed: u64,
    state: RandomState,
}

impl RepresentationHasher {
    /// Key space fixed by `seed`
    pub fn new(seed: u64) -> Self {
        // ahash wants four keys; all of them come from the one seed.
        let state = RandomState::with_seeds(seed, !seed, seed.rotate_left(32), !seed.rotate_left(32));
        Self { seed, state }
    }

    /// Representation key of one encoded k-mer
    #[inline]
    pub fn key_of(&self, encoding: u64) -> Representation {
        self.state.hash_one(encoding)
    }
}

impl std::fmt::Debug for RepresentationHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepresentationHasher").field("seed", &self.seed).finish()
    }
}
