//! Hashing support for the crate's internal collections.
//!
//! Subscription sets are keyed by small integer ids the crate allocates
//! itself, so HashDoS resistance buys nothing. `StableHashBuilder` wraps
//! foldhash with a fixed seed: zero-sized, deterministic, and fast.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

/// Zero-sized `BuildHasher` with a fixed foldhash seed.
///
/// Every instance hashes identically, which keeps the iteration order of the
/// id sets reproducible across runs and costs nothing to store inside arena
/// metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct StableHashBuilder;

const SEED: u64 = 0x9e37_79b9_7f4a_7c15;

impl BuildHasher for StableHashBuilder {
    type Hasher = FoldHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(SEED).build_hasher()
    }
}
