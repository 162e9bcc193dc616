//! Globally unique node/edge identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// An MPI process rank.
pub type Rank = i32;

/// A globally unique identifier, minted once by its `origin_rank` and never
/// reassigned. Serves as both node id and edge id.
///
/// Equality and ordering are structural over `(origin_rank, counter)`;
/// hashing combines both fields (the derived `Hash` impl does this for us).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DistributedId {
    origin_rank: Rank,
    counter: u64,
}

impl DistributedId {
    /// Builds an id directly. Only [`IdCounter`] should normally do this,
    /// so that `counter` values minted by a given `origin_rank` are unique;
    /// this constructor is exposed for deserialization and tests.
    pub fn new(origin_rank: Rank, counter: u64) -> Self {
        DistributedId { origin_rank, counter }
    }

    /// The rank that minted this id, and its permanent registrar.
    pub fn origin_rank(&self) -> Rank {
        self.origin_rank
    }

    /// The per-origin monotonic counter component.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl fmt::Debug for DistributedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.origin_rank, self.counter)
    }
}

impl fmt::Display for DistributedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin_rank, self.counter)
    }
}

/// A monotonic, per-rank id minter.
///
/// Each process owns exactly one `IdCounter` per id "layer" (e.g. one for
/// nodes, one per edge layer), so that ids it mints never collide with ids
/// minted by any other rank (the rank is baked into every id) or by itself
/// under a different layer.
pub struct IdCounter {
    origin_rank: Rank,
    next: AtomicU64,
}

impl IdCounter {
    /// Creates a counter that mints ids attributed to `origin_rank`,
    /// starting from zero.
    pub fn new(origin_rank: Rank) -> Self {
        IdCounter { origin_rank, next: AtomicU64::new(0) }
    }

    /// Mints the next id for this rank.
    pub fn next(&self) -> DistributedId {
        let counter = self.next.fetch_add(1, Ordering::Relaxed);
        DistributedId::new(self.origin_rank, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_counter() {
        let counter = IdCounter::new(2);
        let a = counter.next();
        let b = counter.next();
        assert_ne!(a, b);
        assert_eq!(a.origin_rank(), 2);
        assert_eq!(b.counter(), a.counter() + 1);
    }

    #[test]
    fn ordering_is_lexicographic_on_rank_then_counter() {
        let a = DistributedId::new(0, 5);
        let b = DistributedId::new(1, 0);
        assert!(a < b);
        let c = DistributedId::new(0, 6);
        assert!(a < c);
    }
}
