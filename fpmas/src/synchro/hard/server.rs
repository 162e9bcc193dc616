//! The per-node mutex state machine `HardSyncMode` keeps for every id it
//! owns, grounded on
//! `original_source/src/main/graph/parallel/synchro/hard/mutex_server.h`.
//!
//! This module only tracks *state*: who holds what, and who is queued for
//! what. It never touches the network; [`super::HardSyncMode`] drives it
//! and turns its [`Grant`]s into actual responses, so the queueing policy
//! can be unit-tested without a communicator.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{DistributedId, Rank};

/// The kind of exclusive or shared access a queued/granted request wants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantKind {
    /// Shared access, with data (`READ`/`READ_RESPONSE`).
    Read,
    /// Shared access, without data (`LOCK_SHARED`/`LOCK_SHARED_RESPONSE`).
    LockShared,
    /// Exclusive access, without data (`LOCK`/`LOCK_RESPONSE`).
    Lock,
    /// Exclusive access, with data (`ACQUIRE`/`ACQUIRE_RESPONSE`).
    Acquire,
}

impl GrantKind {
    fn is_shared(self) -> bool {
        matches!(self, GrantKind::Read | GrantKind::LockShared)
    }
}

/// A request granted to `rank`, of kind `kind`: the caller must now send
/// the corresponding response (data for `Read`/`Acquire`, an ack for
/// `Lock`/`LockShared`) to `rank`.
#[derive(Clone, Copy, Debug)]
pub struct Grant {
    pub rank: Rank,
    pub kind: GrantKind,
}

#[derive(Default)]
struct MutexState {
    locked: bool,
    shared_count: u32,
    shared_queue: VecDeque<(Rank, GrantKind)>,
    exclusive_queue: VecDeque<(Rank, GrantKind)>,
}

/// Whether a request against a node managed by this server was granted on
/// the spot or had to be queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Granted,
    Queued,
}

/// Tracks lock state for every node this process owns, draining queued
/// requests as locks are released. Tombstoned ids (removed while a remote
/// request might still be in flight, `DESIGN.md` Open Question 2) are
/// remembered so a late-arriving request against them is dropped rather
/// than panicking.
#[derive(Default)]
pub struct MutexServer {
    nodes: HashMap<DistributedId, MutexState>,
    tombstones: HashSet<DistributedId>,
}

impl MutexServer {
    pub fn new() -> Self {
        MutexServer::default()
    }

    /// Marks `id` as no longer managed here: a request arriving for it
    /// after this call is silently dropped by the caller instead of being
    /// queued forever.
    pub fn tombstone(&mut self, id: DistributedId) {
        self.nodes.remove(&id);
        self.tombstones.insert(id);
    }

    pub fn is_tombstoned(&self, id: DistributedId) -> bool {
        self.tombstones.contains(&id)
    }

    /// Grants `kind` against `id` immediately if available, without
    /// queuing a rejection — used for a node's *owner* accessing its own
    /// `LOCAL` data, which has no remote rank to queue a rejected request
    /// under and instead just retries after servicing the network.
    pub fn try_grant_local(&mut self, id: DistributedId, kind: GrantKind) -> bool {
        let state = self.nodes.entry(id).or_default();
        if kind.is_shared() {
            if !state.locked && state.exclusive_queue.is_empty() {
                state.shared_count += 1;
                true
            } else {
                false
            }
        } else if !state.locked && state.shared_count == 0 {
            state.locked = true;
            true
        } else {
            false
        }
    }

    /// Registers a request of `kind` from `rank` against `id`: grants it
    /// immediately if the policy allows, otherwise queues it.
    pub fn request(&mut self, id: DistributedId, rank: Rank, kind: GrantKind) -> Outcome {
        let state = self.nodes.entry(id).or_default();
        if kind.is_shared() {
            if !state.locked && state.exclusive_queue.is_empty() {
                state.shared_count += 1;
                Outcome::Granted
            } else {
                state.shared_queue.push_back((rank, kind));
                Outcome::Queued
            }
        } else if !state.locked && state.shared_count == 0 {
            state.locked = true;
            Outcome::Granted
        } else {
            state.exclusive_queue.push_back((rank, kind));
            Outcome::Queued
        }
    }

    /// Releases one previously-granted shared access (`UNLOCK_SHARED`,
    /// covering both `release_read` and `unlock_shared`), returning the
    /// requests this unblocks.
    pub fn release_shared(&mut self, id: DistributedId) -> Vec<Grant> {
        let Some(state) = self.nodes.get_mut(&id) else { return Vec::new() };
        state.shared_count = state.shared_count.saturating_sub(1);
        if state.shared_count == 0 {
            Self::drain(state)
        } else {
            Vec::new()
        }
    }

    /// Releases the exclusive lock (`UNLOCK`/`RELEASE_ACQUIRE`), returning
    /// the requests this unblocks.
    pub fn release_exclusive(&mut self, id: DistributedId) -> Vec<Grant> {
        let Some(state) = self.nodes.get_mut(&id) else { return Vec::new() };
        state.locked = false;
        Self::drain(state)
    }

    /// Grants every queued shared request, then — only if no shared
    /// reader remains — grants exactly one queued exclusive request,
    /// FIFO, so no waiting `ACQUIRE`/`LOCK` is starved behind a steady
    /// stream of shared requests once the shared queue runs dry.
    fn drain(state: &mut MutexState) -> Vec<Grant> {
        let mut grants = Vec::new();
        while let Some((rank, kind)) = state.shared_queue.pop_front() {
            state.shared_count += 1;
            grants.push(Grant { rank, kind });
        }
        if state.shared_count == 0 {
            if let Some((rank, kind)) = state.exclusive_queue.pop_front() {
                state.locked = true;
                grants.push(Grant { rank, kind });
            }
        }
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> DistributedId {
        DistributedId::new(0, 0)
    }

    #[test]
    fn concurrent_shared_requests_are_all_granted() {
        let mut server = MutexServer::new();
        assert_eq!(server.request(id(), 1, GrantKind::Read), Outcome::Granted);
        assert_eq!(server.request(id(), 2, GrantKind::LockShared), Outcome::Granted);
    }

    #[test]
    fn exclusive_request_queues_behind_a_held_lock_and_drains_on_release() {
        let mut server = MutexServer::new();
        assert_eq!(server.request(id(), 1, GrantKind::Acquire), Outcome::Granted);
        assert_eq!(server.request(id(), 2, GrantKind::Acquire), Outcome::Queued);
        let grants = server.release_exclusive(id());
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].rank, 2);
        assert_eq!(grants[0].kind, GrantKind::Acquire);
    }

    #[test]
    fn shared_request_queues_behind_an_exclusive_lock() {
        let mut server = MutexServer::new();
        server.request(id(), 1, GrantKind::Lock);
        assert_eq!(server.request(id(), 2, GrantKind::Read), Outcome::Queued);
        let grants = server.release_exclusive(id());
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].kind, GrantKind::Read);
    }

    #[test]
    fn shared_request_queues_behind_a_waiting_exclusive_request_instead_of_jumping_it() {
        let mut server = MutexServer::new();
        server.request(id(), 1, GrantKind::Read);
        assert_eq!(server.request(id(), 2, GrantKind::Acquire), Outcome::Queued);
        // A third rank's shared request arrives while rank 2's exclusive
        // request is still queued: it must not be granted ahead of rank 2,
        // or rank 2 starves as long as reads keep arriving.
        assert_eq!(server.request(id(), 3, GrantKind::Read), Outcome::Queued);
        let grants = server.release_shared(id());
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].rank, 2);
        assert_eq!(grants[0].kind, GrantKind::Acquire);
    }

    #[test]
    fn locked_and_shared_simultaneously_is_unreachable() {
        let mut server = MutexServer::new();
        server.request(id(), 1, GrantKind::Read);
        assert_eq!(server.request(id(), 2, GrantKind::Acquire), Outcome::Queued);
        // Shared reader releases; exclusive waiter is granted, never both
        // held at once.
        let grants = server.release_shared(id());
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].kind, GrantKind::Acquire);
    }
}
