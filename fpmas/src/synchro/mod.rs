//! The synchronization-mode contract (`spec.md` §4.5) and its two
//! implementations.
//!
//! `spec.md` models three interfaces per mode — `SyncLinker`, `DataSync`,
//! and a `Mutex<T>` factory installed per node at insertion. This crate
//! unifies them into one [`SyncMode`] trait that [`ghost::GhostMode`] and
//! [`hard::HardSyncMode`] implement, keyed by node id rather than by a
//! stored per-node trait object: a literal `Box<dyn Mutex<T>>` field on
//! every [`crate::graph::Node`] would force the graph behind a shared,
//! interior-mutable handle just so the mutex could reach back into it,
//! for no behavioral difference. Dispatching through the active
//! [`SyncMode`] with the node id as key gives every caller the same
//! contract — [`crate::graph::DistributedGraph`] itself never inspects
//! which concrete mode is plugged in (`spec.md` §9's "the graph should
//! not know which mode it runs").

pub mod ghost;
pub mod hard;

use crate::graph::base::Graph;
use crate::graph::node::Edge;
use crate::{DistributedId, Result};

/// The operations a synchronization policy must provide so
/// [`crate::graph::DistributedGraph`] can stay agnostic to which one is
/// plugged in.
pub trait SyncMode<T> {
    /// Returns a clone of `id`'s current data, per `spec.md` §4.5's
    /// `Mutex::read`.
    fn mutex_read(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<T>;
    /// Releases a prior [`SyncMode::mutex_read`].
    fn mutex_release_read(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()>;
    /// Acquires exclusive access to `id`'s data, returning its current
    /// value.
    fn mutex_acquire(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<T>;
    /// Releases a prior [`SyncMode::mutex_acquire`], writing `data` back.
    fn mutex_release_acquire(&mut self, graph: &mut Graph<T>, id: DistributedId, data: T) -> Result<()>;
    /// Acquires an exclusive lock on `id` without reading its data.
    fn mutex_lock(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()>;
    /// Releases a prior [`SyncMode::mutex_lock`].
    fn mutex_unlock(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()>;
    /// Acquires a shared (reader) lock on `id`.
    fn mutex_lock_shared(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()>;
    /// Releases a prior [`SyncMode::mutex_lock_shared`].
    fn mutex_unlock_shared(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()>;

    /// Notified when `edge` is created, before it is necessarily visible
    /// to every process that needs to know about it.
    fn link(&mut self, graph: &mut Graph<T>, edge: Edge) -> Result<()>;
    /// Notified when `edge` is about to be erased locally.
    fn unlink(&mut self, graph: &mut Graph<T>, edge: Edge) -> Result<()>;
    /// Notified when node `id` is about to be erased locally.
    fn remove_node(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()>;

    /// Flushes pending link/unlink/remove-node notifications so every
    /// process converges on the same edge set.
    fn synchronize_links(&mut self, graph: &mut Graph<T>) -> Result<()>;
    /// Refreshes every `DISTANT` node's data from its owner.
    fn synchronize_data(&mut self, graph: &mut Graph<T>) -> Result<()>;
    /// Refreshes only `ids`' data, rather than every `DISTANT` node.
    fn synchronize_data_subset(&mut self, graph: &mut Graph<T>, ids: &[DistributedId]) -> Result<()>;

    /// `spec.md` §4.3: `SyncLinker::synchronize()` then
    /// `DataSync::synchronize()`.
    fn synchronize(&mut self, graph: &mut Graph<T>) -> Result<()> {
        self.synchronize_links(graph)?;
        self.synchronize_data(graph)
    }
}
