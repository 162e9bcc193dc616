//! [`Node`] and [`Edge`]: the graph's two entity types, grounded on
//! `original_source/src/fpmas/graph/distributed_node.h` and
//! `distributed_edge.h`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DistributedId, Rank};

/// Ownership state of a node or edge: whether this process holds the
/// authoritative copy (`LOCAL`) or a read-only replica (`DISTANT`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// This process owns the entity; its `data` may be mutated here.
    Local,
    /// This process holds a replica; `data` is read-only and may be stale
    /// until the next [`crate::graph::DistributedGraph::synchronize`].
    Distant,
}

/// An application-defined edge layer, newtype-wrapping a plain `i32` so
/// callers can define their own `enum` and convert into it (mirroring the
/// original's `SET_UP_LAYERS` macro intent without requiring a macro).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub i32);

impl From<i32> for LayerId {
    fn from(value: i32) -> Self {
        LayerId(value)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer({})", self.0)
    }
}

/// The default layer used when an application does not care to
/// distinguish edge kinds.
pub const DEFAULT_LAYER: LayerId = LayerId(0);

/// A node of the distributed graph: its payload `data`, a partitioning
/// `weight`, its ownership `state`, and the rank currently holding its
/// `LOCAL` copy.
///
/// Per `spec.md` §3: `state = Local ⇒ location == this process's rank`;
/// `data` is conceptually mutable only through the active
/// [`crate::synchro::SyncMode`]'s mutex, though this struct itself does
/// not enforce that — [`crate::graph::DistributedGraph`] is the
/// enforcement point, since the mutex is a property of *how* a node is
/// reached (through the graph), not of the node value itself.
#[derive(Clone, Debug)]
pub struct Node<T> {
    id: DistributedId,
    data: T,
    weight: f64,
    state: NodeState,
    location: Rank,
    incoming: HashMap<LayerId, Vec<DistributedId>>,
    outgoing: HashMap<LayerId, Vec<DistributedId>>,
}

impl<T> Node<T> {
    /// Builds a fresh `LOCAL` node owned by `rank`, with the original's
    /// default weight of `1.0` (`distributed_node.h`).
    pub fn new(id: DistributedId, data: T, rank: Rank) -> Self {
        Node::with_weight(id, data, 1.0, rank)
    }

    /// Builds a fresh `LOCAL` node with an explicit weight.
    pub fn with_weight(id: DistributedId, data: T, weight: f64, rank: Rank) -> Self {
        Node {
            id,
            data,
            weight,
            state: NodeState::Local,
            location: rank,
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }

    /// Builds a `DISTANT` replica received from `location`.
    pub fn distant(id: DistributedId, data: T, weight: f64, location: Rank) -> Self {
        Node {
            id,
            data,
            weight,
            state: NodeState::Distant,
            location,
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }

    /// This node's id.
    pub fn id(&self) -> DistributedId {
        self.id
    }

    /// A read-only view of the node's data. Under `HardSyncMode` this is
    /// only consistent for a `LOCAL` node or between
    /// acquire/release_acquire on a `DISTANT` one; reads of a `DISTANT`
    /// node otherwise go through
    /// [`crate::synchro::SyncMode`]'s mutex, not this accessor.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Mutable access to the node's data. Callers outside
    /// [`crate::graph::DistributedGraph`]'s own import/synchronize paths
    /// should prefer going through the active sync mode's mutex instead
    /// of calling this directly on a `DISTANT` node.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Overwrites this node's data in place, without reallocating the
    /// node — required so re-importing a `DISTANT` replica never
    /// invalidates adjacency references held elsewhere (`spec.md` §9).
    pub fn set_data(&mut self, data: T) {
        self.data = data;
    }

    /// The partitioning-hint weight, always `>= 0`.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Overwrites the weight.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Whether this process owns the node (`Local`) or holds a replica
    /// (`Distant`).
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Transitions this node's ownership state.
    pub fn set_state(&mut self, state: NodeState) {
        self.state = state;
    }

    /// The rank currently holding the `LOCAL` copy of this node.
    pub fn location(&self) -> Rank {
        self.location
    }

    /// Updates the cached current location.
    pub fn set_location(&mut self, location: Rank) {
        self.location = location;
    }

    /// Edge ids incoming to this node on `layer`.
    pub fn incoming(&self, layer: LayerId) -> &[DistributedId] {
        self.incoming.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edge ids outgoing from this node on `layer`.
    pub fn outgoing(&self, layer: LayerId) -> &[DistributedId] {
        self.outgoing.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every incoming edge id, across all layers.
    pub fn all_incoming(&self) -> impl Iterator<Item = DistributedId> + '_ {
        self.incoming.values().flatten().copied()
    }

    /// Every outgoing edge id, across all layers.
    pub fn all_outgoing(&self) -> impl Iterator<Item = DistributedId> + '_ {
        self.outgoing.values().flatten().copied()
    }

    /// Every incident edge id (incoming and outgoing), across all layers.
    pub fn all_incident(&self) -> impl Iterator<Item = DistributedId> + '_ {
        self.all_incoming().chain(self.all_outgoing())
    }

    pub(crate) fn attach_incoming(&mut self, layer: LayerId, edge: DistributedId) {
        self.incoming.entry(layer).or_default().push(edge);
    }

    pub(crate) fn attach_outgoing(&mut self, layer: LayerId, edge: DistributedId) {
        self.outgoing.entry(layer).or_default().push(edge);
    }

    pub(crate) fn detach_incoming(&mut self, layer: LayerId, edge: DistributedId) {
        if let Some(list) = self.incoming.get_mut(&layer) {
            list.retain(|id| *id != edge);
        }
    }

    pub(crate) fn detach_outgoing(&mut self, layer: LayerId, edge: DistributedId) {
        if let Some(list) = self.outgoing.get_mut(&layer) {
            list.retain(|id| *id != edge);
        }
    }
}

/// A directed edge between two nodes, on a given [`LayerId`].
///
/// `state = Local` iff both endpoints are `Local`; a `DISTANT` endpoint
/// makes the edge `Distant` even if the other endpoint is `Local` here.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Edge {
    id: DistributedId,
    layer: LayerId,
    weight: f64,
    source: DistributedId,
    target: DistributedId,
    state: NodeState,
}

impl Edge {
    /// Builds an edge. `state` is computed by the caller (typically
    /// [`crate::graph::DistributedGraph::link`]) from its endpoints'
    /// states at creation time.
    pub fn new(
        id: DistributedId,
        layer: LayerId,
        weight: f64,
        source: DistributedId,
        target: DistributedId,
        state: NodeState,
    ) -> Self {
        Edge { id, layer, weight, source, target, state }
    }

    /// This edge's id.
    pub fn id(&self) -> DistributedId {
        self.id
    }

    /// The layer this edge lives on.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// The partitioning-hint weight of this edge.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The id of the edge's source node.
    pub fn source(&self) -> DistributedId {
        self.source
    }

    /// The id of the edge's target node.
    pub fn target(&self) -> DistributedId {
        self.target
    }

    /// Whether both endpoints are `Local` here.
    pub fn state(&self) -> NodeState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: NodeState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_defaults_weight_to_one() {
        let node = Node::new(DistributedId::new(0, 0), "x", 0);
        assert_eq!(node.weight(), 1.0);
        assert_eq!(node.state(), NodeState::Local);
    }

    #[test]
    fn adjacency_attach_detach_round_trips() {
        let mut node = Node::new(DistributedId::new(0, 0), (), 0);
        let e1 = DistributedId::new(0, 1);
        let e2 = DistributedId::new(0, 2);
        node.attach_outgoing(DEFAULT_LAYER, e1);
        node.attach_outgoing(DEFAULT_LAYER, e2);
        assert_eq!(node.outgoing(DEFAULT_LAYER), &[e1, e2]);
        node.detach_outgoing(DEFAULT_LAYER, e1);
        assert_eq!(node.outgoing(DEFAULT_LAYER), &[e2]);
    }
}
