//! [`DistributedGraph`]: adds `LOCAL`/`DISTANT` ownership, import/export,
//! and `distribute` on top of [`crate::graph::base::Graph`] — `spec.md`
//! §4.3, grounded on
//! `original_source/src/fpmas/graph/distributed_node.h`,
//! `distributed_edge.h`, and
//! `src/fpmas/graph/parallel/distributed_graph.h`.

use std::collections::{HashMap, HashSet};

use fpmas_communication::communicator::Communicator;
use fpmas_communication::identifier::IdCounter;
use fpmas_communication::typed::TypedTransport;
use fpmas_communication::wire::Binary;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::graph::base::Graph;
use crate::graph::location::LocationManager;
use crate::graph::node::{Edge, LayerId, Node, NodeState};
use crate::graph::packet::{EdgePacket, NodePacket};
use crate::synchro::SyncMode;
use crate::{DistributedId, FpmasError, Rank, Result};

/// A node's data payload, as required to serve as a
/// [`DistributedGraph`]'s node type: cloneable (mutex reads/writes
/// operate on copies), wire-serializable, and `Default` so a process
/// that references an id it has never seen data for (a freshly-created
/// `DISTANT` placeholder, filled in by the next
/// [`DistributedGraph::synchronize`]) has something to put there.
pub trait NodeData: Clone + Default + Serialize + DeserializeOwned + Send + 'static {}
impl<T: Clone + Default + Serialize + DeserializeOwned + Send + 'static> NodeData for T {}

/// Inserts or refreshes a node from its full wire form. If a `DISTANT`
/// placeholder already exists under this id, it is promoted to `LOCAL`
/// in place — never reallocated, so adjacency references elsewhere stay
/// valid (`spec.md` §9). A pre-existing `LOCAL` copy wins over a stale
/// duplicate import.
pub(crate) fn import_node<T: NodeData>(graph: &mut Graph<T>, packet: NodePacket<T>, location: Rank) {
    match graph.get_node_mut(packet.id) {
        Some(existing) if existing.state() == NodeState::Distant => {
            existing.set_data(packet.data);
            existing.set_weight(packet.weight);
            existing.set_state(NodeState::Local);
            existing.set_location(location);
        }
        Some(_) => {}
        None => graph.insert_node(Node::with_weight(packet.id, packet.data, packet.weight, location)),
    }
}

/// Inserts an edge from its light wire form. Either endpoint unknown
/// locally is created as a data-less `DISTANT` placeholder at the
/// location the packet names; an endpoint already known, local or
/// distant, is left untouched (the packet never carries its data, per
/// `DESIGN.md`'s resolution of the light-serializer Open Question).
pub(crate) fn import_edge<T: NodeData>(graph: &mut Graph<T>, packet: EdgePacket) -> Result<()> {
    if graph.get_edge(packet.id).is_some() {
        return Ok(());
    }
    ensure_placeholder(graph, packet.source_id, packet.source_location);
    ensure_placeholder(graph, packet.target_id, packet.target_location);
    let source_local = graph.get_node(packet.source_id).map(|n| n.state() == NodeState::Local).unwrap_or(false);
    let target_local = graph.get_node(packet.target_id).map(|n| n.state() == NodeState::Local).unwrap_or(false);
    let state = if source_local && target_local { NodeState::Local } else { NodeState::Distant };
    let edge = Edge::new(packet.id, packet.layer, packet.weight, packet.source_id, packet.target_id, state);
    graph.insert_edge(edge)
}

fn ensure_placeholder<T: NodeData>(graph: &mut Graph<T>, id: DistributedId, location: Rank) {
    if graph.get_node(id).is_none() {
        graph.insert_node(Node::distant(id, T::default(), 1.0, location));
    }
}

/// The distributed graph: a [`Graph`] plus ownership bookkeeping, a
/// [`LocationManager`], and the active [`SyncMode`].
pub struct DistributedGraph<T, C, M> {
    rank: Rank,
    graph: Graph<T>,
    node_counter: IdCounter,
    edge_counters: HashMap<LayerId, IdCounter>,
    location_manager: LocationManager<C>,
    node_transport: TypedTransport<Vec<NodePacket<T>>, C, Binary>,
    edge_transport: TypedTransport<Vec<EdgePacket>, C, Binary>,
    sync: M,
}

impl<T, C, M> DistributedGraph<T, C, M>
where
    T: NodeData,
    C: Communicator + Clone,
    M: SyncMode<T>,
{
    /// Builds a distributed graph over `communicator`, running under
    /// synchronization policy `sync`. Reserves channel ids `90`, `91`,
    /// `92` for its own node-export/edge-export/location traffic; `sync`
    /// is expected to have been built against its own, disjoint channel
    /// range by the caller.
    pub fn new(communicator: C, sync: M) -> Self {
        let rank = communicator.rank();
        DistributedGraph {
            rank,
            graph: Graph::new(),
            node_counter: IdCounter::new(rank),
            edge_counters: HashMap::new(),
            location_manager: LocationManager::new(communicator.clone(), 90),
            node_transport: TypedTransport::new(communicator.clone(), 92),
            edge_transport: TypedTransport::new(communicator, 93),
            sync,
        }
    }

    /// This process's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Read-only access to the underlying plain graph.
    pub fn graph(&self) -> &Graph<T> {
        &self.graph
    }

    /// Mutable access to the underlying plain graph, for callers that
    /// need direct map/adjacency access (e.g. a [`Partitioner`
    /// adapter][crate::graph::load_balancing]). Does not go through the
    /// active sync mode's mutex.
    pub fn graph_mut(&mut self) -> &mut Graph<T> {
        &mut self.graph
    }

    /// The last-known location of `id`.
    pub fn location(&self, id: DistributedId) -> Option<Rank> {
        self.location_manager.location(id)
    }

    fn edge_counter(&mut self, layer: LayerId) -> DistributedId {
        self.edge_counters.entry(layer).or_insert_with(|| IdCounter::new(self.rank)).next()
    }

    /// Inserts a fresh `LOCAL` node with the original's default weight
    /// of `1.0`, recording its location with the manager directly (this
    /// process is always the registrar for ids it mints itself).
    pub fn build_node(&mut self, data: T) -> DistributedId {
        self.build_node_weighted(data, 1.0)
    }

    /// As [`DistributedGraph::build_node`], with an explicit weight.
    pub fn build_node_weighted(&mut self, data: T, weight: f64) -> DistributedId {
        let id = self.node_counter.next();
        self.graph.insert_node(Node::with_weight(id, data, weight, self.rank));
        self.location_manager.set_location(id, self.rank);
        id
    }

    fn ensure_known(&mut self, id: DistributedId) -> Result<()> {
        if self.graph.get_node(id).is_some() {
            return Ok(());
        }
        let location = match self.location_manager.location(id) {
            Some(location) => location,
            None => {
                let known: Vec<DistributedId> = self.graph.nodes().map(|n| n.id()).collect();
                self.location_manager.update_locations(&[], known.into_iter().chain(std::iter::once(id)))?;
                self.location_manager.location(id).ok_or(FpmasError::MissingNode(id))?
            }
        };
        self.graph.insert_node(Node::distant(id, T::default(), 1.0, location));
        Ok(())
    }

    /// Creates an edge between `source` and `target` on `layer`. Locks
    /// both endpoints via the active sync mode's mutex, sets the new
    /// edge's state from its endpoints' current states, and notifies
    /// [`SyncMode::link`] (a no-op for a fully-`LOCAL` edge; `DISTANT`
    /// edges propagate at the next `synchronize`).
    pub fn link(&mut self, source: DistributedId, target: DistributedId, layer: LayerId) -> Result<Edge> {
        self.ensure_known(source)?;
        self.ensure_known(target)?;
        self.sync.mutex_lock(&mut self.graph, source)?;
        self.sync.mutex_lock(&mut self.graph, target)?;
        let source_local = self.graph.get_node(source).expect("ensured above").state() == NodeState::Local;
        let target_local = self.graph.get_node(target).expect("ensured above").state() == NodeState::Local;
        let state = if source_local && target_local { NodeState::Local } else { NodeState::Distant };
        let id = self.edge_counter(layer);
        let edge = Edge::new(id, layer, 1.0, source, target, state);
        self.graph.insert_edge(edge)?;
        self.sync.mutex_unlock(&mut self.graph, source)?;
        self.sync.mutex_unlock(&mut self.graph, target)?;
        self.sync.link(&mut self.graph, edge)?;
        Ok(edge)
    }

    /// Removes `edge_id`, notifying [`SyncMode::unlink`] first so a
    /// buffered mode can still see the edge it is about to lose.
    pub fn unlink(&mut self, edge_id: DistributedId) -> Result<()> {
        let edge = *self.graph.get_edge(edge_id).ok_or(FpmasError::MissingEdge(edge_id))?;
        self.sync.mutex_lock(&mut self.graph, edge.source())?;
        self.sync.mutex_lock(&mut self.graph, edge.target())?;
        self.sync.unlink(&mut self.graph, edge)?;
        self.graph.erase_edge(edge_id)?;
        self.sync.mutex_unlock(&mut self.graph, edge.source())?;
        self.sync.mutex_unlock(&mut self.graph, edge.target())?;
        Ok(())
    }

    /// Explicitly removes a node this process is done with (e.g. agent
    /// death), notifying [`SyncMode::remove_node`] before it is erased.
    pub fn remove_node(&mut self, id: DistributedId) -> Result<()> {
        self.sync.remove_node(&mut self.graph, id)?;
        self.graph.erase_node(id)?;
        Ok(())
    }

    /// Reads `id`'s data without taking exclusive access (`spec.md`
    /// §4.5's `Mutex::read`).
    pub fn read(&mut self, id: DistributedId) -> Result<T> {
        self.sync.mutex_read(&mut self.graph, id)
    }

    /// Releases a prior [`DistributedGraph::read`].
    pub fn release_read(&mut self, id: DistributedId) -> Result<()> {
        self.sync.mutex_release_read(&mut self.graph, id)
    }

    /// Acquires exclusive access to `id`, returning its current data.
    pub fn acquire(&mut self, id: DistributedId) -> Result<T> {
        self.sync.mutex_acquire(&mut self.graph, id)
    }

    /// Releases a prior [`DistributedGraph::acquire`], writing `data`
    /// back.
    pub fn release_acquire(&mut self, id: DistributedId, data: T) -> Result<()> {
        self.sync.mutex_release_acquire(&mut self.graph, id, data)
    }

    /// Flushes pending link/unlink notifications, then refreshes every
    /// `DISTANT` node's data (`spec.md` §4.3: `SyncLinker::synchronize`
    /// then `DataSync::synchronize`).
    pub fn synchronize(&mut self) -> Result<()> {
        self.sync.synchronize(&mut self.graph)
    }

    /// A node is erased entirely iff every one of its incident edges has
    /// its *other* endpoint `DISTANT`; otherwise the node remains
    /// `DISTANT` but any incident edge that is itself `DISTANT` on both
    /// ends is pruned (`spec.md` §4.3).
    fn clear_node(&mut self, id: DistributedId) -> Result<()> {
        let Some(node) = self.graph.get_node(id) else { return Ok(()) };
        let incident: Vec<DistributedId> = node.all_incident().collect();
        let has_live_local_edge = incident.iter().any(|edge_id| {
            self.graph
                .get_edge(*edge_id)
                .map(|edge| {
                    let other = if edge.source() == id { edge.target() } else { edge.source() };
                    self.graph.get_node(other).map(|n| n.state() == NodeState::Local).unwrap_or(false)
                })
                .unwrap_or(false)
        });
        if !has_live_local_edge {
            self.graph.erase_node(id)?;
            return Ok(());
        }
        for edge_id in incident {
            let Some(edge) = self.graph.get_edge(edge_id).copied() else { continue };
            let source_distant =
                self.graph.get_node(edge.source()).map(|n| n.state() == NodeState::Distant).unwrap_or(true);
            let target_distant =
                self.graph.get_node(edge.target()).map(|n| n.state() == NodeState::Distant).unwrap_or(true);
            if source_distant && target_distant {
                let _ = self.graph.erase_edge(edge_id);
            }
        }
        Ok(())
    }

    /// Exports every `LOCAL` node `partition` assigns to a different
    /// rank, along with the full set of its incident edges; imports
    /// whatever other processes export to this rank; marks exported
    /// nodes `DISTANT`; refreshes locations; prunes now-obsolete
    /// `DISTANT` state; and refreshes surviving replicas' data
    /// (`spec.md` §4.3, steps 1-8).
    pub fn distribute(&mut self, partition: &HashMap<DistributedId, Rank>) -> Result<()> {
        self.sync.synchronize_links(&mut self.graph)?;

        let export_nodes: Vec<DistributedId> = partition
            .iter()
            .filter(|(id, &dest)| {
                dest != self.rank && self.graph.get_node(**id).map(|n| n.state() == NodeState::Local).unwrap_or(false)
            })
            .map(|(&id, _)| id)
            .collect();

        let mut node_export: HashMap<Rank, Vec<NodePacket<T>>> = HashMap::new();
        for &id in &export_nodes {
            let dest = partition[&id];
            let node = self.graph.get_node(id).expect("filtered above");
            node_export.entry(dest).or_default().push(NodePacket { id, data: node.data().clone(), weight: node.weight() });
        }

        let mut edge_export: HashMap<Rank, Vec<EdgePacket>> = HashMap::new();
        let mut seen: HashSet<(Rank, DistributedId)> = HashSet::new();
        for &id in &export_nodes {
            let dest = partition[&id];
            let node = self.graph.get_node(id).expect("filtered above");
            for edge_id in node.all_incident() {
                if !seen.insert((dest, edge_id)) {
                    continue;
                }
                let edge = *self.graph.get_edge(edge_id).expect("adjacency points at a live edge");
                let source_location = self.graph.get_node(edge.source()).map(|n| n.location()).unwrap_or(self.rank);
                let target_location = self.graph.get_node(edge.target()).map(|n| n.location()).unwrap_or(self.rank);
                edge_export.entry(dest).or_default().push(EdgePacket {
                    id: edge.id(),
                    layer: edge.layer(),
                    weight: edge.weight(),
                    source_id: edge.source(),
                    source_location,
                    target_id: edge.target(),
                    target_location,
                });
            }
        }

        let incoming_nodes = self.node_transport.migrate(node_export)?;
        let incoming_edges = self.edge_transport.migrate(edge_export)?;

        let mut imported_local_nodes: Vec<DistributedId> = Vec::new();
        for packets in incoming_nodes.into_values() {
            for packet in packets {
                let id = packet.id;
                import_node(&mut self.graph, packet, self.rank);
                imported_local_nodes.push(id);
            }
        }
        for packets in incoming_edges.into_values() {
            for packet in packets {
                import_edge(&mut self.graph, packet)?;
            }
        }

        for &id in &export_nodes {
            let dest = partition[&id];
            if let Some(node) = self.graph.get_node_mut(id) {
                node.set_state(NodeState::Distant);
                node.set_location(dest);
            }
        }

        // Demoting an exported node to `DISTANT` (or promoting an imported
        // one to `LOCAL`, inside `import_node` above) can flip the
        // `LOCAL`/`DISTANT` state every edge still incident to it should
        // carry, per `spec.md` §8 invariant 2. Recompute each such edge's
        // state from its endpoints' now-current states, exactly as
        // `import_edge` does when an edge is first created.
        let mut touched: Vec<DistributedId> = export_nodes.clone();
        touched.extend(imported_local_nodes.iter().copied());
        let mut refreshed: HashSet<DistributedId> = HashSet::new();
        for &id in &touched {
            let Some(node) = self.graph.get_node(id) else { continue };
            let incident: Vec<DistributedId> = node.all_incident().collect();
            for edge_id in incident {
                if !refreshed.insert(edge_id) {
                    continue;
                }
                let Some(edge) = self.graph.get_edge(edge_id).copied() else { continue };
                let source_local =
                    self.graph.get_node(edge.source()).map(|n| n.state() == NodeState::Local).unwrap_or(false);
                let target_local =
                    self.graph.get_node(edge.target()).map(|n| n.state() == NodeState::Local).unwrap_or(false);
                let state = if source_local && target_local { NodeState::Local } else { NodeState::Distant };
                if let Some(edge_mut) = self.graph.get_edge_mut(edge_id) {
                    edge_mut.set_state(state);
                }
            }
        }

        let known: Vec<DistributedId> = self.graph.nodes().map(|n| n.id()).collect();
        self.location_manager.update_locations(&imported_local_nodes, known.into_iter())?;

        for &id in &export_nodes {
            self.clear_node(id)?;
        }

        self.sync.synchronize_data(&mut self.graph)?;
        Ok(())
    }
}
