//! The plain, single-process graph core: an id-keyed node map, an
//! id-keyed edge map, and insertion/erasure callbacks — `spec.md` §4.2,
//! grounded on `original_source/src/main/api/graph/base/{node,arc,graph}.h`
//! and `src/fpmas/graph/graph.h`.
//!
//! This layer knows nothing about `LOCAL`/`DISTANT` ownership; that is
//! added by [`crate::graph::distributed::DistributedGraph`], which wraps
//! a `Graph<T>` rather than subclassing it.

use std::collections::HashMap;

use crate::graph::node::{Edge, LayerId, Node};
use crate::{DistributedId, FpmasError, Result};

/// A callback fired once, synchronously, after the map mutation it
/// reacts to is already visible — e.g. `on_insert_node` sees
/// `graph.get_node(id)` return `Some` if called from inside the
/// callback.
pub type Callback = Box<dyn FnMut(DistributedId)>;

#[derive(Default)]
struct Callbacks {
    on_insert_node: Vec<Callback>,
    on_erase_node: Vec<Callback>,
    on_insert_edge: Vec<Callback>,
    on_erase_edge: Vec<Callback>,
}

/// An in-memory directed multigraph: a node map, an edge map, and
/// layered adjacency between them. The graph is the sole owner of its
/// nodes and edges; no node or edge outlives it.
pub struct Graph<T> {
    nodes: HashMap<DistributedId, Node<T>>,
    edges: HashMap<DistributedId, Edge>,
    callbacks: Callbacks,
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Graph::new()
    }
}

impl<T> Graph<T> {
    /// Builds an empty graph.
    pub fn new() -> Self {
        Graph { nodes: HashMap::new(), edges: HashMap::new(), callbacks: Callbacks::default() }
    }

    /// The number of nodes currently in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The number of edges currently in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Registers a callback fired after a node is inserted.
    pub fn on_insert_node(&mut self, callback: Callback) {
        self.callbacks.on_insert_node.push(callback);
    }

    /// Registers a callback fired after a node is erased.
    pub fn on_erase_node(&mut self, callback: Callback) {
        self.callbacks.on_erase_node.push(callback);
    }

    /// Registers a callback fired after an edge is inserted.
    pub fn on_insert_edge(&mut self, callback: Callback) {
        self.callbacks.on_insert_edge.push(callback);
    }

    /// Registers a callback fired after an edge is erased.
    pub fn on_erase_edge(&mut self, callback: Callback) {
        self.callbacks.on_erase_edge.push(callback);
    }

    /// Inserts `node`, keyed by its own id, firing `on_insert_node`.
    pub fn insert_node(&mut self, node: Node<T>) {
        let id = node.id();
        self.nodes.insert(id, node);
        for cb in &mut self.callbacks.on_insert_node {
            cb(id);
        }
    }

    /// Inserts `edge` and attaches it to both endpoints' adjacency
    /// lists, firing `on_insert_edge`. Fails if either endpoint is
    /// absent from the node map.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<()> {
        if !self.nodes.contains_key(&edge.source()) {
            return Err(FpmasError::MissingNode(edge.source()));
        }
        if !self.nodes.contains_key(&edge.target()) {
            return Err(FpmasError::MissingNode(edge.target()));
        }
        let id = edge.id();
        let layer = edge.layer();
        let (source, target) = (edge.source(), edge.target());
        self.edges.insert(id, edge);
        self.nodes.get_mut(&source).expect("checked above").attach_outgoing(layer, id);
        self.nodes.get_mut(&target).expect("checked above").attach_incoming(layer, id);
        for cb in &mut self.callbacks.on_insert_edge {
            cb(id);
        }
        Ok(())
    }

    /// Removes `edge`, detaching it from both endpoints' adjacency
    /// lists, firing `on_erase_edge`.
    pub fn erase_edge(&mut self, id: DistributedId) -> Result<Edge> {
        let edge = self.edges.remove(&id).ok_or(FpmasError::MissingEdge(id))?;
        if let Some(source) = self.nodes.get_mut(&edge.source()) {
            source.detach_outgoing(edge.layer(), id);
        }
        if let Some(target) = self.nodes.get_mut(&edge.target()) {
            target.detach_incoming(edge.layer(), id);
        }
        for cb in &mut self.callbacks.on_erase_edge {
            cb(id);
        }
        Ok(edge)
    }

    /// Removes `node` and every edge incident to it, firing
    /// `on_erase_edge` for each then `on_erase_node` once.
    pub fn erase_node(&mut self, id: DistributedId) -> Result<Node<T>> {
        let incident: Vec<DistributedId> =
            self.nodes.get(&id).ok_or(FpmasError::MissingNode(id))?.all_incident().collect();
        for edge_id in incident {
            // An edge may already have been erased as the *other*
            // endpoint's incident edge in a prior call; ignore.
            let _ = self.erase_edge(edge_id);
        }
        let node = self.nodes.remove(&id).ok_or(FpmasError::MissingNode(id))?;
        for cb in &mut self.callbacks.on_erase_node {
            cb(id);
        }
        Ok(node)
    }

    /// Looks up a node by id.
    pub fn get_node(&self, id: DistributedId) -> Option<&Node<T>> {
        self.nodes.get(&id)
    }

    /// Mutably looks up a node by id.
    pub fn get_node_mut(&mut self, id: DistributedId) -> Option<&mut Node<T>> {
        self.nodes.get_mut(&id)
    }

    /// Looks up an edge by id.
    pub fn get_edge(&self, id: DistributedId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Mutably looks up an edge by id.
    pub fn get_edge_mut(&mut self, id: DistributedId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    /// Iterates over every node.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    /// Iterates over every edge.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Edge ids incident to `id` on any layer, if the node exists.
    pub fn incident_edges(&self, id: DistributedId, layer: LayerId) -> Vec<DistributedId> {
        self.nodes
            .get(&id)
            .map(|n| n.incoming(layer).iter().chain(n.outgoing(layer).iter()).copied().collect())
            .unwrap_or_default()
    }

    /// Erases every edge, then every node, firing every callback exactly
    /// once per entity (`spec.md` §8 invariant 8).
    pub fn clear(&mut self) {
        let edge_ids: Vec<DistributedId> = self.edges.keys().copied().collect();
        for id in edge_ids {
            let _ = self.erase_edge(id);
        }
        let node_ids: Vec<DistributedId> = self.nodes.keys().copied().collect();
        for id in node_ids {
            let _ = self.erase_node(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{NodeState, DEFAULT_LAYER};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn node(counter: u64) -> Node<i32> {
        Node::new(DistributedId::new(0, counter), 0, 0)
    }

    #[test]
    fn insert_and_erase_edge_updates_adjacency() {
        let mut graph: Graph<i32> = Graph::new();
        graph.insert_node(node(0));
        graph.insert_node(node(1));
        let edge = Edge::new(DistributedId::new(0, 10), DEFAULT_LAYER, 1.0, DistributedId::new(0, 0), DistributedId::new(0, 1), NodeState::Local);
        graph.insert_edge(edge).unwrap();
        assert_eq!(graph.get_node(DistributedId::new(0, 0)).unwrap().outgoing(DEFAULT_LAYER).len(), 1);
        assert_eq!(graph.get_node(DistributedId::new(0, 1)).unwrap().incoming(DEFAULT_LAYER).len(), 1);
        graph.erase_edge(DistributedId::new(0, 10)).unwrap();
        assert!(graph.get_node(DistributedId::new(0, 0)).unwrap().outgoing(DEFAULT_LAYER).is_empty());
    }

    #[test]
    fn erase_node_cascades_to_incident_edges() {
        let mut graph: Graph<i32> = Graph::new();
        graph.insert_node(node(0));
        graph.insert_node(node(1));
        let edge = Edge::new(DistributedId::new(0, 10), DEFAULT_LAYER, 1.0, DistributedId::new(0, 0), DistributedId::new(0, 1), NodeState::Local);
        graph.insert_edge(edge).unwrap();
        graph.erase_node(DistributedId::new(0, 0)).unwrap();
        assert!(graph.get_edge(DistributedId::new(0, 10)).is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn clear_fires_erase_callbacks_exactly_once_each() {
        let mut graph: Graph<i32> = Graph::new();
        graph.insert_node(node(0));
        graph.insert_node(node(1));
        let edge = Edge::new(DistributedId::new(0, 10), DEFAULT_LAYER, 1.0, DistributedId::new(0, 0), DistributedId::new(0, 1), NodeState::Local);
        graph.insert_edge(edge).unwrap();

        let node_erases = Rc::new(RefCell::new(0));
        let edge_erases = Rc::new(RefCell::new(0));
        let (n, e) = (Rc::clone(&node_erases), Rc::clone(&edge_erases));
        graph.on_erase_node(Box::new(move |_| *n.borrow_mut() += 1));
        graph.on_erase_edge(Box::new(move |_| *e.borrow_mut() += 1));

        graph.clear();
        assert!(graph.nodes().next().is_none());
        assert!(graph.edges().next().is_none());
        assert_eq!(*node_erases.borrow(), 2);
        assert_eq!(*edge_erases.borrow(), 1);
    }
}
