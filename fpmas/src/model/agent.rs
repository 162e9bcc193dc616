//! [`Agent`] and its binding to a node through [`AgentContext`] and
//! [`AgentTask`] — `SPEC_FULL.md` §4.8, grounded on
//! `original_source/src/main/model/model.h`'s `AgentTask` (a `Task` that
//! calls `agent.act()` against the node it is bound to).

use std::cell::RefCell;
use std::rc::Rc;

use fpmas_communication::communicator::Communicator;

use crate::graph::distributed::{DistributedGraph, NodeData};
use crate::scheduler::Task;
use crate::synchro::SyncMode;
use crate::{DistributedId, FpmasError, Result};

/// An agent is itself a node's data: `Node<A>` rather than a node
/// carrying a separate `Box<dyn Agent>` payload, per `SPEC_FULL.md`
/// §4.8 ("concretely, `Node<A>` where `A: Agent`"). `act` runs once per
/// scheduler firing of the [`crate::model::Group`] the agent's node was
/// added to.
///
/// Parameterized over the communicator `C` and sync mode `M` its own
/// node lives under, so `act` can read/acquire neighbors through the
/// same [`DistributedGraph`] it is bound to — this is the cost of a
/// binding layer thin enough not to need dynamic dispatch.
pub trait Agent<C, M>: NodeData
where
    C: Communicator + Clone,
    M: SyncMode<Self>,
{
    fn act(&mut self, ctx: &mut AgentContext<'_, Self, C, M>) -> Result<()>;
}

/// The handle an [`Agent::act`] call receives: its own node id, and
/// access to the [`DistributedGraph`] it lives in for reading/acquiring
/// neighbors.
pub struct AgentContext<'a, T, C, M> {
    graph: &'a mut DistributedGraph<T, C, M>,
    node: DistributedId,
}

impl<'a, T, C, M> AgentContext<'a, T, C, M>
where
    T: NodeData,
    C: Communicator + Clone,
    M: SyncMode<T>,
{
    fn new(graph: &'a mut DistributedGraph<T, C, M>, node: DistributedId) -> Self {
        AgentContext { graph, node }
    }

    /// The id of the node this agent is bound to.
    pub fn node_id(&self) -> DistributedId {
        self.node
    }

    /// Direct access to the graph this agent lives in.
    pub fn graph(&mut self) -> &mut DistributedGraph<T, C, M> {
        self.graph
    }

    pub fn read(&mut self, id: DistributedId) -> Result<T> {
        self.graph.read(id)
    }

    pub fn release_read(&mut self, id: DistributedId) -> Result<()> {
        self.graph.release_read(id)
    }

    pub fn acquire(&mut self, id: DistributedId) -> Result<T> {
        self.graph.acquire(id)
    }

    pub fn release_acquire(&mut self, id: DistributedId, data: T) -> Result<()> {
        self.graph.release_acquire(id, data)
    }

    /// The node ids reachable through this agent's outgoing edges.
    pub fn out_neighbors(&self) -> Vec<DistributedId> {
        let Some(node) = self.graph.graph().get_node(self.node) else { return Vec::new() };
        node.all_outgoing().filter_map(|edge_id| self.graph.graph().get_edge(edge_id)).map(|edge| edge.target()).collect()
    }

    /// The node ids reachable through this agent's incoming edges.
    pub fn in_neighbors(&self) -> Vec<DistributedId> {
        let Some(node) = self.graph.graph().get_node(self.node) else { return Vec::new() };
        node.all_incoming().filter_map(|edge_id| self.graph.graph().get_edge(edge_id)).map(|edge| edge.source()).collect()
    }
}

/// The [`crate::scheduler::Task`] bound to a single agent's node: clones
/// the node's current data out, calls [`Agent::act`] against it, and
/// writes the (possibly modified) result back — mirrors
/// `FPMAS::model::AgentTask::run` (`_agent.act()`), adapted to this
/// crate's clone-based mutex access instead of a persistent reference.
pub struct AgentTask<A, C, M> {
    graph: Rc<RefCell<DistributedGraph<A, C, M>>>,
    node: DistributedId,
}

impl<A, C, M> AgentTask<A, C, M> {
    pub fn new(graph: Rc<RefCell<DistributedGraph<A, C, M>>>, node: DistributedId) -> Self {
        AgentTask { graph, node }
    }
}

impl<A, C, M> Task for AgentTask<A, C, M>
where
    A: Agent<C, M>,
    C: Communicator + Clone,
    M: SyncMode<A>,
{
    fn run(&mut self) -> Result<()> {
        let mut graph = self.graph.borrow_mut();
        let mut data =
            graph.graph().get_node(self.node).ok_or(FpmasError::MissingNode(self.node))?.data().clone();
        {
            let mut ctx = AgentContext::new(&mut graph, self.node);
            data.act(&mut ctx)?;
        }
        graph.graph_mut().get_node_mut(self.node).ok_or(FpmasError::MissingNode(self.node))?.set_data(data);
        Ok(())
    }

    fn bound_node(&self) -> Option<DistributedId> {
        Some(self.node)
    }
}
