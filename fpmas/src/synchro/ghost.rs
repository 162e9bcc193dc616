//! Optimistic synchronization (`spec.md` §4.5.1), grounded on
//! `original_source/src/main/graph/parallel/synchro/ghost/basic_ghost_mode.h`:
//! the mutex never leaves this process, edge mutations are buffered and
//! flushed in bulk at `synchronize`, and `DISTANT` data is refreshed by one
//! request/response round per `synchronize`.

use std::collections::HashMap;

use fpmas_communication::communicator::Communicator;
use fpmas_communication::typed::TypedTransport;
use fpmas_communication::wire::Binary;

use crate::graph::base::Graph;
use crate::graph::distributed::{import_edge, NodeData};
use crate::graph::node::{Edge, NodeState};
use crate::graph::packet::{EdgePacket, NodePacket};
use crate::synchro::SyncMode;
use crate::{DistributedId, FpmasError, Rank, Result};

/// The optimistic synchronization mode: every mutex access is served
/// directly from the local replica, at the cost of `DISTANT` data only
/// being as fresh as the last `synchronize`.
///
/// Reserves five adjacent channel ids starting at the `channel_id` passed
/// to [`GhostMode::new`]: new-edge export, unlink export, remove-node
/// export, data request, data response.
pub struct GhostMode<T, C> {
    link_buffer: Vec<Edge>,
    unlink_buffer: Vec<Edge>,
    remove_node_buffer: Vec<DistributedId>,
    edge_transport: TypedTransport<Vec<EdgePacket>, C, Binary>,
    unlink_transport: TypedTransport<Vec<DistributedId>, C, Binary>,
    remove_transport: TypedTransport<Vec<DistributedId>, C, Binary>,
    request_transport: TypedTransport<Vec<DistributedId>, C, Binary>,
    data_transport: TypedTransport<Vec<NodePacket<T>>, C, Binary>,
}

impl<T: NodeData, C: Communicator + Clone> GhostMode<T, C> {
    /// Builds a ghost-mode handler over `communicator`.
    pub fn new(communicator: C, channel_id: i32) -> Self {
        GhostMode {
            link_buffer: Vec::new(),
            unlink_buffer: Vec::new(),
            remove_node_buffer: Vec::new(),
            edge_transport: TypedTransport::new(communicator.clone(), channel_id),
            unlink_transport: TypedTransport::new(communicator.clone(), channel_id + 1),
            remove_transport: TypedTransport::new(communicator.clone(), channel_id + 2),
            request_transport: TypedTransport::new(communicator.clone(), channel_id + 3),
            data_transport: TypedTransport::new(communicator, channel_id + 4),
        }
    }

    fn edge_packet(graph: &Graph<T>, edge: &Edge) -> EdgePacket {
        let source_location = graph.get_node(edge.source()).map(|n| n.location()).unwrap_or(0);
        let target_location = graph.get_node(edge.target()).map(|n| n.location()).unwrap_or(0);
        EdgePacket {
            id: edge.id(),
            layer: edge.layer(),
            weight: edge.weight(),
            source_id: edge.source(),
            source_location,
            target_id: edge.target(),
            target_location,
        }
    }

    /// The owners of `edge`'s `DISTANT` endpoints, deduplicated: this is
    /// the set of processes that need to be told about the edge so their
    /// own replica of the graph stays consistent.
    fn distant_owners(graph: &Graph<T>, edge: &Edge) -> Vec<Rank> {
        let mut owners = Vec::new();
        for id in [edge.source(), edge.target()] {
            if let Some(node) = graph.get_node(id) {
                if node.state() == NodeState::Distant {
                    owners.push(node.location());
                }
            }
        }
        owners.sort_unstable();
        owners.dedup();
        owners
    }
}

impl<T: NodeData, C: Communicator + Clone> SyncMode<T> for GhostMode<T, C> {
    fn mutex_read(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<T> {
        graph.get_node(id).map(|n| n.data().clone()).ok_or(FpmasError::MissingNode(id))
    }

    fn mutex_release_read(&mut self, _graph: &mut Graph<T>, _id: DistributedId) -> Result<()> {
        Ok(())
    }

    fn mutex_acquire(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<T> {
        self.mutex_read(graph, id)
    }

    fn mutex_release_acquire(&mut self, graph: &mut Graph<T>, id: DistributedId, data: T) -> Result<()> {
        graph.get_node_mut(id).ok_or(FpmasError::MissingNode(id))?.set_data(data);
        Ok(())
    }

    fn mutex_lock(&mut self, _graph: &mut Graph<T>, _id: DistributedId) -> Result<()> {
        Ok(())
    }

    fn mutex_unlock(&mut self, _graph: &mut Graph<T>, _id: DistributedId) -> Result<()> {
        Ok(())
    }

    fn mutex_lock_shared(&mut self, _graph: &mut Graph<T>, _id: DistributedId) -> Result<()> {
        Ok(())
    }

    fn mutex_unlock_shared(&mut self, _graph: &mut Graph<T>, _id: DistributedId) -> Result<()> {
        Ok(())
    }

    fn link(&mut self, _graph: &mut Graph<T>, edge: Edge) -> Result<()> {
        if edge.state() == NodeState::Distant {
            self.link_buffer.push(edge);
        }
        Ok(())
    }

    fn unlink(&mut self, _graph: &mut Graph<T>, edge: Edge) -> Result<()> {
        if let Some(pos) = self.link_buffer.iter().position(|e| e.id() == edge.id()) {
            self.link_buffer.remove(pos);
        } else if edge.state() == NodeState::Distant {
            self.unlink_buffer.push(edge);
        }
        Ok(())
    }

    fn remove_node(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()> {
        let incident: Vec<DistributedId> = graph.get_node(id).map(|n| n.all_incident().collect()).unwrap_or_default();
        for edge_id in incident {
            if let Some(edge) = graph.get_edge(edge_id).copied() {
                self.unlink(graph, edge)?;
            }
        }
        if graph.get_node(id).map(|n| n.state() == NodeState::Distant).unwrap_or(false) {
            self.remove_node_buffer.push(id);
        }
        Ok(())
    }

    fn synchronize_links(&mut self, graph: &mut Graph<T>) -> Result<()> {
        let mut link_export: HashMap<Rank, Vec<EdgePacket>> = HashMap::new();
        for edge in &self.link_buffer {
            for owner in Self::distant_owners(graph, edge) {
                link_export.entry(owner).or_default().push(Self::edge_packet(graph, edge));
            }
        }
        let both_distant: Vec<DistributedId> = self
            .link_buffer
            .iter()
            .filter(|e| {
                let source = graph.get_node(e.source()).map(|n| n.state());
                let target = graph.get_node(e.target()).map(|n| n.state());
                source == Some(NodeState::Distant) && target == Some(NodeState::Distant)
            })
            .map(|e| e.id())
            .collect();
        self.link_buffer.clear();
        let incoming_links = self.edge_transport.migrate(link_export)?;
        for packets in incoming_links.into_values() {
            for packet in packets {
                import_edge(graph, packet)?;
            }
        }
        for id in both_distant {
            let _ = graph.erase_edge(id);
        }

        let mut unlink_export: HashMap<Rank, Vec<DistributedId>> = HashMap::new();
        for edge in &self.unlink_buffer {
            for owner in Self::distant_owners(graph, edge) {
                unlink_export.entry(owner).or_default().push(edge.id());
            }
        }
        self.unlink_buffer.clear();
        let incoming_unlinks = self.unlink_transport.migrate(unlink_export)?;
        for ids in incoming_unlinks.into_values() {
            for id in ids {
                let _ = graph.erase_edge(id);
            }
        }

        let mut remove_export: HashMap<Rank, Vec<DistributedId>> = HashMap::new();
        for &id in &self.remove_node_buffer {
            if let Some(node) = graph.get_node(id) {
                remove_export.entry(node.location()).or_default().push(id);
            }
        }
        self.remove_node_buffer.clear();
        let incoming_removals = self.remove_transport.migrate(remove_export)?;
        for ids in incoming_removals.into_values() {
            for id in ids {
                let _ = graph.erase_node(id);
            }
        }
        Ok(())
    }

    fn synchronize_data(&mut self, graph: &mut Graph<T>) -> Result<()> {
        let ids: Vec<DistributedId> =
            graph.nodes().filter(|n| n.state() == NodeState::Distant).map(|n| n.id()).collect();
        self.synchronize_data_subset(graph, &ids)
    }

    fn synchronize_data_subset(&mut self, graph: &mut Graph<T>, ids: &[DistributedId]) -> Result<()> {
        let mut request_export: HashMap<Rank, Vec<DistributedId>> = HashMap::new();
        for &id in ids {
            if let Some(node) = graph.get_node(id) {
                if node.state() == NodeState::Distant {
                    request_export.entry(node.location()).or_default().push(id);
                }
            }
        }
        let incoming_requests = self.request_transport.migrate(request_export)?;

        let mut response_export: HashMap<Rank, Vec<NodePacket<T>>> = HashMap::new();
        for (requester, ids) in incoming_requests {
            let mut packets = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(node) = graph.get_node(id) {
                    packets.push(NodePacket { id, data: node.data().clone(), weight: node.weight() });
                }
            }
            response_export.insert(requester, packets);
        }
        let incoming_responses = self.data_transport.migrate(response_export)?;
        for packets in incoming_responses.into_values() {
            for packet in packets {
                if let Some(node) = graph.get_node_mut(packet.id) {
                    node.set_data(packet.data);
                    node.set_weight(packet.weight);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DistributedGraph;
    use fpmas_communication::allocator::in_process::InProcessCommunicator;

    #[test]
    fn synchronize_data_refreshes_a_distant_replica() {
        let group = InProcessCommunicator::new_vector(2);
        let mut graphs: Vec<DistributedGraph<i32, _, GhostMode<i32, _>>> = group
            .into_iter()
            .map(|c| {
                let sync = GhostMode::new(c.clone(), 0);
                DistributedGraph::new(c, sync)
            })
            .collect();

        let id = graphs[0].build_node(7);
        std::thread::scope(|scope| {
            let mut export = HashMap::new();
            export.insert(id, 1);
            let handles: Vec<_> = graphs
                .iter_mut()
                .enumerate()
                .map(|(rank, g)| {
                    let partition = if rank == 0 { export.clone() } else { HashMap::new() };
                    scope.spawn(move || g.distribute(&partition).unwrap())
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });

        assert_eq!(graphs[1].graph().get_node(id).unwrap().data(), &7);
        assert_eq!(graphs[1].graph().get_node(id).unwrap().state(), NodeState::Local);
        assert_eq!(graphs[0].graph().get_node(id).unwrap().state(), NodeState::Distant);

        *graphs[1].graph_mut().get_node_mut(id).unwrap().data_mut() = 42;
        std::thread::scope(|scope| {
            let handles: Vec<_> = graphs.iter_mut().map(|g| scope.spawn(move || g.synchronize().unwrap())).collect();
            for h in handles {
                h.join().unwrap();
            }
        });
        assert_eq!(graphs[0].graph().get_node(id).unwrap().data(), &42);
    }
}
