//! Immediate (unbuffered) edge/node mutation notifications: under hard
//! sync, `LINK`/`UNLINK`/`REMOVE_NODE` are sent the moment they happen,
//! not batched until `synchronize` — grounded on
//! `original_source/src/main/graph/parallel/synchro/hard/hard_sync_linker.h`.

use fpmas_communication::communicator::Communicator;

use crate::graph::base::Graph;
use crate::graph::distributed::{import_edge, NodeData};
use crate::graph::node::{Edge, NodeState};
use crate::graph::packet::EdgePacket;
use crate::synchro::hard::tags;
use crate::synchro::hard::HardSyncMode;
use crate::{DistributedId, Rank, Result};

impl<T: NodeData, C: Communicator + Clone> HardSyncMode<T, C> {
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

    pub(crate) fn send_link(&mut self, graph: &mut Graph<T>, edge: Edge) -> Result<()> {
        if edge.state() != NodeState::Distant {
            return Ok(());
        }
        let packet = Self::edge_packet(graph, &edge);
        let tag = tags::combine(tags::base::LINK, self.epoch);
        for owner in Self::distant_owners(graph, &edge) {
            self.edge_tx.send(&packet, owner, tag)?;
        }
        Ok(())
    }

    pub(crate) fn send_unlink(&mut self, graph: &mut Graph<T>, edge: Edge) -> Result<()> {
        if edge.state() != NodeState::Distant {
            return Ok(());
        }
        let tag = tags::combine(tags::base::UNLINK, self.epoch);
        for owner in Self::distant_owners(graph, &edge) {
            self.id_tx.send(&edge.id(), owner, tag)?;
        }
        Ok(())
    }

    pub(crate) fn send_remove_node(&mut self, graph: &mut Graph<T>, id: DistributedId) -> Result<()> {
        let Some(node) = graph.get_node(id) else { return Ok(()) };
        if node.state() != NodeState::Distant {
            return Ok(());
        }
        let owner = node.location();
        let tag = tags::combine(tags::base::REMOVE_NODE, self.epoch);
        self.id_tx.send(&id, owner, tag)?;
        Ok(())
    }

    pub(crate) fn handle_link(&mut self, graph: &mut Graph<T>) -> Result<()> {
        let tag = tags::combine(tags::base::LINK, self.epoch);
        if let Some(status) = self.edge_tx.iprobe(None, tag)? {
            let packet = self.edge_tx.recv(status.source, tag)?;
            import_edge(graph, packet)?;
        }
        Ok(())
    }

    pub(crate) fn handle_unlink(&mut self, graph: &mut Graph<T>) -> Result<()> {
        let tag = tags::combine(tags::base::UNLINK, self.epoch);
        if let Some(status) = self.id_tx.iprobe(None, tag)? {
            let id = self.id_tx.recv(status.source, tag)?;
            let _ = graph.erase_edge(id);
        }
        Ok(())
    }

    pub(crate) fn handle_remove_node(&mut self, graph: &mut Graph<T>) -> Result<()> {
        let tag = tags::combine(tags::base::REMOVE_NODE, self.epoch);
        if let Some(status) = self.id_tx.iprobe(None, tag)? {
            let id = self.id_tx.recv(status.source, tag)?;
            let _ = graph.erase_node(id);
        }
        Ok(())
    }
}
