//! The client side of a hard-sync mutex access against a `DISTANT` node:
//! Issend the request, keep answering incoming requests until it has been
//! received (so a receiving rank waiting on *us* never deadlocks), then
//! block for the response — grounded on
//! `original_source/src/main/graph/parallel/synchro/hard/mutex_client.h`.

use fpmas_communication::communicator::Communicator;

use crate::graph::base::Graph;
use crate::graph::distributed::NodeData;
use crate::synchro::hard::tags;
use crate::synchro::hard::{DataUpdatePack, HardSyncMode};
use crate::{DistributedId, Rank, Result};

impl<T: NodeData, C: Communicator + Clone> HardSyncMode<T, C> {
    pub(crate) fn remote_request_data(
        &mut self,
        graph: &mut Graph<T>,
        owner: Rank,
        id: DistributedId,
        request_tag: i32,
        response_tag: i32,
    ) -> Result<T> {
        self.termination.request_started();
        let tag = tags::combine(request_tag, self.epoch);
        let request = self.id_tx.issend(&id, owner, tag)?;
        while !self.id_tx.test(&request) {
            self.handle_incoming_requests(graph)?;
        }
        let resp_tag = tags::combine(response_tag, self.epoch);
        let status = self.data_tx.probe(Some(owner), resp_tag)?;
        let data = self.data_tx.recv(status.source, resp_tag)?;
        self.termination.request_finished();
        Ok(data)
    }

    pub(crate) fn remote_request_ack(
        &mut self,
        graph: &mut Graph<T>,
        owner: Rank,
        id: DistributedId,
        request_tag: i32,
        response_tag: i32,
    ) -> Result<()> {
        self.termination.request_started();
        let tag = tags::combine(request_tag, self.epoch);
        let request = self.id_tx.issend(&id, owner, tag)?;
        while !self.id_tx.test(&request) {
            self.handle_incoming_requests(graph)?;
        }
        let resp_tag = tags::combine(response_tag, self.epoch);
        let status = self.ack_tx.probe(Some(owner), resp_tag)?;
        self.ack_tx.recv(status.source, resp_tag)?;
        self.termination.request_finished();
        Ok(())
    }

    pub(crate) fn remote_release(
        &mut self,
        graph: &mut Graph<T>,
        owner: Rank,
        id: DistributedId,
        release_tag: i32,
    ) -> Result<()> {
        let tag = tags::combine(release_tag, self.epoch);
        let request = self.id_tx.issend(&id, owner, tag)?;
        while !self.id_tx.test(&request) {
            self.handle_incoming_requests(graph)?;
        }
        Ok(())
    }

    pub(crate) fn remote_release_acquire(
        &mut self,
        graph: &mut Graph<T>,
        owner: Rank,
        id: DistributedId,
        data: T,
    ) -> Result<()> {
        let tag = tags::combine(tags::base::RELEASE_ACQUIRE, self.epoch);
        let pack = DataUpdatePack { id, data };
        let request = self.release_tx.issend(&pack, owner, tag)?;
        while !self.release_tx.test(&request) {
            self.handle_incoming_requests(graph)?;
        }
        Ok(())
    }
}
