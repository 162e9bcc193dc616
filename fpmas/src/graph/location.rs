//! The location manager: for every id a process has ever seen, tracks
//! which rank currently holds its `LOCAL` copy — `spec.md` §4.4.
//!
//! There is no single original header that implements this three-step
//! gossip protocol in isolation (the closest analog is the location
//! bookkeeping embedded in `original_source/.../distributed_graph.h`'s
//! `distribute`); this module follows `spec.md` §4.4 directly.

use std::collections::{HashMap, HashSet};

use fpmas_communication::communicator::Communicator;
use fpmas_communication::typed::TypedTransport;
use fpmas_communication::wire::Binary;

use crate::{DistributedId, Rank, Result};

/// Tracks, for every id known on this process, the rank currently
/// holding its `LOCAL` copy.
///
/// A process is the *registrar* for every id whose `origin_rank` equals
/// its own rank: for those ids, its table entry is authoritative and
/// every other process's view is ultimately refreshed from it.
pub struct LocationManager<C> {
    rank: Rank,
    table: HashMap<DistributedId, Rank>,
    pairs: TypedTransport<Vec<(DistributedId, Rank)>, C, Binary>,
    lookups: TypedTransport<Vec<DistributedId>, C, Binary>,
}

impl<C: Communicator + Clone> LocationManager<C> {
    /// Builds a location manager over `communicator`, reserving two
    /// adjacent channel ids (`channel_id` and `channel_id + 1`) for its
    /// internal report/resolve/respond traffic.
    pub fn new(communicator: C, channel_id: i32) -> Self {
        let rank = communicator.rank();
        LocationManager {
            rank,
            table: HashMap::new(),
            pairs: TypedTransport::new(communicator.clone(), channel_id),
            lookups: TypedTransport::new(communicator, channel_id + 1),
        }
    }

    /// This process's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// The last-known location of `id`, if this process has ever
    /// resolved it.
    pub fn location(&self, id: DistributedId) -> Option<Rank> {
        self.table.get(&id).copied()
    }

    /// Directly records `id`'s location, without a network round-trip.
    /// Used when a process is itself `id`'s registrar and already knows
    /// the answer (e.g. right after `build_node`).
    pub fn set_location(&mut self, id: DistributedId, location: Rank) {
        self.table.insert(id, location);
    }

    /// Runs the three-step gossip protocol (`spec.md` §4.4): report
    /// `newly_local`'s new ownership to each node's registrar, then
    /// resolve every other known id whose location might be stale
    /// against its registrar, then let each registrar respond.
    ///
    /// `known_ids` should enumerate every id this process currently
    /// tracks (typically every node id in the local
    /// [`crate::graph::DistributedGraph`]) so step B can refresh
    /// potentially-stale entries.
    pub fn update_locations(
        &mut self,
        newly_local: &[DistributedId],
        known_ids: impl Iterator<Item = DistributedId>,
    ) -> Result<()> {
        // Step A: report.
        let mut report_export: HashMap<Rank, Vec<(DistributedId, Rank)>> = HashMap::new();
        let mut resolved_this_round: HashSet<DistributedId> = HashSet::new();
        for &id in newly_local {
            self.table.insert(id, self.rank);
            resolved_this_round.insert(id);
            if id.origin_rank() != self.rank {
                report_export.entry(id.origin_rank()).or_default().push((id, self.rank));
            }
        }
        let incoming_reports = self.pairs.migrate(report_export)?;
        for reports in incoming_reports.into_values() {
            for (id, rank) in reports {
                self.table.insert(id, rank);
                resolved_this_round.insert(id);
            }
        }

        // Step B: resolve.
        let mut resolve_export: HashMap<Rank, Vec<DistributedId>> = HashMap::new();
        for id in known_ids {
            if resolved_this_round.contains(&id) || id.origin_rank() == self.rank {
                continue;
            }
            resolve_export.entry(id.origin_rank()).or_default().push(id);
        }
        let incoming_lookups = self.lookups.migrate(resolve_export)?;

        // Step C: respond.
        let mut respond_export: HashMap<Rank, Vec<(DistributedId, Rank)>> = HashMap::new();
        for (requester, ids) in incoming_lookups {
            let reply: Vec<(DistributedId, Rank)> =
                ids.into_iter().filter_map(|id| self.table.get(&id).map(|&rank| (id, rank))).collect();
            respond_export.insert(requester, reply);
        }
        let incoming_responses = self.pairs.migrate(respond_export)?;
        for responses in incoming_responses.into_values() {
            for (id, rank) in responses {
                self.table.insert(id, rank);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpmas_communication::allocator::in_process::InProcessCommunicator;

    #[test]
    fn update_locations_resolves_a_distant_node_via_its_registrar() {
        let group = InProcessCommunicator::new_vector(3);
        let mut managers: Vec<_> = group.into_iter().map(|c| LocationManager::new(c, 0)).collect();

        // Rank 0 owns (0, 5); rank 2 holds a stale belief that it is on rank 1.
        managers[0].set_location(DistributedId::new(0, 5), 0);
        managers[2].table.insert(DistributedId::new(0, 5), 1);

        std::thread::scope(|scope| {
            let handles: Vec<_> = managers
                .iter_mut()
                .enumerate()
                .map(|(rank, manager)| {
                    let known: Vec<DistributedId> = if rank == 2 { vec![DistributedId::new(0, 5)] } else { vec![] };
                    scope.spawn(move || manager.update_locations(&[], known.into_iter()).unwrap())
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });

        assert_eq!(managers[2].location(DistributedId::new(0, 5)), Some(0));
    }
}
