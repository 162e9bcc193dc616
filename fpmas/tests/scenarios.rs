//! End-to-end scenarios spanning several ranks at once, grounded on the
//! named properties in `spec.md` §8 and exercised with
//! [`InProcessCommunicator`] the same way the unit tests in
//! `src/graph/location.rs` and `src/synchro/ghost.rs` do: one thread per
//! rank via `std::thread::scope`, joined once every rank's collective
//! calls return.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fpmas::graph::load_balancing::{NodeMap, PartitionMap, Partitioner, ScheduledLoadBalancing};
use fpmas::graph::node::NodeState;
use fpmas::graph::{DistributedGraph, LayerId, Node};
use fpmas::model::{Agent, AgentContext, Group};
use fpmas::scheduler::{Date, Job, Runtime, Scheduler, Task};
use fpmas::synchro::ghost::GhostMode;
use fpmas::synchro::hard::HardSyncMode;
use fpmas::DistributedId;
use fpmas_communication::allocator::in_process::InProcessCommunicator;

/// S1 (`spec.md` §8): a 4-node ring, built entirely on rank 0, distributed
/// one node per rank. Every bridging edge should end up `DISTANT` on both
/// of the ranks holding its endpoints, and each rank should keep exactly
/// the one node `distribute` assigned it.
#[test]
fn ring_distribute_places_one_node_per_rank_and_marks_bridges_distant() {
    let size = 4;
    let group = InProcessCommunicator::new_vector(size);
    let mut graphs: Vec<DistributedGraph<i32, _, GhostMode<i32, _>>> = group
        .into_iter()
        .map(|c| {
            let sync = GhostMode::new(c.clone(), 0);
            DistributedGraph::new(c, sync)
        })
        .collect();

    let ids: Vec<DistributedId> = (0..size).map(|i| graphs[0].build_node(i)).collect();
    for i in 0..size as usize {
        let next = (i + 1) % size as usize;
        graphs[0].link(ids[i], ids[next], LayerId(0)).unwrap();
    }

    let mut partition = HashMap::new();
    for (i, &id) in ids.iter().enumerate() {
        partition.insert(id, i as i32);
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = graphs
            .iter_mut()
            .enumerate()
            .map(|(rank, g)| {
                let partition = if rank == 0 { partition.clone() } else { HashMap::new() };
                scope.spawn(move || g.distribute(&partition).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    });

    for rank in 0..size as usize {
        let own_id = ids[rank];
        let node = graphs[rank].graph().get_node(own_id).expect("distribute assigned this node here");
        assert_eq!(node.state(), NodeState::Local, "rank {rank} should own node {rank}");
        assert_eq!(*node.data(), rank as i32);
    }

    for rank in 0..size as usize {
        let next_rank = (rank + 1) % size as usize;
        let bridge = ids[(rank + 1) % size];
        let this_side = ids[rank];

        let here = graphs[rank]
            .graph()
            .edges()
            .find(|e| e.source() == this_side && e.target() == bridge)
            .unwrap_or_else(|| panic!("rank {rank} should still know the bridging edge to rank {next_rank}"));
        assert_eq!(here.state(), NodeState::Distant);

        let there = graphs[next_rank]
            .graph()
            .edges()
            .find(|e| e.source() == this_side && e.target() == bridge)
            .unwrap_or_else(|| panic!("rank {next_rank} should also know the bridging edge from rank {rank}"));
        assert_eq!(there.state(), NodeState::Distant);
    }
}

/// S3 (`spec.md` §8): under `HardSyncMode`, every rank repeatedly acquires
/// a node owned by rank 0 and increments it; no interleaving should lose
/// an update, so the final value is exactly `size * increments_per_rank`.
#[test]
fn hard_sync_acquire_is_mutually_exclusive_across_ranks() {
    let size = 4;
    let increments_per_rank = 25;
    let group = InProcessCommunicator::new_vector(size);
    let mut graphs: Vec<DistributedGraph<i32, _, HardSyncMode<i32, _>>> = group
        .into_iter()
        .map(|c| {
            let sync = HardSyncMode::new(c.clone(), 0);
            DistributedGraph::new(c, sync)
        })
        .collect();

    let shared = graphs[0].build_node(0);
    for rank in 1..size as usize {
        graphs[rank].graph_mut().insert_node(Node::distant(shared, 0, 1.0, 0));
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = graphs
            .iter_mut()
            .map(|g| {
                scope.spawn(move || {
                    for _ in 0..increments_per_rank {
                        let value = g.acquire(shared).unwrap();
                        g.release_acquire(shared, value + 1).unwrap();
                    }
                    g.synchronize().unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    });

    assert_eq!(*graphs[0].graph().get_node(shared).unwrap().data(), size * increments_per_rank);
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
struct CounterAgent {
    value: i32,
}

impl Agent<InProcessCommunicator, GhostMode<CounterAgent, InProcessCommunicator>> for CounterAgent {
    fn act(
        &mut self,
        ctx: &mut AgentContext<'_, Self, InProcessCommunicator, GhostMode<Self, InProcessCommunicator>>,
    ) -> fpmas::Result<()> {
        let neighbors = ctx.out_neighbors();
        let neighbor = neighbors.first().copied().expect("ring has exactly one out neighbor");
        let neighbor_value = ctx.read(neighbor)?.value;
        self.value = neighbor_value + 1;
        Ok(())
    }
}

/// A model-layer smoke test: two agents linked in a cycle, one `Group`,
/// driven by a `Runtime` for a few steps. Confirms `Agent`/`AgentTask`/
/// `Group`/`Scheduler`/`Runtime` compose correctly end to end, including
/// the deterministic insertion-order task execution within a step
/// (`DESIGN.md` Open Question 1).
#[test]
fn agent_group_runs_under_the_runtime_and_synchronizes_each_step() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let communicator = InProcessCommunicator::new_vector(1).pop().unwrap();
    let sync = GhostMode::new(communicator.clone(), 0);
    let graph = Rc::new(RefCell::new(DistributedGraph::new(communicator, sync)));

    let (node0, node1) = {
        let mut g = graph.borrow_mut();
        let node0 = g.build_node(CounterAgent { value: 0 });
        let node1 = g.build_node(CounterAgent { value: 100 });
        g.link(node0, node1, LayerId(0)).unwrap();
        g.link(node1, node0, LayerId(0)).unwrap();
        (node0, node1)
    };

    let mut group: Group<CounterAgent, InProcessCommunicator, GhostMode<CounterAgent, InProcessCommunicator>> =
        Group::new(Rc::clone(&graph));
    group.add(node0);
    group.add(node1);

    let mut scheduler = Scheduler::new();
    group.schedule(&mut scheduler, Date::new(0, 0.0), 1);
    let mut runtime = Runtime::new(scheduler);
    runtime.run(3).unwrap();

    let g = graph.borrow();
    assert_eq!(g.graph().get_node(node0).unwrap().data().value, 105);
    assert_eq!(g.graph().get_node(node1).unwrap().data().value, 106);
}

/// S4 (`spec.md` §8): under `HardSyncMode`, one rank sleeping through its
/// own `synchronize()` call must not deadlock the termination protocol
/// for the others — the whole round only ends once that rank finally
/// sends its first coloured token, so elapsed time should be at least as
/// long as the sleep.
#[test]
fn hard_sync_termination_survives_a_slow_rank() {
    let size = 4;
    let group = InProcessCommunicator::new_vector(size);
    let mut graphs: Vec<DistributedGraph<i32, _, HardSyncMode<i32, _>>> = group
        .into_iter()
        .map(|c| {
            let sync = HardSyncMode::new(c.clone(), 0);
            DistributedGraph::new(c, sync)
        })
        .collect();

    let start = Instant::now();
    std::thread::scope(|scope| {
        let handles: Vec<_> = graphs
            .iter_mut()
            .enumerate()
            .map(|(rank, g)| {
                scope.spawn(move || {
                    if rank == 0 {
                        std::thread::sleep(Duration::from_secs(1));
                    }
                    g.synchronize().unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    });
    assert!(start.elapsed() >= Duration::from_secs(1));
}

/// S5 (`spec.md` §8): an 8-node ring distributed one pair per rank (the
/// same setup as S1, scaled to 4 ranks), after which rank 0 owns neither
/// endpoint of a would-be edge between two nodes it only has a cached
/// location for (the middle of ring node 3 and ring node 5 were both
/// pruned from rank 0's replica entirely by `clear_node`, since neither
/// has a surviving local neighbor there). Rank 0 links them anyway —
/// `ensure_known` resolves both locations from the location manager's
/// table without needing a network round-trip — and after the next
/// `synchronize`, the two owning ranks should each see the new edge
/// while rank 0's own copy (both endpoints distant to it) is gone.
#[test]
fn link_between_two_cached_distant_nodes_propagates_to_both_owners() {
    let size = 4;
    let group = InProcessCommunicator::new_vector(size);
    let mut graphs: Vec<DistributedGraph<i32, _, GhostMode<i32, _>>> = group
        .into_iter()
        .map(|c| {
            let sync = GhostMode::new(c.clone(), 0);
            DistributedGraph::new(c, sync)
        })
        .collect();

    let ids: Vec<DistributedId> = (0..8).map(|i| graphs[0].build_node(i)).collect();
    for i in 0..8usize {
        let next = (i + 1) % 8;
        graphs[0].link(ids[i], ids[next], LayerId(0)).unwrap();
    }

    let mut partition = HashMap::new();
    for (k, &id) in ids.iter().enumerate() {
        partition.insert(id, (k / 2) as i32);
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = graphs
            .iter_mut()
            .enumerate()
            .map(|(rank, g)| {
                let partition = if rank == 0 { partition.clone() } else { HashMap::new() };
                scope.spawn(move || g.distribute(&partition).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    });

    // Node 3 and node 5 sit in the interior of ranks 1 and 2's shares,
    // with no edge left to anything rank 0 kept local, so `clear_node`
    // erased them from rank 0 entirely.
    assert!(graphs[0].graph().get_node(ids[3]).is_none());
    assert!(graphs[0].graph().get_node(ids[5]).is_none());

    graphs[0].link(ids[3], ids[5], LayerId(0)).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = graphs.iter_mut().map(|g| scope.spawn(move || g.synchronize().unwrap())).collect();
        for h in handles {
            h.join().unwrap();
        }
    });

    for rank in [1usize, 2usize] {
        assert!(
            graphs[rank].graph().edges().any(|e| e.source() == ids[3] && e.target() == ids[5]),
            "rank {rank} should observe the new edge after synchronize"
        );
    }
    assert!(
        graphs[0].graph().edges().all(|e| !(e.source() == ids[3] && e.target() == ids[5])),
        "rank 0's own copy had both endpoints distant, so synchronize should have erased it"
    );
}

/// A task bound to a node but otherwise inert, for load-balancing tests
/// that only care which nodes a job touches.
struct BoundTask(DistributedId);

impl Task for BoundTask {
    fn run(&mut self) -> fpmas::Result<()> {
        Ok(())
    }

    fn bound_node(&self) -> Option<DistributedId> {
        Some(self.0)
    }
}

/// A [`Partitioner`] spy: assigns every node [`ScheduledLoadBalancing`]
/// hands it (that isn't already `fixed`) to a rank picked from how many
/// times it has been called so far, and records each call's node-id set
/// and `fixed` map — enough to see exactly how `ScheduledLoadBalancing`
/// drives it, without needing to reproduce a real partitioner's scoring.
struct RecordingPartitioner {
    size: i32,
    calls: Vec<(Vec<DistributedId>, PartitionMap)>,
}

impl RecordingPartitioner {
    fn new(size: i32) -> Self {
        RecordingPartitioner { size, calls: Vec::new() }
    }
}

impl Partitioner for RecordingPartitioner {
    fn balance(&mut self, nodes: &NodeMap, fixed: &PartitionMap) -> anyhow::Result<PartitionMap> {
        let mut ids: Vec<DistributedId> = nodes.keys().copied().collect();
        ids.sort();
        let call_rank = (self.calls.len() as i32) % self.size;
        self.calls.push((ids.clone(), fixed.clone()));
        let mut partition = fixed.clone();
        for id in ids {
            partition.entry(id).or_insert(call_rank);
        }
        Ok(partition)
    }
}

/// S6 (`spec.md` §8): `ScheduledLoadBalancing` must consult the
/// partitioner once per node touched by the upcoming epoch's jobs —
/// scoped to just that job, with nothing yet fixed — before a final call
/// sees the whole graph with every job's placement pinned. Nodes `a` and
/// `b` are both bound by the one scheduled job; `c` is bound by nothing
/// and only shows up in the final, whole-graph call.
#[test]
fn scheduled_load_balancing_partitions_job_bound_nodes_before_the_whole_graph() {
    let communicator = InProcessCommunicator::new_vector(1).pop().unwrap();
    let sync = GhostMode::new(communicator.clone(), 0);
    let mut graph: DistributedGraph<i32, _, GhostMode<i32, _>> = DistributedGraph::new(communicator.clone(), sync);

    let a = graph.build_node(0);
    let b = graph.build_node(0);
    let c = graph.build_node(0);
    let ab = fpmas::graph::Edge::new(DistributedId::new(0, 900), LayerId(0), 1.0, a, b, NodeState::Local);
    graph.graph_mut().insert_edge(ab).unwrap();
    let bc = fpmas::graph::Edge::new(DistributedId::new(0, 901), LayerId(0), 1.0, b, c, NodeState::Local);
    graph.graph_mut().insert_edge(bc).unwrap();

    let mut scheduler = Scheduler::new();
    let job = Job::new();
    job.add_task(Box::new(BoundTask(a)));
    job.add_task(Box::new(BoundTask(b)));
    scheduler.schedule_recurring(Date::new(0, 0.0), 1, job);
    // `runtime`'s own scheduler is irrelevant here: `balance` takes the
    // real one as an explicit argument and only reads `runtime` for the
    // current step.
    let runtime = Runtime::new(Scheduler::new());

    let scheduled = ScheduledLoadBalancing::new(communicator, 50);
    let mut partitioner = RecordingPartitioner::new(2);
    let result = scheduled.balance(&graph, &scheduler, &runtime, &mut partitioner).unwrap();

    assert_eq!(partitioner.calls.len(), 2, "one call for the upcoming job, one final call for the whole graph");

    let (job_ids, job_fixed) = &partitioner.calls[0];
    assert_eq!(job_ids, &vec![a, b], "the job-scoped call should only see the nodes that job touches");
    assert!(job_fixed.is_empty(), "nothing has been placed yet ahead of the first job");

    let (whole_ids, whole_fixed) = &partitioner.calls[1];
    assert_eq!(whole_ids, &vec![a, b, c], "the final call should see every node in the graph");
    assert_eq!(whole_fixed[&a], result[&a], "a's job-scoped placement should already be pinned going in");
    assert_eq!(whole_fixed[&b], result[&b], "b's job-scoped placement should already be pinned going in");
    assert!(!whole_fixed.contains_key(&c), "c was never job-bound, so it stays unfixed until this call");

    // The job-scoped call colocated a and b on its own rank; pinning
    // carries that into the final result even though the final call's
    // own default rank (for c, the only still-unfixed node) differs.
    assert_eq!(result[&a], result[&b]);
    assert_ne!(result[&c], result[&a]);
}
