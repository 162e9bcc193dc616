//! The distributed graph: nodes and edges that may be `LOCAL` (owned by
//! this process) or `DISTANT` (a read-only replica), plus the machinery
//! that keeps that state consistent across processes.
//!
//! [`base`] is the plain, single-process multigraph core (insert/erase,
//! adjacency, callbacks) that `spec.md` §4.2 specifies. [`distributed`]
//! layers ownership state, import/export, and `distribute` on top of it
//! (§4.3). [`location`] is the origin/current-location gossip protocol
//! (§4.4). [`load_balancing`] turns the graph into a partitioning problem
//! and drives repartitioning on a schedule (§4.7).

pub mod base;
pub mod distributed;
pub mod load_balancing;
pub mod location;
pub mod node;
pub mod packet;

pub use base::Graph;
pub use distributed::DistributedGraph;
pub use load_balancing::{Partitioner, PartitionMap};
pub use location::LocationManager;
pub use node::{Edge, LayerId, Node, NodeState};
pub use packet::{EdgePacket, NodePacket};
