//! Wire envelopes for migrating nodes and edges between processes.
//!
//! Per `spec.md` §6: a node packet is `{id, data, weight}`; an edge
//! packet is `{id, layer, weight, (source_id, source_location),
//! (target_id, target_location)}` — the edge packet is already a "light"
//! form, carrying endpoint handles rather than endpoint payloads, so no
//! separate light/full serializer split is needed at this layer (see
//! `DESIGN.md`, Open Question 3).

use serde::{Deserialize, Serialize};

use crate::graph::node::LayerId;
use crate::{DistributedId, Rank};

/// The full wire form of a node: enough to reconstruct it from scratch on
/// the receiving process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodePacket<T> {
    /// The node's id.
    pub id: DistributedId,
    /// The node's payload.
    pub data: T,
    /// The node's partitioning weight.
    pub weight: f64,
}

/// The wire form of an edge: endpoints are referenced by id plus their
/// last-known location, not by payload.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EdgePacket {
    /// The edge's id.
    pub id: DistributedId,
    /// The layer this edge lives on.
    pub layer: LayerId,
    /// The edge's partitioning weight.
    pub weight: f64,
    /// The source endpoint's id.
    pub source_id: DistributedId,
    /// The source endpoint's last-known location.
    pub source_location: Rank,
    /// The target endpoint's id.
    pub target_id: DistributedId,
    /// The target endpoint's last-known location.
    pub target_location: Rank,
}
