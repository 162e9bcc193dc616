//! Typed events describing transport activity, for streams registered in a
//! [`fpmas_logging::Registry`].

use serde::{Deserialize, Serialize};

use crate::identifier::Rank;

/// Which collective or point-to-point operation produced a
/// [`CommunicationEvent`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Operation {
    Send,
    Issend,
    Recv,
    Migrate,
    Gather,
    AllGather,
    Bcast,
}

/// A single observed transport operation, suitable for buffering into a
/// [`fpmas_logging::Logger<CommunicationEvent>`] and later flushed to a
/// trace file or dashboard.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct CommunicationEvent {
    /// The rank that performed the operation.
    pub rank: Rank,
    /// The remote peer, when the operation names one (absent for e.g.
    /// `AllGather`, which has no single peer).
    pub peer: Option<Rank>,
    /// The channel the message travelled on.
    pub channel_id: i32,
    /// Payload size in bytes.
    pub bytes: usize,
    pub operation: Operation,
}
