//! The crate-wide error type.
//!
//! Per `spec.md` §7, every error kind the kernel can produce is fatal from
//! the kernel's own point of view: operations return [`Result`] so callers
//! *can* propagate with `?`, but no component here attempts partial
//! recovery, and [`crate::graph::DistributedGraph::synchronize`] /
//! [`crate::graph::DistributedGraph::distribute`] do not catch and
//! continue past an `Err` from any sub-step. `anyhow::Error` is reserved
//! for the model/runtime boundary, where a caller-supplied
//! [`crate::model::Agent::act`] or
//! [`crate::graph::load_balancing::Partitioner`] implementation may itself
//! fail in ways this crate cannot name.

use thiserror::Error;

use crate::communication::communicator::CommError;
use crate::communication::typed::TransportError;
use crate::communication::wire::SerializationError;
use crate::DistributedId;

/// The crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FpmasError>;

/// Every fatal error kind the graph/sync/scheduler kernel can raise.
#[derive(Debug, Error)]
pub enum FpmasError {
    /// Lookup of a node by id found nothing, locally or distantly.
    #[error("no node with id {0} is known on this process")]
    MissingNode(DistributedId),
    /// Lookup of an edge by id found nothing.
    #[error("no edge with id {0} is known on this process")]
    MissingEdge(DistributedId),
    /// An operation was attempted against a node/edge/mutex in a state
    /// that does not permit it (e.g. unlocking an unlocked mutex).
    #[error("state violation: {0}")]
    StateViolation(String),
    /// An imported edge's endpoint could not be resolved locally and was
    /// not itself present in the incoming packet.
    #[error("could not resolve endpoint {0} while importing")]
    UnresolvedImport(DistributedId),
    /// The underlying transport failed.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A wire payload failed to encode or decode.
    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl From<CommError> for FpmasError {
    fn from(err: CommError) -> Self {
        FpmasError::Transport(err.to_string())
    }
}

impl From<TransportError> for FpmasError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Comm(e) => FpmasError::Transport(e.to_string()),
            TransportError::Serialization(e) => FpmasError::Serialization(e.to_string()),
        }
    }
}

impl From<SerializationError> for FpmasError {
    fn from(err: SerializationError) -> Self {
        FpmasError::Serialization(err.to_string())
    }
}
