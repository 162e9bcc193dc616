//! The [`Communicator`] trait: a minimal MPI-2-equivalent transport
//! contract, grounded in `MpiCommunicator` of the original FPMAS
//! implementation (`src/fpmas/api/communication/communication.h`).
//!
//! Implementations move raw bytes; [`crate::typed::TypedTransport`] layers
//! a [`crate::wire::WireFormat`] on top to move typed values.

use std::collections::HashMap;

use thiserror::Error;

use crate::identifier::Rank;

/// A message tag, scoped per [`crate::typed::TypedTransport`] channel.
pub type Tag = i32;

/// Failure of an underlying transport operation.
///
/// Per `spec.md` §7, a transport failure is unrecoverable: callers
/// propagate it out of the current call rather than retrying.
#[derive(Debug, Error)]
pub enum CommError {
    /// The remote rank is out of the communicator's process group.
    #[error("rank {0} is not part of this communicator's group")]
    UnknownRank(Rank),
    /// A lower-level transport error (socket, MPI runtime, channel).
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Information about a message made visible by [`Communicator::probe`] or
/// [`Communicator::iprobe`], or returned alongside a receive.
#[derive(Clone, Copy, Debug)]
pub struct Status {
    /// Rank the message originated from.
    pub source: Rank,
    /// Tag the message was sent with.
    pub tag: Tag,
    /// Size of the message payload, in bytes.
    pub size: usize,
}

/// A handle to a pending non-blocking synchronous send (`Issend`).
///
/// The request completes — i.e. [`Communicator::test`] starts returning
/// `true` — only once a matching `recv` has actually consumed the message
/// on the destination rank, per the synchronous-send semantics of
/// `spec.md` §4.1.
pub struct Request {
    pub(crate) done: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

/// Wildcard source for [`Communicator::probe`]/[`Communicator::iprobe`],
/// mirroring `MPI_ANY_SOURCE`.
pub const ANY_SOURCE: Option<Rank> = None;

/// A typed-byte transport wrapper around the MPI collective/p2p layer.
///
/// Every method here operates on raw bytes; callers needing typed values
/// use [`crate::typed::TypedTransport`], which serializes through a
/// [`crate::wire::WireFormat`] before calling down to these primitives.
pub trait Communicator: Send + Sync {
    /// This process's rank in `0..size()`.
    fn rank(&self) -> Rank;
    /// The number of processes in the group.
    fn size(&self) -> Rank;

    /// Blocking, asynchronous send: returns once the payload has been
    /// handed off, without waiting for the destination to receive it.
    fn send(&self, bytes: &[u8], destination: Rank, tag: Tag) -> Result<(), CommError>;

    /// Non-blocking, synchronous send: returns a [`Request`] that only
    /// completes (per [`Communicator::test`]) once `destination` has
    /// actually received this exact message.
    fn issend(&self, bytes: Vec<u8>, destination: Rank, tag: Tag) -> Result<Request, CommError>;

    /// Blocks until a message tagged `tag` from `source` (or any source,
    /// if `None`) is available, and returns its [`Status`] without
    /// consuming it.
    fn probe(&self, source: Option<Rank>, tag: Tag) -> Result<Status, CommError>;

    /// Non-blocking variant of [`Communicator::probe`]: returns
    /// immediately with `None` if no matching message is available yet.
    fn iprobe(&self, source: Option<Rank>, tag: Tag) -> Result<Option<Status>, CommError>;

    /// Blocks until a message tagged `tag` from `source` is available,
    /// consumes it, and returns its payload.
    fn recv(&self, source: Rank, tag: Tag) -> Result<Vec<u8>, CommError>;

    /// Returns whether `request` has completed. Never blocks.
    fn test(&self, request: &Request) -> bool {
        request.done.load(std::sync::atomic::Ordering::Acquire)
    }

    /// A full variable-length exchange: `export` maps destination rank to
    /// the payload to send it (a rank absent from the map receives
    /// nothing). Returns the payloads received from each sending peer,
    /// keyed by source rank.
    ///
    /// Implemented, per `spec.md` §4.1, as a two-phase exchange: sizes
    /// first (so peers exporting to only a subset of the group are
    /// tolerated), then the payload bytes themselves.
    fn all_to_all(&self, export: HashMap<Rank, Vec<u8>>, tag: Tag) -> Result<HashMap<Rank, Vec<u8>>, CommError> {
        let size_tag = tag.wrapping_mul(2);
        let data_tag = size_tag.wrapping_add(1);
        let my_rank = self.rank();
        let group_size = self.size();

        for dest in 0..group_size {
            if dest == my_rank {
                continue;
            }
            let len = export.get(&dest).map(|v| v.len()).unwrap_or(0) as u64;
            self.send(&len.to_le_bytes(), dest, size_tag)?;
        }

        let mut incoming_sizes = HashMap::new();
        for source in 0..group_size {
            if source == my_rank {
                continue;
            }
            let bytes = self.recv(source, size_tag)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes);
            incoming_sizes.insert(source, u64::from_le_bytes(buf));
        }

        for dest in 0..group_size {
            if dest == my_rank {
                continue;
            }
            if let Some(payload) = export.get(&dest) {
                if !payload.is_empty() {
                    self.send(payload, dest, data_tag)?;
                }
            }
        }

        let mut result = HashMap::new();
        for (source, len) in incoming_sizes {
            if len > 0 {
                result.insert(source, self.recv(source, data_tag)?);
            }
        }
        Ok(result)
    }

    /// Gathers one payload per rank at `root`, ordered by rank.
    /// Non-root ranks receive an empty vector back.
    fn gather(&self, data: Vec<u8>, root: Rank, tag: Tag) -> Result<Vec<Vec<u8>>, CommError> {
        if self.rank() == root {
            let mut result = vec![Vec::new(); self.size() as usize];
            for source in 0..self.size() {
                result[source as usize] = if source == root { data.clone() } else { self.recv(source, tag)? };
            }
            Ok(result)
        } else {
            self.send(&data, root, tag)?;
            Ok(Vec::new())
        }
    }

    /// Gathers one payload per rank at every rank, ordered by rank.
    fn all_gather(&self, data: Vec<u8>, tag: Tag) -> Result<Vec<Vec<u8>>, CommError> {
        let gathered = self.gather(data, 0, tag)?;
        let encoded = if self.rank() == 0 {
            bincode::serialize(&gathered).map_err(|e| CommError::Transport(e.to_string()))?
        } else {
            Vec::new()
        };
        let broadcast = self.bcast(if self.rank() == 0 { Some(encoded) } else { None }, 0, tag)?;
        bincode::deserialize(&broadcast).map_err(|e| CommError::Transport(e.to_string()))
    }

    /// Broadcasts `data` (required on `root`, ignored elsewhere) to every
    /// rank, returning the broadcast payload on all ranks including root.
    fn bcast(&self, data: Option<Vec<u8>>, root: Rank, tag: Tag) -> Result<Vec<u8>, CommError> {
        if self.rank() == root {
            let payload = data.expect("root must supply data to bcast");
            for dest in 0..self.size() {
                if dest != root {
                    self.send(&payload, dest, tag)?;
                }
            }
            Ok(payload)
        } else {
            self.recv(root, tag)
        }
    }
}
