//! A generic communicator, wrapping known implementors of [`Communicator`].
//!
//! Useful in settings where it is awkward to stay generic over
//! `C: Communicator` — e.g. a [`crate::typed::TypedTransport`] held in a
//! struct field whose concrete backend is chosen at startup from
//! configuration.

use std::collections::HashMap;

use crate::allocator::in_process::InProcessCommunicator;
use crate::communicator::{CommError, Communicator, Request, Status};
use crate::identifier::Rank;

#[cfg(feature = "mpi")]
use crate::allocator::mpi_backend::MpiCommunicator;

/// Enumerates the known [`Communicator`] backends and dispatches trait
/// calls to whichever is active.
#[derive(Clone)]
pub enum Generic {
    /// Single-process, multi-rank backend used by every test and by
    /// single-machine demos.
    InProcess(InProcessCommunicator),
    /// Real multi-process backend, built on MPI. Only available when the
    /// `mpi` feature is enabled.
    #[cfg(feature = "mpi")]
    Mpi(MpiCommunicator),
}

impl Communicator for Generic {
    fn rank(&self) -> Rank {
        match self {
            Generic::InProcess(c) => c.rank(),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.rank(),
        }
    }

    fn size(&self) -> Rank {
        match self {
            Generic::InProcess(c) => c.size(),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.size(),
        }
    }

    fn send(&self, bytes: &[u8], destination: Rank, tag: i32) -> Result<(), CommError> {
        match self {
            Generic::InProcess(c) => c.send(bytes, destination, tag),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.send(bytes, destination, tag),
        }
    }

    fn issend(&self, bytes: Vec<u8>, destination: Rank, tag: i32) -> Result<Request, CommError> {
        match self {
            Generic::InProcess(c) => c.issend(bytes, destination, tag),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.issend(bytes, destination, tag),
        }
    }

    fn probe(&self, source: Option<Rank>, tag: i32) -> Result<Status, CommError> {
        match self {
            Generic::InProcess(c) => c.probe(source, tag),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.probe(source, tag),
        }
    }

    fn iprobe(&self, source: Option<Rank>, tag: i32) -> Result<Option<Status>, CommError> {
        match self {
            Generic::InProcess(c) => c.iprobe(source, tag),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.iprobe(source, tag),
        }
    }

    fn recv(&self, source: Rank, tag: i32) -> Result<Vec<u8>, CommError> {
        match self {
            Generic::InProcess(c) => c.recv(source, tag),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.recv(source, tag),
        }
    }

    fn all_to_all(&self, export: HashMap<Rank, Vec<u8>>, tag: i32) -> Result<HashMap<Rank, Vec<u8>>, CommError> {
        match self {
            Generic::InProcess(c) => c.all_to_all(export, tag),
            #[cfg(feature = "mpi")]
            Generic::Mpi(c) => c.all_to_all(export, tag),
        }
    }
}
