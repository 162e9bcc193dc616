//! `MpiCommunicator`: a [`Communicator`] backed by a real MPI runtime via
//! `rsmpi`.
//!
//! This is the multi-process counterpart to
//! [`crate::allocator::in_process::InProcessCommunicator`]; it is gated
//! behind the `mpi` feature and requires a working MPI installation to
//! build and link against. No file in the reference corpus exercises an
//! actual MPI binding, so this backend follows the shape of
//! `original_source/.../communication.h`'s `MpiCommunicator` interface
//! directly rather than an idiom borrowed from the teacher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mpi::point_to_point::{Destination, Source};
use mpi::topology::{Communicator as MpiTopologyCommunicator, SystemCommunicator};
use mpi::Tag as MpiTag;

use crate::communicator::{CommError, Communicator, Request, Status};
use crate::identifier::Rank;

/// A [`Communicator`] that moves bytes over MPI's two-sided point-to-point
/// calls.
///
/// `Clone` because `SystemCommunicator` is itself a cheap, `Copy` handle
/// onto MPI's world communicator.
#[derive(Clone)]
pub struct MpiCommunicator {
    world: SystemCommunicator,
}

impl MpiCommunicator {
    /// Wraps the world communicator of an already-initialized MPI
    /// environment. Callers are responsible for keeping the owning
    /// `mpi::environment::Universe` alive for as long as this value lives.
    pub fn new(world: SystemCommunicator) -> Self {
        MpiCommunicator { world }
    }
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> Rank {
        self.world.rank()
    }

    fn size(&self) -> Rank {
        self.world.size()
    }

    fn send(&self, bytes: &[u8], destination: Rank, tag: i32) -> Result<(), CommError> {
        self.world.process_at_rank(destination).send_with_tag(bytes, tag as MpiTag);
        Ok(())
    }

    fn issend(&self, bytes: Vec<u8>, destination: Rank, tag: i32) -> Result<Request, CommError> {
        // rsmpi's immediate synchronous send borrows its buffer for the
        // lifetime of the request; a helper thread lets us instead expose
        // the same owned `Request` handle the in-process backend returns,
        // so callers stay backend-agnostic.
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = Arc::clone(&done);
        let world = self.world;
        std::thread::spawn(move || {
            let process = world.process_at_rank(destination);
            process.synchronous_send_with_tag(&bytes[..], tag as MpiTag);
            done_clone.store(true, Ordering::Release);
        });
        Ok(Request { done })
    }

    fn probe(&self, source: Option<Rank>, tag: i32) -> Result<Status, CommError> {
        let status = match source {
            Some(rank) => self.world.process_at_rank(rank).probe_with_tag(tag as MpiTag),
            None => self.world.any_process().probe_with_tag(tag as MpiTag),
        };
        Ok(Status { source: status.source_rank(), tag: status.tag(), size: 0 })
    }

    fn iprobe(&self, source: Option<Rank>, tag: i32) -> Result<Option<Status>, CommError> {
        let probed = match source {
            Some(rank) => self.world.process_at_rank(rank).immediate_probe_with_tag(tag as MpiTag),
            None => self.world.any_process().immediate_probe_with_tag(tag as MpiTag),
        };
        Ok(probed.map(|status| Status { source: status.source_rank(), tag: status.tag(), size: 0 }))
    }

    fn recv(&self, source: Rank, tag: i32) -> Result<Vec<u8>, CommError> {
        let (data, _status) = self.world.process_at_rank(source).receive_vec_with_tag::<u8>(tag as MpiTag);
        Ok(data)
    }
}
