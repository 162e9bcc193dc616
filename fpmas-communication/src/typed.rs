//! Typed transport built from a [`Communicator`] and a [`WireFormat`].
//!
//! A [`TypedTransport`] is the unit of channel isolation a graph or
//! synchronization layer actually programs against: distinct transports
//! sharing the same underlying [`Communicator`] never see each other's
//! messages, because every protocol tag they use is namespaced by the
//! transport's `channel_id`.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::communicator::{CommError, Communicator, Request, Status};
use crate::identifier::Rank;
use crate::wire::{SerializationError, WireFormat};

/// A failure encountered moving a typed value across a [`TypedTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying [`Communicator`] failed.
    #[error(transparent)]
    Comm(#[from] CommError),
    /// The payload failed to encode or decode.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Internal protocol offsets reserved within a channel's tag namespace.
/// User-supplied tags are shifted past all of these, so application code
/// can never collide with a collective operation's control messages.
mod offset {
    pub const MIGRATE_SIZE: i32 = 1;
    pub const GATHER: i32 = 3;
    pub const ALL_GATHER: i32 = 4;
    pub const BCAST: i32 = 5;
    pub const USER: i32 = 1000;
}

/// A typed wrapper over a [`Communicator`], scoped to its own tag
/// namespace via `channel_id`.
///
/// Two `TypedTransport`s built with different `channel_id`s over the same
/// `C` never observe each other's traffic, even if they move the same `T`;
/// this is what lets e.g. the ghost-mode node transport and the hard-sync
/// request transport share one [`Communicator`] safely.
pub struct TypedTransport<T, C, F = crate::wire::Binary> {
    communicator: C,
    channel_id: i32,
    _value: PhantomData<T>,
    _format: PhantomData<F>,
}

impl<T, C, F> TypedTransport<T, C, F>
where
    T: Serialize + DeserializeOwned,
    C: Communicator,
    F: WireFormat,
{
    /// Wraps `communicator`, reserving the tag namespace
    /// `channel_id * 1_000_000 .. (channel_id + 1) * 1_000_000` for this
    /// transport's internal and user-facing traffic.
    pub fn new(communicator: C, channel_id: i32) -> Self {
        TypedTransport { communicator, channel_id, _value: PhantomData, _format: PhantomData }
    }

    /// This process's rank.
    pub fn rank(&self) -> Rank {
        self.communicator.rank()
    }

    /// The number of processes in the group.
    pub fn size(&self) -> Rank {
        self.communicator.size()
    }

    /// A direct handle to the wrapped communicator, for callers that need
    /// raw byte primitives alongside typed traffic (e.g. hard-sync probing
    /// an unknown-length request before deciding how to decode it).
    pub fn communicator(&self) -> &C {
        &self.communicator
    }

    fn tag(&self, offset: i32) -> i32 {
        self.channel_id.wrapping_mul(1_000_000).wrapping_add(offset)
    }

    /// Sends `value`, asynchronously, tagged with `user_tag` (shifted into
    /// this channel's user-tag range).
    pub fn send(&self, value: &T, destination: Rank, user_tag: i32) -> Result<(), TransportError> {
        let bytes = F::encode(value)?;
        self.communicator.send(&bytes, destination, self.tag(offset::USER + user_tag))?;
        Ok(())
    }

    /// Non-blocking synchronous send; see
    /// [`Communicator::issend`].
    pub fn issend(&self, value: &T, destination: Rank, user_tag: i32) -> Result<Request, TransportError> {
        let bytes = F::encode(value)?;
        Ok(self.communicator.issend(bytes, destination, self.tag(offset::USER + user_tag))?)
    }

    /// Blocks until a message tagged `user_tag` from `source` (or any
    /// source) is visible, without consuming it.
    pub fn probe(&self, source: Option<Rank>, user_tag: i32) -> Result<Status, TransportError> {
        Ok(self.communicator.probe(source, self.tag(offset::USER + user_tag))?)
    }

    /// Non-blocking probe; see [`Communicator::iprobe`].
    pub fn iprobe(&self, source: Option<Rank>, user_tag: i32) -> Result<Option<Status>, TransportError> {
        Ok(self.communicator.iprobe(source, self.tag(offset::USER + user_tag))?)
    }

    /// Blocks until a message tagged `user_tag` from `source` is
    /// available, and decodes it.
    pub fn recv(&self, source: Rank, user_tag: i32) -> Result<T, TransportError> {
        let bytes = self.communicator.recv(source, self.tag(offset::USER + user_tag))?;
        Ok(F::decode(&bytes)?)
    }

    /// Returns whether `request` has completed.
    pub fn test(&self, request: &Request) -> bool {
        self.communicator.test(request)
    }

    /// Exchanges one typed value per destination rank: `export` maps
    /// destination to payload (a rank absent from the map receives
    /// nothing), and the return maps source rank to the payload received
    /// from it.
    pub fn migrate(&self, export: HashMap<Rank, T>) -> Result<HashMap<Rank, T>, TransportError> {
        let mut encoded = HashMap::with_capacity(export.len());
        for (rank, value) in export {
            encoded.insert(rank, F::encode(&value)?);
        }
        let received = self.communicator.all_to_all(encoded, self.tag(offset::MIGRATE_SIZE))?;
        let mut decoded = HashMap::with_capacity(received.len());
        for (rank, bytes) in received {
            decoded.insert(rank, F::decode(&bytes)?);
        }
        Ok(decoded)
    }

    /// Gathers one value per rank at `root`, ordered by rank; non-root
    /// ranks get back an empty vector.
    pub fn gather(&self, value: T, root: Rank) -> Result<Vec<T>, TransportError> {
        let bytes = F::encode(&value)?;
        let gathered = self.communicator.gather(bytes, root, self.tag(offset::GATHER))?;
        let mut decoded = Vec::with_capacity(gathered.len());
        for bytes in gathered {
            if bytes.is_empty() && self.rank() != root {
                continue;
            }
            decoded.push(F::decode(&bytes)?);
        }
        Ok(decoded)
    }

    /// Gathers one value per rank at every rank, ordered by rank.
    pub fn all_gather(&self, value: T) -> Result<Vec<T>, TransportError>
    where
        T: Clone,
    {
        let bytes = F::encode(&value)?;
        let gathered = self.communicator.all_gather(bytes, self.tag(offset::ALL_GATHER))?;
        let mut decoded = Vec::with_capacity(gathered.len());
        for bytes in gathered {
            decoded.push(F::decode(&bytes)?);
        }
        Ok(decoded)
    }

    /// Broadcasts `value` (required on `root`, ignored elsewhere) to every
    /// rank.
    pub fn bcast(&self, value: Option<T>, root: Rank) -> Result<T, TransportError> {
        let payload = match value {
            Some(v) => Some(F::encode(&v)?),
            None => None,
        };
        let bytes = self.communicator.bcast(payload, root, self.tag(offset::BCAST))?;
        Ok(F::decode(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::in_process::InProcessCommunicator;
    use crate::wire::Json;
    use serde::Deserialize;

    #[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn send_recv_round_trips_a_typed_value() {
        let mut group = InProcessCommunicator::new_vector(2);
        let comm_b = group.pop().unwrap();
        let comm_a = group.pop().unwrap();
        let a = TypedTransport::<Point, _, Json>::new(comm_a, 0);
        let b = TypedTransport::<Point, _, Json>::new(comm_b, 0);
        a.send(&Point { x: 1, y: 2 }, 1, 0).unwrap();
        assert_eq!(b.recv(0, 0).unwrap(), Point { x: 1, y: 2 });
    }

    #[test]
    fn distinct_channels_do_not_collide() {
        let mut group_left = InProcessCommunicator::new_vector(2);
        let comm_b = group_left.pop().unwrap();
        let comm_a = group_left.pop().unwrap();
        // Two transports, channel ids 0 and 1, sharing nothing but the same
        // tag offsets, must not see each other's messages.
        let a0 = TypedTransport::<Point, _, Json>::new(comm_a, 0);
        drop(a0);
        let mut group = InProcessCommunicator::new_vector(2);
        let comm_b2 = group.pop().unwrap();
        let comm_a2 = group.pop().unwrap();
        let a1 = TypedTransport::<Point, _, Json>::new(comm_a2, 1);
        let b1 = TypedTransport::<Point, _, Json>::new(comm_b2, 1);
        a1.send(&Point { x: 5, y: 6 }, 1, 0).unwrap();
        assert_eq!(b1.recv(0, 0).unwrap(), Point { x: 5, y: 6 });
    }

    #[test]
    fn migrate_tolerates_partial_export_maps() {
        let group = InProcessCommunicator::new_vector(3);
        let transports: Vec<_> =
            group.into_iter().map(|c| TypedTransport::<Point, _, Json>::new(c, 7)).collect();
        std::thread::scope(|scope| {
            let t0 = &transports[0];
            let t1 = &transports[1];
            let t2 = &transports[2];
            let h0 = scope.spawn(move || {
                let mut export = HashMap::new();
                export.insert(2, Point { x: 9, y: 9 });
                t0.migrate(export).unwrap()
            });
            let h1 = scope.spawn(move || t1.migrate(HashMap::new()).unwrap());
            let h2 = scope.spawn(move || t2.migrate(HashMap::new()).unwrap());
            let (r0, r1, r2) = (h0.join().unwrap(), h1.join().unwrap(), h2.join().unwrap());
            assert!(r0.is_empty());
            assert!(r1.is_empty());
            assert_eq!(r2.get(&0), Some(&Point { x: 9, y: 9 }));
        });
    }
}
