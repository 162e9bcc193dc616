//! A `Communicator` implementation connecting several ranks living in the
//! same process, for single-process tests and demos.
//!
//! Grounded on the channel fan-out pattern of the teacher's
//! `allocator::process::Process::new_vector`: a shared piece of state is
//! built once, then handed out split by rank via a vector of builders.
//! Here the shared state is a [`Hub`] of per-destination inboxes rather
//! than a `HashMap` of `mpsc` channel pairs, since [`Communicator`] needs
//! blocking `probe`/`recv` keyed by `(source, tag)` rather than a plain
//! FIFO.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::communicator::{CommError, Communicator, Request, Status};
use crate::identifier::Rank;

struct Envelope {
    from: Rank,
    tag: i32,
    bytes: Vec<u8>,
    ack: Option<Arc<AtomicBool>>,
}

struct Hub {
    inboxes: Mutex<HashMap<Rank, VecDeque<Envelope>>>,
    ready: Condvar,
}

impl Hub {
    fn new(ranks: &[Rank]) -> Self {
        let inboxes = ranks.iter().map(|r| (*r, VecDeque::new())).collect();
        Hub { inboxes: Mutex::new(inboxes), ready: Condvar::new() }
    }

    fn deposit(&self, destination: Rank, envelope: Envelope) {
        let mut inboxes = self.inboxes.lock().expect("in-process hub poisoned");
        inboxes.entry(destination).or_default().push_back(envelope);
        self.ready.notify_all();
    }

    /// Blocks until an envelope matching `(source, tag)` is available in
    /// `rank`'s inbox, then applies `take` to remove or merely inspect it.
    fn wait_for<R>(
        &self,
        rank: Rank,
        source: Option<Rank>,
        tag: i32,
        take: bool,
        build: impl Fn(&Envelope) -> R,
    ) -> R {
        let mut inboxes = self.inboxes.lock().expect("in-process hub poisoned");
        loop {
            let inbox = inboxes.entry(rank).or_default();
            let position = inbox.iter().position(|e| e.tag == tag && source.map_or(true, |s| s == e.from));
            if let Some(index) = position {
                return if take {
                    let envelope = inbox.remove(index).expect("index just located");
                    if let Some(ack) = &envelope.ack {
                        ack.store(true, Ordering::Release);
                    }
                    build(&envelope)
                } else {
                    build(&inbox[index])
                };
            }
            inboxes = self.ready.wait(inboxes).expect("in-process hub poisoned");
        }
    }

    fn try_find(&self, rank: Rank, source: Option<Rank>, tag: i32) -> Option<Status> {
        let inboxes = self.inboxes.lock().expect("in-process hub poisoned");
        inboxes
            .get(&rank)
            .and_then(|inbox| inbox.iter().find(|e| e.tag == tag && source.map_or(true, |s| s == e.from)))
            .map(|e| Status { source: e.from, tag: e.tag, size: e.bytes.len() })
    }
}

/// An in-process [`Communicator`]: every rank in the group lives on its own
/// thread (or none at all, for single-threaded tests) within the same
/// process, and messages pass through a shared [`Hub`] rather than a real
/// network or MPI runtime.
///
/// Cheaply `Clone`: clones share the same [`Hub`] via `Arc`, so a single
/// physical connection can back several independently-tagged
/// [`crate::typed::TypedTransport`] channels (e.g. one for bulk data sync,
/// one for hard-sync RPCs).
#[derive(Clone)]
pub struct InProcessCommunicator {
    rank: Rank,
    size: Rank,
    hub: Arc<Hub>,
}

impl InProcessCommunicator {
    /// Builds one communicator per rank in `0..peers`, all sharing the same
    /// hub, mirroring `Process::new_vector`'s fan-out of connected
    /// endpoints.
    pub fn new_vector(peers: Rank) -> Vec<Self> {
        let ranks: Vec<Rank> = (0..peers).collect();
        let hub = Arc::new(Hub::new(&ranks));
        ranks.into_iter().map(|rank| InProcessCommunicator { rank, size: peers, hub: Arc::clone(&hub) }).collect()
    }
}

impl Communicator for InProcessCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> Rank {
        self.size
    }

    fn send(&self, bytes: &[u8], destination: Rank, tag: i32) -> Result<(), CommError> {
        if destination < 0 || destination >= self.size {
            return Err(CommError::UnknownRank(destination));
        }
        self.hub.deposit(destination, Envelope { from: self.rank, tag, bytes: bytes.to_vec(), ack: None });
        Ok(())
    }

    fn issend(&self, bytes: Vec<u8>, destination: Rank, tag: i32) -> Result<Request, CommError> {
        if destination < 0 || destination >= self.size {
            return Err(CommError::UnknownRank(destination));
        }
        let ack = Arc::new(AtomicBool::new(false));
        self.hub.deposit(destination, Envelope { from: self.rank, tag, bytes, ack: Some(Arc::clone(&ack)) });
        Ok(Request { done: ack })
    }

    fn probe(&self, source: Option<Rank>, tag: i32) -> Result<Status, CommError> {
        Ok(self.hub.wait_for(self.rank, source, tag, false, |e| Status { source: e.from, tag: e.tag, size: e.bytes.len() }))
    }

    fn iprobe(&self, source: Option<Rank>, tag: i32) -> Result<Option<Status>, CommError> {
        Ok(self.hub.try_find(self.rank, source, tag))
    }

    fn recv(&self, source: Rank, tag: i32) -> Result<Vec<u8>, CommError> {
        Ok(self.hub.wait_for(self.rank, Some(source), tag, true, |e| e.bytes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recv_round_trips() {
        let mut group = InProcessCommunicator::new_vector(2);
        let b = group.pop().unwrap();
        let a = group.pop().unwrap();
        a.send(b"hello", 1, 7).unwrap();
        assert_eq!(b.recv(0, 7).unwrap(), b"hello");
    }

    #[test]
    fn issend_completes_only_after_matching_recv() {
        let mut group = InProcessCommunicator::new_vector(2);
        let b = group.pop().unwrap();
        let a = group.pop().unwrap();
        let request = a.issend(vec![1, 2, 3], 1, 9).unwrap();
        assert!(!a.test(&request));
        let received = b.recv(0, 9).unwrap();
        assert_eq!(received, vec![1, 2, 3]);
        assert!(a.test(&request));
    }

    #[test]
    fn probe_reports_without_consuming() {
        let mut group = InProcessCommunicator::new_vector(2);
        let b = group.pop().unwrap();
        let a = group.pop().unwrap();
        a.send(b"x", 1, 1).unwrap();
        let status = b.probe(Some(0), 1).unwrap();
        assert_eq!(status.source, 0);
        assert_eq!(status.size, 1);
        // still there for the real receive
        assert_eq!(b.recv(0, 1).unwrap(), b"x");
    }

    #[test]
    fn iprobe_is_nonblocking() {
        let group = InProcessCommunicator::new_vector(2);
        assert!(group[1].iprobe(Some(0), 1).unwrap().is_none());
    }

    #[test]
    fn all_to_all_tolerates_a_strict_subset_of_destinations() {
        let group = InProcessCommunicator::new_vector(3);
        let mut export = HashMap::new();
        export.insert(2, b"payload".to_vec());
        // rank 0 only exports to rank 2, nothing to rank 1.
        let handle = std::thread::scope(|scope| {
            let g0 = &group[0];
            let g1 = &group[1];
            let g2 = &group[2];
            let t0 = scope.spawn(move || g0.all_to_all(export, 42).unwrap());
            let t1 = scope.spawn(move || g1.all_to_all(HashMap::new(), 42).unwrap());
            let t2 = scope.spawn(move || g2.all_to_all(HashMap::new(), 42).unwrap());
            (t0.join().unwrap(), t1.join().unwrap(), t2.join().unwrap())
        });
        assert!(handle.0.is_empty());
        assert!(handle.1.is_empty());
        assert_eq!(handle.2.get(&0), Some(&b"payload".to_vec()));
    }
}
