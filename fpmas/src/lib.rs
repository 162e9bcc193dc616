//! FPMAS is a kernel for distributed, agent-based simulations: a mutable
//! graph of agents is partitioned across a group of processes, kept
//! consistent under one of two synchronization policies, and driven by an
//! integer-stepped scheduler that load-balances as it goes.
//!
//! The crate is layered, leaves first:
//!
//! - [`fpmas_communication`] (re-exported as [`communication`]) is the
//!   transport: typed send/recv/migrate/gather/bcast over a pluggable
//!   [`communication::Communicator`].
//! - [`graph`] is the in-memory distributed graph: [`graph::Node`] and
//!   [`graph::Edge`] carry a `LOCAL`/`DISTANT` ownership state,
//!   [`graph::DistributedGraph`] imports/exports them across processes and
//!   exposes `distribute`, and [`graph::LocationManager`] answers "where is
//!   this node right now?".
//! - [`synchro`] provides the two synchronization policies
//!   ([`synchro::ghost`]'s optimistic bulk exchange and
//!   [`synchro::hard`]'s pessimistic per-access RPC mutex) behind one
//!   [`synchro::SyncMode`] contract.
//! - [`scheduler`] compiles per-step [`scheduler::Epoch`]s of
//!   [`scheduler::Job`]s and a [`scheduler::Runtime`] executes them.
//! - [`graph::load_balancing`] turns the local graph plus the next epoch's
//!   job membership into a partition, via a pluggable
//!   [`graph::load_balancing::Partitioner`].
//! - [`model`] is thin glue binding [`model::Agent`]s to graph nodes and
//!   assembling their jobs.
//!
//! [`error::FpmasError`] is the crate-wide error type; [`config::Config`]
//! is the ambient, programmatically- or `toml`-constructed runtime
//! configuration (synchronization mode, load-balancing period, log level).

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod synchro;

/// Re-export of the `fpmas_communication` crate: the transport layer this
/// crate is built on.
pub mod communication {
    pub use fpmas_communication::*;
}

pub use communication::{DistributedId, Rank};
pub use config::Config;
pub use error::{FpmasError, Result};
