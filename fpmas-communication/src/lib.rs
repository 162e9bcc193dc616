//! Typed, MPI-style communication layer for distributed graph transport.
//!
//! This crate is the lowest layer of the workspace: it knows nothing about
//! graphs, agents, or scheduling. It provides three things:
//!
//! - [`identifier`]: globally unique [`identifier::DistributedId`]s, minted
//!   once per origin rank and never reassigned.
//! - [`communicator`]: the [`communicator::Communicator`] trait, a minimal
//!   MPI-2-equivalent transport contract (point-to-point send/recv/probe,
//!   non-blocking synchronous send, and the collectives built on top of
//!   them), plus [`allocator::in_process::InProcessCommunicator`], a
//!   single-process implementation used throughout the test suite and by
//!   single-machine demos.
//! - [`typed`]: [`typed::TypedTransport`], which layers a
//!   [`wire::WireFormat`] over a `Communicator` so callers move typed
//!   values instead of bytes, each transport instance isolated into its
//!   own tag namespace.
//!
//! Enable the `mpi` feature to additionally pull in
//! [`allocator::mpi_backend::MpiCommunicator`], a real multi-process
//! backend built on `rsmpi`.

pub mod allocator;
pub mod communicator;
pub mod identifier;
pub mod logging;
pub mod typed;
pub mod wire;

pub use allocator::Generic as Allocator;
pub use communicator::Communicator;
pub use identifier::{DistributedId, IdCounter, Rank};
pub use typed::TypedTransport;
pub use wire::WireFormat;
