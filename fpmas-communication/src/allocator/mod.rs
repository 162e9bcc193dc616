//! [`Communicator`](crate::communicator::Communicator) backends.

pub mod generic;
pub mod in_process;

#[cfg(feature = "mpi")]
pub mod mpi_backend;

pub use generic::Generic;
pub use in_process::InProcessCommunicator;

#[cfg(feature = "mpi")]
pub use mpi_backend::MpiCommunicator;
