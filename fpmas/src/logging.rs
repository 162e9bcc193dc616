//! Logging facade.
//!
//! Every call site that would log in the original C++ implementation
//! (`FPMAS_LOGD`/`FPMAS_LOGI`/`FPMAS_LOGE` macros throughout
//! `original_source/`) uses the `log` crate's `debug!`/`info!`/`warn!`
//! macros directly at the equivalent point in this crate, rank and node
//! id included in the message — the same way `amethyst`'s rendering
//! crates uniformly depend on `log` rather than rolling their own
//! facility. There is no `fpmas`-specific macro layer on top of `log`.
//!
//! [`Registry`] (re-exported from [`fpmas_logging`]) is offered alongside
//! for callers who want programmatic access to timed event streams (e.g.
//! a CSV trace of mutex contention) rather than text logs; the two are
//! complementary. A [`Registry`] is not installed automatically by any
//! component in this crate — a caller opts in by constructing one and
//! passing loggers down to e.g. [`crate::synchro::hard::server::MutexServer`].

pub use fpmas_logging::{Logger, Registry};

/// Builds a [`Registry`] for `rank`, timestamped from process start.
pub fn registry(rank: crate::Rank) -> Registry {
    Registry::new(std::time::Instant::now(), rank)
}
