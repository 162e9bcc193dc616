//! Thin glue binding agents to graph nodes and assembling their jobs —
//! `SPEC_FULL.md` §4.8 (out of `spec.md`'s own scope, but budgeted by
//! its component table). Grounded on
//! `original_source/src/main/model/model.h`'s `AgentTask`/`AgentGroup`.
//!
//! Deliberately thin: no agent (de)serialization for migrating
//! polymorphic agent state, no spatial fields, no behavior composition
//! DSL — an [`Agent`] is plain node data, a [`Group`] is one [`crate::scheduler::Job`]
//! per behavior.

pub mod agent;
pub mod group;

pub use agent::{Agent, AgentContext, AgentTask};
pub use group::Group;
