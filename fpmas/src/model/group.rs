//! [`Group`]: binds a set of nodes to one [`Job`], wiring its `end_task`
//! to `graph.synchronize()` by default — `SPEC_FULL.md` §4.8, grounded
//! on `original_source/src/main/model/model.h`'s `AgentGroup` (one `Job`
//! per behavior, `SynchronizeGraphTask` as its end task).

use std::cell::RefCell;
use std::rc::Rc;

use fpmas_communication::communicator::Communicator;

use crate::graph::distributed::DistributedGraph;
use crate::model::agent::{Agent, AgentTask};
use crate::scheduler::{Date, Job, LambdaTask, Scheduler};
use crate::synchro::SyncMode;
use crate::DistributedId;

/// One behavior's worth of agents: every node added here gets its own
/// [`AgentTask`] in the group's [`Job`], which ends with
/// `graph.synchronize()` so a caller never has to remember to call it
/// themselves per `SPEC_FULL.md`'s reading of `spec.md` §2 ("each job
/// runs ... then its end-task (typically `graph.synchronize()`)").
pub struct Group<A, C, M> {
    job: Job,
    graph: Rc<RefCell<DistributedGraph<A, C, M>>>,
    agents: Vec<DistributedId>,
}

impl<A, C, M> Group<A, C, M>
where
    A: Agent<C, M> + 'static,
    C: Communicator + Clone + 'static,
    M: SyncMode<A> + 'static,
{
    pub fn new(graph: Rc<RefCell<DistributedGraph<A, C, M>>>) -> Self {
        let job = Job::new();
        let sync_graph = Rc::clone(&graph);
        job.set_end_task(Box::new(LambdaTask::new(move || sync_graph.borrow_mut().synchronize())));
        Group { job, graph, agents: Vec::new() }
    }

    /// Adds `node` to this group's behavior: a new [`AgentTask`] bound
    /// to it joins the group's job.
    pub fn add(&mut self, node: DistributedId) {
        self.agents.push(node);
        self.job.add_task(Box::new(AgentTask::new(Rc::clone(&self.graph), node)));
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn agents(&self) -> &[DistributedId] {
        &self.agents
    }

    /// Registers this group's job with `scheduler`, firing at `start`
    /// and every `period` steps after.
    pub fn schedule(&self, scheduler: &mut Scheduler, start: Date, period: u64) {
        scheduler.schedule_recurring(start, period, self.job.clone());
    }

    /// As [`Group::schedule`], but stops firing once `end` is reached.
    pub fn schedule_until(&self, scheduler: &mut Scheduler, start: Date, end: Date, period: u64) {
        scheduler.schedule_recurring_until(start, end, period, self.job.clone());
    }
}
