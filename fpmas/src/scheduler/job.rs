//! [`Task`] and [`Job`]: a job runs its `begin` task, then every task in
//! its list, then its `end` task — `spec.md` §3/§4.6, grounded on
//! `original_source/src/fpmas/scheduler/scheduler.h`'s `TaskBase`,
//! `VoidTask`, `detail::LambdaTask`, and `Job`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{DistributedId, Result};

/// A unit of work a [`Job`] runs once per scheduler step it fires on.
///
/// Unlike the original's `void run()`, `run` here returns a [`Result`] so
/// a failing task (e.g. a [`crate::model::Agent::act`] propagating an
/// error) aborts the job rather than being silently swallowed, per
/// `SPEC_FULL.md` §7.
pub trait Task {
    fn run(&mut self) -> Result<()>;

    /// The node this task is bound to, if any. [`crate::graph::load_balancing::ScheduledLoadBalancing`]
    /// uses this to find which nodes an upcoming job will touch;
    /// `VoidTask`/`LambdaTask` are bound to nothing. Grounded on the
    /// original's `dynamic_cast<NodeTask<T>*>` probe in
    /// `scheduled_load_balancing.h`.
    fn bound_node(&self) -> Option<DistributedId> {
        None
    }
}

/// A task that does nothing; the default `begin`/`end` task of a fresh
/// [`Job`].
pub struct VoidTask;

impl Task for VoidTask {
    fn run(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A task built from a closure, for callers that don't need a dedicated
/// type (mirrors `detail::LambdaTask`; used here for `end_task =
/// graph.synchronize()` in [`crate::model::Group`]).
pub struct LambdaTask<F> {
    f: F,
}

impl<F: FnMut() -> Result<()>> LambdaTask<F> {
    pub fn new(f: F) -> Self {
        LambdaTask { f }
    }
}

impl<F: FnMut() -> Result<()>> Task for LambdaTask<F> {
    fn run(&mut self) -> Result<()> {
        (self.f)()
    }
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(0);

/// A job's id, minted once per [`Job::new`] and stable for the job's
/// lifetime.
pub type JobId = u64;

struct JobInner {
    id: JobId,
    begin: Box<dyn Task>,
    tasks: Vec<Box<dyn Task>>,
    end: Box<dyn Task>,
}

/// An ordered unit of scheduled work: `begin`, then every task in
/// `tasks` (insertion order — `SPEC_FULL.md`'s resolution of the
/// original's "iteration order not specified"; see `DESIGN.md` Open
/// Question 1), then `end`.
///
/// Cheaply `Clone`: every clone shares the same underlying job, the same
/// way the original passes a `Job&` around rather than copying it —
/// `Scheduler::build` stores one of these per firing `SchedulerItem`
/// without cloning the task list itself.
#[derive(Clone)]
pub struct Job(Rc<RefCell<JobInner>>);

impl Default for Job {
    fn default() -> Self {
        Job::new()
    }
}

impl Job {
    pub fn new() -> Self {
        let id = NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed);
        Job(Rc::new(RefCell::new(JobInner { id, begin: Box::new(VoidTask), tasks: Vec::new(), end: Box::new(VoidTask) })))
    }

    pub fn id(&self) -> JobId {
        self.0.borrow().id
    }

    pub fn set_begin_task(&self, task: Box<dyn Task>) {
        self.0.borrow_mut().begin = task;
    }

    pub fn set_end_task(&self, task: Box<dyn Task>) {
        self.0.borrow_mut().end = task;
    }

    pub fn add_task(&self, task: Box<dyn Task>) {
        self.0.borrow_mut().tasks.push(task);
    }

    pub fn task_count(&self) -> usize {
        self.0.borrow().tasks.len()
    }

    /// Every node a task in this job's list is bound to (not `begin`/
    /// `end`, which never bind a node).
    pub fn bound_nodes(&self) -> Vec<DistributedId> {
        self.0.borrow().tasks.iter().filter_map(|t| t.bound_node()).collect()
    }

    /// Runs `begin`, then every task, then `end`, propagating the first
    /// error encountered.
    pub fn run(&self) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        inner.begin.run()?;
        for task in inner.tasks.iter_mut() {
            task.run()?;
        }
        inner.end.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn runs_begin_tasks_end_in_order() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let job = Job::new();

        let t = Rc::clone(&trace);
        job.set_begin_task(Box::new(LambdaTask::new(move || {
            t.borrow_mut().push("begin");
            Ok(())
        })));
        let t = Rc::clone(&trace);
        job.add_task(Box::new(LambdaTask::new(move || {
            t.borrow_mut().push("task1");
            Ok(())
        })));
        let t = Rc::clone(&trace);
        job.add_task(Box::new(LambdaTask::new(move || {
            t.borrow_mut().push("task2");
            Ok(())
        })));
        let t = Rc::clone(&trace);
        job.set_end_task(Box::new(LambdaTask::new(move || {
            t.borrow_mut().push("end");
            Ok(())
        })));

        job.run().unwrap();
        assert_eq!(*trace.borrow(), vec!["begin", "task1", "task2", "end"]);
    }

    #[test]
    fn clone_shares_the_same_task_list() {
        let job = Job::new();
        let handle = job.clone();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        handle.add_task(Box::new(LambdaTask::new(move || {
            c.set(c.get() + 1);
            Ok(())
        })));
        assert_eq!(job.task_count(), 1);
        job.run().unwrap();
        assert_eq!(count.get(), 1);
    }
}
