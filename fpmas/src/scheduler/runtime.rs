//! [`Runtime`]: drives the step loop `spec.md` §4.6 describes — build
//! the current step's epoch, run every job in sub-step order, advance —
//! grounded on `original_source/src/main/scheduler/scheduler.h`'s
//! `Scheduler::build` call site and `timely/src/worker.rs`'s ambient
//! driving-loop shape (a `Worker::step` callers repeatedly invoke).

use crate::scheduler::date::Date;
use crate::scheduler::epoch::Epoch;
use crate::scheduler::scheduler::Scheduler;
use crate::Result;

/// Owns a [`Scheduler`] and the current step counter, and runs one step
/// at a time.
pub struct Runtime {
    scheduler: Scheduler,
    step: i64,
}

impl Runtime {
    pub fn new(scheduler: Scheduler) -> Self {
        Runtime { scheduler, step: 0 }
    }

    /// The date at the start of the step about to run (or that just
    /// ran, once [`Runtime::run_step`] returns).
    pub fn current_date(&self) -> Date {
        Date::at(self.step)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Builds the current step's epoch and runs every job in it, in
    /// sub-step order, then advances to the next step. Propagates the
    /// first job error encountered, leaving `current_date` unchanged so
    /// a caller can inspect which step failed.
    pub fn run_step(&mut self) -> Result<()> {
        let mut epoch = Epoch::new();
        self.scheduler.build(self.step, &mut epoch);
        for job in epoch.jobs() {
            job.run()?;
        }
        self.step += 1;
        Ok(())
    }

    /// Runs `steps` consecutive steps.
    pub fn run(&mut self, steps: i64) -> Result<()> {
        for _ in 0..steps {
            self.run_step()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::{Job, LambdaTask};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn advances_one_step_per_call_and_runs_due_jobs() {
        let mut scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let job = Job::new();
        let c = Rc::clone(&count);
        job.add_task(Box::new(LambdaTask::new(move || {
            c.set(c.get() + 1);
            Ok(())
        })));
        scheduler.schedule_recurring(Date::new(0, 0.0), 1, job);
        let mut runtime = Runtime::new(scheduler);
        assert_eq!(runtime.current_date().step, 0);
        runtime.run(3).unwrap();
        assert_eq!(runtime.current_date().step, 3);
        assert_eq!(count.get(), 3);
    }
}
