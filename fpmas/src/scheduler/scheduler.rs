//! [`Scheduler`]: the three firing-predicate maps `spec.md` §4.6
//! describes (unique / recurring / bounded-recurring), grounded on
//! `original_source/src/fpmas/scheduler/scheduler.h`'s `unique_jobs`,
//! `recurring_jobs`, and `limited_recurring_jobs`.

use std::collections::{BTreeMap, HashMap};

use crate::scheduler::date::Date;
use crate::scheduler::epoch::Epoch;
use crate::scheduler::job::Job;

struct Recurring {
    period: u64,
    sub_step: f64,
    job: Job,
}

struct LimitedRecurring {
    period: u64,
    sub_step: f64,
    end: f64,
    job: Job,
}

/// Stores every job ever scheduled, keyed by the step it first fires on,
/// and rebuilds a step's [`Epoch`] on demand via [`Scheduler::build`].
/// Never drops a job once scheduled — this mirrors the original, which
/// has no "unschedule" operation either.
#[derive(Default)]
pub struct Scheduler {
    unique_jobs: HashMap<i64, Vec<(f64, Job)>>,
    recurring_jobs: BTreeMap<i64, Vec<Recurring>>,
    limited_recurring_jobs: BTreeMap<i64, Vec<LimitedRecurring>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Fires `job` exactly once, at `date.step`.
    pub fn schedule(&mut self, date: Date, job: Job) {
        self.unique_jobs.entry(date.step).or_default().push((date.sub_step, job));
    }

    /// Fires `job` at `date.step` and every `period` steps after.
    pub fn schedule_recurring(&mut self, date: Date, period: u64, job: Job) {
        assert!(period > 0, "a recurring job's period must be positive");
        self.recurring_jobs.entry(date.step).or_default().push(Recurring { period, sub_step: date.sub_step, job });
    }

    /// As [`Scheduler::schedule_recurring`], but stops firing once
    /// `step + sub_step >= end.as_f64()`.
    pub fn schedule_recurring_until(&mut self, date: Date, end: Date, period: u64, job: Job) {
        assert!(period > 0, "a recurring job's period must be positive");
        self.limited_recurring_jobs.entry(date.step).or_default().push(LimitedRecurring {
            period,
            sub_step: date.sub_step,
            end: end.as_f64(),
            job,
        });
    }

    /// Clears `epoch` and fills it with every job whose firing
    /// predicate matches `step`, per `spec.md` §4.6:
    /// - unique: `step == s`
    /// - recurring: `step ≥ s ∧ (step − s) mod period == 0`
    /// - bounded recurring: same, plus `step + sub_step < end`
    pub fn build(&self, step: i64, epoch: &mut Epoch) {
        epoch.clear();
        if let Some(items) = self.unique_jobs.get(&step) {
            for (sub_step, job) in items {
                epoch.submit(job.clone(), *sub_step);
            }
        }
        for (&start, items) in self.recurring_jobs.range(..=step) {
            for item in items {
                if (step - start) as u64 % item.period == 0 {
                    epoch.submit(item.job.clone(), item.sub_step);
                }
            }
        }
        for (&start, items) in self.limited_recurring_jobs.range(..=step) {
            for item in items {
                if (step - start) as u64 % item.period == 0 && (step as f64 + item.sub_step) < item.end {
                    epoch.submit(item.job.clone(), item.sub_step);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_job_fires_exactly_once() {
        let mut scheduler = Scheduler::new();
        let job = Job::new();
        scheduler.schedule(Date::new(2, 0.0), job.clone());
        let mut epoch = Epoch::new();
        scheduler.build(1, &mut epoch);
        assert_eq!(epoch.job_count(), 0);
        scheduler.build(2, &mut epoch);
        assert_eq!(epoch.job_count(), 1);
        scheduler.build(3, &mut epoch);
        assert_eq!(epoch.job_count(), 0);
    }

    #[test]
    fn recurring_job_fires_on_every_period() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_recurring(Date::new(1, 0.0), 3, Job::new());
        let mut epoch = Epoch::new();
        for step in [0, 2, 5, 8] {
            scheduler.build(step, &mut epoch);
            assert_eq!(epoch.job_count(), 0, "step {step}");
        }
        for step in [1, 4, 7, 10] {
            scheduler.build(step, &mut epoch);
            assert_eq!(epoch.job_count(), 1, "step {step}");
        }
    }

    #[test]
    fn bounded_recurring_job_stops_after_end() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_recurring_until(Date::new(0, 0.0), Date::new(6, 0.0), 2, Job::new());
        let mut epoch = Epoch::new();
        scheduler.build(4, &mut epoch);
        assert_eq!(epoch.job_count(), 1);
        scheduler.build(6, &mut epoch);
        assert_eq!(epoch.job_count(), 0);
    }
}
