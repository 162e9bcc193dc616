//! A scheduler date: an integer step plus a sub-step ordering within it
//! (`spec.md` §4.6), grounded on
//! `original_source/src/fpmas/api/scheduler/scheduler.h`'s `Date`/
//! `TimeStep`/`SubTimeStep` aliases.

use std::ops::Add;

/// A point in simulated time: `step` is the integer scheduler tick,
/// `sub_step` orders dates within the same step (`0.0..1.0`).
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Date {
    pub step: i64,
    pub sub_step: f64,
}

impl Date {
    /// Builds a date. Panics if `sub_step` is outside `[0, 1)`, the same
    /// precondition the original places on `sub_time_step()`.
    pub fn new(step: i64, sub_step: f64) -> Self {
        assert!((0.0..1.0).contains(&sub_step), "sub_step must be in [0, 1), got {sub_step}");
        Date { step, sub_step }
    }

    /// The date at the start of `step`.
    pub fn at(step: i64) -> Self {
        Date { step, sub_step: 0.0 }
    }

    /// This date's position on the real line, for comparing against a
    /// limited recurring job's end date.
    pub fn as_f64(&self) -> f64 {
        self.step as f64 + self.sub_step
    }
}

impl Add<i64> for Date {
    type Output = Date;

    fn add(self, steps: i64) -> Date {
        Date { step: self.step + steps, sub_step: self.sub_step }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn sub_step_out_of_range_panics() {
        Date::new(0, 1.0);
    }

    #[test]
    fn add_steps_preserves_sub_step() {
        let date = Date::new(3, 0.5) + 2;
        assert_eq!(date.step, 5);
        assert_eq!(date.sub_step, 0.5);
    }
}
