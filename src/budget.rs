//! Step and wall-clock limits threaded through the search.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::MatchTimeout;

/// Clock is polled once every this many steps.
const POLL_INTERVAL: u64 = 256;

/// Budget for one (rule, file) evaluation. Not shared between threads: each worker owns the
/// budgets of the evaluations it runs.
#[derive(Debug)]
pub struct Budget {
    max_steps: Option<u64>,
    deadline: Option<Instant>,
    started: Instant,
    steps: Cell<u64>,
    exhausted: Cell<bool>,
}

impl Budget {
    pub fn new(max_steps: Option<u64>, timeout: Option<Duration>) -> Self {
        let started = Instant::now();
        Budget {
            max_steps,
            deadline: timeout.map(|t| started + t),
            started,
            steps: Cell::new(0),
            exhausted: Cell::new(false),
        }
    }

    pub fn unlimited() -> Self {
        Budget::new(None, None)
    }

    /// Account for one step. Returns false once the budget is spent; it stays spent.
    pub fn tick(&self) -> bool {
        if self.exhausted.get() {
            return false;
        }
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        let over_steps = self.max_steps.map_or(false, |max| steps > max);
        let over_time = steps % POLL_INTERVAL == 0
            && self.deadline.map_or(false, |d| Instant::now() >= d);
        if over_steps || over_time {
            self.exhausted.set(true);
            return false;
        }
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.get()
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// `Err` if the budget has been spent.
    pub fn check(&self) -> Result<(), MatchTimeout> {
        if self.is_exhausted() {
            Err(MatchTimeout {
                steps: self.steps(),
                elapsed: self.started.elapsed(),
            })
        } else {
            Ok(())
        }
    }
}
