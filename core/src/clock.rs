//! Wall time and pacing.
//!
//! The live loop targets one tick per `tick_interval`. Everything that
//! reads wall time goes through `Clock` so tests can drive it by hand.

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug)]
struct ManualState {
    now:   DateTime<Utc>,
    slept: Vec<Duration>,
}

/// A clock that only moves when told to. Sleeping advances it and is
/// recorded, so pacing can be asserted without waiting.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Rc<RefCell<ManualState>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ManualState { now, slept: Vec::new() })),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state.borrow_mut();
        state.now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.state.borrow_mut().now = now;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().slept.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.borrow().now
    }

    fn sleep(&self, duration: Duration) {
        self.state.borrow_mut().slept.push(duration);
        self.advance(duration);
    }
}

/// Wall time between two instants, zero if the clock went backwards.
pub fn elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    (end - start).to_std().unwrap_or(Duration::ZERO)
}

/// What is left of the tick budget. Never negative.
pub fn remaining_budget(budget: Duration, spent: Duration) -> Duration {
    budget.saturating_sub(spent)
}
