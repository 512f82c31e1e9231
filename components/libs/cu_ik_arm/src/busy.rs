//! Open-loop estimate of whether the arm is still executing a motion.
//!
//! The firmware drains its slot queue at a fixed interval and never
//! acknowledges anything, so completion is inferred from elapsed time: a
//! motion dispatched at `t0` with expected duration `D` is considered done
//! once `now - t0 + grace > D`. The grace margin accounts for the frames
//! still travelling over the serial line when the timer is stamped.

use cu29_clock::{CuTime, RobotClock};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Moving,
}

/// Tracks the last dispatched motion against the robot clock.
#[derive(Clone)]
pub struct BusyTracker {
    clock: RobotClock,
    expected: Duration,
    grace: Duration,
    last_dispatch: Option<CuTime>,
}

impl BusyTracker {
    /// A tracker that has never seen a dispatch, hence idle.
    pub fn new(clock: RobotClock, expected: Duration, grace: Duration) -> Self {
        Self {
            clock,
            expected,
            grace,
            last_dispatch: None,
        }
    }

    pub fn expected_duration(&self) -> Duration {
        self.expected
    }

    pub fn grace_margin(&self) -> Duration {
        self.grace
    }

    /// Stamp a successful dispatch. Overwrites the previous one.
    pub fn arm(&mut self) {
        self.last_dispatch = Some(self.clock.now());
    }

    /// Time elapsed since the last dispatch, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        let stamp = self.last_dispatch?;
        let now = self.clock.now().as_nanos();
        Some(Duration::from_nanos(now.saturating_sub(stamp.as_nanos())))
    }

    pub fn state(&self) -> MotionState {
        match self.elapsed() {
            Some(elapsed) if elapsed + self.grace <= self.expected => MotionState::Moving,
            _ => MotionState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == MotionState::Idle
    }
}

impl fmt::Debug for BusyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusyTracker")
            .field("expected", &self.expected)
            .field("grace", &self.grace)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}
