//! Straight-line waypoint generation.

use crate::pose::Pose;
use std::num::NonZeroUsize;

/// Split the segment `start -> end` into `steps` evenly spaced waypoints.
///
/// Waypoint `n` (1-based) is `start + n * (end - start) / steps`, so the
/// start pose itself is never emitted and the last waypoint lands on `end`
/// (up to float rounding). A zero-length move yields `steps` copies of `end`.
pub fn interpolate(start: Pose, end: Pose, steps: NonZeroUsize) -> Vec<Pose> {
    let n = steps.get() as f64;
    let increment = Pose(std::array::from_fn(|i| (end[i] - start[i]) / n));
    (1..=steps.get())
        .map(|k| start.offset(&increment, k as f64))
        .collect()
}
