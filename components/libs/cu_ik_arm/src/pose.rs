use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Three real coordinates: Cartesian `x, y, z` in millimetres for targets
/// and waypoints.
///
/// Poses are values. Every operation returns a new pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose(pub [f64; 3]);

impl Pose {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn z(&self) -> f64 {
        self.0[2]
    }

    /// Component-wise `self + other * k`.
    pub fn offset(&self, step: &Pose, k: f64) -> Pose {
        Pose(std::array::from_fn(|i| self.0[i] + step.0[i] * k))
    }

    /// Euclidean distance from the origin.
    pub fn norm(&self) -> f64 {
        self.0.iter().map(|c| c * c).sum::<f64>().sqrt()
    }
}

impl Index<usize> for Pose {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl From<[f64; 3]> for Pose {
    fn from(coords: [f64; 3]) -> Self {
        Self(coords)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.0[0], self.0[1], self.0[2])
    }
}
