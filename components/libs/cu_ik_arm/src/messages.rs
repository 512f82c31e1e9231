//! Inbound message: where the arm should go next.
//!
//! Producers publish a bare 3D point; text producers (the demo reads stdin)
//! send it as `"x y z"` or `"x,y,z"`.

use crate::pose::Pose;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Target position in millimetres, in the arm base frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TargetPosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<TargetPosition> for Pose {
    fn from(t: TargetPosition) -> Self {
        Pose::new(t.x, t.y, t.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTargetError {
    #[error("expected 3 coordinates, got {0}")]
    Arity(usize),
    #[error("invalid coordinate {0:?}")]
    Coordinate(String),
}

impl FromStr for TargetPosition {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        let [x, y, z] = fields[..] else {
            return Err(ParseTargetError::Arity(fields.len()));
        };
        let coord = |f: &str| {
            f.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParseTargetError::Coordinate(f.to_string()))
        };
        Ok(Self::new(coord(x)?, coord(y)?, coord(z)?))
    }
}
