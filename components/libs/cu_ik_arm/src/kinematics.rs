//! Inverse kinematics and servo pulse conversion.
//!
//! The motion driver only sees the [`Kinematics`] trait. [`TwoLinkArm`] is
//! the solver for the stock arm: a yawing base carrying a shoulder and an
//! elbow joint, driven by hobby servos that map `[0, π]` onto a pulse width
//! range. A pose whose solution needs any joint outside that half turn is
//! unreachable, not clamped.

use crate::pose::Pose;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use uom::si::angle::radian;
use uom::si::f64::Angle;

/// Slack allowed on the servo range before a joint counts as out of travel.
const JOINT_TOLERANCE: f64 = 1e-9;

/// Fold `angle` into the servo travel `[0, π]`, or `None` when it lies
/// outside.
fn servo_travel(angle: f64) -> Option<f64> {
    (-JOINT_TOLERANCE..=PI + JOINT_TOLERANCE)
        .contains(&angle)
        .then(|| angle.clamp(0.0, PI))
}

/// Base yaw, shoulder pitch and elbow interior angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles {
    pub base: Angle,
    pub shoulder: Angle,
    pub elbow: Angle,
}

impl JointAngles {
    pub fn from_radians(base: f64, shoulder: f64, elbow: f64) -> Self {
        Self {
            base: Angle::new::<radian>(base),
            shoulder: Angle::new::<radian>(shoulder),
            elbow: Angle::new::<radian>(elbow),
        }
    }
}

/// Servo pulse widths in microseconds, one per joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseTriple {
    pub base: u32,
    pub shoulder: u32,
    pub elbow: u32,
}

/// Pose to joint space, joint space to actuator units.
pub trait Kinematics {
    /// `None` when the pose cannot be reached.
    fn pose_to_angles(&self, pose: &Pose) -> Option<JointAngles>;

    fn angles_to_pulse(&self, angles: &JointAngles) -> PulseTriple;
}

/// Base yaw plus a planar two-link chain, lengths in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoLinkArm {
    pub link1_mm: f64,
    pub link2_mm: f64,
    pub pulse_min: u32,
    pub pulse_max: u32,
}

impl Default for TwoLinkArm {
    fn default() -> Self {
        Self {
            link1_mm: 175.0,
            link2_mm: 175.0,
            pulse_min: 550,
            pulse_max: 2450,
        }
    }
}

impl TwoLinkArm {
    /// Maximum distance from the shoulder the wrist can reach.
    pub fn reach(&self) -> f64 {
        self.link1_mm + self.link2_mm
    }

    fn pulse(&self, angle: Angle) -> u32 {
        let frac = (angle.get::<radian>() / PI).clamp(0.0, 1.0);
        let span = self.pulse_max.saturating_sub(self.pulse_min) as f64;
        self.pulse_min + (frac * span).round() as u32
    }
}

impl Kinematics for TwoLinkArm {
    fn pose_to_angles(&self, pose: &Pose) -> Option<JointAngles> {
        let (l1, l2) = (self.link1_mm, self.link2_mm);
        let planar = pose.x().hypot(pose.y());
        let d = pose.norm();
        if !d.is_finite() || d <= 0.0 || d > l1 + l2 || d < (l1 - l2).abs() {
            return None;
        }

        // -0.0 would send atan2 to -π on the negative x axis.
        let y = if pose.y() == 0.0 { 0.0 } else { pose.y() };
        let base = servo_travel(y.atan2(pose.x()))?;
        // Law of cosines in the vertical plane holding both links.
        let cos_shoulder = ((l1 * l1 + d * d - l2 * l2) / (2.0 * l1 * d)).clamp(-1.0, 1.0);
        let shoulder = servo_travel(pose.z().atan2(planar) + cos_shoulder.acos())?;
        let cos_elbow = ((l1 * l1 + l2 * l2 - d * d) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
        let elbow = servo_travel(cos_elbow.acos())?;

        Some(JointAngles::from_radians(base, shoulder, elbow))
    }

    fn angles_to_pulse(&self, angles: &JointAngles) -> PulseTriple {
        PulseTriple {
            base: self.pulse(angles.base),
            shoulder: self.pulse(angles.shoulder),
            elbow: self.pulse(angles.elbow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_straight_ahead_target() {
        let arm = TwoLinkArm::default();
        let angles = arm.pose_to_angles(&Pose::new(200.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(angles.base.get::<radian>(), 0.0);
        // cos(shoulder) = 200 / 350, cos(elbow) = 1 - 200^2 / (2 * 175^2)
        assert_relative_eq!(
            angles.shoulder.get::<radian>(),
            (200.0f64 / 350.0).acos(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            angles.elbow.get::<radian>(),
            (1.0 - 40_000.0 / 61_250.0f64).acos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn fully_stretched_is_reachable() {
        let arm = TwoLinkArm::default();
        let angles = arm.pose_to_angles(&Pose::new(0.0, 0.0, 350.0)).unwrap();
        assert_relative_eq!(angles.elbow.get::<radian>(), PI, epsilon = 1e-6);
        assert_relative_eq!(angles.shoulder.get::<radian>(), PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn refuses_out_of_reach_and_origin() {
        let arm = TwoLinkArm::default();
        assert!(arm.pose_to_angles(&Pose::new(400.0, 0.0, 0.0)).is_none());
        assert!(arm.pose_to_angles(&Pose::new(250.0, 250.0, 10.0)).is_none());
        assert!(arm.pose_to_angles(&Pose::new(0.0, 0.0, 0.0)).is_none());
        assert!(arm.pose_to_angles(&Pose::new(f64::NAN, 0.0, 0.0)).is_none());

        let uneven = TwoLinkArm {
            link1_mm: 200.0,
            link2_mm: 100.0,
            ..TwoLinkArm::default()
        };
        assert!(uneven.pose_to_angles(&Pose::new(50.0, 0.0, 0.0)).is_none());
        assert!(uneven.pose_to_angles(&Pose::new(150.0, 0.0, 0.0)).is_some());
    }

    #[test]
    fn pulses_span_servo_range() {
        let arm = TwoLinkArm::default();
        let p = arm.angles_to_pulse(&JointAngles::from_radians(0.0, PI / 2.0, PI));
        assert_eq!(
            p,
            PulseTriple {
                base: 550,
                shoulder: 1500,
                elbow: 2450
            }
        );

        let clamped = arm.angles_to_pulse(&JointAngles::from_radians(-1.0, 4.0, 0.0));
        assert_eq!(
            clamped,
            PulseTriple {
                base: 550,
                shoulder: 2450,
                elbow: 550
            }
        );
    }

    #[test]
    fn refuses_joints_beyond_servo_travel() {
        let arm = TwoLinkArm::default();
        // Behind the base servo: yaw would be -π/4.
        assert!(arm.pose_to_angles(&Pose::new(100.0, -100.0, 100.0)).is_none());
        // Mirror image on the reachable side.
        let front = arm.pose_to_angles(&Pose::new(100.0, 100.0, 100.0)).unwrap();
        assert_relative_eq!(front.base.get::<radian>(), PI / 4.0, epsilon = 1e-12);
        // Straight down at full stretch needs the shoulder at -π/2.
        assert!(arm.pose_to_angles(&Pose::new(0.0, 0.0, -340.0)).is_none());
    }

    #[test]
    fn negative_x_axis_is_the_far_end_of_base_travel() {
        let arm = TwoLinkArm::default();
        let angles = arm.pose_to_angles(&Pose::new(-200.0, -0.0, 0.0)).unwrap();
        assert_relative_eq!(angles.base.get::<radian>(), PI);
        assert_eq!(arm.angles_to_pulse(&angles).base, 2450);
    }
}
