//! Arm configuration, stored as JSON.
//!
//! Every field has a default matching the stock arm (175 mm links, 550–2450
//! µs servos, 50-slot controller queue, 3 s per motion), so a config file
//! only needs the values that differ:
//!
//! ```json
//! { "link": { "ports": ["/dev/ttyACM1"] }, "total_duration_ms": 2000 }
//! ```

use crate::busy::BusyTracker;
use crate::driver::MotionDriver;
use crate::kinematics::{Kinematics, TwoLinkArm};
use crate::pose::Pose;
use crate::protocol::VALUE_LIMIT;
use cu_serial_link::LinkSettings;
use cu29_clock::RobotClock;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub arm: TwoLinkArm,
    /// Pose assumed at startup, before anything was commanded.
    pub home: Pose,
    /// Time the controller takes to drain a full queue.
    pub total_duration_ms: u64,
    /// Controller queue depth, also the number of waypoints per motion.
    pub queue_max: usize,
    /// Subtracted from the wait before a new target is accepted.
    pub grace_ms: u64,
    pub link: LinkSettings,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            arm: TwoLinkArm::default(),
            home: Pose::new(0.0, 50.0, 50.0),
            total_duration_ms: 3_000,
            queue_max: 50,
            grace_ms: 500,
            link: LinkSettings::default(),
        }
    }
}

impl ArmConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the controller or the protocol cannot represent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let arm = &self.arm;

        if !(arm.link1_mm > 0.0 && arm.link2_mm > 0.0) {
            return invalid(format!(
                "link lengths must be positive, got {} and {}",
                arm.link1_mm, arm.link2_mm
            ));
        }
        if arm.pulse_min > arm.pulse_max {
            return invalid(format!(
                "pulse_min {} is above pulse_max {}",
                arm.pulse_min, arm.pulse_max
            ));
        }
        if arm.pulse_max >= VALUE_LIMIT {
            return invalid(format!(
                "pulse_max {} does not fit the protocol (limit {VALUE_LIMIT})",
                arm.pulse_max
            ));
        }
        if self.queue_max == 0 {
            return invalid("queue_max must be at least 1".into());
        }
        let interval = self.total_duration_ms / self.queue_max as u64;
        if interval == 0 || interval >= VALUE_LIMIT as u64 {
            return invalid(format!(
                "slot interval {interval} ms ({} ms over {} slots) is not encodable",
                self.total_duration_ms, self.queue_max
            ));
        }
        if arm.pose_to_angles(&self.home).is_none() {
            return invalid(format!("home pose {} is out of reach", self.home));
        }
        Ok(())
    }

    pub fn steps(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.queue_max)
            .ok_or_else(|| ConfigError::Invalid("queue_max must be at least 1".into()))
    }

    pub fn expected_duration(&self) -> Duration {
        Duration::from_millis(self.total_duration_ms)
    }

    pub fn grace_margin(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Build the motion driver for the configured arm.
    pub fn driver(&self, clock: RobotClock) -> Result<MotionDriver<TwoLinkArm>, ConfigError> {
        self.validate()?;
        let tracker = BusyTracker::new(clock, self.expected_duration(), self.grace_margin());
        Ok(MotionDriver::new(self.arm, tracker, self.home, self.steps()?))
    }
}
