//! Motion queue driver: one target in, one complete slot stream out.
//!
//! A dispatch interpolates from the current pose to the target, solves every
//! waypoint, checks that the previous motion has drained, then writes three
//! frames per waypoint (base, shoulder, elbow) into the controller's queue.
//! Either the whole stream goes out and the driver's state moves forward, or
//! nothing observable changes.

use crate::busy::{BusyTracker, MotionState};
use crate::interpolate::interpolate;
use crate::kinematics::{JointAngles, Kinematics};
use crate::pose::Pose;
use crate::protocol::{Command, CommandKind, EncodingError, Frame, encode};
use cu_serial_link::{ByteLink, LinkError};
use log::{debug, info, warn};
use std::num::NonZeroUsize;
use thiserror::Error;

/// Frames per queue slot, in transmission order.
pub const SLOT_KINDS: [CommandKind; 3] = [
    CommandKind::SetBase,
    CommandKind::SetShoulder,
    CommandKind::SetElbow,
];

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Why a target was dropped without touching the link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// The previous motion is still expected to be running.
    Busy,
    /// The solver has no solution for waypoint `waypoint` (0-based).
    Unreachable { waypoint: usize, pose: Pose },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSummary {
    pub target: Pose,
    pub waypoints: usize,
    pub frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    Sent(MotionSummary),
    Rejected(Rejection),
}

/// Owns the arm's commanded pose and busy state.
#[derive(Debug)]
pub struct MotionDriver<K> {
    kinematics: K,
    tracker: BusyTracker,
    current: Pose,
    steps: NonZeroUsize,
}

impl<K: Kinematics> MotionDriver<K> {
    /// `steps` is the controller's queue depth: every motion fills it.
    pub fn new(kinematics: K, tracker: BusyTracker, home: Pose, steps: NonZeroUsize) -> Self {
        Self {
            kinematics,
            tracker,
            current: home,
            steps,
        }
    }

    /// The last fully dispatched target (or the home pose).
    pub fn current_pose(&self) -> Pose {
        self.current
    }

    pub fn state(&self) -> MotionState {
        self.tracker.state()
    }

    pub fn kinematics(&self) -> &K {
        &self.kinematics
    }

    /// Per-slot execution interval the controller is configured with, so that
    /// a full queue takes the tracker's expected duration.
    pub fn interval_ms(&self) -> u32 {
        let per_slot = self.tracker.expected_duration().as_millis() / self.steps.get() as u128;
        u32::try_from(per_slot).unwrap_or(u32::MAX)
    }

    /// Configure a freshly acquired controller: ask for its queue depth and
    /// set its slot interval. Returns the interval sent.
    pub fn handshake<L: ByteLink + ?Sized>(&self, link: &mut L) -> Result<u32, DispatchError> {
        let interval = self.interval_ms();
        let frames = [
            Command::new(CommandKind::GetQueueMax, 0).encode()?,
            Command::new(CommandKind::SetInterval, interval).encode()?,
        ];
        for frame in &frames {
            debug!("Sending cmd {frame}");
            link.write(frame.as_bytes())?;
        }
        info!(
            "Controller configured: queue_max {}, interval {interval} ms",
            self.steps
        );
        Ok(interval)
    }

    /// Move the arm to `target`.
    ///
    /// Unreachable targets are reported even while the arm is busy: the
    /// solver runs before the busy check. Encoding happens before the first
    /// write, so an encoding error never leaves half a motion on the wire. A
    /// link error aborts mid-stream; the driver state is left untouched so
    /// the same target can be retried.
    pub fn dispatch<L: ByteLink + ?Sized>(
        &mut self,
        target: Pose,
        link: &mut L,
    ) -> Result<Dispatch, DispatchError> {
        info!("Moving from {} to {}", self.current, target);

        let waypoints = interpolate(self.current, target, self.steps);
        let mut joints = Vec::with_capacity(waypoints.len());
        for (waypoint, pose) in waypoints.iter().enumerate() {
            let Some(angles) = self.kinematics.pose_to_angles(pose) else {
                warn!("Impossible position {pose} (waypoint {waypoint}), target {target} dropped");
                return Ok(Dispatch::Rejected(Rejection::Unreachable {
                    waypoint,
                    pose: *pose,
                }));
            };
            joints.push(angles);
        }

        if self.tracker.state() == MotionState::Moving {
            warn!("Arm was still moving, target {target} ignored");
            return Ok(Dispatch::Rejected(Rejection::Busy));
        }

        let frames = self.encode_motion(&joints)?;
        for (slot, chunk) in frames.chunks(SLOT_KINDS.len()).enumerate() {
            debug!("Filling queue slot {slot}");
            for frame in chunk {
                link.write(frame.as_bytes())?;
            }
        }

        self.tracker.arm();
        self.current = target;
        Ok(Dispatch::Sent(MotionSummary {
            target,
            waypoints: joints.len(),
            frames: frames.len(),
        }))
    }

    fn encode_motion(&self, joints: &[JointAngles]) -> Result<Vec<Frame>, EncodingError> {
        let mut frames = Vec::with_capacity(joints.len() * SLOT_KINDS.len());
        for angles in joints {
            let pulses = self.kinematics.angles_to_pulse(angles);
            let values = [pulses.base, pulses.shoulder, pulses.elbow];
            for (kind, value) in SLOT_KINDS.into_iter().zip(values) {
                frames.push(encode(kind, value)?);
            }
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{PulseTriple, TwoLinkArm};
    use crate::protocol::decode;
    use crate::sim::SimulatedController;
    use cu29_clock::{RobotClock, RobotClockMock};
    use std::time::Duration;

    const HOME: Pose = Pose::new(0.0, 50.0, 50.0);

    fn driver_with<K: Kinematics>(kinematics: K) -> (MotionDriver<K>, RobotClockMock) {
        let (clock, mock) = RobotClock::mock();
        let tracker = BusyTracker::new(
            clock,
            Duration::from_millis(3_000),
            Duration::from_millis(500),
        );
        let steps = NonZeroUsize::new(50).unwrap();
        let driver = MotionDriver::new(kinematics, tracker, HOME, steps);
        (driver, mock)
    }

    /// Reaches everything and reports pulses past the protocol limit.
    struct Overdriven;

    impl Kinematics for Overdriven {
        fn pose_to_angles(&self, _pose: &Pose) -> Option<JointAngles> {
            Some(JointAngles::from_radians(0.0, 0.0, 0.0))
        }

        fn angles_to_pulse(&self, _angles: &JointAngles) -> PulseTriple {
            PulseTriple {
                base: 1_500,
                shoulder: 1_500,
                elbow: 12_000,
            }
        }
    }

    #[test]
    fn handshake_sets_queue_cadence() {
        let (driver, _mock) = driver_with(TwoLinkArm::default());
        let mut sim = SimulatedController::new(50);
        assert_eq!(driver.handshake(&mut sim).unwrap(), 60);
        assert_eq!(
            sim.commands(),
            &[
                Command::new(CommandKind::GetQueueMax, 0),
                Command::new(CommandKind::SetInterval, 60)
            ]
        );
        assert_eq!(sim.interval_ms(), Some(60));
        assert_eq!(sim.read_available().unwrap(), b"queue_max 50\n");
    }

    #[test]
    fn handshake_refuses_unencodable_interval() {
        let (clock, _mock) = RobotClock::mock();
        let tracker = BusyTracker::new(clock, Duration::from_secs(20), Duration::ZERO);
        let steps = NonZeroUsize::new(1).unwrap();
        let driver = MotionDriver::new(TwoLinkArm::default(), tracker, HOME, steps);
        let mut sim = SimulatedController::new(1);

        let err = driver.handshake(&mut sim).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Encoding(EncodingError::ValueOutOfRange {
                kind: CommandKind::SetInterval,
                value: 20_000
            })
        ));
        assert!(sim.commands().is_empty());
    }

    #[test]
    fn frames_go_out_base_shoulder_elbow() {
        let (mut driver, _mock) = driver_with(TwoLinkArm::default());
        let mut sim = SimulatedController::new(50);
        driver.dispatch(Pose::new(200.0, 0.0, 0.0), &mut sim).unwrap();
        let kinds: Vec<CommandKind> = sim.commands().iter().map(|c| c.kind).collect();
        for slot in kinds.chunks(3) {
            assert_eq!(slot, SLOT_KINDS);
        }
        assert_eq!(sim.slots().len(), 50);
    }

    #[test]
    fn unreachable_reported_while_busy() {
        let (mut driver, _mock) = driver_with(TwoLinkArm::default());
        let mut sim = SimulatedController::new(50);
        driver.dispatch(Pose::new(200.0, 0.0, 0.0), &mut sim).unwrap();
        let sent = sim.commands().len();

        let outcome = driver.dispatch(Pose::new(0.0, 0.0, 900.0), &mut sim).unwrap();
        assert!(matches!(
            outcome,
            Dispatch::Rejected(Rejection::Unreachable { .. })
        ));
        assert_eq!(sim.commands().len(), sent);
    }

    #[test]
    fn encoding_failure_sends_nothing() {
        let (mut driver, _mock) = driver_with(Overdriven);
        let mut sim = SimulatedController::new(50);
        let err = driver.dispatch(Pose::new(100.0, 0.0, 0.0), &mut sim).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Encoding(EncodingError::ValueOutOfRange {
                kind: CommandKind::SetElbow,
                value: 12_000
            })
        ));
        assert!(sim.commands().is_empty());
        assert_eq!(driver.current_pose(), HOME);
        assert_eq!(driver.state(), MotionState::Idle);
    }

    #[test]
    fn link_failure_leaves_state_for_retry() {
        let (mut driver, _mock) = driver_with(TwoLinkArm::default());
        let target = Pose::new(200.0, 0.0, 0.0);
        let mut flaky = SimulatedController::new(50).with_write_budget(20);

        let err = driver.dispatch(target, &mut flaky).unwrap_err();
        assert!(matches!(err, DispatchError::Link(_)));
        assert_eq!(flaky.commands().len(), 20);
        assert_eq!(driver.current_pose(), HOME);
        assert_eq!(driver.state(), MotionState::Idle);

        let mut healthy = SimulatedController::new(50);
        let outcome = driver.dispatch(target, &mut healthy).unwrap();
        assert!(matches!(
            outcome,
            Dispatch::Sent(MotionSummary { frames: 150, .. })
        ));
        assert_eq!(driver.current_pose(), target);
    }

    #[test]
    fn next_motion_starts_from_last_target() {
        let (mut driver, mock) = driver_with(TwoLinkArm::default());
        let mut sim = SimulatedController::new(50);
        driver.dispatch(Pose::new(200.0, 0.0, 0.0), &mut sim).unwrap();
        mock.increment(Duration::from_secs(3).into());

        let mut second = SimulatedController::new(50);
        driver.dispatch(Pose::new(200.0, 0.0, 0.0), &mut second).unwrap();
        // Zero-length move: every slot repeats the target's pulses.
        let first_slot = second.slots()[0];
        assert!(second.slots().iter().all(|s| *s == first_slot));
        assert_eq!(first_slot, sim.slots()[49]);

        let raw = encode(CommandKind::SetBase, first_slot.base).unwrap();
        assert_eq!(decode(raw.as_bytes()).unwrap().value, first_slot.base);
    }
}
