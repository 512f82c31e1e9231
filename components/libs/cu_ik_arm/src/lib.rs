//! Motion command pipeline for a 3-joint hobby-servo arm.
//!
//! Target positions come in one at a time. For each, the [`MotionDriver`]
//! interpolates a straight line from the last commanded pose, solves every
//! waypoint with a [`Kinematics`] implementation, and streams the resulting
//! servo pulses to the arm controller as fixed-point text frames (see
//! [`protocol`]). The controller executes its slot queue at a fixed cadence
//! without acknowledging anything, so a [`BusyTracker`] estimates from the
//! robot clock when the previous motion has finished; targets arriving
//! earlier are dropped.
//!
//! ```no_run
//! use cu_ik_arm::{ArmConfig, Dispatch, Pose};
//! use cu_serial_link::SerialLink;
//! use cu29_clock::RobotClock;
//!
//! let config = ArmConfig::default();
//! let mut link = SerialLink::new(config.link.clone());
//! link.connect()?;
//! let mut driver = config.driver(RobotClock::new())?;
//! driver.handshake(&mut link)?;
//! if let Dispatch::Sent(motion) = driver.dispatch(Pose::new(200.0, 0.0, 0.0), &mut link)? {
//!     println!("{} frames queued", motion.frames);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod busy;
pub mod config;
pub mod driver;
pub mod interpolate;
pub mod kinematics;
pub mod messages;
pub mod pose;
pub mod protocol;
pub mod sim;

pub use busy::{BusyTracker, MotionState};
pub use config::{ArmConfig, ConfigError};
pub use driver::{Dispatch, DispatchError, MotionDriver, MotionSummary, Rejection};
pub use interpolate::interpolate;
pub use kinematics::{JointAngles, Kinematics, PulseTriple, TwoLinkArm};
pub use messages::TargetPosition;
pub use pose::Pose;
pub use protocol::{Command, CommandKind, EncodingError, Frame};
pub use sim::SimulatedController;

pub use cu_serial_link::{ByteLink, LinkError};
