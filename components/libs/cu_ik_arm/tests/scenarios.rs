use cu_ik_arm::protocol::{VALUE_LIMIT, decode, encode};
use cu_ik_arm::{
    ArmConfig, ByteLink, CommandKind, Dispatch, EncodingError, MotionDriver, MotionState, Pose,
    Rejection, SimulatedController, TargetPosition, TwoLinkArm,
};
use cu29_clock::{RobotClock, RobotClockMock};
use std::time::Duration;

fn setup() -> (MotionDriver<TwoLinkArm>, RobotClockMock, SimulatedController) {
    let config = ArmConfig::default();
    let (clock, mock) = RobotClock::mock();
    let driver = config.driver(clock).unwrap();
    (driver, mock, SimulatedController::new(config.queue_max))
}

#[test]
fn reachable_target_fills_the_queue() {
    let (mut driver, _mock, mut sim) = setup();
    let target: Pose = "200 0 0".parse::<TargetPosition>().unwrap().into();

    let outcome = driver.dispatch(target, &mut sim).unwrap();

    let Dispatch::Sent(motion) = outcome else {
        panic!("expected the motion to be sent, got {outcome:?}");
    };
    assert_eq!(motion.waypoints, 50);
    assert_eq!(motion.frames, 150);
    assert_eq!(sim.commands().len(), 150);
    assert_eq!(sim.slots().len(), 50);
    assert!(sim.decode_errors().is_empty());
    assert_eq!(driver.current_pose(), Pose::new(200.0, 0.0, 0.0));
    assert_eq!(driver.state(), MotionState::Moving);
}

#[test]
fn unreachable_target_sends_nothing() {
    let (mut driver, _mock, mut sim) = setup();
    let home = driver.current_pose();
    let beyond = driver.kinematics().reach() + 1.0;

    let outcome = driver.dispatch(Pose::new(beyond, 0.0, 0.0), &mut sim).unwrap();

    assert!(matches!(
        outcome,
        Dispatch::Rejected(Rejection::Unreachable { waypoint: 49, .. })
    ));
    assert!(sim.commands().is_empty());
    assert_eq!(sim.bytes_available().unwrap(), 0);
    assert_eq!(driver.current_pose(), home);
    assert_eq!(driver.state(), MotionState::Idle);
}

#[test]
fn target_behind_the_base_is_not_clamped() {
    let (mut driver, _mock, mut sim) = setup();
    let home = driver.current_pose();

    let outcome = driver.dispatch(Pose::new(100.0, -100.0, 100.0), &mut sim).unwrap();

    assert!(matches!(
        outcome,
        Dispatch::Rejected(Rejection::Unreachable { .. })
    ));
    assert!(sim.commands().is_empty());
    assert_eq!(driver.current_pose(), home);
}

#[test]
fn target_during_motion_is_dropped() {
    let (mut driver, mock, mut sim) = setup();
    let x = Pose::new(200.0, 0.0, 0.0);
    let y = Pose::new(150.0, 100.0, 50.0);

    assert!(matches!(driver.dispatch(x, &mut sim).unwrap(), Dispatch::Sent(_)));
    let sent = sim.commands().len();

    mock.increment(Duration::from_millis(100).into());
    assert_eq!(
        driver.dispatch(y, &mut sim).unwrap(),
        Dispatch::Rejected(Rejection::Busy)
    );
    assert_eq!(driver.current_pose(), x);
    assert_eq!(sim.commands().len(), sent);

    // Accepted once expected duration minus grace has passed.
    mock.increment(Duration::from_millis(2_401).into());
    assert!(matches!(driver.dispatch(y, &mut sim).unwrap(), Dispatch::Sent(_)));
    assert_eq!(driver.current_pose(), y);
    assert_eq!(sim.commands().len(), sent + 150);
}

#[test]
fn value_at_protocol_limit_is_refused() {
    assert_eq!(
        encode(CommandKind::SetBase, VALUE_LIMIT),
        Err(EncodingError::ValueOutOfRange {
            kind: CommandKind::SetBase,
            value: VALUE_LIMIT
        })
    );
    let frame = encode(CommandKind::SetBase, VALUE_LIMIT - 1).unwrap();
    let command = decode(frame.as_bytes()).unwrap();
    assert_eq!((command.kind, command.value), (CommandKind::SetBase, VALUE_LIMIT - 1));
}

#[test]
fn startup_handshake_then_motion() {
    let (mut driver, _mock, mut sim) = setup();
    driver.handshake(&mut sim).unwrap();
    assert_eq!(sim.read_available().unwrap(), b"queue_max 50\n");
    assert_eq!(sim.interval_ms(), Some(60));

    driver.dispatch(Pose::new(120.0, 80.0, 60.0), &mut sim).unwrap();
    assert_eq!(sim.commands().len(), 2 + 150);
    assert_eq!(sim.slots().len(), 50);
}
