//! Example application for the `cu_ik_arm` pipeline.
//!
//! Reads target positions from stdin, one `x y z` (millimetres) per line,
//! and streams the resulting servo commands to the arm controller.
//!
//! ```sh
//! cargo run -p cu-ik-arm-demo -- --config demos/cu_ik_arm_demo/ikarm.json
//! cargo run -p cu-ik-arm-demo -- --port /dev/ttyACM0
//! echo "200 0 0" | cargo run -p cu-ik-arm-demo -- --sim
//! ```

use clap::Parser;
use cu_ik_arm::{
    ArmConfig, ByteLink, Dispatch, DispatchError, LinkError, MotionDriver, Rejection,
    SimulatedController, TargetPosition, TwoLinkArm,
};
use cu_serial_link::{LineAssembler, LinkSettings, SerialLink, SerialReader};
use cu29_clock::RobotClock;
use log::{LevelFilter, debug, error, info, warn};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DRAIN_POLL: Duration = Duration::from_millis(20);

#[derive(Parser, Debug)]
#[command(name = "cu-ik-arm-demo", about = "Move a 3-joint servo arm to positions read on stdin")]
struct Args {
    /// JSON arm configuration. Built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serial device to probe; repeat to give several. Replaces the configured list.
    #[arg(short, long = "port")]
    ports: Vec<String>,
    /// Drive an in-memory controller instead of a serial port.
    #[arg(long)]
    sim: bool,
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to set up logging: {e}");
    }

    let mut config = match &args.config {
        Some(path) => ArmConfig::load(path).unwrap_or_else(|e| {
            eprintln!("ERROR: {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => ArmConfig::default(),
    };
    if !args.ports.is_empty() {
        config.link.ports = args.ports.clone();
    }

    let mut driver = config.driver(RobotClock::new()).unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    });

    let result = if args.sim {
        run_sim(&mut driver, config.queue_max)
    } else {
        run_serial(&mut driver, config.link.clone())
    };
    match result {
        Ok(()) => info!("Input closed, last commanded pose {}", driver.current_pose()),
        Err(DispatchError::Link(e)) => {
            print_setup_help(&e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("ERROR: controller setup failed: {e}");
            std::process::exit(1);
        }
    }
}

fn print_setup_help(e: &LinkError) {
    eprintln!("ERROR: {e}\n");
    eprintln!("Check: controller plugged in? Device path (--port or config) correct?");
    eprintln!("       Permission? Try: sudo usermod -aG dialout $USER");
}

// ===========================================================================
// Backends
// ===========================================================================

fn run_sim(driver: &mut MotionDriver<TwoLinkArm>, queue_max: usize) -> Result<(), DispatchError> {
    let mut sim = SimulatedController::new(queue_max);
    let mut lines = LineAssembler::new();
    let mut slots = 0;
    driver.handshake(&mut sim)?;
    serve(driver, &mut sim, std::io::stdin().lock(), |_, sim| {
        match sim.read_available() {
            Ok(bytes) => {
                for line in lines.push(&bytes) {
                    info!("Controller: {line}");
                }
            }
            Err(e) => warn!("Simulated controller unreadable: {e}"),
        }
        slots += sim.slots().len();
        sim.clear();
    });
    info!("Simulated controller received {slots} slots");
    Ok(())
}

/// Only the first connection is fatal. Later losses are repaired after each
/// request; until that succeeds dispatches fail with `Disconnected`.
fn run_serial(
    driver: &mut MotionDriver<TwoLinkArm>,
    settings: LinkSettings,
) -> Result<(), DispatchError> {
    let mut link = SerialLink::new(settings);
    let generation = Arc::new(AtomicU64::new(0));
    acquire(driver, &mut link, &generation)?;

    serve(driver, &mut link, std::io::stdin().lock(), |driver, link| {
        if link.is_connected() {
            return;
        }
        warn!("Controller link lost, reconnecting");
        if let Err(e) = acquire(driver, link, &generation) {
            error!("Reconnect failed: {e}. Retrying after the next target");
        }
    });
    Ok(())
}

/// Connect, start a drain thread for device output and configure the
/// controller. Older drain threads retire when the generation moves on.
fn acquire(
    driver: &MotionDriver<TwoLinkArm>,
    link: &mut SerialLink,
    generation: &Arc<AtomicU64>,
) -> Result<(), DispatchError> {
    link.connect()?;
    let reader = link.reader()?;
    let current = generation.fetch_add(1, Ordering::SeqCst) + 1;
    let generation = Arc::clone(generation);
    std::thread::spawn(move || drain(reader, generation, current));
    driver.handshake(link)?;
    Ok(())
}

fn drain(mut reader: SerialReader, generation: Arc<AtomicU64>, mine: u64) {
    let mut lines = LineAssembler::new();
    while generation.load(Ordering::SeqCst) == mine {
        match reader.read_available() {
            Ok(bytes) if bytes.is_empty() => std::thread::sleep(DRAIN_POLL),
            Ok(bytes) => {
                for line in lines.push(&bytes) {
                    info!("Controller: {line}");
                }
            }
            Err(e) => {
                debug!("Drain stopped: {e}");
                return;
            }
        }
    }
}

// ===========================================================================
// Request loop
// ===========================================================================

/// Dispatch every target read from `input`. `after_dispatch` runs after each
/// request and may repair the link (the driver is lent back for the
/// handshake). Failed dispatches are logged and the loop moves on.
fn serve<L, R, F>(
    driver: &mut MotionDriver<TwoLinkArm>,
    link: &mut L,
    input: R,
    mut after_dispatch: F,
) where
    L: ByteLink,
    R: BufRead,
    F: FnMut(&MotionDriver<TwoLinkArm>, &mut L),
{
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Cannot read input: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let target: TargetPosition = match line.parse() {
            Ok(target) => target,
            Err(e) => {
                warn!("Ignoring {line:?}: {e}");
                continue;
            }
        };
        info!("Received target ({}, {}, {})", target.x, target.y, target.z);

        match driver.dispatch(target.into(), link) {
            Ok(Dispatch::Sent(motion)) => info!(
                "Queued {} waypoints ({} frames) towards {}",
                motion.waypoints, motion.frames, motion.target
            ),
            Ok(Dispatch::Rejected(Rejection::Busy)) => {}
            Ok(Dispatch::Rejected(Rejection::Unreachable { .. })) => {}
            Err(DispatchError::Link(e)) => error!("Motion aborted, link failed: {e}"),
            Err(DispatchError::Encoding(e)) => error!("Motion aborted, bad command: {e}"),
        }
        after_dispatch(driver, link);
    }
}
