//! In-memory stand-in for the arm controller.
//!
//! [`SimulatedController`] accepts frames exactly as the firmware does: it
//! cuts the byte stream on the delimiter, decodes each command and fills
//! queue slots (base, shoulder, then elbow completes the slot). It answers
//! `GetQueueMax` with a status line on its read side. Useful for running the
//! pipeline without hardware and for asserting on what went over the wire.

use crate::kinematics::PulseTriple;
use crate::protocol::{Command, CommandKind, EncodingError, FrameSplitter};
use cu_serial_link::{ByteLink, LinkError};
use log::{debug, warn};

/// Recorded commands, slots and decode errors kept by default.
pub const DEFAULT_HISTORY: usize = 16 * 1024;

#[derive(Debug)]
pub struct SimulatedController {
    queue_max: usize,
    history: usize,
    slots_filled: usize,
    splitter: FrameSplitter,
    commands: Vec<Command>,
    decode_errors: Vec<EncodingError>,
    slots: Vec<PulseTriple>,
    pending_base: Option<u32>,
    pending_shoulder: Option<u32>,
    interval_ms: Option<u32>,
    outbox: Vec<u8>,
    write_budget: Option<usize>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self {
            queue_max: 0,
            history: DEFAULT_HISTORY,
            slots_filled: 0,
            splitter: FrameSplitter::default(),
            commands: Vec::new(),
            decode_errors: Vec::new(),
            slots: Vec::new(),
            pending_base: None,
            pending_shoulder: None,
            interval_ms: None,
            outbox: Vec::new(),
            write_budget: None,
        }
    }
}

/// Drop the oldest half once `records` reaches `limit`.
fn bound<T>(records: &mut Vec<T>, limit: usize) {
    if records.len() >= limit.max(2) {
        records.drain(..records.len() / 2);
    }
}

impl SimulatedController {
    /// A controller whose slot queue is `queue_max` deep.
    pub fn new(queue_max: usize) -> Self {
        Self {
            queue_max,
            ..Self::default()
        }
    }

    /// Fail every write after the first `writes` succeeded, as a cable pulled
    /// mid-motion would.
    pub fn with_write_budget(mut self, writes: usize) -> Self {
        self.write_budget = Some(writes);
        self
    }

    /// Keep at most `records` entries of each recorded kind; the oldest half
    /// is discarded when the bound is hit.
    pub fn with_history(mut self, records: usize) -> Self {
        self.history = records;
        self
    }

    pub fn queue_max(&self) -> usize {
        self.queue_max
    }

    /// Commands decoded so far, in arrival order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Completed queue slots, in arrival order.
    pub fn slots(&self) -> &[PulseTriple] {
        &self.slots
    }

    pub fn interval_ms(&self) -> Option<u32> {
        self.interval_ms
    }

    pub fn decode_errors(&self) -> &[EncodingError] {
        &self.decode_errors
    }

    /// Forget recorded traffic. The interval and slot numbering are kept.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.decode_errors.clear();
        self.slots.clear();
        self.pending_base = None;
        self.pending_shoulder = None;
    }

    fn apply(&mut self, command: Command) {
        match command.kind {
            CommandKind::SetBase => self.pending_base = Some(command.value),
            CommandKind::SetShoulder => self.pending_shoulder = Some(command.value),
            CommandKind::SetElbow => {
                match (self.pending_base.take(), self.pending_shoulder.take()) {
                    (Some(base), Some(shoulder)) => {
                        let slot = PulseTriple {
                            base,
                            shoulder,
                            elbow: command.value,
                        };
                        let index = self.slots_filled % self.queue_max.max(1);
                        debug!("slot {index} filled: {slot:?}");
                        self.slots_filled += 1;
                        bound(&mut self.slots, self.history);
                        self.slots.push(slot);
                    }
                    _ => warn!("elbow value {} without base/shoulder, slot dropped", command.value),
                }
            }
            CommandKind::SetInterval => self.interval_ms = Some(command.value),
            CommandKind::GetQueueMax => self
                .outbox
                .extend_from_slice(format!("queue_max {}\n", self.queue_max).as_bytes()),
        }
        bound(&mut self.commands, self.history);
        self.commands.push(command);
    }
}

impl ByteLink for SimulatedController {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if let Some(budget) = self.write_budget.as_mut() {
            if *budget == 0 {
                return Err(LinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "simulated controller unplugged",
                )));
            }
            *budget -= 1;
        }
        for decoded in self.splitter.push(bytes) {
            match decoded {
                Ok(command) => self.apply(command),
                Err(e) => {
                    warn!("controller rejected frame: {e}");
                    bound(&mut self.decode_errors, self.history);
                    self.decode_errors.push(e);
                }
            }
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        Ok(self.outbox.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, LinkError> {
        Ok(std::mem::take(&mut self.outbox))
    }
}
