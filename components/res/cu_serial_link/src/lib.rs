//! Serial byte link used by the IK arm pipeline.
//!
//! The motion pipeline only needs a reliable, ordered byte sink with an
//! optional non-blocking read side. That contract is [`ByteLink`]. The host
//! implementation is [`SerialLink`], which owns the serial port, probes a
//! list of candidate device paths on connection and gives up after a bounded
//! number of rounds (see [`ReconnectPolicy`]).
//!
//! Unsolicited device output (status or debug text printed by the firmware)
//! is drained on a separate handle, [`SerialReader`], so a background reader
//! never contends with the write path.

mod lines;
mod policy;
mod serial;

pub use lines::{LineAssembler, MAX_LINE};
pub use policy::ReconnectPolicy;
pub use serial::{LinkSettings, SerialLink, SerialReader};

use thiserror::Error;

/// Errors raised by a byte link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The link holds no open device. Nothing was written.
    #[error("serial link is not connected")]
    Disconnected,
    /// The device rejected a read or a write. The link drops the device.
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The serial driver refused an operation (open, clone, query).
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    /// Every candidate path failed for every round allowed by the policy.
    #[error("no serial port could be opened ({attempts} round(s) over {candidates} candidate(s))")]
    Exhausted { attempts: u32, candidates: usize },
}

/// The byte transport the arm pipeline writes its frames to.
///
/// Writes are ordered and either complete or fail; a failed write leaves the
/// remote command stream in an unknown state, so callers abort the current
/// transmission instead of retrying it.
pub trait ByteLink {
    /// Write every byte of `bytes`, in order.
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Number of bytes waiting to be read, without blocking.
    fn bytes_available(&mut self) -> Result<usize, LinkError>;

    /// Everything currently waiting on the read side. Never blocks; an empty
    /// vector means nothing was pending.
    fn read_available(&mut self) -> Result<Vec<u8>, LinkError>;
}

impl<L: ByteLink + ?Sized> ByteLink for Box<L> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).write(bytes)
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        (**self).bytes_available()
    }

    fn read_available(&mut self) -> Result<Vec<u8>, LinkError> {
        (**self).read_available()
    }
}
