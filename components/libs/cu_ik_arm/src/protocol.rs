//! Fixed-point command protocol spoken by the arm controller firmware.
//!
//! A command is a single decimal integer `value + kind * 10^VALUE_PLACES`
//! followed by [`FRAME_DELIMITER`]. With 4 value places, "set the elbow to
//! 1500 µs" is `31500/`. The constants below are shared with the firmware;
//! changing any of them needs a synchronized firmware update.

use core::fmt::Write as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of decimal digits reserved for the command value.
pub const VALUE_PLACES: u32 = 4;

/// Exclusive upper bound for a command value (`10^VALUE_PLACES`).
pub const VALUE_LIMIT: u32 = 10u32.pow(VALUE_PLACES);

/// Terminates every frame on the wire.
pub const FRAME_DELIMITER: u8 = b'/';

/// Longest possible frame: every digit of a `u32` plus the delimiter.
pub const FRAME_CAPACITY: usize = 11;

/// Command codes understood by the firmware. Code 0 is reserved.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    SetBase = 1,
    SetShoulder = 2,
    SetElbow = 3,
    SetInterval = 4,
    GetQueueMax = 5,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        Self::SetBase,
        Self::SetShoulder,
        Self::SetElbow,
        Self::SetInterval,
        Self::GetQueueMax,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() as u32 == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The value does not fit the protocol's fixed value field.
    #[error("{kind:?} value {value} is out of range (must be below 10^4)")]
    ValueOutOfRange { kind: CommandKind, value: u32 },
    #[error("frame is not terminated by '/'")]
    MissingDelimiter,
    #[error("frame payload {0:?} is not a decimal integer")]
    Malformed(String),
    #[error("unknown command code {0}")]
    UnknownKind(u32),
    #[error("encoded frame does not fit the frame buffer")]
    FrameOverflow,
}

/// A decoded (kind, value) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub value: u32,
}

impl Command {
    pub const fn new(kind: CommandKind, value: u32) -> Self {
        Self { kind, value }
    }

    pub fn encode(&self) -> Result<Frame, EncodingError> {
        encode(self.kind, self.value)
    }
}

/// One encoded command, delimiter included.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    text: heapless::String<FRAME_CAPACITY>,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.text)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Encode one command into its wire frame.
///
/// Values at or above [`VALUE_LIMIT`] are refused rather than truncated: a
/// value spilling into the kind digits would be executed as a different
/// command by the firmware.
pub fn encode(kind: CommandKind, value: u32) -> Result<Frame, EncodingError> {
    if value >= VALUE_LIMIT {
        return Err(EncodingError::ValueOutOfRange { kind, value });
    }
    let wire = value + kind.code() as u32 * VALUE_LIMIT;
    let mut text = heapless::String::new();
    write!(text, "{wire}").map_err(|_| EncodingError::FrameOverflow)?;
    text.push(FRAME_DELIMITER as char)
        .map_err(|_| EncodingError::FrameOverflow)?;
    Ok(Frame { text })
}

/// Decode exactly one frame, delimiter included.
pub fn decode(frame: &[u8]) -> Result<Command, EncodingError> {
    let body = frame
        .strip_suffix(&[FRAME_DELIMITER])
        .ok_or(EncodingError::MissingDelimiter)?;
    let malformed = || EncodingError::Malformed(String::from_utf8_lossy(body).into_owned());
    if body.is_empty() || !body.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    let wire: u32 = std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;
    let code = wire / VALUE_LIMIT;
    let kind = CommandKind::from_code(code).ok_or(EncodingError::UnknownKind(code))?;
    Ok(Command::new(kind, wire % VALUE_LIMIT))
}

/// Cuts a byte stream into frames as the firmware does, one per delimiter.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    pending: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, get every frame they complete, decoded.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Command, EncodingError>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == FRAME_DELIMITER) {
            let frame: Vec<u8> = self.pending.drain(..=end).collect();
            out.push(decode(&frame));
        }
        out
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
