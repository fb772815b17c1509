use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest payload a classic CAN frame can carry.
pub const MAX_FRAME_LEN: usize = 8;

/// Arbitration identifiers understood by the gate.
pub mod message_id {
    /// Steering/throttle command from the radio receiver (inbound).
    pub const MOTION_CONTROL: u32 = 510;
    /// Power-state announcement (inbound).
    pub const SYSTEM_STATE: u32 = 500;
    /// Sensor-state announcement (inbound).
    pub const SENSOR_STATE: u32 = 110;
    /// Movement command for the motor-control board (outbound).
    pub const MOVEMENT: u32 = 100;
}

/// A single CAN bus message: arbitration identifier plus up to eight data
/// bytes.
///
/// Frames are immutable once constructed; use [`Frame::new`] to build one
/// from a byte slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFrame", into = "RawFrame")]
pub struct Frame {
    id: u32,
    len: u8,
    data: [u8; MAX_FRAME_LEN],
}

impl Frame {
    /// Build a frame from `id` and `data`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::PayloadTooLong`] when `data` holds more than
    /// [`MAX_FRAME_LEN`] bytes.
    pub fn new(id: u32, data: &[u8]) -> Result<Self, GateError> {
        if data.len() > MAX_FRAME_LEN {
            return Err(GateError::PayloadTooLong {
                id,
                len: data.len(),
            });
        }
        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            len: data.len() as u8,
            data: buf,
        })
    }

    /// Build a frame from a fixed-size array. The length bound is checked at
    /// compile time, so this cannot fail.
    pub const fn from_array<const N: usize>(id: u32, data: [u8; N]) -> Self {
        const { assert!(N <= MAX_FRAME_LEN) };
        let mut buf = [0u8; MAX_FRAME_LEN];
        let mut i = 0;
        while i < N {
            buf[i] = data[i];
            i += 1;
        }
        Self {
            id,
            len: N as u8,
            data: buf,
        }
    }

    /// Arbitration identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The payload bytes actually carried by this frame.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Number of payload bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Highest 11-bit identifier; anything above prints in extended form.
const MAX_STANDARD_ID: u32 = 0x7FF;

/// candump notation: hex identifier (3 digits standard, 8 extended), `#`, hex
/// payload.  Identifier 100 with bytes `00 A0` prints as `064#00A0`.
impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id <= MAX_STANDARD_ID {
            write!(f, "{:03X}#", self.id)?;
        } else {
            write!(f, "{:08X}#", self.id)?;
        }
        for byte in self.data() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Parses candump notation.  A `candump -L` log line is accepted too: only
/// the last whitespace-separated field is read.
impl std::str::FromStr for Frame {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || GateError::FrameSyntax(s.trim().to_string());
        let field = s.split_whitespace().last().ok_or_else(syntax)?;
        let (id, payload) = field.split_once('#').ok_or_else(syntax)?;
        if id.is_empty() || payload.len() % 2 != 0 {
            return Err(syntax());
        }
        let id = u32::from_str_radix(id, 16).map_err(|_| syntax())?;
        let bytes = (0..payload.len())
            .step_by(2)
            .map(|i| payload.get(i..i + 2).and_then(|hex| u8::from_str_radix(hex, 16).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(syntax)?;
        Frame::new(id, &bytes)
    }
}

// Wire shape used for serde so the fixed-size buffer never leaks into JSON.
#[derive(Serialize, Deserialize)]
struct RawFrame {
    id: u32,
    data: Vec<u8>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = GateError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        Frame::new(raw.id, &raw.data)
    }
}

impl From<Frame> for RawFrame {
    fn from(frame: Frame) -> Self {
        RawFrame {
            id: frame.id,
            data: frame.data().to_vec(),
        }
    }
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateError {
    #[error("Malformed frame {id}: expected at least {expected} byte(s), got {actual}")]
    MalformedFrame {
        id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Frame {id} payload of {len} bytes exceeds 8")]
    PayloadTooLong { id: u32, len: usize },

    #[error("Cannot parse frame '{0}'")]
    FrameSyntax(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("CAN adapter error: {0}")]
    Adapter(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
