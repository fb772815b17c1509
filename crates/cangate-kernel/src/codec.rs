//! Byte-level codec for the four message types on the bus.
//!
//! | Id | Direction | byte 0 | byte 1 |
//! |---|---|---|---|
//! | 510 | in | direction | `0x80` forward flag, `0x7F` throttle % |
//! | 500 | in | `0x80` powered on | – |
//! | 110 | in | `0x80` obstruction detected | – |
//! | 100 | out | direction | `0x80` forward flag, `0x7F` speed |
//!
//! Inbound frames are decoded exactly once into [`InboundMessage`]; every
//! handler downstream works on the typed value.

use cangate_types::{message_id, Frame, GateError};

const FLAG_BIT: u8 = 0x80;
const VALUE_MASK: u8 = 0x7F;

/// Minimum payload length for every recognized inbound identifier.
pub const MIN_INBOUND_LEN: usize = 2;

/// A decoded inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    MotionControl(MotionCommand),
    SystemState { powered_on: bool },
    SensorState { obstruction_detected: bool },
    /// Any identifier the gate does not handle. Not an error.
    Unrecognized(u32),
}

impl InboundMessage {
    /// Classify and decode `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::MalformedFrame`] when a recognized identifier
    /// carries fewer than [`MIN_INBOUND_LEN`] bytes. Unrecognized identifiers
    /// are never checked for length.
    pub fn decode(frame: &Frame) -> Result<Self, GateError> {
        let id = frame.id();
        if !matches!(
            id,
            message_id::MOTION_CONTROL | message_id::SYSTEM_STATE | message_id::SENSOR_STATE
        ) {
            return Ok(InboundMessage::Unrecognized(id));
        }

        let data = frame.data();
        if data.len() < MIN_INBOUND_LEN {
            return Err(GateError::MalformedFrame {
                id,
                expected: MIN_INBOUND_LEN,
                actual: data.len(),
            });
        }

        Ok(match id {
            message_id::MOTION_CONTROL => InboundMessage::MotionControl(MotionCommand {
                direction: data[0],
                forward: data[1] & FLAG_BIT != 0,
                throttle_percentage: data[1] & VALUE_MASK,
            }),
            message_id::SYSTEM_STATE => InboundMessage::SystemState {
                powered_on: data[0] & FLAG_BIT != 0,
            },
            _ => InboundMessage::SensorState {
                obstruction_detected: data[0] & FLAG_BIT != 0,
            },
        })
    }
}

/// Steering/throttle intent from the radio receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    /// Raw steering/rotation code, passed through untouched.
    pub direction: u8,
    pub forward: bool,
    /// Nominally 0–100. Values up to 127 are accepted and not clamped.
    pub throttle_percentage: u8,
}

impl MotionCommand {
    pub fn speed(&self) -> Speed {
        Speed::from_throttle(self.throttle_percentage)
    }

    /// The movement command this intent translates to.
    pub fn to_movement(&self) -> MovementCommand {
        MovementCommand {
            direction: self.direction,
            forward: self.forward,
            speed: self.speed(),
        }
    }
}

/// Motor speed in board units, guaranteed to fit in 7 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Speed(u8);

impl Speed {
    pub const ZERO: Speed = Speed(0);
    /// Speed produced by a 100 % throttle.
    pub const NOMINAL_MAX: Speed = Speed(64);

    /// `floor(throttle * 0.64)`, computed exactly in integers.
    ///
    /// The throttle is masked to 7 bits first, so the result is at most 81
    /// and always representable.
    pub fn from_throttle(throttle_percentage: u8) -> Self {
        let throttle = u16::from(throttle_percentage & VALUE_MASK);
        Speed((throttle * 64 / 100) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Command for the motor-control board (id 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementCommand {
    pub direction: u8,
    pub forward: bool,
    pub speed: Speed,
}

impl MovementCommand {
    /// Direction 0, reverse, speed 0. Shared by both safety handlers.
    pub const fn stop() -> Self {
        MovementCommand {
            direction: 0,
            forward: false,
            speed: Speed::ZERO,
        }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::stop()
    }

    pub fn to_frame(&self) -> Frame {
        let mut byte_1 = self.speed.get();
        if self.forward {
            byte_1 |= FLAG_BIT;
        }
        Frame::from_array(message_id::MOVEMENT, [self.direction, byte_1])
    }

    /// Decode an outbound movement frame, as the motor-control board would.
    ///
    /// Returns `None` for any other identifier or a short payload.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.id() != message_id::MOVEMENT || frame.len() < 2 {
            return None;
        }
        let data = frame.data();
        Some(MovementCommand {
            direction: data[0],
            forward: data[1] & FLAG_BIT != 0,
            speed: Speed(data[1] & VALUE_MASK),
        })
    }
}
