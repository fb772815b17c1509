//! `cangate-kernel` – Translation & Interlocks
//!
//! The part of the gate that has real semantics. It turns radio motion
//! commands into motor-board movement commands and enforces the two safety
//! interlocks that can suppress or override movement.
//!
//! # Modules
//!
//! - [`codec`] – decodes inbound frames once into the closed
//!   [`InboundMessage`][codec::InboundMessage] union and encodes
//!   [`MovementCommand`][codec::MovementCommand]s into outbound frames.
//! - [`interlock`] – [`InterlockState`][interlock::InterlockState]: the
//!   obstruction and power tags, and the pure rule that decides whether a
//!   movement may be emitted.
//! - [`translator`] – [`Translator`][translator::Translator]: dispatches one
//!   frame at a time, mutates the interlock state and drives the
//!   [`FrameSink`][translator::FrameSink].
//! - [`shared`] – [`SharedTranslator`][shared::SharedTranslator]: a
//!   mutex-guarded handle for hosts that deliver frames from several threads.

pub mod codec;
pub mod interlock;
pub mod shared;
pub mod translator;

pub use codec::{InboundMessage, MotionCommand, MovementCommand, Speed};
pub use interlock::{InterlockState, MotionPermission, PowerState, Transition};
pub use shared::SharedTranslator;
pub use translator::{Dispatch, DispatchStats, FrameSink, Translator};
