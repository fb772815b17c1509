//! `cangate-middleware` – Bus Plumbing
//!
//! Moves frames between the CAN interface and the translator without caring
//! what they mean.
//!
//! # Modules
//!
//! - [`bus`] – in-process [`FrameBus`] with inbound and outbound lanes, built
//!   on Tokio broadcast channels.
//! - [`adapter`] – the [`CanAdapter`] trait every bus backend implements.
//! - [`virtual_can`] – [`VirtualCanAdapter`], an in-process stand-in for a
//!   `vcan` interface.
//! - `socketcan_adapter` (feature `socketcan`) – `SocketCanAdapter` for Linux
//!   SocketCAN interfaces.
//! - [`notifier`] – [`Notifier`]: pulls frames from an adapter, feeds the
//!   translator one at a time and forwards what it emits.

pub mod adapter;
pub mod bus;
pub mod notifier;
#[cfg(feature = "socketcan")]
pub mod socketcan_adapter;
pub mod virtual_can;

pub use adapter::CanAdapter;
pub use bus::{FrameBus, StampedFrame, Topic, TopicReceiver};
pub use notifier::{ChannelSink, Notifier};
#[cfg(feature = "socketcan")]
pub use socketcan_adapter::SocketCanAdapter;
pub use virtual_can::VirtualCanAdapter;
