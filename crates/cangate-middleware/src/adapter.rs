//! The bus-adapter seam.
//!
//! The translator never talks to a CAN interface directly.  A [`CanAdapter`]
//! owns the interface and exposes exactly what the gate needs from it: an
//! ordered stream of inbound frames and a send primitive.
//!
//! - [`VirtualCanAdapter`][crate::virtual_can::VirtualCanAdapter] – in-process
//!   bus for tests and bench setups.
//! - `SocketCanAdapter` – a Linux SocketCAN interface (feature `socketcan`).

use async_trait::async_trait;
use cangate_types::{Frame, GateError};
use futures_util::stream::BoxStream;

/// Every CAN backend must implement this trait.
///
/// # Contract
///
/// * `frame_stream` – yields inbound frames in arrival order, never
///   reordered or batched.  Subscription happens when the method is called,
///   so frames that arrive before the call are not seen.
///
/// * `send_frame` – transmits one frame.  Delivery guarantees belong to the
///   backend; the gate does not retry.
#[async_trait]
pub trait CanAdapter: Send + Sync {
    /// Interface name, e.g. `"vcan0"`.
    fn channel(&self) -> &str;

    async fn send_frame(&self, frame: Frame) -> Result<(), GateError>;

    async fn frame_stream(&self) -> BoxStream<'static, Frame>;
}
