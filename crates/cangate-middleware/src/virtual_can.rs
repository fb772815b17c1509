//! Virtual CAN adapter.
//!
//! [`VirtualCanAdapter`] stands in for a `vcan` interface inside one
//! process:
//!
//! * **Inbound** – remote devices (radio receiver, sensor pack) are emulated
//!   with [`VirtualCanAdapter::inject`].  Injected frames are queued on an
//!   unbounded channel that feeds exactly one frame stream, so none are
//!   dropped however far the reader falls behind.  Each frame is also
//!   published on [`Topic::Inbound`] for anyone tapping the bus.
//!
//! * **Outbound** – frames passed to `send_frame` are published on
//!   [`Topic::Outbound`], where a test or a simulated motor-control board can
//!   observe them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cangate_types::{Frame, GateError};
use futures_util::stream::{self, BoxStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::CanAdapter;
use crate::bus::{FrameBus, Topic, TopicReceiver};

pub struct VirtualCanAdapter {
    bus: Arc<FrameBus>,
    channel: String,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
}

impl VirtualCanAdapter {
    pub fn new(bus: Arc<FrameBus>, channel: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            bus,
            channel: channel.into(),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: Mutex::new(Some(rx)),
        }
    }

    pub fn bus(&self) -> &Arc<FrameBus> {
        &self.bus
    }

    /// Put `frame` on the wire as if a remote device had sent it.
    ///
    /// Frames injected before the stream is taken are kept and delivered
    /// first.  Fails with [`GateError::Channel`] once the adapter is closed or
    /// its frame stream has been dropped.
    pub fn inject(&self, frame: Frame) -> Result<(), GateError> {
        let guard = lock(&self.inbound_tx);
        let Some(tx) = guard.as_ref() else {
            return Err(GateError::Channel(format!("{} is closed", self.channel)));
        };
        tx.send(frame.clone())
            .map_err(|_| GateError::Channel(format!("{} has no reader", self.channel)))?;
        // Taps are optional.
        let _ = self.bus.publish_to(Topic::Inbound, frame);
        Ok(())
    }

    /// Disconnect the emulated devices.  The frame stream ends once every
    /// frame already injected has been read.
    pub fn close(&self) {
        lock(&self.inbound_tx).take();
    }

    /// Watch what the gate sends, as the motor-control board would.
    pub fn subscribe_outbound(&self) -> TopicReceiver {
        self.bus.subscribe_to(Topic::Outbound)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CanAdapter for VirtualCanAdapter {
    fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish on [`Topic::Outbound`].  A frame nobody listens to is still a
    /// successful send, as on a real bus.
    async fn send_frame(&self, frame: Frame) -> Result<(), GateError> {
        if self.bus.subscriber_count(Topic::Outbound) == 0 {
            debug!(channel = %self.channel, frame = %frame, "no listeners for outbound frame");
            return Ok(());
        }
        self.bus.publish_to(Topic::Outbound, frame).map(|_| ())
    }

    /// The inbound queue feeds exactly one stream; later calls get an empty
    /// stream.
    async fn frame_stream(&self) -> BoxStream<'static, Frame> {
        match lock(&self.inbound_rx).take() {
            Some(receiver) => Box::pin(stream::unfold(receiver, |mut receiver| async move {
                receiver.recv().await.map(|frame| (frame, receiver))
            })),
            None => {
                warn!(channel = %self.channel, "frame stream already taken");
                Box::pin(stream::empty())
            }
        }
    }
}
