//! Linux SocketCAN adapter (feature `socketcan`).
//!
//! [`SocketCanAdapter`] opens two raw sockets on the named interface: one is
//! handed to a dedicated reader thread (reads block), the other is used for
//! writes.  Bit timing is configured on the interface itself (`ip link set
//! can0 type can bitrate 250000`), not here.

use std::sync::Mutex;
use std::thread;

use async_trait::async_trait;
use cangate_types::{Frame, GateError};
use futures_util::stream::{self, BoxStream};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Id, Socket, StandardId};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::adapter::CanAdapter;

pub struct SocketCanAdapter {
    channel: String,
    writer: CanSocket,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
}

impl SocketCanAdapter {
    /// Open `channel` (e.g. `"can0"`, `"vcan0"`) and start the reader thread.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Adapter`] when either socket cannot be opened.
    pub fn open(channel: &str) -> Result<Self, GateError> {
        let reader = CanSocket::open(channel)
            .map_err(|e| GateError::Adapter(format!("open {channel} for reading: {e}")))?;
        let writer = CanSocket::open(channel)
            .map_err(|e| GateError::Adapter(format!("open {channel} for writing: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let name = channel.to_string();
        thread::Builder::new()
            .name(format!("cangate-rx-{channel}"))
            .spawn(move || read_loop(&name, &reader, &tx))
            .map_err(|e| GateError::Adapter(format!("spawn reader thread: {e}")))?;

        Ok(Self {
            channel: channel.to_string(),
            writer,
            inbound: Mutex::new(Some(rx)),
        })
    }
}

fn read_loop(channel: &str, socket: &CanSocket, tx: &mpsc::UnboundedSender<Frame>) {
    loop {
        let raw = match socket.read_frame() {
            Ok(raw) => raw,
            Err(e) => {
                error!(channel, error = %e, "SocketCAN read failed; reader stopping");
                return;
            }
        };
        let Some(frame) = from_socketcan(&raw) else {
            debug!(channel, ?raw, "non-gate frame skipped");
            continue;
        };
        if tx.send(frame).is_err() {
            return;
        }
    }
}

/// Standard-id data frames only.  Remote and error frames carry no gate
/// traffic, and an extended id that happens to equal 510 is not a motion
/// command.
fn from_socketcan(raw: &CanFrame) -> Option<Frame> {
    let CanFrame::Data(_) = raw else {
        return None;
    };
    let Id::Standard(id) = raw.id() else {
        return None;
    };
    Frame::new(u32::from(id.as_raw()), raw.data()).ok()
}

fn to_socketcan(frame: &Frame) -> Result<CanFrame, GateError> {
    let id = u16::try_from(frame.id())
        .ok()
        .and_then(StandardId::new)
        .ok_or_else(|| GateError::Adapter(format!("id {} is not a standard id", frame.id())))?;
    CanFrame::new(id, frame.data())
        .ok_or_else(|| GateError::Adapter(format!("cannot build frame {frame}")))
}

#[async_trait]
impl CanAdapter for SocketCanAdapter {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), GateError> {
        let raw = to_socketcan(&frame)?;
        self.writer
            .write_frame(&raw)
            .map_err(|e| GateError::Send(format!("{}: {e}", self.channel)))
    }

    /// The reader thread feeds exactly one stream; later calls get an empty
    /// stream.
    async fn frame_stream(&self) -> BoxStream<'static, Frame> {
        let receiver = self
            .inbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        match receiver {
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
