//! [`Notifier`] – connects a [`CanAdapter`] to a [`Translator`].
//!
//! The notifier is the only task that touches the translator, so frames are
//! handled strictly one at a time in arrival order:
//!
//! 1. take the next frame from the adapter's stream;
//! 2. [`Translator::dispatch`] it (decode, interlock, at most one emission
//!    into the [`ChannelSink`]);
//! 3. forward whatever was emitted to the adapter before looking at the next
//!    frame.
//!
//! Malformed frames and failed sends are logged and dropped; the loop keeps
//! running.  On shutdown a final stop command is sent.
//!
//! The translator counts a frame as emitted once it is queued.  A queued
//! frame the adapter then fails to put on the wire is added to
//! [`DispatchStats::send_failures`] in the counters [`Notifier::run`]
//! returns.

use std::future::Future;
use std::sync::Arc;

use cangate_kernel::{DispatchStats, FrameSink, Translator};
use cangate_types::{Frame, GateError};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapter::CanAdapter;

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// [`FrameSink`] that queues frames on an unbounded Tokio channel.
///
/// `send` never blocks and keeps order; the receiving side decides when the
/// frames actually go out.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Frame>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl FrameSink for ChannelSink {
    fn send(&mut self, frame: Frame) -> Result<(), GateError> {
        self.sender
            .send(frame)
            .map_err(|e| GateError::Send(format!("outbound queue closed, lost {}", e.0)))
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct Notifier<A: CanAdapter + ?Sized> {
    adapter: Arc<A>,
    frames: BoxStream<'static, Frame>,
    translator: Translator<ChannelSink>,
    outbound: mpsc::UnboundedReceiver<Frame>,
    adapter_failures: u64,
}

impl<A: CanAdapter + ?Sized> Notifier<A> {
    /// Subscribe to `adapter` and build a translator in its default state.
    ///
    /// The subscription is taken here, so frames injected after `connect`
    /// returns are guaranteed to be seen by [`Notifier::run`].
    pub async fn connect(adapter: Arc<A>, journal_capacity: usize) -> Self {
        let frames = adapter.frame_stream().await;
        let (sink, outbound) = ChannelSink::new();
        Self {
            adapter,
            frames,
            translator: Translator::with_journal_capacity(sink, journal_capacity),
            outbound,
            adapter_failures: 0,
        }
    }

    pub fn translator(&self) -> &Translator<ChannelSink> {
        &self.translator
    }

    /// Process frames until the stream ends or `shutdown` resolves.
    ///
    /// Returns the translator's final counters.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> DispatchStats {
        info!(channel = %self.adapter.channel(), "notifier started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                next = self.frames.next() => {
                    let Some(frame) = next else {
                        info!("frame stream ended");
                        break;
                    };
                    self.handle(&frame).await;
                }
            }
        }

        if let Err(e) = self.translator.send_stop() {
            warn!(error = %e, "failed to queue final stop command");
        }
        self.flush().await;

        let mut stats = self.translator.stats();
        stats.send_failures += self.adapter_failures;
        info!(
            received = stats.received,
            emitted = stats.emitted,
            suppressed = stats.suppressed,
            malformed = stats.malformed,
            send_failures = stats.send_failures,
            "notifier stopped"
        );
        stats
    }

    async fn handle(&mut self, frame: &Frame) {
        match self.translator.dispatch(frame) {
            Ok(outcome) => debug!(frame = %frame, ?outcome, "frame handled"),
            // Already logged by the translator; keep going.
            Err(GateError::MalformedFrame { .. }) => {}
            Err(e) => warn!(frame = %frame, error = %e, "frame handling failed"),
        }
        self.flush().await;
    }

    async fn flush(&mut self) {
        while let Ok(frame) = self.outbound.try_recv() {
            if let Err(e) = self.adapter.send_frame(frame.clone()).await {
                self.adapter_failures += 1;
                warn!(
                    channel = %self.adapter.channel(),
                    frame = %frame,
                    error = %e,
                    "outbound send failed; not retried"
                );
            }
        }
    }
}
