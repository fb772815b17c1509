//! In-process frame bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so that every subscriber sees
//! every frame without a slow subscriber blocking the others.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::Inbound`] | Copies of frames read off the wire (monitoring only) |
//! | [`Topic::Outbound`] | Frames the translator sent, headed for the wire |

use cangate_types::{Frame, GateError};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered frames before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the [`FrameBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Inbound,
    Outbound,
}

/// A frame plus the instant it was put on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedFrame {
    pub timestamp: DateTime<Utc>,
    pub frame: Frame,
}

/// Shared frame bus.  Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct FrameBus {
    inbound: broadcast::Sender<StampedFrame>,
    outbound: broadcast::Sender<StampedFrame>,
}

impl FrameBus {
    /// Create a new bus.  `capacity` is applied to each topic independently.
    pub fn new(capacity: usize) -> Self {
        let (inbound, _) = broadcast::channel(capacity);
        let (outbound, _) = broadcast::channel(capacity);
        Self { inbound, outbound }
    }

    /// Publish `frame` on `topic`, stamped with the current time.
    ///
    /// Returns the number of subscribers that were handed the frame, or
    /// [`GateError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, frame: Frame) -> Result<usize, GateError> {
        let stamped = StampedFrame {
            timestamp: Utc::now(),
            frame,
        };
        self.sender(topic)
            .send(stamped)
            .map_err(|_| GateError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// Current number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<StampedFrame> {
        match topic {
            Topic::Inbound => &self.inbound,
            Topic::Outbound => &self.outbound,
        }
    }
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`].
///
/// Obtained via [`FrameBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<StampedFrame>,
}

impl TopicReceiver {
    /// Wait for the next frame on this topic.
    ///
    /// Returns:
    /// * `Ok(frame)` – a frame in publish order.
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   frames were dropped.
    /// * `Err(RecvError::Closed)` – every sender is gone.
    pub async fn recv(&mut self) -> Result<StampedFrame, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Take the next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Result<StampedFrame, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
