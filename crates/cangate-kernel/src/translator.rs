//! [`Translator`] – the dispatch core of the gate.
//!
//! Feed it inbound frames one at a time with [`Translator::dispatch`].  Each
//! call runs to completion: decode, interlock update, emission decision and
//! (at most one) call to the [`FrameSink`], before the next frame is looked
//! at.
//!
//! | Inbound | Effect |
//! |---|---|
//! | 510 motion control | emit a movement if [`InterlockState::permits`] it |
//! | 500 system state | update power; emit a stop on the on→off edge |
//! | 110 sensor state | update obstruction; emit a stop on the clear→obstructed edge |
//! | anything else | ignored |
//!
//! Should several handlers ever match one identifier they run in the order
//! motion control, system state, sensor state.  With the current identifiers
//! exactly one handler matches.

use std::collections::VecDeque;

use cangate_types::{Frame, GateError};
use tracing::{debug, info, instrument, trace, warn};

use crate::codec::{InboundMessage, MotionCommand, MovementCommand};
use crate::interlock::{InterlockState, Transition};

/// Number of inbound frames kept in the journal by default.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Send primitive
// ────────────────────────────────────────────────────────────────────────────

/// The outbound half of the bus, as seen by the translator.
///
/// `send` is synchronous from the translator's perspective but carries no
/// delivery guarantee.  Failures are returned to the translator, which
/// reports them and does not retry.
pub trait FrameSink {
    fn send(&mut self, frame: Frame) -> Result<(), GateError>;
}

/// Recording sink, handy for tests and offline replays.
impl FrameSink for Vec<Frame> {
    fn send(&mut self, frame: Frame) -> Result<(), GateError> {
        self.push(frame);
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn send(&mut self, frame: Frame) -> Result<(), GateError> {
        (**self).send(frame)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outcomes
// ────────────────────────────────────────────────────────────────────────────

/// What a single [`Translator::dispatch`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A movement frame was handed to the sink.
    Emitted(MovementCommand),
    /// A motion-control frame was filtered out by the interlock.
    Suppressed { forward: bool },
    /// A state announcement was applied without emitting anything.
    StateUpdated(Transition),
    /// The identifier is not one the gate handles.
    Ignored(u32),
}

/// Running counters.  Purely observational; the emission decision never
/// reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    /// Frames the sink accepted.
    pub emitted: u64,
    pub suppressed: u64,
    pub malformed: u64,
    pub ignored: u64,
    /// Frames the sink refused.
    pub send_failures: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Translator
// ────────────────────────────────────────────────────────────────────────────

/// Translates radio intent into motor commands behind the two interlocks.
///
/// # Example
///
/// ```
/// use cangate_kernel::{Dispatch, Translator};
/// use cangate_types::Frame;
///
/// let mut gate = Translator::new(Vec::<Frame>::new());
///
/// // Forward at 50 % throttle → speed 32 with the forward bit set.
/// let motion = Frame::new(510, &[0x00, 0x80 | 50]).unwrap();
/// assert!(matches!(gate.dispatch(&motion), Ok(Dispatch::Emitted(_))));
/// assert_eq!(gate.sink()[0].data(), &[0x00, 0x80 | 32]);
///
/// // Obstruction → immediate stop, then forward is filtered.
/// gate.dispatch(&Frame::new(110, &[0x80, 0x00]).unwrap()).unwrap();
/// assert_eq!(gate.sink()[1].data(), &[0x00, 0x00]);
/// assert!(matches!(gate.dispatch(&motion), Ok(Dispatch::Suppressed { .. })));
/// ```
pub struct Translator<S> {
    state: InterlockState,
    sink: S,
    stats: DispatchStats,
    journal: VecDeque<Frame>,
    journal_capacity: usize,
}

impl<S: FrameSink> Translator<S> {
    /// Create a translator in the default state (clear, powered on).
    pub fn new(sink: S) -> Self {
        Self::with_journal_capacity(sink, DEFAULT_JOURNAL_CAPACITY)
    }

    /// Like [`Translator::new`] but keep the last `capacity` inbound frames.
    /// A capacity of zero disables the journal.
    pub fn with_journal_capacity(sink: S, capacity: usize) -> Self {
        Self {
            state: InterlockState::default(),
            sink,
            stats: DispatchStats::default(),
            journal: VecDeque::with_capacity(capacity),
            journal_capacity: capacity,
        }
    }

    pub fn state(&self) -> InterlockState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Most recent inbound frames, oldest first.
    pub fn received_frames(&self) -> impl Iterator<Item = &Frame> {
        self.journal.iter()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Handle one inbound frame to completion.
    ///
    /// # Errors
    ///
    /// - [`GateError::MalformedFrame`] – a recognized identifier with a short
    ///   payload.  Nothing is mutated and nothing is sent.
    /// - Whatever the sink returns when a send fails.  State changes made by
    ///   the frame stay applied.
    #[instrument(level = "debug", skip_all, fields(id = frame.id(), len = frame.len()))]
    pub fn dispatch(&mut self, frame: &Frame) -> Result<Dispatch, GateError> {
        self.stats.received += 1;
        self.record(frame);

        let message = match InboundMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(frame = %frame, error = %e, "dropping malformed frame");
                return Err(e);
            }
        };

        match message {
            InboundMessage::MotionControl(command) => self.handle_motion_control(command),
            InboundMessage::SystemState { powered_on } => self.handle_system_state(powered_on),
            InboundMessage::SensorState {
                obstruction_detected,
            } => self.handle_sensor_state(obstruction_detected),
            InboundMessage::Unrecognized(id) => {
                self.stats.ignored += 1;
                trace!(id, "ignoring unrecognized identifier");
                Ok(Dispatch::Ignored(id))
            }
        }
    }

    /// Send a stop command outside the normal dispatch flow, e.g. on
    /// shutdown.  Interlock state is not touched.
    pub fn send_stop(&mut self) -> Result<(), GateError> {
        self.emit(MovementCommand::stop()).map(|_| ())
    }

    // ------------------------------------------------------------------ handlers

    fn handle_motion_control(&mut self, command: MotionCommand) -> Result<Dispatch, GateError> {
        if !self.state.permits(command.forward) {
            self.stats.suppressed += 1;
            debug!(
                forward = command.forward,
                obstruction_detected = self.state.obstruction_detected(),
                powered_on = self.state.powered_on(),
                "movement suppressed by interlock"
            );
            return Ok(Dispatch::Suppressed {
                forward: command.forward,
            });
        }
        self.emit(command.to_movement())
    }

    fn handle_system_state(&mut self, powered_on: bool) -> Result<Dispatch, GateError> {
        let transition = self.state.set_power(powered_on);
        if transition == Transition::Changed {
            info!(powered_on, "power state changed");
            if !powered_on {
                return self.emit(MovementCommand::stop());
            }
        }
        Ok(Dispatch::StateUpdated(transition))
    }

    fn handle_sensor_state(&mut self, obstruction_detected: bool) -> Result<Dispatch, GateError> {
        let transition = self.state.set_obstruction(obstruction_detected);
        if transition == Transition::Changed {
            info!(obstruction_detected, "obstruction state changed");
            if obstruction_detected {
                return self.emit(MovementCommand::stop());
            }
        }
        Ok(Dispatch::StateUpdated(transition))
    }

    // ------------------------------------------------------------------ helpers

    fn emit(&mut self, command: MovementCommand) -> Result<Dispatch, GateError> {
        let frame = command.to_frame();
        match self.sink.send(frame) {
            Ok(()) => {
                self.stats.emitted += 1;
                debug!(
                    direction = command.direction,
                    forward = command.forward,
                    speed = command.speed.get(),
                    "movement sent"
                );
                Ok(Dispatch::Emitted(command))
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!(error = %e, stop = command.is_stop(), "movement send failed");
                Err(e)
            }
        }
    }

    fn record(&mut self, frame: &Frame) {
        if self.journal_capacity == 0 {
            return;
        }
        if self.journal.len() == self.journal_capacity {
            self.journal.pop_front();
        }
        self.journal.push_back(frame.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Speed;
    use cangate_types::message_id;

    // ------------------------------------------------------------------ helpers

    fn motion(direction: u8, forward: bool, throttle: u8) -> Frame {
        let byte_1 = if forward { 0x80 | throttle } else { throttle };
        Frame::new(message_id::MOTION_CONTROL, &[direction, byte_1]).unwrap()
    }

    fn sensor(obstruction: bool) -> Frame {
        Frame::new(message_id::SENSOR_STATE, &[if obstruction { 0x80 } else { 0 }, 0]).unwrap()
    }

    fn system(powered_on: bool) -> Frame {
        Frame::new(message_id::SYSTEM_STATE, &[if powered_on { 0x80 } else { 0 }, 0]).unwrap()
    }

    fn stop_frame() -> Frame {
        Frame::new(message_id::MOVEMENT, &[0, 0]).unwrap()
    }

    fn recording_gate() -> Translator<Vec<Frame>> {
        Translator::new(Vec::new())
    }

    /// Sink that refuses every frame.
    struct BrokenSink;

    impl FrameSink for BrokenSink {
        fn send(&mut self, _frame: Frame) -> Result<(), GateError> {
            Err(GateError::Send("bus down".into()))
        }
    }

    // ------------------------------------------------------------------ motion control

    #[test]
    fn forward_motion_is_translated() {
        let mut gate = recording_gate();
        let out = gate.dispatch(&motion(0, true, 50)).unwrap();

        assert_eq!(
            out,
            Dispatch::Emitted(MovementCommand {
                direction: 0,
                forward: true,
                speed: Speed::from_throttle(50),
            })
        );
        assert_eq!(gate.sink().len(), 1);
        assert_eq!(gate.sink()[0].id(), message_id::MOVEMENT);
        assert_eq!(gate.sink()[0].data(), &[0x00, 0x80 | 32]);
    }

    #[test]
    fn reverse_allowed_while_obstructed() {
        let mut gate = recording_gate();
        gate.dispatch(&sensor(true)).unwrap();
        gate.sink_mut().clear();

        let direction = (-90i8) as u8;
        let out = gate.dispatch(&motion(direction, false, 75)).unwrap();

        assert!(matches!(out, Dispatch::Emitted(_)));
        assert_eq!(gate.sink().as_slice(), &[Frame::new(100, &[direction, 48]).unwrap()]);
    }

    #[test]
    fn forward_blocked_while_obstructed() {
        let mut gate = recording_gate();
        gate.dispatch(&sensor(true)).unwrap();
        gate.sink_mut().clear();

        let out = gate.dispatch(&motion(0, true, 50)).unwrap();
        assert_eq!(out, Dispatch::Suppressed { forward: true });
        assert!(gate.sink().is_empty());
        // Filtering is not a state change.
        assert!(gate.state().obstruction_detected());
        assert!(gate.state().powered_on());
    }

    #[test]
    fn nothing_moves_while_powered_off() {
        let mut gate = recording_gate();
        gate.dispatch(&system(false)).unwrap();
        gate.sink_mut().clear();

        assert_eq!(
            gate.dispatch(&motion(0, true, 50)).unwrap(),
            Dispatch::Suppressed { forward: true }
        );
        assert_eq!(
            gate.dispatch(&motion(0, false, 50)).unwrap(),
            Dispatch::Suppressed { forward: false }
        );
        assert!(gate.sink().is_empty());
        assert_eq!(gate.stats().suppressed, 2);
    }

    #[test]
    fn clearing_obstruction_restores_forward() {
        let mut gate = recording_gate();
        gate.dispatch(&sensor(true)).unwrap();
        assert_eq!(
            gate.dispatch(&sensor(false)).unwrap(),
            Dispatch::StateUpdated(Transition::Changed)
        );
        gate.sink_mut().clear();

        assert!(matches!(
            gate.dispatch(&motion(3, true, 100)).unwrap(),
            Dispatch::Emitted(_)
        ));
        assert_eq!(gate.sink()[0].data(), &[3, 0x80 | 64]);
    }

    // ------------------------------------------------------------------ safety handlers

    #[test]
    fn obstruction_edge_emits_single_stop() {
        let mut gate = recording_gate();
        let out = gate.dispatch(&sensor(true)).unwrap();

        assert_eq!(out, Dispatch::Emitted(MovementCommand::stop()));
        assert!(gate.state().obstruction_detected());
        assert_eq!(gate.sink().as_slice(), &[stop_frame()]);
    }

    #[test]
    fn power_off_edge_emits_single_stop() {
        let mut gate = recording_gate();
        let out = gate.dispatch(&system(false)).unwrap();

        assert_eq!(out, Dispatch::Emitted(MovementCommand::stop()));
        assert!(!gate.state().powered_on());
        assert_eq!(gate.sink().as_slice(), &[stop_frame()]);
    }

    #[test]
    fn power_on_is_silent() {
        let mut gate = recording_gate();
        gate.dispatch(&system(false)).unwrap();
        gate.sink_mut().clear();

        assert_eq!(
            gate.dispatch(&system(true)).unwrap(),
            Dispatch::StateUpdated(Transition::Changed)
        );
        assert!(gate.state().powered_on());
        assert!(gate.sink().is_empty());
    }

    #[test]
    fn repeated_announcements_are_idempotent() {
        let mut gate = recording_gate();

        // Defaults: clear + powered.  Repeating them changes nothing.
        assert_eq!(
            gate.dispatch(&sensor(false)).unwrap(),
            Dispatch::StateUpdated(Transition::Unchanged)
        );
        assert_eq!(
            gate.dispatch(&system(true)).unwrap(),
            Dispatch::StateUpdated(Transition::Unchanged)
        );
        assert!(gate.sink().is_empty());

        gate.dispatch(&sensor(true)).unwrap();
        gate.dispatch(&system(false)).unwrap();
        let before = gate.state();
        gate.sink_mut().clear();

        assert_eq!(
            gate.dispatch(&sensor(true)).unwrap(),
            Dispatch::StateUpdated(Transition::Unchanged)
        );
        assert_eq!(
            gate.dispatch(&system(false)).unwrap(),
            Dispatch::StateUpdated(Transition::Unchanged)
        );
        assert_eq!(gate.state(), before);
        assert!(gate.sink().is_empty());
    }

    // ------------------------------------------------------------------ errors

    #[test]
    fn malformed_frame_changes_nothing() {
        let mut gate = recording_gate();
        let before = gate.state();

        for id in [message_id::MOTION_CONTROL, message_id::SENSOR_STATE, message_id::SYSTEM_STATE] {
            let short = Frame::new(id, &[0x80]).unwrap();
            assert!(matches!(
                gate.dispatch(&short),
                Err(GateError::MalformedFrame { .. })
            ));
        }

        assert_eq!(gate.state(), before);
        assert!(gate.sink().is_empty());
        assert_eq!(gate.stats().malformed, 3);

        // Still live afterwards.
        assert!(matches!(
            gate.dispatch(&motion(0, true, 10)).unwrap(),
            Dispatch::Emitted(_)
        ));
    }

    #[test]
    fn unrecognized_identifier_is_ignored() {
        let mut gate = recording_gate();
        let out = gate.dispatch(&Frame::new(0x123, &[]).unwrap()).unwrap();
        assert_eq!(out, Dispatch::Ignored(0x123));
        assert!(gate.sink().is_empty());
        assert_eq!(gate.stats().ignored, 1);
    }

    #[test]
    fn send_failure_is_reported_but_state_sticks() {
        let mut gate = Translator::new(BrokenSink);

        let result = gate.dispatch(&sensor(true));
        assert_eq!(result, Err(GateError::Send("bus down".into())));
        assert!(gate.state().obstruction_detected());
        assert_eq!(gate.stats().send_failures, 1);
        assert_eq!(gate.stats().emitted, 0);

        // The next frame is processed normally.
        assert!(gate.dispatch(&motion(0, false, 10)).is_err());
        assert_eq!(gate.stats().send_failures, 2);
        assert_eq!(gate.stats().received, 2);
    }

    #[test]
    fn send_stop_leaves_state_alone() {
        let mut gate = recording_gate();
        gate.send_stop().unwrap();
        assert_eq!(gate.sink().as_slice(), &[stop_frame()]);
        assert_eq!(gate.state(), InterlockState::default());
    }

    // ------------------------------------------------------------------ journal

    #[test]
    fn journal_keeps_most_recent_frames() {
        let mut gate = Translator::with_journal_capacity(Vec::<Frame>::new(), 2);
        let frames = [motion(1, true, 1), sensor(false), system(true)];
        for f in &frames {
            gate.dispatch(f).unwrap();
        }
        let kept: Vec<_> = gate.received_frames().cloned().collect();
        assert_eq!(kept, frames[1..].to_vec());
        assert_eq!(gate.stats().received, 3);
    }

    #[test]
    fn journal_records_malformed_frames_too() {
        let mut gate = recording_gate();
        let short = Frame::new(message_id::MOTION_CONTROL, &[]).unwrap();
        let _ = gate.dispatch(&short);
        assert_eq!(gate.received_frames().count(), 1);
    }

    #[test]
    fn zero_capacity_disables_journal() {
        let mut gate = Translator::with_journal_capacity(Vec::<Frame>::new(), 0);
        gate.dispatch(&sensor(false)).unwrap();
        assert_eq!(gate.received_frames().count(), 0);
    }

    // ------------------------------------------------------------------ sequences

    #[test]
    fn scripted_drive_session() {
        let mut gate = recording_gate();
        let script = [
            motion(0, true, 50),  // emitted
            sensor(true),         // stop
            motion(0, true, 50),  // suppressed
            motion(0, false, 75), // reverse emitted
            sensor(false),        // silent
            system(false),        // stop
            motion(0, false, 75), // suppressed
            system(true),         // silent
            motion(0, true, 100), // emitted
        ];
        for f in &script {
            gate.dispatch(f).unwrap();
        }
        let sent: Vec<Vec<u8>> = gate.sink().iter().map(|f| f.data().to_vec()).collect();
        assert_eq!(
            sent,
            vec![
                vec![0, 0x80 | 32],
                vec![0, 0],
                vec![0, 48],
                vec![0, 0],
                vec![0, 0x80 | 64],
            ]
        );
        let stats = gate.stats();
        assert_eq!(stats.received, 9);
        assert_eq!(stats.emitted, 5);
        assert_eq!(stats.suppressed, 2);
    }
}
