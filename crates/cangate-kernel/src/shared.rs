//! [`SharedTranslator`] – a [`Translator`] that can be fed from several
//! threads.
//!
//! The interlock check and the send that follows it must not be split by a
//! concurrent state update, so a single mutex covers the whole of
//! [`Translator::dispatch`]: decode, state mutation, decision and send.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cangate_types::{Frame, GateError};

use crate::interlock::InterlockState;
use crate::translator::{Dispatch, DispatchStats, FrameSink, Translator};

/// Cloneable, thread-safe handle to one [`Translator`].  All clones share the
/// same interlock state and sink.
pub struct SharedTranslator<S> {
    inner: Arc<Mutex<Translator<S>>>,
}

impl<S> Clone for SharedTranslator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: FrameSink> SharedTranslator<S> {
    pub fn new(translator: Translator<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(translator)),
        }
    }

    /// Dispatch `frame` while holding the lock for the full handler.
    pub fn dispatch(&self, frame: &Frame) -> Result<Dispatch, GateError> {
        self.lock().dispatch(frame)
    }

    pub fn send_stop(&self) -> Result<(), GateError> {
        self.lock().send_stop()
    }

    pub fn state(&self) -> InterlockState {
        self.lock().state()
    }

    pub fn stats(&self) -> DispatchStats {
        self.lock().stats()
    }

    /// Run `f` with exclusive access to the translator.
    pub fn with<R>(&self, f: impl FnOnce(&mut Translator<S>) -> R) -> R {
        f(&mut self.lock())
    }

    // A panic inside a handler cannot leave the two tags half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Translator<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangate_types::message_id;
    use std::thread;

    fn shared() -> SharedTranslator<Vec<Frame>> {
        SharedTranslator::new(Translator::new(Vec::new()))
    }

    #[test]
    fn clones_share_state() {
        let a = shared();
        let b = a.clone();
        a.dispatch(&Frame::new(message_id::SENSOR_STATE, &[0x80, 0]).unwrap())
            .unwrap();
        assert!(b.state().obstruction_detected());
        assert_eq!(b.with(|t| t.sink().len()), 1);
    }

    #[test]
    fn concurrent_feeds_are_serialized() {
        let gate = shared();
        let motion = Frame::new(message_id::MOTION_CONTROL, &[0, 0x80 | 50]).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                let motion = motion.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        gate.dispatch(&motion).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = gate.stats();
        assert_eq!(stats.received, 1000);
        assert_eq!(stats.emitted, 1000);
        assert_eq!(gate.with(|t| t.sink().len()), 1000);
    }

    #[test]
    fn interleaved_updates_keep_counts_consistent() {
        // Writer toggles the obstruction while a reader sends forward
        // commands.  Every forward is either emitted or suppressed, and each
        // clear→obstructed edge yields exactly one stop.
        let gate = shared();
        let sensor_on = Frame::new(message_id::SENSOR_STATE, &[0x80, 0]).unwrap();
        let sensor_off = Frame::new(message_id::SENSOR_STATE, &[0x00, 0]).unwrap();
        let forward = Frame::new(message_id::MOTION_CONTROL, &[0, 0x80 | 20]).unwrap();

        let writer = {
            let gate = gate.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    gate.dispatch(&sensor_on).unwrap();
                    gate.dispatch(&sensor_off).unwrap();
                }
            })
        };
        let reader = {
            let gate = gate.clone();
            thread::spawn(move || {
                for _ in 0..400 {
                    gate.dispatch(&forward).unwrap();
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();

        let stats = gate.stats();
        assert_eq!(stats.emitted + stats.suppressed, 400 + 200);
        // 200 stops + whatever forwards got through.
        let stops = gate.with(|t| {
            t.sink()
                .iter()
                .filter(|f| f.data() == [0u8, 0u8])
                .count()
        });
        assert_eq!(stops, 200);
    }
}
