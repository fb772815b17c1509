//! [`InterlockState`] – the two safety tags that gate every movement.
//!
//! The gate keeps exactly two pieces of state:
//!
//! - [`MotionPermission`] – set by the sensor-state announcement. An
//!   obstruction blocks forward motion only; reversing stays allowed so the
//!   vehicle can back away.
//! - [`PowerState`] – set by the system-state announcement. Power-off blocks
//!   all motion with no exception.
//!
//! [`InterlockState::permits`] is a pure function of these two tags and is
//! the whole decision basis for emitting a movement on a motion-control
//! input.

// ────────────────────────────────────────────────────────────────────────────
// Tags
// ────────────────────────────────────────────────────────────────────────────

/// Obstruction axis of the interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPermission {
    /// No obstruction sensed: forward and reverse are both allowed.
    #[default]
    Allowed,
    /// An obstruction is sensed: only reverse movements pass.
    ReverseOnly,
}

/// Power axis of the interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    On,
    Off,
}

/// Result of applying an announcement to the interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed,
    Unchanged,
}

// ────────────────────────────────────────────────────────────────────────────
// InterlockState
// ────────────────────────────────────────────────────────────────────────────

/// Complete interlock state. Defaults to no obstruction and powered on.
///
/// # Example
///
/// ```
/// use cangate_kernel::interlock::InterlockState;
///
/// let mut state = InterlockState::default();
/// assert!(state.permits(true));
///
/// state.set_obstruction(true);
/// assert!(!state.permits(true));  // forward blocked
/// assert!(state.permits(false));  // reverse still allowed
///
/// state.set_power(false);
/// assert!(!state.permits(false)); // nothing moves while powered off
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterlockState {
    permission: MotionPermission,
    power: PowerState,
}

impl InterlockState {
    pub fn new(permission: MotionPermission, power: PowerState) -> Self {
        Self { permission, power }
    }

    pub fn permission(&self) -> MotionPermission {
        self.permission
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn obstruction_detected(&self) -> bool {
        self.permission == MotionPermission::ReverseOnly
    }

    pub fn powered_on(&self) -> bool {
        self.power == PowerState::On
    }

    /// Whether a movement in the given direction may be emitted.
    pub fn permits(&self, forward: bool) -> bool {
        self.power == PowerState::On && (self.permission == MotionPermission::Allowed || !forward)
    }

    /// Apply a sensor-state announcement.
    pub fn set_obstruction(&mut self, obstruction_detected: bool) -> Transition {
        let next = if obstruction_detected {
            MotionPermission::ReverseOnly
        } else {
            MotionPermission::Allowed
        };
        Self::apply(&mut self.permission, next)
    }

    /// Apply a system-state announcement.
    pub fn set_power(&mut self, powered_on: bool) -> Transition {
        let next = if powered_on { PowerState::On } else { PowerState::Off };
        Self::apply(&mut self.power, next)
    }

    fn apply<T: PartialEq>(slot: &mut T, next: T) -> Transition {
        if *slot == next {
            Transition::Unchanged
        } else {
            *slot = next;
            Transition::Changed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_clear_and_powered() {
        let state = InterlockState::default();
        assert!(!state.obstruction_detected());
        assert!(state.powered_on());
        assert_eq!(state.permission(), MotionPermission::Allowed);
        assert_eq!(state.power(), PowerState::On);
    }

    #[test]
    fn permits_truth_table() {
        use MotionPermission::*;
        use PowerState::*;
        let cases = [
            (Allowed, On, true, true),
            (Allowed, On, false, true),
            (ReverseOnly, On, true, false),
            (ReverseOnly, On, false, true),
            (Allowed, Off, true, false),
            (Allowed, Off, false, false),
            (ReverseOnly, Off, true, false),
            (ReverseOnly, Off, false, false),
        ];
        for (permission, power, forward, expected) in cases {
            let state = InterlockState::new(permission, power);
            assert_eq!(
                state.permits(forward),
                expected,
                "{permission:?} {power:?} forward={forward}"
            );
        }
    }

    #[test]
    fn set_obstruction_reports_transitions() {
        let mut state = InterlockState::default();
        assert_eq!(state.set_obstruction(false), Transition::Unchanged);
        assert_eq!(state.set_obstruction(true), Transition::Changed);
        assert!(state.obstruction_detected());
        assert_eq!(state.set_obstruction(true), Transition::Unchanged);
        assert_eq!(state.set_obstruction(false), Transition::Changed);
        assert!(!state.obstruction_detected());
    }

    #[test]
    fn set_power_reports_transitions() {
        let mut state = InterlockState::default();
        assert_eq!(state.set_power(true), Transition::Unchanged);
        assert_eq!(state.set_power(false), Transition::Changed);
        assert!(!state.powered_on());
        assert_eq!(state.set_power(false), Transition::Unchanged);
        assert_eq!(state.set_power(true), Transition::Changed);
    }

    #[test]
    fn axes_are_independent() {
        let mut state = InterlockState::default();
        state.set_power(false);
        state.set_obstruction(true);
        state.set_power(true);
        assert!(state.obstruction_detected());
        assert!(state.powered_on());
        assert!(state.permits(false));
        assert!(!state.permits(true));
    }
}
