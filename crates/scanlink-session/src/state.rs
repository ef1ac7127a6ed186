//! Session lifecycle state machine.
//!
//! # Valid Transitions
//!
//! - Discovered → Claimed (successful claim)
//! - Claimed → CloseWait (accessory disconnected before `close()`)
//! - Claimed → Closed, CloseWait → Closed (explicit `close()`)
//! - Closed → Claimed (the accessory was claimed again)
//! - any state except Unknown → Unknown (protocol invariant violated)
//! - Unknown → Closed (`close()`, the only operation accepted there)
//!
//! ```
//! use scanlink_core::ScannerStatus;
//! use scanlink_session::SessionStateMachine;
//!
//! let mut machine = SessionStateMachine::new();
//! machine.transition_to(ScannerStatus::Claimed).unwrap();
//! assert!(machine.transition_to(ScannerStatus::Discovered).is_err());
//! assert_eq!(machine.history().len(), 1);
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use scanlink_core::{Error, Result, ScannerStatus};

/// Transitions kept for diagnostics.
const MAX_HISTORY_SIZE: usize = 64;

/// Whether `from → to` is a legal lifecycle step.
pub fn can_transition(from: ScannerStatus, to: ScannerStatus) -> bool {
    use ScannerStatus::*;
    matches!(
        (from, to),
        (Discovered, Claimed)
            | (Claimed, CloseWait)
            | (Claimed, Closed)
            | (CloseWait, Closed)
            | (Closed, Claimed)
            | (Unknown, Closed)
            | (Discovered | Claimed | CloseWait | Closed, Unknown)
    )
}

/// A recorded state change.
#[derive(Debug, Clone, Copy)]
pub struct StateTransition {
    pub from: ScannerStatus,
    pub to: ScannerStatus,
    pub at: Instant,
}

impl StateTransition {
    pub fn elapsed(&self) -> Duration {
        self.at.elapsed()
    }
}

/// Current status plus bounded transition history.
#[derive(Debug)]
pub struct SessionStateMachine {
    current: ScannerStatus,
    entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl SessionStateMachine {
    /// New machine in `Discovered`.
    pub fn new() -> Self {
        Self {
            current: ScannerStatus::Discovered,
            entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current(&self) -> ScannerStatus {
        self.current
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.entered_at.elapsed()
    }

    /// Move to `target`.
    ///
    /// # Errors
    /// `InvalidStateTransition` when the step is not allowed; the state is
    /// left unchanged.
    pub fn transition_to(&mut self, target: ScannerStatus) -> Result<StateTransition> {
        if !can_transition(self.current, target) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }

        let transition = StateTransition {
            from: self.current,
            to: target,
            at: Instant::now(),
        };
        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
        self.current = target;
        self.entered_at = transition.at;
        Ok(transition)
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.history.iter().copied().collect()
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScannerStatus::*;
    use rstest::rstest;

    #[rstest]
    #[case(Discovered, Claimed, true)]
    #[case(Discovered, Closed, false)]
    #[case(Discovered, CloseWait, false)]
    #[case(Claimed, CloseWait, true)]
    #[case(Claimed, Closed, true)]
    #[case(Claimed, Discovered, false)]
    #[case(CloseWait, Closed, true)]
    #[case(CloseWait, Claimed, false)]
    #[case(Closed, Claimed, true)]
    #[case(Closed, CloseWait, false)]
    #[case(Claimed, Unknown, true)]
    #[case(CloseWait, Unknown, true)]
    #[case(Unknown, Unknown, false)]
    #[case(Unknown, Claimed, false)]
    #[case(Unknown, Closed, true)]
    fn test_transition_table(
        #[case] from: ScannerStatus,
        #[case] to: ScannerStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(can_transition(from, to), allowed);
    }

    #[test]
    fn test_invalid_transition_keeps_state() {
        let mut machine = SessionStateMachine::new();
        let err = machine.transition_to(CloseWait).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(machine.current(), Discovered);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_full_lifecycle_history() {
        let mut machine = SessionStateMachine::new();
        machine.transition_to(Claimed).unwrap();
        machine.transition_to(CloseWait).unwrap();
        machine.transition_to(Closed).unwrap();

        let steps: Vec<_> = machine.history().iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            steps,
            vec![(Discovered, Claimed), (Claimed, CloseWait), (CloseWait, Closed)]
        );
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = SessionStateMachine::new();
        machine.transition_to(Claimed).unwrap();
        for _ in 0..100 {
            machine.transition_to(Closed).unwrap();
            machine.transition_to(Claimed).unwrap();
        }
        let history = machine.history();
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.last().unwrap().to, Claimed);
    }
}
