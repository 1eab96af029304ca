use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;

/// Where the reentrancy latch currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    #[default]
    Idle,
    /// A guarded call is running (possibly waiting on a transfer).
    Entered,
    /// Latched by an emergency halt; cleared only by a resume.
    Halted,
}

impl GuardState {
    /// Whether a guarded call would be rejected right now.
    pub fn is_latched(self) -> bool {
        self != GuardState::Idle
    }
}

/// Non-counting mutual exclusion for one ledger instance.
///
/// Entry succeeds only from [`GuardState::Idle`]. A nested attempt from the
/// same call chain fails instead of blocking.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    state: Cell<GuardState>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GuardState {
        self.state.get()
    }

    /// Take the guard for the lifetime of the returned scope.
    pub fn enter(&self) -> Result<GuardScope<'_>, LedgerError> {
        match self.state.get() {
            GuardState::Idle => {
                self.state.set(GuardState::Entered);
                Ok(GuardScope { guard: self })
            }
            state => {
                debug!(?state, "guard rejected entry");
                Err(LedgerError::ReentrancyDetected)
            }
        }
    }

    /// Fail if a guarded call is in flight. Used by operations that do not
    /// take the guard but must not run from inside a transfer callback.
    pub fn ensure_not_entered(&self) -> Result<(), LedgerError> {
        if self.state.get() == GuardState::Entered {
            debug!("call rejected while a guarded call is in flight");
            return Err(LedgerError::ReentrancyDetected);
        }
        Ok(())
    }

    /// Latch the guard outside the enter/exit protocol. Halting an already
    /// halted guard is a no-op; halting from inside a guarded call is a
    /// re-entry and fails.
    pub(crate) fn halt(&self) -> Result<(), LedgerError> {
        if self.state.get() == GuardState::Entered {
            return Err(LedgerError::ReentrancyDetected);
        }
        self.state.set(GuardState::Halted);
        Ok(())
    }

    /// Clear the latch. Succeeds when idle or halted, fails while a guarded
    /// call is in flight.
    pub(crate) fn resume(&self) -> Result<(), LedgerError> {
        if self.state.get() == GuardState::Entered {
            return Err(LedgerError::ReentrancyDetected);
        }
        self.state.set(GuardState::Idle);
        Ok(())
    }
}

/// Proof that the guard is held. Dropping it releases the guard on every exit
/// path, early returns and `?` included.
#[must_use = "the guard is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct GuardScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        if self.guard.state.get() == GuardState::Entered {
            self.guard.state.set(GuardState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_releases_on_drop() {
        let guard = ReentrancyGuard::new();
        {
            let _scope = guard.enter().unwrap();
            assert_eq!(guard.state(), GuardState::Entered);
            assert_eq!(guard.enter().unwrap_err(), LedgerError::ReentrancyDetected);
        }
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn scope_releases_on_early_error() {
        fn guarded(guard: &ReentrancyGuard) -> Result<(), LedgerError> {
            let _scope = guard.enter()?;
            Err(LedgerError::InvalidAmount)
        }
        let guard = ReentrancyGuard::new();
        assert_eq!(guarded(&guard).unwrap_err(), LedgerError::InvalidAmount);
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[test]
    fn halt_blocks_entry_until_resume() {
        let guard = ReentrancyGuard::new();
        guard.halt().unwrap();
        guard.halt().unwrap();
        assert!(guard.state().is_latched());
        assert_eq!(guard.enter().unwrap_err(), LedgerError::ReentrancyDetected);
        guard.resume().unwrap();
        assert_eq!(guard.state(), GuardState::Idle);
        // Resume with nothing to clear is fine.
        guard.resume().unwrap();
    }

    #[test]
    fn ensure_not_entered_allows_idle_and_halted() {
        let guard = ReentrancyGuard::new();
        guard.ensure_not_entered().unwrap();
        guard.halt().unwrap();
        guard.ensure_not_entered().unwrap();
        guard.resume().unwrap();
        let _scope = guard.enter().unwrap();
        assert_eq!(
            guard.ensure_not_entered().unwrap_err(),
            LedgerError::ReentrancyDetected
        );
    }

    #[test]
    fn halt_and_resume_refuse_while_entered() {
        let guard = ReentrancyGuard::new();
        let scope = guard.enter().unwrap();
        assert_eq!(guard.halt().unwrap_err(), LedgerError::ReentrancyDetected);
        assert_eq!(guard.resume().unwrap_err(), LedgerError::ReentrancyDetected);
        drop(scope);
        assert_eq!(guard.state(), GuardState::Idle);
    }
}
