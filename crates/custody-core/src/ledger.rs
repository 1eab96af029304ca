use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::access::{AccessController, AuthorizationChange, Role};
use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::guard::{GuardState, ReentrancyGuard};
use crate::host::Host;
use crate::principal::Principal;
use crate::Amount;

/// Balances plus their running total. Both fields move together or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Accounts {
    balances: BTreeMap<Principal, Amount>,
    total: Amount,
}

/// Values overwritten by a debit, kept so a failed transfer can undo it.
#[derive(Clone, Copy, Debug)]
struct Checkpoint {
    principal: Principal,
    balance: Amount,
    total: Amount,
}

impl Accounts {
    fn balance(&self, principal: &Principal) -> Amount {
        self.balances.get(principal).copied().unwrap_or(0)
    }

    fn credit(&mut self, principal: &Principal, amount: Amount) -> Result<(), LedgerError> {
        let balance = self
            .balance(principal)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let total = self.total.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.balances.insert(*principal, balance);
        self.total = total;
        Ok(())
    }

    fn debit(&mut self, principal: &Principal, amount: Amount) -> Result<Checkpoint, LedgerError> {
        let available = self.balance(principal);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                principal: *principal,
                requested: amount,
                available,
            });
        }
        let total = self.total.checked_sub(amount).ok_or(LedgerError::Overflow)?;
        let checkpoint = Checkpoint {
            principal: *principal,
            balance: available,
            total: self.total,
        };
        self.balances.insert(*principal, available - amount);
        self.total = total;
        Ok(checkpoint)
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.balances.insert(checkpoint.principal, checkpoint.balance);
        self.total = checkpoint.total;
    }
}

/// Custodial ledger owned by a single principal.
///
/// Balance-changing operations run under a [`ReentrancyGuard`]; privileged
/// ones are checked against the [`AccessController`] before the guard is
/// taken. All methods take `&self` so that a [`Host`] calling back in from a
/// transfer reaches the same instance and is turned away by the guard.
#[derive(Debug)]
pub struct Ledger<H> {
    access: RefCell<AccessController>,
    accounts: RefCell<Accounts>,
    guard: ReentrancyGuard,
    host: H,
}

impl<H: Host> Ledger<H> {
    /// Create a ledger owned by `owner`. The owner starts authorized.
    pub fn new(owner: Principal, host: H) -> Result<Self, LedgerError> {
        let access = AccessController::new(owner)?;
        debug!(%owner, "ledger created");
        Ok(Self {
            access: RefCell::new(access),
            accounts: RefCell::new(Accounts::default()),
            guard: ReentrancyGuard::new(),
            host,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Record value the host has already taken into custody for `depositor`.
    pub fn deposit(
        &self,
        depositor: Principal,
        amount: Amount,
    ) -> Result<LedgerEvent, LedgerError> {
        let _scope = self.guard.enter()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        {
            let mut accounts = self.accounts.borrow_mut();
            accounts.credit(&depositor, amount)?;
            debug!(
                principal = %depositor,
                amount,
                balance = accounts.balance(&depositor),
                total = accounts.total,
                "deposit recorded"
            );
        }
        Ok(LedgerEvent::Deposited {
            principal: depositor,
            amount,
            time: self.host.now(),
        })
    }

    /// Pay `amount` back to `withdrawer`.
    ///
    /// The debit lands before the host is asked to transfer, so anything the
    /// transfer triggers observes the reduced balance (and hits the guard).
    /// If the host refuses, the debit is undone before the error is returned.
    pub fn withdraw(
        &self,
        withdrawer: Principal,
        amount: Amount,
    ) -> Result<LedgerEvent, LedgerError> {
        let _scope = self.guard.enter()?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        // Borrow must end before the host runs.
        let checkpoint = self.accounts.borrow_mut().debit(&withdrawer, amount)?;

        if let Err(err) = self.host.transfer(&withdrawer, amount) {
            self.accounts.borrow_mut().restore(checkpoint);
            warn!(
                principal = %withdrawer,
                amount,
                reason = %err,
                "transfer failed, debit rolled back"
            );
            return Err(LedgerError::TransferFailed {
                to: withdrawer,
                amount,
                reason: err.reason,
            });
        }

        debug!(
            principal = %withdrawer,
            amount,
            total = self.accounts.borrow().total,
            "withdrawal paid"
        );
        Ok(LedgerEvent::Withdrawn {
            principal: withdrawer,
            amount,
            time: self.host.now(),
        })
    }

    pub fn set_authorization(
        &self,
        caller: Principal,
        target: Principal,
        grant: bool,
    ) -> Result<LedgerEvent, LedgerError> {
        // Owner and authorized set only change outside an in-flight transfer.
        self.guard.ensure_not_entered()?;
        let change = self
            .access
            .borrow_mut()
            .set_authorization(&caller, &target, grant)?;
        debug!(%caller, %target, ?change, "authorization updated");
        let time = self.host.now();
        Ok(match change {
            AuthorizationChange::Granted => LedgerEvent::Authorized {
                target,
                by: caller,
                time,
            },
            AuthorizationChange::Revoked => LedgerEvent::Revoked {
                target,
                by: caller,
                time,
            },
        })
    }

    pub fn transfer_ownership(
        &self,
        caller: Principal,
        new_owner: Principal,
    ) -> Result<LedgerEvent, LedgerError> {
        self.guard.ensure_not_entered()?;
        let previous = self
            .access
            .borrow_mut()
            .transfer_ownership(&caller, &new_owner)?;
        debug!(%previous, new = %new_owner, "ownership transferred");
        Ok(LedgerEvent::OwnershipTransferred {
            previous,
            new: new_owner,
            time: self.host.now(),
        })
    }

    /// Latch the guard so every balance-changing call fails with
    /// [`LedgerError::ReentrancyDetected`] until [`Ledger::emergency_resume`].
    ///
    /// This bypasses the normal enter/exit protocol. It is a circuit breaker
    /// for the owner, and it stops withdrawals as well as deposits.
    pub fn emergency_halt(&self, caller: Principal) -> Result<GuardState, LedgerError> {
        self.access.borrow().require_owner(&caller)?;
        self.guard.halt()?;
        warn!(%caller, "ledger halted");
        Ok(self.guard.state())
    }

    /// Clear the guard latch. Works whether or not a halt is in place, but
    /// never from inside a guarded call.
    pub fn emergency_resume(&self, caller: Principal) -> Result<GuardState, LedgerError> {
        self.access.borrow().require_owner(&caller)?;
        self.guard.resume()?;
        warn!(%caller, "ledger resumed");
        Ok(self.guard.state())
    }

    pub fn get_balance(&self, principal: &Principal) -> Amount {
        self.accounts.borrow().balance(principal)
    }

    pub fn total_funds(&self) -> Amount {
        self.accounts.borrow().total
    }

    /// What the host reports holding; should always equal [`Ledger::total_funds`].
    pub fn contract_balance(&self) -> Amount {
        self.host.custodied_value()
    }

    /// Copy of every balance entry, zero entries included.
    pub fn balances(&self) -> BTreeMap<Principal, Amount> {
        self.accounts.borrow().balances.clone()
    }

    pub fn owner(&self) -> Principal {
        self.access.borrow().owner()
    }

    pub fn is_owner(&self, principal: &Principal) -> bool {
        self.access.borrow().is_owner(principal)
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.access.borrow().is_authorized(principal)
    }

    pub fn role_of(&self, principal: &Principal) -> Option<Role> {
        self.access.borrow().role_of(principal)
    }

    pub fn require_authorized(&self, principal: &Principal) -> Result<(), LedgerError> {
        self.access.borrow().require_authorized(principal)
    }

    pub fn authorized(&self) -> Vec<Principal> {
        self.access.borrow().authorized().copied().collect()
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }
}
