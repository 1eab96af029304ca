use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::principal::Principal;
use crate::Amount;

/// Services the ledger borrows from its hosting environment.
///
/// `transfer` is the only call the ledger makes while holding its guard, and
/// implementations are free to call back into the ledger from it; those
/// callbacks are rejected.
pub trait Host {
    /// Move `amount` out of custody to `to`.
    fn transfer(&self, to: &Principal, amount: Amount) -> Result<(), TransferError>;

    /// Value the host believes it holds on behalf of the ledger.
    fn custodied_value(&self) -> Amount;

    /// Logical timestamp stamped on emitted events.
    fn now(&self) -> u64;
}

impl<H: Host + ?Sized> Host for &H {
    fn transfer(&self, to: &Principal, amount: Amount) -> Result<(), TransferError> {
        (**self).transfer(to, amount)
    }

    fn custodied_value(&self) -> Amount {
        (**self).custodied_value()
    }

    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Refusal from the host to move value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TransferError {
    pub reason: String,
}

impl TransferError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Value paid out by a [`MemoryHost`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payout {
    pub to: Principal,
    pub amount: Amount,
    pub time: u64,
}

/// Host that keeps custody in memory.
///
/// Value arrives through [`MemoryHost::receive`] before a deposit is
/// recorded and leaves through [`Host::transfer`]. Recipients can be marked
/// as rejecting to exercise the failed-transfer path. The clock advances by
/// one on every read.
#[derive(Debug, Default)]
pub struct MemoryHost {
    custodied: Cell<Amount>,
    clock: Cell<u64>,
    rejecting: RefCell<BTreeSet<Principal>>,
    payouts: RefCell<Vec<Payout>>,
}

impl MemoryHost {
    pub fn new(start_time: u64) -> Self {
        Self {
            clock: Cell::new(start_time),
            ..Self::default()
        }
    }

    /// Take `amount` into custody ahead of recording a deposit.
    pub fn receive(&self, amount: Amount) -> Result<(), TransferError> {
        let custodied = self
            .custodied
            .get()
            .checked_add(amount)
            .ok_or_else(|| TransferError::new("custodied value overflow"))?;
        self.custodied.set(custodied);
        Ok(())
    }

    /// Hand back value taken by [`MemoryHost::receive`] when the deposit it
    /// was meant for did not go through.
    pub fn bounce(&self, amount: Amount) {
        self.custodied
            .set(self.custodied.get().saturating_sub(amount));
    }

    pub fn reject_transfers_to(&self, principal: Principal) {
        self.rejecting.borrow_mut().insert(principal);
    }

    pub fn accept_transfers_to(&self, principal: &Principal) {
        self.rejecting.borrow_mut().remove(principal);
    }

    pub fn payouts(&self) -> Vec<Payout> {
        self.payouts.borrow().clone()
    }

    fn tick(&self) -> u64 {
        let now = self.clock.get();
        self.clock.set(now.saturating_add(1));
        now
    }
}

impl Host for MemoryHost {
    fn transfer(&self, to: &Principal, amount: Amount) -> Result<(), TransferError> {
        if self.rejecting.borrow().contains(to) {
            return Err(TransferError::new("recipient rejected the transfer"));
        }
        let remaining = self
            .custodied
            .get()
            .checked_sub(amount)
            .ok_or_else(|| TransferError::new("host holds less than the requested amount"))?;
        self.custodied.set(remaining);
        let time = self.tick();
        self.payouts.borrow_mut().push(Payout {
            to: *to,
            amount,
            time,
        });
        Ok(())
    }

    fn custodied_value(&self) -> Amount {
        self.custodied.get()
    }

    fn now(&self) -> u64 {
        self.tick()
    }
}
