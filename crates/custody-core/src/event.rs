use serde::{Deserialize, Serialize};

use crate::principal::Principal;
use crate::Amount;

/// Notification produced by a successful state change.
///
/// The ledger returns these to its caller; delivering or persisting them is
/// left to whoever hosts the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Deposited {
        principal: Principal,
        amount: Amount,
        time: u64,
    },
    Withdrawn {
        principal: Principal,
        amount: Amount,
        time: u64,
    },
    Authorized {
        target: Principal,
        by: Principal,
        time: u64,
    },
    Revoked {
        target: Principal,
        by: Principal,
        time: u64,
    },
    OwnershipTransferred {
        previous: Principal,
        new: Principal,
        time: u64,
    },
}

impl LedgerEvent {
    pub fn time(&self) -> u64 {
        match self {
            LedgerEvent::Deposited { time, .. }
            | LedgerEvent::Withdrawn { time, .. }
            | LedgerEvent::Authorized { time, .. }
            | LedgerEvent::Revoked { time, .. }
            | LedgerEvent::OwnershipTransferred { time, .. } => *time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_json_shape() {
        let alice = Principal::from_label("alice");
        let event = LedgerEvent::Deposited {
            principal: alice,
            amount: 100,
            time: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "deposited");
        assert_eq!(value["principal"], alice.to_hex());
        assert_eq!(value["amount"], 100);
        assert_eq!(event.time(), 3);

        let transfer = LedgerEvent::OwnershipTransferred {
            previous: alice,
            new: Principal::from_label("bob"),
            time: 9,
        };
        let value = serde_json::to_value(&transfer).unwrap();
        assert_eq!(value["type"], "ownership_transferred");
        assert_eq!(value["new"], Principal::from_label("bob").to_hex());
    }
}
