use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::principal::Principal;

/// Privilege held by a principal.
///
/// Roles are resolved owner first, then the explicit authorized set, so the
/// owner is authorized no matter what its map entry says.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Authorized,
}

/// Which way an authorization entry was set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationChange {
    Granted,
    Revoked,
}

/// Owner identity plus the explicitly authorized principals.
#[derive(Clone, Debug)]
pub struct AccessController {
    owner: Principal,
    authorized: BTreeMap<Principal, bool>,
}

impl AccessController {
    pub fn new(owner: Principal) -> Result<Self, LedgerError> {
        if owner.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let mut authorized = BTreeMap::new();
        authorized.insert(owner, true);
        Ok(Self { owner, authorized })
    }

    pub fn owner(&self) -> Principal {
        self.owner
    }

    pub fn role_of(&self, principal: &Principal) -> Option<Role> {
        if self.is_owner(principal) {
            Some(Role::Owner)
        } else if self.authorized.get(principal).copied().unwrap_or(false) {
            Some(Role::Authorized)
        } else {
            None
        }
    }

    pub fn is_owner(&self, principal: &Principal) -> bool {
        *principal == self.owner
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.role_of(principal).is_some()
    }

    pub fn require_owner(&self, principal: &Principal) -> Result<(), LedgerError> {
        match self.role_of(principal) {
            Some(Role::Owner) => Ok(()),
            _ => Err(LedgerError::Unauthorized(*principal)),
        }
    }

    pub fn require_authorized(&self, principal: &Principal) -> Result<(), LedgerError> {
        self.role_of(principal)
            .map(|_| ())
            .ok_or(LedgerError::Unauthorized(*principal))
    }

    /// Grant or revoke `target`. Repeating a call re-reports the same change.
    pub fn set_authorization(
        &mut self,
        caller: &Principal,
        target: &Principal,
        grant: bool,
    ) -> Result<AuthorizationChange, LedgerError> {
        self.require_owner(caller)?;
        if target.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if self.is_owner(target) && !grant {
            return Err(LedgerError::SelfRevocation);
        }
        self.authorized.insert(*target, grant);
        Ok(if grant {
            AuthorizationChange::Granted
        } else {
            AuthorizationChange::Revoked
        })
    }

    /// Hand ownership to `new_owner` and return the previous owner.
    ///
    /// The previous owner keeps whatever authorization entry it had; only an
    /// explicit revocation removes it.
    pub fn transfer_ownership(
        &mut self,
        caller: &Principal,
        new_owner: &Principal,
    ) -> Result<Principal, LedgerError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if self.is_owner(new_owner) {
            return Err(LedgerError::SelfTransfer(*new_owner));
        }
        let previous = std::mem::replace(&mut self.owner, *new_owner);
        self.authorized.insert(*new_owner, true);
        Ok(previous)
    }

    /// Principals with an explicit `true` entry, in key order.
    pub fn authorized(&self) -> impl Iterator<Item = &Principal> + '_ {
        self.authorized
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(principal, _)| principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(label: &str) -> Principal {
        Principal::from_label(label)
    }

    #[test]
    fn owner_is_authorized_from_construction() {
        let access = AccessController::new(p("owner")).unwrap();
        assert!(access.is_owner(&p("owner")));
        assert!(access.is_authorized(&p("owner")));
        assert_eq!(access.role_of(&p("owner")), Some(Role::Owner));
        assert_eq!(access.role_of(&p("stranger")), None);
        assert_eq!(access.authorized().collect::<Vec<_>>(), vec![&p("owner")]);
    }

    #[test]
    fn zero_owner_is_rejected() {
        assert_eq!(
            AccessController::new(Principal::ZERO).unwrap_err(),
            LedgerError::ZeroAddress
        );
    }

    #[test]
    fn only_owner_may_change_authorization() {
        let mut access = AccessController::new(p("owner")).unwrap();
        let change = access
            .set_authorization(&p("owner"), &p("alice"), true)
            .unwrap();
        assert_eq!(change, AuthorizationChange::Granted);
        assert_eq!(access.role_of(&p("alice")), Some(Role::Authorized));
        access.require_authorized(&p("alice")).unwrap();

        let err = access
            .set_authorization(&p("alice"), &p("bob"), true)
            .unwrap_err();
        assert_eq!(err, LedgerError::Unauthorized(p("alice")));
        assert!(!access.is_authorized(&p("bob")));
        assert_eq!(
            access.require_owner(&p("alice")).unwrap_err(),
            LedgerError::Unauthorized(p("alice"))
        );
    }

    #[test]
    fn granting_twice_is_idempotent() {
        let mut access = AccessController::new(p("owner")).unwrap();
        for _ in 0..2 {
            let change = access
                .set_authorization(&p("owner"), &p("alice"), true)
                .unwrap();
            assert_eq!(change, AuthorizationChange::Granted);
        }
        assert!(access.is_authorized(&p("alice")));
        assert_eq!(access.authorized().count(), 2);
    }

    #[test]
    fn revocation_and_validation() {
        let mut access = AccessController::new(p("owner")).unwrap();
        access
            .set_authorization(&p("owner"), &p("alice"), true)
            .unwrap();
        let change = access
            .set_authorization(&p("owner"), &p("alice"), false)
            .unwrap();
        assert_eq!(change, AuthorizationChange::Revoked);
        assert!(!access.is_authorized(&p("alice")));

        assert_eq!(
            access
                .set_authorization(&p("owner"), &Principal::ZERO, true)
                .unwrap_err(),
            LedgerError::ZeroAddress
        );
        assert_eq!(
            access
                .set_authorization(&p("owner"), &p("owner"), false)
                .unwrap_err(),
            LedgerError::SelfRevocation
        );
        assert!(access.is_authorized(&p("owner")));
    }

    #[test]
    fn ownership_transfer_keeps_former_owner_entry() {
        let mut access = AccessController::new(p("owner")).unwrap();
        let previous = access
            .transfer_ownership(&p("owner"), &p("next"))
            .unwrap();
        assert_eq!(previous, p("owner"));
        assert!(access.is_owner(&p("next")));
        assert!(access.is_authorized(&p("next")));
        assert!(!access.is_owner(&p("owner")));
        // Former owner still carries its explicit entry.
        assert_eq!(access.role_of(&p("owner")), Some(Role::Authorized));

        access
            .set_authorization(&p("next"), &p("owner"), false)
            .unwrap();
        assert!(!access.is_authorized(&p("owner")));
    }

    #[test]
    fn ownership_transfer_validation() {
        let mut access = AccessController::new(p("owner")).unwrap();
        assert_eq!(
            access
                .transfer_ownership(&p("owner"), &Principal::ZERO)
                .unwrap_err(),
            LedgerError::ZeroAddress
        );
        assert_eq!(
            access
                .transfer_ownership(&p("owner"), &p("owner"))
                .unwrap_err(),
            LedgerError::SelfTransfer(p("owner"))
        );
        assert_eq!(
            access
                .transfer_ownership(&p("alice"), &p("alice"))
                .unwrap_err(),
            LedgerError::Unauthorized(p("alice"))
        );
        assert!(access.is_owner(&p("owner")));
    }
}
