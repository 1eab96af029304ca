//! Core of the custody ledger.
//!
//! The crate is split along the two responsibilities the ledger has to get
//! right:
//!
//! * [`access`] holds the owner role and the authorized set that gate every
//!   privileged operation.
//! * [`ledger`] keeps per-principal balances and the aggregate total, mutated only
//!   inside the [`guard`] and following effects-before-interactions for
//!   outgoing transfers.
//!
//! Everything the ledger needs from the outside world (moving value, the
//! logical clock, the custodied total) comes through the [`host::Host`] trait.
//! Inbound requests in wire form are resolved by [`dispatch`].

pub mod access;
pub mod dispatch;
pub mod event;
pub mod guard;
pub mod host;
pub mod ledger;
pub mod principal;

mod error;

pub use access::{AccessController, AuthorizationChange, Role};
pub use dispatch::{Call, Operation, Outcome, Params};
pub use error::{LedgerError, PrincipalParseError};
pub use event::LedgerEvent;
pub use guard::{GuardScope, GuardState, ReentrancyGuard};
pub use host::{Host, MemoryHost, Payout, TransferError};
pub use ledger::Ledger;
pub use principal::Principal;

/// Smallest indivisible unit of custodied value.
pub type Amount = u64;
