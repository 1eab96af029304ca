use thiserror::Error;

use crate::principal::Principal;
use crate::Amount;

/// Every way a ledger operation can fail.
///
/// All variants are terminal for the call that produced them. Nothing inside
/// the crate retries or swallows them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Caller does not hold the role the operation requires.
    #[error("principal {0} is not permitted to perform this operation")]
    Unauthorized(Principal),

    /// Withdrawal larger than the recorded balance.
    #[error("insufficient balance for {principal}: requested {requested}, available {available}")]
    InsufficientBalance {
        principal: Principal,
        requested: Amount,
        available: Amount,
    },

    /// Zero-amount deposit or withdrawal.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// The host could not move value out; the debit has been rolled back.
    #[error("transfer of {amount} to {to} failed: {reason}")]
    TransferFailed {
        to: Principal,
        amount: Amount,
        reason: String,
    },

    /// The guard is already held, either by an in-flight call or an emergency halt.
    #[error("reentrant call rejected")]
    ReentrancyDetected,

    /// The null principal was supplied where a concrete one is required.
    #[error("null principal supplied")]
    ZeroAddress,

    /// The owner tried to revoke its own authorization.
    #[error("owner cannot revoke its own authorization")]
    SelfRevocation,

    /// Ownership transfer to the current owner.
    #[error("principal {0} already owns the ledger")]
    SelfTransfer(Principal),

    /// Balance or total would leave the representable range.
    #[error("arithmetic overflow")]
    Overflow,

    #[error("unsupported operation `{0}`")]
    UnsupportedOperation(String),

    #[error("missing parameter `{0}`")]
    MissingParameter(&'static str),
}

/// Failure to read a [`Principal`] from its hex form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrincipalParseError {
    #[error("invalid principal hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("principal must be 32 bytes, got {0}")]
    Length(usize),
}
