use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::guard::GuardState;
use crate::host::Host;
use crate::ledger::Ledger;
use crate::principal::Principal;
use crate::Amount;

/// Arguments of an inbound call. Which ones are required depends on the method.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<bool>,
}

/// Inbound request in wire form, e.g.
/// `{"method":"withdraw","params":{"principal":"ab..","amount":40}}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Call {
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

impl Call {
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Resolved inbound operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Deposit { principal: Principal, amount: Amount },
    Withdraw { principal: Principal, amount: Amount },
    SetAuthorization { caller: Principal, target: Principal, grant: bool },
    TransferOwnership { caller: Principal, new_owner: Principal },
    EmergencyHalt { caller: Principal },
    EmergencyResume { caller: Principal },
    GetBalance { principal: Principal },
    IsAuthorized { principal: Principal },
    IsOwner { principal: Principal },
    Owner,
    TotalFunds,
    ContractBalance,
}

impl Operation {
    /// Whether the operation can change ledger state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::Deposit { .. }
                | Operation::Withdraw { .. }
                | Operation::SetAuthorization { .. }
                | Operation::TransferOwnership { .. }
                | Operation::EmergencyHalt { .. }
                | Operation::EmergencyResume { .. }
        )
    }
}

fn required<T>(value: Option<T>, name: &'static str) -> Result<T, LedgerError> {
    value.ok_or(LedgerError::MissingParameter(name))
}

impl TryFrom<&Call> for Operation {
    type Error = LedgerError;

    fn try_from(call: &Call) -> Result<Self, Self::Error> {
        let p = &call.params;
        let op = match call.method.as_str() {
            "deposit" => Operation::Deposit {
                principal: required(p.principal, "principal")?,
                amount: required(p.amount, "amount")?,
            },
            "withdraw" => Operation::Withdraw {
                principal: required(p.principal, "principal")?,
                amount: required(p.amount, "amount")?,
            },
            "setAuthorization" => Operation::SetAuthorization {
                caller: required(p.caller, "caller")?,
                target: required(p.target, "target")?,
                grant: required(p.grant, "grant")?,
            },
            "transferOwnership" => Operation::TransferOwnership {
                caller: required(p.caller, "caller")?,
                new_owner: required(p.new_owner, "newOwner")?,
            },
            "emergencyHalt" => Operation::EmergencyHalt {
                caller: required(p.caller, "caller")?,
            },
            "emergencyResume" => Operation::EmergencyResume {
                caller: required(p.caller, "caller")?,
            },
            "getBalance" => Operation::GetBalance {
                principal: required(p.principal, "principal")?,
            },
            "isAuthorized" => Operation::IsAuthorized {
                principal: required(p.principal, "principal")?,
            },
            "isOwner" => Operation::IsOwner {
                principal: required(p.principal, "principal")?,
            },
            "owner" => Operation::Owner,
            "totalFunds" => Operation::TotalFunds,
            "contractBalance" => Operation::ContractBalance,
            other => return Err(LedgerError::UnsupportedOperation(other.to_string())),
        };
        Ok(op)
    }
}

/// Result of a successfully executed operation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Event(LedgerEvent),
    Amount(Amount),
    Flag(bool),
    Principal(Principal),
    Guard(GuardState),
}

impl<H: Host> Ledger<H> {
    /// Run a resolved operation against this ledger.
    pub fn execute(&self, op: &Operation) -> Result<Outcome, LedgerError> {
        let outcome = match *op {
            Operation::Deposit { principal, amount } => {
                Outcome::Event(self.deposit(principal, amount)?)
            }
            Operation::Withdraw { principal, amount } => {
                Outcome::Event(self.withdraw(principal, amount)?)
            }
            Operation::SetAuthorization {
                caller,
                target,
                grant,
            } => Outcome::Event(self.set_authorization(caller, target, grant)?),
            Operation::TransferOwnership { caller, new_owner } => {
                Outcome::Event(self.transfer_ownership(caller, new_owner)?)
            }
            Operation::EmergencyHalt { caller } => Outcome::Guard(self.emergency_halt(caller)?),
            Operation::EmergencyResume { caller } => {
                Outcome::Guard(self.emergency_resume(caller)?)
            }
            Operation::GetBalance { principal } => Outcome::Amount(self.get_balance(&principal)),
            Operation::IsAuthorized { principal } => {
                Outcome::Flag(self.is_authorized(&principal))
            }
            Operation::IsOwner { principal } => Outcome::Flag(self.is_owner(&principal)),
            Operation::Owner => Outcome::Principal(self.owner()),
            Operation::TotalFunds => Outcome::Amount(self.total_funds()),
            Operation::ContractBalance => Outcome::Amount(self.contract_balance()),
        };
        Ok(outcome)
    }

    /// Resolve and run a wire-form call.
    pub fn call(&self, call: &Call) -> Result<Outcome, LedgerError> {
        let op = Operation::try_from(call)?;
        self.execute(&op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::host::MemoryHost;

    fn p(label: &str) -> Principal {
        Principal::from_label(label)
    }

    fn parse(json: &str) -> Call {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_wire_calls() {
        let alice = p("alice");
        let call = parse(&format!(
            r#"{{"method":"withdraw","params":{{"principal":"{alice}","amount":40}}}}"#
        ));
        assert_eq!(
            Operation::try_from(&call).unwrap(),
            Operation::Withdraw {
                principal: alice,
                amount: 40
            }
        );

        let call = parse(&format!(
            r#"{{"method":"transferOwnership","params":{{"caller":"{alice}","newOwner":"{alice}"}}}}"#
        ));
        assert!(matches!(
            Operation::try_from(&call).unwrap(),
            Operation::TransferOwnership { .. }
        ));

        let call = parse(r#"{"method":"totalFunds"}"#);
        assert_eq!(Operation::try_from(&call).unwrap(), Operation::TotalFunds);
    }

    #[test]
    fn unknown_methods_are_unsupported_and_mutate_nothing() {
        let ledger = Ledger::new(p("owner"), MemoryHost::default()).unwrap();
        ledger.deposit(p("owner"), 10).unwrap();
        let call = Call::new(
            "drain",
            Params {
                principal: Some(p("owner")),
                amount: Some(10),
                ..Params::default()
            },
        );
        assert_eq!(
            ledger.call(&call).unwrap_err(),
            LedgerError::UnsupportedOperation("drain".into())
        );
        assert_eq!(ledger.get_balance(&p("owner")), 10);
        assert_eq!(ledger.total_funds(), 10);
    }

    #[test]
    fn missing_parameters_are_reported_by_name() {
        let call = parse(r#"{"method":"deposit","params":{"amount":5}}"#);
        assert_eq!(
            Operation::try_from(&call).unwrap_err(),
            LedgerError::MissingParameter("principal")
        );
        let call = Call::new(
            "setAuthorization",
            Params {
                caller: Some(p("owner")),
                target: Some(p("alice")),
                ..Params::default()
            },
        );
        assert_eq!(
            Operation::try_from(&call).unwrap_err(),
            LedgerError::MissingParameter("grant")
        );
    }

    #[test]
    fn executes_reads_and_writes() {
        let ledger = Ledger::new(p("owner"), MemoryHost::default()).unwrap();
        ledger.host().receive(25).unwrap();
        let outcome = ledger
            .execute(&Operation::Deposit {
                principal: p("alice"),
                amount: 25,
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Event(LedgerEvent::Deposited { amount: 25, .. })));
        assert!(Operation::Deposit {
            principal: p("alice"),
            amount: 25
        }
        .is_mutation());

        assert_eq!(
            ledger
                .execute(&Operation::GetBalance {
                    principal: p("alice")
                })
                .unwrap(),
            Outcome::Amount(25)
        );
        assert_eq!(
            ledger.execute(&Operation::ContractBalance).unwrap(),
            Outcome::Amount(25)
        );
        assert_eq!(
            ledger.execute(&Operation::Owner).unwrap(),
            Outcome::Principal(p("owner"))
        );
        assert_eq!(
            ledger
                .execute(&Operation::IsAuthorized {
                    principal: p("alice")
                })
                .unwrap(),
            Outcome::Flag(false)
        );
        assert!(!Operation::TotalFunds.is_mutation());
        assert_eq!(
            ledger
                .execute(&Operation::EmergencyHalt { caller: p("owner") })
                .unwrap(),
            Outcome::Guard(GuardState::Halted)
        );
    }

    #[test]
    fn outcome_json_shape() {
        let value = serde_json::to_value(Outcome::Amount(60)).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "amount", "value": 60}));
    }
}
