use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::{Context, Result};
use custody_core::{
    Amount, Call, Ledger, LedgerError, LedgerEvent, MemoryHost, Operation, Outcome, Payout,
    Principal,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CustodyConfig;

/// Result line printed for every replayed call.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CallRecord {
    pub line: usize,
    pub method: String,
    #[serde(flatten)]
    pub result: CallResult,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResult {
    Ok { outcome: Outcome },
    Error { error: String },
}

/// End-of-run state, printed after the last call.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub owner: Principal,
    pub authorized: Vec<Principal>,
    pub balances: BTreeMap<Principal, Amount>,
    pub total_funds: Amount,
    pub contract_balance: Amount,
    pub events: usize,
    pub payouts: Vec<Payout>,
    pub consistent: bool,
}

/// A ledger hosted on [`MemoryHost`] plus the events it has produced.
pub struct Session {
    ledger: Ledger<MemoryHost>,
    journal: Vec<LedgerEvent>,
}

impl Session {
    pub fn new(config: &CustodyConfig) -> Result<Self> {
        let owner = config.resolve_owner()?;
        let host = MemoryHost::new(config.start_time);
        for recipient in &config.failing_recipients {
            host.reject_transfers_to(*recipient);
        }
        let ledger = Ledger::new(owner, host).context("create ledger")?;
        info!(%owner, "session started");
        Ok(Self {
            ledger,
            journal: Vec::new(),
        })
    }

    pub fn ledger(&self) -> &Ledger<MemoryHost> {
        &self.ledger
    }

    pub fn journal(&self) -> &[LedgerEvent] {
        &self.journal
    }

    /// Apply one call. For deposits the value is taken into custody first and
    /// handed back if the ledger refuses to record it. A latched guard turns
    /// the deposit away before any value moves.
    pub fn apply(&mut self, call: &Call) -> Result<Outcome, LedgerError> {
        let op = Operation::try_from(call)?;
        let outcome = match op {
            Operation::Deposit { amount, .. } => {
                if self.ledger.guard_state().is_latched() {
                    return Err(LedgerError::ReentrancyDetected);
                }
                let host = self.ledger.host();
                host.receive(amount).map_err(|_| LedgerError::Overflow)?;
                let result = self.ledger.execute(&op);
                if result.is_err() {
                    host.bounce(amount);
                }
                result?
            }
            _ => self.ledger.execute(&op)?,
        };
        if let Outcome::Event(event) = &outcome {
            self.journal.push(event.clone());
        }
        Ok(outcome)
    }

    pub fn record(&mut self, line: usize, call: &Call) -> CallRecord {
        let result = match self.apply(call) {
            Ok(outcome) => {
                info!(line, method = %call.method, "call applied");
                CallResult::Ok { outcome }
            }
            Err(err) => {
                warn!(line, method = %call.method, error = %err, "call failed");
                CallResult::Error {
                    error: err.to_string(),
                }
            }
        };
        CallRecord {
            line,
            method: call.method.clone(),
            result,
        }
    }

    pub fn summary(&self) -> Summary {
        let total_funds = self.ledger.total_funds();
        let contract_balance = self.ledger.contract_balance();
        let balances = self.ledger.balances();
        let sum: Option<Amount> = balances
            .values()
            .try_fold(0, |acc: Amount, v| acc.checked_add(*v));
        Summary {
            owner: self.ledger.owner(),
            authorized: self.ledger.authorized(),
            balances,
            total_funds,
            contract_balance,
            events: self.journal.len(),
            payouts: self.ledger.host().payouts(),
            consistent: total_funds == contract_balance && sum == Some(total_funds),
        }
    }
}

/// Read one JSON [`Call`] per line. Blank lines and `#` comments are skipped;
/// line numbers are 1-based.
pub fn read_script(reader: impl BufRead) -> Result<Vec<(usize, Call)>> {
    let mut calls = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read script line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let call: Call = serde_json::from_str(trimmed)
            .with_context(|| format!("parse script line {line_no}"))?;
        calls.push((line_no, call));
    }
    Ok(calls)
}
