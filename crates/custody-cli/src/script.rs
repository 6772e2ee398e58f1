//! Operation scripts: a JSON list of fund operations replayed in order.

use std::fs;
use std::path::Path;

use custody_core::{
    AllowanceFund, AllowanceId, AllowanceSnapshot, Amount, CustodyError, ErrorKind,
    FundEventRecord, FundSummary, InMemoryPayout, InvariantViolation, PayoutConnector,
    PayoutReceipt, Principal,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

/// One scripted fund operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Deposit {
        caller: Principal,
        amount: Amount,
    },
    Create {
        caller: Principal,
        amount: Amount,
        beneficiary: Principal,
        required_approvals: usize,
    },
    Approve {
        caller: Principal,
        id: AllowanceId,
    },
    Withdraw {
        caller: Principal,
        id: AllowanceId,
        amount: Amount,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepResult {
    Deposited { balance: Amount },
    Created { id: AllowanceId },
    Approved,
    Withdrawn { payout_id: String, remaining: Amount },
    Rejected { kind: ErrorKind, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: usize,
    pub operation: Operation,
    pub result: StepResult,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub events: Vec<FundEventRecord>,
    pub allowances: Vec<AllowanceSnapshot>,
    pub payouts: Vec<PayoutReceipt>,
    pub summary: FundSummary,
    pub invariant_violations: Vec<InvariantViolation>,
}

impl ReplayReport {
    pub fn rejected(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.result, StepResult::Rejected { .. }))
            .count()
    }
}

pub fn parse_script(json: &str) -> CliResult<Vec<Operation>> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_script(path: &Path) -> CliResult<Vec<Operation>> {
    let json = fs::read_to_string(path).map_err(|source| CliError::ScriptIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&json)
}

fn apply(
    fund: &mut AllowanceFund,
    operation: &Operation,
    rail: &dyn PayoutConnector,
) -> Result<StepResult, CustodyError> {
    match operation {
        Operation::Deposit { caller, amount } => fund
            .deposit(caller, *amount)
            .map(|balance| StepResult::Deposited { balance }),
        Operation::Create {
            caller,
            amount,
            beneficiary,
            required_approvals,
        } => fund
            .create_allowance(caller, *amount, beneficiary.clone(), *required_approvals)
            .map(|id| StepResult::Created { id }),
        Operation::Approve { caller, id } => fund
            .approve_allowance(caller, *id)
            .map(|()| StepResult::Approved),
        Operation::Withdraw { caller, id, amount } => fund
            .withdraw_allowed(caller, *id, *amount, rail)
            .map(|receipt| StepResult::Withdrawn {
                payout_id: receipt.payout_id,
                remaining: receipt.instruction.remaining,
            }),
    }
}

/// Replay `operations` against `fund`, paying out through an in-memory rail.
///
/// Rejected steps are recorded and the replay continues, unless `fail_fast`
/// is set.
pub fn replay(
    fund: &mut AllowanceFund,
    operations: Vec<Operation>,
    fail_fast: bool,
) -> CliResult<ReplayReport> {
    let rail = InMemoryPayout::new();
    let mut steps = Vec::with_capacity(operations.len());

    for (index, operation) in operations.into_iter().enumerate() {
        let step = index + 1;
        let result = match apply(fund, &operation, &rail) {
            Ok(result) => {
                debug!(step, ?operation, "Step applied");
                result
            }
            Err(err) if fail_fast => {
                return Err(CliError::StepFailed { step, source: err });
            }
            Err(err) => {
                warn!(step, error = %err, "Step rejected");
                StepResult::Rejected {
                    kind: err.kind(),
                    error: err.to_string(),
                }
            }
        };
        steps.push(StepOutcome {
            step,
            operation,
            result,
        });
    }

    let summary = fund.summary();
    let allowances = (1..=summary.allowances_created as u64)
        .filter_map(|id| fund.get_allowance(AllowanceId(id)))
        .collect();

    Ok(ReplayReport {
        steps,
        events: fund.events().to_vec(),
        allowances,
        payouts: rail.receipts(),
        summary,
        invariant_violations: fund.check_invariants(),
    })
}
