use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AllowanceId, Amount, Principal};

/// Errors raised by fund operations.
///
/// Every error is detected before the failing operation commits anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    // --- Authorization errors ---
    #[error("caller {0} is not a benefactor")]
    NotBenefactor(Principal),

    #[error("caller {caller} is not the beneficiary of {id}")]
    NotBeneficiary { id: AllowanceId, caller: Principal },

    // --- Validation errors ---
    #[error("benefactor list is empty")]
    NoBenefactors,

    #[error("benefactor list contains the null principal")]
    NullBenefactor,

    #[error("benefactor {0} is listed more than once")]
    DuplicateBenefactor(Principal),

    #[error("maximum allowance must be positive")]
    ZeroMaximumAllowance,

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("amount {amount} exceeds maximum allowance {maximum}")]
    AmountExceedsMaximum { amount: Amount, maximum: Amount },

    #[error("beneficiary must not be the null principal")]
    NullBeneficiary,

    // --- State errors ---
    #[error("{0} does not exist")]
    UnknownAllowance(AllowanceId),

    #[error("{0} is not active")]
    NotActive(AllowanceId),

    #[error("{approver} already approved {id}")]
    AlreadyApproved { id: AllowanceId, approver: Principal },

    #[error("{id} has {approvals} of {required} required approvals")]
    ThresholdNotMet {
        id: AllowanceId,
        approvals: usize,
        required: usize,
    },

    #[error("{id} has {remaining} remaining, requested {requested}")]
    InsufficientRemaining {
        id: AllowanceId,
        remaining: Amount,
        requested: Amount,
    },

    #[error("fund holds {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("deposit of {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: Amount, amount: Amount },

    #[error("payout for {id} failed: {reason}")]
    PayoutFailed { id: AllowanceId, reason: String },
}

/// Error taxonomy: who has to correct the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required role
    Authorization,
    /// Malformed construction or creation arguments
    Validation,
    /// Operation invalid for the current allowance or fund state
    State,
}

impl CustodyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotBenefactor(_) | Self::NotBeneficiary { .. } => ErrorKind::Authorization,
            Self::NoBenefactors
            | Self::NullBenefactor
            | Self::DuplicateBenefactor(_)
            | Self::ZeroMaximumAllowance
            | Self::ZeroAmount
            | Self::AmountExceedsMaximum { .. }
            | Self::NullBeneficiary => ErrorKind::Validation,
            Self::UnknownAllowance(_)
            | Self::NotActive(_)
            | Self::AlreadyApproved { .. }
            | Self::ThresholdNotMet { .. }
            | Self::InsufficientRemaining { .. }
            | Self::InsufficientFunds { .. }
            | Self::BalanceOverflow { .. }
            | Self::PayoutFailed { .. } => ErrorKind::State,
        }
    }

    pub fn is_authorization(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_state(&self) -> bool {
        self.kind() == ErrorKind::State
    }
}
