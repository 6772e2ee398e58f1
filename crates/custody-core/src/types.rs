use serde::{Deserialize, Serialize};

/// Value in minor units (cents, satoshis, wei...).
pub type Amount = u64;

/// Principal identity: an opaque string naming a benefactor or beneficiary.
///
/// The empty (or all-whitespace) string is the null principal; it can be
/// represented so that callers get a validation error instead of a parse
/// failure, but it is never accepted as a benefactor or beneficiary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The null principal.
    pub fn null() -> Self {
        Self(String::new())
    }

    pub fn is_null(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Allowance identifier. Assigned from 1 upward and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowanceId(pub u64);

impl AllowanceId {
    pub const FIRST: AllowanceId = AllowanceId(1);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for AllowanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "allowance#{}", self.0)
    }
}

/// A capped, threshold-gated spending grant to a single beneficiary.
///
/// `total`, `beneficiary` and `required_approvals` are fixed at creation.
/// `spent` only grows and never exceeds `total`. `approvers` is append-only,
/// duplicate-free, and always starts with the creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub id: AllowanceId,
    /// Cap on cumulative withdrawal
    pub total: Amount,
    /// Cumulative amount withdrawn so far
    pub spent: Amount,
    pub beneficiary: Principal,
    /// Quorum threshold
    pub required_approvals: usize,
    /// Benefactors who voted, in approval order
    pub approvers: Vec<Principal>,
}

impl Allowance {
    pub fn remaining(&self) -> Amount {
        self.total - self.spent
    }

    /// Threshold satisfaction, recomputed from the approver list on every call.
    pub fn is_unlocked(&self) -> bool {
        self.approvers.len() >= self.required_approvals
    }

    pub fn is_exhausted(&self) -> bool {
        self.spent == self.total
    }

    pub fn has_approved(&self, principal: &Principal) -> bool {
        self.approvers.iter().any(|a| a == principal)
    }

    pub fn snapshot(&self, active: bool) -> AllowanceSnapshot {
        AllowanceSnapshot {
            id: self.id,
            total: self.total,
            spent: self.spent,
            remaining: self.remaining(),
            beneficiary: self.beneficiary.clone(),
            required_approvals: self.required_approvals,
            approvers: self.approvers.clone(),
            unlocked: self.is_unlocked(),
            active,
        }
    }
}

/// Read-only view of an allowance returned to callers and observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceSnapshot {
    pub id: AllowanceId,
    pub total: Amount,
    pub spent: Amount,
    pub remaining: Amount,
    pub beneficiary: Principal,
    pub required_approvals: usize,
    pub approvers: Vec<Principal>,
    /// Derived: `approvers.len() >= required_approvals`
    pub unlocked: bool,
    /// Derived: `spent < total`
    pub active: bool,
}
