use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AllowanceId, Amount, Principal};

/// Outbound value transfer requested by a committed withdrawal.
///
/// The connector only ever sees this instruction; it holds no handle to the
/// fund and so cannot re-enter the allowance being paid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub allowance_id: AllowanceId,
    pub recipient: Principal,
    pub amount: Amount,
    /// Allowance balance left after this payout
    pub remaining: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub payout_id: String,
    pub rail: String,
    pub instruction: PayoutInstruction,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayoutError {
    #[error("rail rejected transfer: {0}")]
    Rejected(String),

    #[error("rail unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable value-transfer rail, invoked as the last step of a withdrawal.
pub trait PayoutConnector: Send + Sync {
    fn rail(&self) -> &'static str;

    fn transfer(&self, instruction: &PayoutInstruction) -> Result<PayoutReceipt, PayoutError>;
}

/// Connector that settles in memory and keeps every receipt.
#[derive(Debug, Default)]
pub struct InMemoryPayout {
    receipts: Mutex<Vec<PayoutReceipt>>,
}

impl InMemoryPayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipts(&self) -> Vec<PayoutReceipt> {
        self.receipts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Total paid to `recipient` across all receipts.
    pub fn paid_to(&self, recipient: &Principal) -> Amount {
        self.receipts()
            .iter()
            .filter(|r| &r.instruction.recipient == recipient)
            .map(|r| r.instruction.amount)
            .sum()
    }
}

impl PayoutConnector for InMemoryPayout {
    fn rail(&self) -> &'static str {
        "in-memory"
    }

    fn transfer(&self, instruction: &PayoutInstruction) -> Result<PayoutReceipt, PayoutError> {
        let receipt = PayoutReceipt {
            payout_id: uuid::Uuid::new_v4().to_string(),
            rail: self.rail().to_string(),
            instruction: instruction.clone(),
            settled_at: Utc::now(),
        };
        self.receipts
            .lock()
            .map_err(|_| PayoutError::Unavailable("receipt log poisoned".into()))?
            .push(receipt.clone());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(amount: Amount) -> PayoutInstruction {
        PayoutInstruction {
            allowance_id: AllowanceId(1),
            recipient: Principal::new("x"),
            amount,
            remaining: 0,
        }
    }

    #[test]
    fn in_memory_rail_records_receipts() {
        let rail = InMemoryPayout::new();
        let first = rail.transfer(&instruction(3)).unwrap();
        rail.transfer(&instruction(2)).unwrap();

        assert_eq!(first.rail, "in-memory");
        assert_eq!(rail.receipts().len(), 2);
        assert_eq!(rail.paid_to(&Principal::new("x")), 5);
        assert_eq!(rail.paid_to(&Principal::new("y")), 0);
    }

    #[test]
    fn receipt_ids_are_unique() {
        let rail = InMemoryPayout::new();
        let a = rail.transfer(&instruction(1)).unwrap();
        let b = rail.transfer(&instruction(1)).unwrap();
        assert_ne!(a.payout_id, b.payout_id);
    }
}
