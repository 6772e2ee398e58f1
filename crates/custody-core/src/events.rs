//! Fund notifications.
//!
//! Operations stage their notifications locally and hand them to the journal
//! only after every state change of the operation has been applied, so an
//! aborted operation never publishes anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{AllowanceId, Amount, Principal};

const SUBSCRIBER_CAPACITY: usize = 1024;

/// Observable notification emitted by a committed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FundEvent {
    AllowanceCreated {
        id: AllowanceId,
        beneficiary: Principal,
        amount: Amount,
        required_approvals: usize,
        creator: Principal,
    },
    AllowanceApproved {
        id: AllowanceId,
        beneficiary: Principal,
        approver: Principal,
    },
    /// Edge-triggered: fires once, when approvals first reach the threshold.
    AllowanceUnlocked {
        id: AllowanceId,
        beneficiary: Principal,
    },
    AllowanceConsumed {
        id: AllowanceId,
        beneficiary: Principal,
        amount: Amount,
        remaining: Amount,
    },
    AllowanceExhausted {
        id: AllowanceId,
        beneficiary: Principal,
    },
    FundsDeposited {
        depositor: Principal,
        amount: Amount,
        balance: Amount,
    },
}

impl FundEvent {
    /// The allowance this event concerns, if any.
    pub fn allowance_id(&self) -> Option<AllowanceId> {
        match self {
            Self::AllowanceCreated { id, .. }
            | Self::AllowanceApproved { id, .. }
            | Self::AllowanceUnlocked { id, .. }
            | Self::AllowanceConsumed { id, .. }
            | Self::AllowanceExhausted { id, .. } => Some(*id),
            Self::FundsDeposited { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllowanceCreated { .. } => "allowance_created",
            Self::AllowanceApproved { .. } => "allowance_approved",
            Self::AllowanceUnlocked { .. } => "allowance_unlocked",
            Self::AllowanceConsumed { .. } => "allowance_consumed",
            Self::AllowanceExhausted { .. } => "allowance_exhausted",
            Self::FundsDeposited { .. } => "funds_deposited",
        }
    }
}

/// A committed event with its journal position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundEventRecord {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: FundEvent,
}

/// Append-only journal of committed notifications with live fan-out.
pub struct EventJournal {
    records: Vec<FundEventRecord>,
    sender: broadcast::Sender<FundEventRecord>,
}

impl EventJournal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            records: Vec::new(),
            sender,
        }
    }

    /// Commit a batch of staged events in order.
    pub fn publish(&mut self, staged: Vec<FundEvent>) {
        let recorded_at = Utc::now();
        for event in staged {
            let record = FundEventRecord {
                sequence: self.records.len() as u64 + 1,
                recorded_at,
                event,
            };
            self.records.push(record.clone());
            // No receivers is fine
            let _ = self.sender.send(record);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FundEventRecord> {
        self.sender.subscribe()
    }

    pub fn records(&self) -> &[FundEventRecord] {
        &self.records
    }

    /// Committed events concerning one allowance, in order.
    pub fn for_allowance(&self, id: AllowanceId) -> Vec<&FundEvent> {
        self.records
            .iter()
            .map(|r| &r.event)
            .filter(|e| e.allowance_id() == Some(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked(id: u64) -> FundEvent {
        FundEvent::AllowanceUnlocked {
            id: AllowanceId(id),
            beneficiary: Principal::new("x"),
        }
    }

    #[test]
    fn publish_assigns_sequence_numbers() {
        let mut journal = EventJournal::new();
        journal.publish(vec![unlocked(1), unlocked(2)]);
        journal.publish(vec![unlocked(1)]);

        let seqs: Vec<u64> = journal.records().iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(journal.for_allowance(AllowanceId(1)).len(), 2);
    }

    #[test]
    fn empty_batch_publishes_nothing() {
        let mut journal = EventJournal::new();
        journal.publish(Vec::new());
        assert!(journal.is_empty());
    }

    #[test]
    fn record_serializes_flat_with_tag() {
        let record = FundEventRecord {
            sequence: 1,
            recorded_at: Utc::now(),
            event: FundEvent::AllowanceConsumed {
                id: AllowanceId(1),
                beneficiary: Principal::new("x"),
                amount: 3,
                remaining: 2,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "allowance_consumed");
        assert_eq!(json["remaining"], 2);
        let restored: FundEventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(restored, record);
    }

    #[tokio::test]
    async fn subscribers_receive_committed_events() {
        let mut journal = EventJournal::new();
        let mut rx = journal.subscribe();
        journal.publish(vec![unlocked(9)]);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.event.name(), "allowance_unlocked");
        assert_eq!(received.event.allowance_id(), Some(AllowanceId(9)));
    }
}
