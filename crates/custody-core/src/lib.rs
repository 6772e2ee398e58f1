//! # custody-core
//!
//! Shared-custody allowance fund: a fixed set of co-owners (benefactors)
//! jointly authorizes capped, threshold-gated spending grants (allowances) to
//! third-party recipients (beneficiaries).
//!
//! - **BenefactorRegistry**: fixed membership and the per-allowance cap
//! - **AllowanceStore**: records, id allocation, ordered active set
//! - **ApprovalEngine**: distinct-benefactor threshold voting
//! - **WithdrawalGuard**: withdrawal preconditions and spend application
//! - **FundGateway**: benefactor-only deposits, aggregate balance
//! - **AllowanceFund**: the public facade; one atomic unit per operation
//!
//! ## Invariants
//!
//! - `spent <= total` for every allowance.
//! - Approvers are distinct benefactors; the creator approves first.
//! - An allowance is active iff `spent < total`; it leaves the active set
//!   exactly once and its record stays queryable.
//! - "Unlocked" is derived from the approver count, never stored. The unlock
//!   notification fires once, when the count first reaches the threshold.
//! - A rejected operation changes nothing and publishes nothing.

#![deny(unsafe_code)]

pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod fund;
pub mod gateway;
pub mod invariants;
pub mod payout;
pub mod registry;
pub mod store;
pub mod types;
pub mod withdrawal;

pub use approval::ApprovalEngine;
pub use config::{FundConfig, OpeningDeposit};
pub use error::{CustodyError, ErrorKind};
pub use events::{EventJournal, FundEvent, FundEventRecord};
pub use fund::{AllowanceFund, FundSummary};
pub use gateway::FundGateway;
pub use invariants::{Invariant, InvariantEnforcer, InvariantViolation};
pub use payout::{InMemoryPayout, PayoutConnector, PayoutError, PayoutInstruction, PayoutReceipt};
pub use registry::BenefactorRegistry;
pub use store::{AllowanceStore, StoreCheckpoint};
pub use types::{Allowance, AllowanceId, AllowanceSnapshot, Amount, Principal};
pub use withdrawal::WithdrawalGuard;
