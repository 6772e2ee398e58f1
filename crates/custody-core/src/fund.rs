use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::approval::ApprovalEngine;
use crate::config::FundConfig;
use crate::error::CustodyError;
use crate::events::{EventJournal, FundEvent, FundEventRecord};
use crate::gateway::FundGateway;
use crate::invariants::{InvariantEnforcer, InvariantViolation};
use crate::payout::{PayoutConnector, PayoutInstruction, PayoutReceipt};
use crate::registry::BenefactorRegistry;
use crate::store::AllowanceStore;
use crate::types::{AllowanceId, AllowanceSnapshot, Amount, Principal};
use crate::withdrawal::WithdrawalGuard;

/// Shared-custody allowance fund.
///
/// Each public operation is one atomic unit: it either commits every state
/// change plus its notifications, or returns an error and leaves the fund
/// exactly as it was. Mutating operations take `&mut self`, which serializes
/// them; share a fund across threads behind a lock.
pub struct AllowanceFund {
    registry: BenefactorRegistry,
    store: AllowanceStore,
    gateway: FundGateway,
    journal: EventJournal,
    invariants: InvariantEnforcer,
}

/// Aggregate view of the fund.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSummary {
    pub benefactors: Vec<Principal>,
    pub maximum_allowance: Amount,
    pub balance: Amount,
    pub allowances_created: usize,
    pub active_allowances: Vec<AllowanceId>,
    pub events_committed: usize,
}

impl AllowanceFund {
    pub fn new(benefactors: Vec<Principal>, maximum_allowance: Amount) -> Result<Self, CustodyError> {
        Ok(Self {
            registry: BenefactorRegistry::new(benefactors, maximum_allowance)?,
            store: AllowanceStore::new(),
            gateway: FundGateway::new(),
            journal: EventJournal::new(),
            invariants: InvariantEnforcer::standard(),
        })
    }

    /// Construct from configuration and apply its opening deposits.
    pub fn from_config(config: &FundConfig) -> Result<Self, CustodyError> {
        let mut fund = Self::new(config.benefactors.clone(), config.maximum_allowance)?;
        for deposit in &config.opening_deposits {
            fund.deposit(&deposit.depositor, deposit.amount)?;
        }
        Ok(fund)
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Accept a deposit from a benefactor. Returns the new balance.
    pub fn deposit(&mut self, caller: &Principal, amount: Amount) -> Result<Amount, CustodyError> {
        let (balance, event) = self.gateway.deposit(&self.registry, caller, amount)?;
        self.journal.publish(vec![event]);
        Ok(balance)
    }

    /// Create an allowance; the caller becomes its first approver.
    pub fn create_allowance(
        &mut self,
        caller: &Principal,
        amount: Amount,
        beneficiary: Principal,
        required_approvals: usize,
    ) -> Result<AllowanceId, CustodyError> {
        self.registry.require_benefactor(caller)?;
        let id = self.store.create(
            &self.registry,
            amount,
            beneficiary.clone(),
            required_approvals,
            caller.clone(),
        )?;

        let mut staged = vec![FundEvent::AllowanceCreated {
            id,
            beneficiary: beneficiary.clone(),
            amount,
            required_approvals,
            creator: caller.clone(),
        }];
        // A threshold of zero or one is already met by the creator's approval
        if self.store.get(id).is_some_and(|a| a.is_unlocked()) {
            staged.push(FundEvent::AllowanceUnlocked { id, beneficiary });
        }
        self.journal.publish(staged);

        info!(allowance_id = %id, creator = %caller, amount, required_approvals, "Allowance created");
        Ok(id)
    }

    /// Record a benefactor's approval of an allowance.
    pub fn approve_allowance(
        &mut self,
        caller: &Principal,
        id: AllowanceId,
    ) -> Result<(), CustodyError> {
        let staged = ApprovalEngine::approve(&mut self.store, &self.registry, id, caller)?;
        self.journal.publish(staged);
        Ok(())
    }

    /// Withdraw from an unlocked allowance to its beneficiary.
    ///
    /// Internal state (spent, active set, fund balance) is finalized before
    /// the connector is called. A failed transfer restores the allowance and
    /// the balance, drops the staged notifications, and reports `PayoutFailed`.
    pub fn withdraw_allowed(
        &mut self,
        caller: &Principal,
        id: AllowanceId,
        amount: Amount,
        connector: &dyn PayoutConnector,
    ) -> Result<PayoutReceipt, CustodyError> {
        WithdrawalGuard::authorize(&self.store, id, amount, caller)?;
        self.gateway.ensure_available(amount)?;

        let checkpoint = self
            .store
            .checkpoint(id)
            .ok_or(CustodyError::NotActive(id))?;

        let staged = match WithdrawalGuard::apply(&mut self.store, id, amount) {
            Ok(events) => events,
            Err(err) => {
                self.store.restore(checkpoint);
                return Err(err);
            }
        };
        if let Err(err) = self.gateway.debit(amount) {
            self.store.restore(checkpoint);
            return Err(err);
        }

        let instruction = PayoutInstruction {
            allowance_id: id,
            recipient: caller.clone(),
            amount,
            remaining: self.store.get(id).map(|a| a.remaining()).unwrap_or_default(),
        };

        match connector.transfer(&instruction) {
            Ok(receipt) => {
                self.journal.publish(staged);
                info!(
                    allowance_id = %id,
                    beneficiary = %caller,
                    amount,
                    rail = connector.rail(),
                    payout_id = %receipt.payout_id,
                    "Withdrawal paid out"
                );
                Ok(receipt)
            }
            Err(err) => {
                self.store.restore(checkpoint);
                self.gateway.credit(amount);
                warn!(allowance_id = %id, error = %err, "Payout failed, withdrawal rolled back");
                Err(CustodyError::PayoutFailed {
                    id,
                    reason: err.to_string(),
                })
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn benefactors(&self) -> &[Principal] {
        self.registry.list()
    }

    pub fn is_benefactor(&self, principal: &Principal) -> bool {
        self.registry.is_benefactor(principal)
    }

    pub fn maximum_allowance(&self) -> Amount {
        self.registry.maximum_allowance()
    }

    /// Number of active (not yet exhausted) allowances.
    pub fn allowances_count(&self) -> usize {
        self.store.active_count()
    }

    /// Allowance snapshot, active or archived; `None` if never created.
    pub fn get_allowance(&self, id: AllowanceId) -> Option<AllowanceSnapshot> {
        self.store.snapshot(id)
    }

    pub fn is_allowance_active(&self, id: AllowanceId) -> bool {
        self.store.is_active(id)
    }

    /// Active allowance ids in creation order.
    pub fn active_allowances(&self) -> Vec<AllowanceId> {
        self.store.active_ids().to_vec()
    }

    pub fn balance(&self) -> Amount {
        self.gateway.balance()
    }

    /// Committed notifications, oldest first.
    pub fn events(&self) -> &[FundEventRecord] {
        self.journal.records()
    }

    pub fn events_for(&self, id: AllowanceId) -> Vec<&FundEvent> {
        self.journal.for_allowance(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FundEventRecord> {
        self.journal.subscribe()
    }

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        self.invariants.check_all(&self.registry, &self.store)
    }

    pub fn summary(&self) -> FundSummary {
        FundSummary {
            benefactors: self.registry.list().to_vec(),
            maximum_allowance: self.registry.maximum_allowance(),
            balance: self.gateway.balance(),
            allowances_created: self.store.created_count(),
            active_allowances: self.active_allowances(),
            events_committed: self.journal.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::{InMemoryPayout, PayoutError};

    struct FailingRail;

    impl PayoutConnector for FailingRail {
        fn rail(&self) -> &'static str {
            "failing"
        }

        fn transfer(&self, _: &PayoutInstruction) -> Result<PayoutReceipt, PayoutError> {
            Err(PayoutError::Unavailable("rail offline".into()))
        }
    }

    fn p(id: &str) -> Principal {
        Principal::new(id)
    }

    fn funded() -> AllowanceFund {
        let mut fund = AllowanceFund::new(vec![p("a"), p("b"), p("c")], 10).unwrap();
        fund.deposit(&p("a"), 100).unwrap();
        fund
    }

    #[test]
    fn from_config_applies_opening_deposits() {
        let config = FundConfig::new(vec![p("a"), p("b")], 10)
            .with_deposit("a", 30)
            .with_deposit("b", 12);
        let fund = AllowanceFund::from_config(&config).unwrap();
        assert_eq!(fund.balance(), 42);
        assert_eq!(fund.events().len(), 2);
    }

    #[test]
    fn from_config_rejects_outsider_deposit() {
        let config = FundConfig::new(vec![p("a")], 10).with_deposit("z", 5);
        assert!(matches!(
            AllowanceFund::from_config(&config),
            Err(CustodyError::NotBenefactor(_))
        ));
    }

    #[test]
    fn threshold_of_one_unlocks_at_creation() {
        let mut fund = funded();
        let id = fund.create_allowance(&p("a"), 5, p("x"), 1).unwrap();
        let names: Vec<&str> = fund.events_for(id).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["allowance_created", "allowance_unlocked"]);
    }

    #[test]
    fn withdrawal_needs_fund_balance() {
        let mut fund = AllowanceFund::new(vec![p("a")], 10).unwrap();
        fund.deposit(&p("a"), 2).unwrap();
        let id = fund.create_allowance(&p("a"), 5, p("x"), 1).unwrap();

        let err = fund
            .withdraw_allowed(&p("x"), id, 3, &InMemoryPayout::new())
            .unwrap_err();
        assert_eq!(
            err,
            CustodyError::InsufficientFunds {
                balance: 2,
                requested: 3
            }
        );
        assert_eq!(fund.get_allowance(id).unwrap().spent, 0);
    }

    #[test]
    fn failed_payout_rolls_back_everything() {
        let mut fund = funded();
        let id = fund.create_allowance(&p("a"), 5, p("x"), 1).unwrap();
        let before = fund.get_allowance(id).unwrap();
        let events_before = fund.events().len();

        let err = fund.withdraw_allowed(&p("x"), id, 5, &FailingRail).unwrap_err();
        assert!(matches!(err, CustodyError::PayoutFailed { .. }));

        assert_eq!(fund.get_allowance(id).unwrap(), before);
        assert!(fund.is_allowance_active(id));
        assert_eq!(fund.balance(), 100);
        assert_eq!(fund.events().len(), events_before);
        assert!(fund.check_invariants().is_empty());
    }

    #[test]
    fn successful_withdrawal_debits_balance() {
        let mut fund = funded();
        let rail = InMemoryPayout::new();
        let id = fund.create_allowance(&p("a"), 5, p("x"), 1).unwrap();

        let receipt = fund.withdraw_allowed(&p("x"), id, 4, &rail).unwrap();
        assert_eq!(receipt.instruction.remaining, 1);
        assert_eq!(fund.balance(), 96);
        assert_eq!(rail.paid_to(&p("x")), 4);
    }

    #[test]
    fn summary_reflects_state() {
        let mut fund = funded();
        fund.create_allowance(&p("a"), 5, p("x"), 2).unwrap();
        let summary = fund.summary();
        assert_eq!(summary.allowances_created, 1);
        assert_eq!(summary.active_allowances, vec![AllowanceId(1)]);
        assert_eq!(summary.balance, 100);
        assert_eq!(summary.events_committed, 2);
    }
}
