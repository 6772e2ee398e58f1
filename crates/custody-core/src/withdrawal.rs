use tracing::{info, warn};

use crate::error::CustodyError;
use crate::events::FundEvent;
use crate::store::AllowanceStore;
use crate::types::{AllowanceId, Amount, Principal};

/// Authorizes and applies consumption of an allowance.
///
/// `authorize` is read-only; `apply` assumes a successful `authorize` in the
/// same operation and performs all state changes of the spend.
pub struct WithdrawalGuard;

impl WithdrawalGuard {
    /// Check every withdrawal precondition, in order:
    /// active, threshold met, beneficiary caller, enough remaining, non-zero.
    pub fn authorize(
        store: &AllowanceStore,
        id: AllowanceId,
        amount: Amount,
        caller: &Principal,
    ) -> Result<(), CustodyError> {
        let result = Self::check(store, id, amount, caller);
        if let Err(ref err) = result {
            warn!(allowance_id = %id, caller = %caller, amount, error = %err, "Withdrawal rejected");
        }
        result
    }

    fn check(
        store: &AllowanceStore,
        id: AllowanceId,
        amount: Amount,
        caller: &Principal,
    ) -> Result<(), CustodyError> {
        if !store.is_active(id) {
            return Err(CustodyError::NotActive(id));
        }
        let allowance = store.get(id).ok_or(CustodyError::NotActive(id))?;

        if !allowance.is_unlocked() {
            return Err(CustodyError::ThresholdNotMet {
                id,
                approvals: allowance.approvers.len(),
                required: allowance.required_approvals,
            });
        }

        if *caller != allowance.beneficiary {
            return Err(CustodyError::NotBeneficiary {
                id,
                caller: caller.clone(),
            });
        }

        let remaining = allowance.remaining();
        if remaining < amount {
            return Err(CustodyError::InsufficientRemaining {
                id,
                remaining,
                requested: amount,
            });
        }

        if amount == 0 {
            return Err(CustodyError::ZeroAmount);
        }

        Ok(())
    }

    /// Consume `amount` and return the notifications of the spend.
    ///
    /// Reaching `spent == total` archives the allowance: it leaves the active
    /// set exactly once.
    pub fn apply(
        store: &mut AllowanceStore,
        id: AllowanceId,
        amount: Amount,
    ) -> Result<Vec<FundEvent>, CustodyError> {
        let allowance = store.get_mut(id).ok_or(CustodyError::NotActive(id))?;
        let remaining = allowance.remaining();
        if remaining < amount {
            return Err(CustodyError::InsufficientRemaining {
                id,
                remaining,
                requested: amount,
            });
        }

        allowance.spent += amount;
        let beneficiary = allowance.beneficiary.clone();
        let remaining = allowance.remaining();
        let exhausted = allowance.is_exhausted();

        let mut events = vec![FundEvent::AllowanceConsumed {
            id,
            beneficiary: beneficiary.clone(),
            amount,
            remaining,
        }];

        info!(allowance_id = %id, amount, remaining, "Allowance consumed");

        if exhausted && store.remove_from_active(id) {
            info!(allowance_id = %id, "Allowance exhausted and archived");
            events.push(FundEvent::AllowanceExhausted { id, beneficiary });
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalEngine;
    use crate::registry::BenefactorRegistry;

    fn p(id: &str) -> Principal {
        Principal::new(id)
    }

    fn setup(required: usize) -> (AllowanceStore, BenefactorRegistry, AllowanceId) {
        let registry =
            BenefactorRegistry::new(vec![p("a"), p("b"), p("c"), p("d")], 10).unwrap();
        let mut store = AllowanceStore::new();
        let id = store.create(&registry, 5, p("x"), required, p("a")).unwrap();
        (store, registry, id)
    }

    #[test]
    fn threshold_checked_before_caller() {
        let (store, _, id) = setup(2);
        // Even a non-beneficiary sees the threshold error first
        assert!(matches!(
            WithdrawalGuard::authorize(&store, id, 1, &p("b")),
            Err(CustodyError::ThresholdNotMet {
                approvals: 1,
                required: 2,
                ..
            })
        ));
    }

    #[test]
    fn only_beneficiary_may_withdraw() {
        let (mut store, registry, id) = setup(2);
        ApprovalEngine::approve(&mut store, &registry, id, &p("b")).unwrap();
        let err = WithdrawalGuard::authorize(&store, id, 1, &p("a")).unwrap_err();
        assert!(err.is_authorization());
        assert!(WithdrawalGuard::authorize(&store, id, 1, &p("x")).is_ok());
    }

    #[test]
    fn overdraw_rejected() {
        let (mut store, registry, id) = setup(2);
        ApprovalEngine::approve(&mut store, &registry, id, &p("b")).unwrap();
        assert!(matches!(
            WithdrawalGuard::authorize(&store, id, 6, &p("x")),
            Err(CustodyError::InsufficientRemaining {
                remaining: 5,
                requested: 6,
                ..
            })
        ));
    }

    #[test]
    fn zero_withdrawal_rejected() {
        let (store, _, id) = setup(1);
        assert_eq!(
            WithdrawalGuard::authorize(&store, id, 0, &p("x")),
            Err(CustodyError::ZeroAmount)
        );
    }

    #[test]
    fn partial_then_full_spend_archives_once() {
        let (mut store, _, id) = setup(1);

        let events = WithdrawalGuard::apply(&mut store, id, 3).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            FundEvent::AllowanceConsumed {
                amount: 3,
                remaining: 2,
                ..
            }
        ));
        assert!(store.is_active(id));

        let events = WithdrawalGuard::apply(&mut store, id, 2).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], FundEvent::AllowanceExhausted { .. }));
        assert!(!store.is_active(id));
        assert_eq!(store.get(id).unwrap().spent, 5);

        assert_eq!(
            WithdrawalGuard::authorize(&store, id, 1, &p("x")),
            Err(CustodyError::NotActive(id))
        );
    }

    #[test]
    fn unknown_id_is_not_active() {
        let (store, _, _) = setup(1);
        assert_eq!(
            WithdrawalGuard::authorize(&store, AllowanceId(9), 1, &p("x")),
            Err(CustodyError::NotActive(AllowanceId(9)))
        );
    }
}
