use tracing::{info, warn};

use crate::error::CustodyError;
use crate::events::FundEvent;
use crate::registry::BenefactorRegistry;
use crate::store::AllowanceStore;
use crate::types::{Allowance, AllowanceId, Principal};

/// Multi-party threshold voting over allowances.
///
/// "Unlocked" is never stored. It is recomputed from the approver list, so the
/// withdrawal gate and the unlock notification cannot drift apart.
pub struct ApprovalEngine;

impl ApprovalEngine {
    /// Check that `caller` may approve `id` without touching anything.
    ///
    /// Archived (exhausted) allowances still accept approvals; only an id that
    /// was never created is refused.
    pub fn authorize(
        store: &AllowanceStore,
        registry: &BenefactorRegistry,
        id: AllowanceId,
        caller: &Principal,
    ) -> Result<(), CustodyError> {
        let allowance = store.get(id).ok_or(CustodyError::UnknownAllowance(id))?;
        registry.require_benefactor(caller)?;
        if allowance.has_approved(caller) {
            warn!(allowance_id = %id, approver = %caller, "Duplicate approval rejected");
            return Err(CustodyError::AlreadyApproved {
                id,
                approver: caller.clone(),
            });
        }
        Ok(())
    }

    /// Record `caller`'s approval and return the notifications it produces.
    pub fn approve(
        store: &mut AllowanceStore,
        registry: &BenefactorRegistry,
        id: AllowanceId,
        caller: &Principal,
    ) -> Result<Vec<FundEvent>, CustodyError> {
        Self::authorize(store, registry, id, caller)?;

        let allowance = store
            .get_mut(id)
            .ok_or(CustodyError::UnknownAllowance(id))?;
        allowance.approvers.push(caller.clone());

        let mut events = vec![FundEvent::AllowanceApproved {
            id,
            beneficiary: allowance.beneficiary.clone(),
            approver: caller.clone(),
        }];

        if Self::reached_threshold_now(allowance) {
            info!(allowance_id = %id, approvals = allowance.approvers.len(), "Allowance unlocked");
            events.push(FundEvent::AllowanceUnlocked {
                id,
                beneficiary: allowance.beneficiary.clone(),
            });
        }

        info!(
            allowance_id = %id,
            approver = %caller,
            approvals = allowance.approvers.len(),
            required = allowance.required_approvals,
            "Allowance approved"
        );
        Ok(events)
    }

    pub fn is_unlocked(allowance: &Allowance) -> bool {
        allowance.is_unlocked()
    }

    /// True exactly when the latest approval made the count equal the threshold.
    ///
    /// The approver list only grows by one per approval, so equality is hit at
    /// most once per allowance.
    fn reached_threshold_now(allowance: &Allowance) -> bool {
        allowance.approvers.len() == allowance.required_approvals
    }
}
