use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::registry::BenefactorRegistry;
use crate::store::AllowanceStore;
use crate::types::AllowanceId;

/// A detected breach of a data-model invariant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub invariant: String,
    pub allowance_id: Option<AllowanceId>,
    pub message: String,
}

/// One checkable rule over the registry and store.
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, registry: &BenefactorRegistry, store: &AllowanceStore)
        -> Vec<InvariantViolation>;
}

fn violation(
    invariant: &dyn Invariant,
    id: Option<AllowanceId>,
    message: String,
) -> InvariantViolation {
    InvariantViolation {
        invariant: invariant.name().to_string(),
        allowance_id: id,
        message,
    }
}

/// `spent <= total` for every allowance.
pub struct SpentWithinTotal;

impl Invariant for SpentWithinTotal {
    fn name(&self) -> &'static str {
        "spent-within-total"
    }

    fn check(&self, _: &BenefactorRegistry, store: &AllowanceStore) -> Vec<InvariantViolation> {
        store
            .iter()
            .filter(|a| a.spent > a.total)
            .map(|a| {
                violation(
                    self,
                    Some(a.id),
                    format!("spent {} exceeds total {}", a.spent, a.total),
                )
            })
            .collect()
    }
}

/// Approvers are distinct benefactors.
pub struct DistinctBenefactorApprovers;

impl Invariant for DistinctBenefactorApprovers {
    fn name(&self) -> &'static str {
        "distinct-benefactor-approvers"
    }

    fn check(
        &self,
        registry: &BenefactorRegistry,
        store: &AllowanceStore,
    ) -> Vec<InvariantViolation> {
        let mut found = Vec::new();
        for allowance in store.iter() {
            for (i, approver) in allowance.approvers.iter().enumerate() {
                if !registry.is_benefactor(approver) {
                    found.push(violation(
                        self,
                        Some(allowance.id),
                        format!("approver {} is not a benefactor", approver),
                    ));
                }
                if allowance.approvers[..i].contains(approver) {
                    found.push(violation(
                        self,
                        Some(allowance.id),
                        format!("approver {} appears twice", approver),
                    ));
                }
            }
        }
        found
    }
}

/// Active-set membership matches `spent < total`, in creation order.
pub struct ActiveIffUnspent;

impl Invariant for ActiveIffUnspent {
    fn name(&self) -> &'static str {
        "active-iff-unspent"
    }

    fn check(&self, _: &BenefactorRegistry, store: &AllowanceStore) -> Vec<InvariantViolation> {
        let mut found = Vec::new();
        for allowance in store.iter() {
            let should_be_active = allowance.spent < allowance.total;
            if store.is_active(allowance.id) != should_be_active {
                found.push(violation(
                    self,
                    Some(allowance.id),
                    format!(
                        "active={} but spent={} total={}",
                        store.is_active(allowance.id),
                        allowance.spent,
                        allowance.total
                    ),
                ));
            }
        }
        for id in store.active_ids() {
            if store.get(*id).is_none() {
                found.push(violation(
                    self,
                    Some(*id),
                    "active id has no record".to_string(),
                ));
            }
        }
        if store.active_ids().windows(2).any(|w| w[0] >= w[1]) {
            found.push(violation(
                self,
                None,
                "active set is not in creation order".to_string(),
            ));
        }
        found
    }
}

/// Runs a fixed set of invariants.
pub struct InvariantEnforcer {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantEnforcer {
    /// Enforcer loaded with every allowance data-model invariant.
    pub fn standard() -> Self {
        Self {
            invariants: vec![
                Box::new(SpentWithinTotal),
                Box::new(DistinctBenefactorApprovers),
                Box::new(ActiveIffUnspent),
            ],
        }
    }

    pub fn check_all(
        &self,
        registry: &BenefactorRegistry,
        store: &AllowanceStore,
    ) -> Vec<InvariantViolation> {
        let violations: Vec<InvariantViolation> = self
            .invariants
            .iter()
            .flat_map(|inv| inv.check(registry, store))
            .collect();

        if violations.is_empty() {
            debug!(checked = self.invariants.len(), "All invariants hold");
        } else {
            for v in &violations {
                error!(invariant = %v.invariant, message = %v.message, "Invariant violated");
            }
        }
        violations
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

impl Default for InvariantEnforcer {
    fn default() -> Self {
        Self::standard()
    }
}
