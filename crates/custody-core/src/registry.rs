use tracing::{debug, info};

use crate::error::CustodyError;
use crate::types::{Amount, Principal};

/// Fixed, ordered set of co-owners plus the per-allowance cap.
///
/// Membership never changes after construction. Containment is a linear scan;
/// the set is bounded by the number of co-owners.
#[derive(Clone, Debug)]
pub struct BenefactorRegistry {
    benefactors: Vec<Principal>,
    maximum_allowance: Amount,
}

impl BenefactorRegistry {
    pub fn new(
        benefactors: Vec<Principal>,
        maximum_allowance: Amount,
    ) -> Result<Self, CustodyError> {
        if benefactors.is_empty() {
            return Err(CustodyError::NoBenefactors);
        }
        if maximum_allowance == 0 {
            return Err(CustodyError::ZeroMaximumAllowance);
        }
        for (i, benefactor) in benefactors.iter().enumerate() {
            if benefactor.is_null() {
                return Err(CustodyError::NullBenefactor);
            }
            if benefactors[..i].contains(benefactor) {
                return Err(CustodyError::DuplicateBenefactor(benefactor.clone()));
            }
        }

        info!(
            benefactors = benefactors.len(),
            maximum_allowance, "Benefactor registry constructed"
        );

        Ok(Self {
            benefactors,
            maximum_allowance,
        })
    }

    pub fn is_benefactor(&self, principal: &Principal) -> bool {
        self.benefactors.iter().any(|b| b == principal)
    }

    /// Fails with `NotBenefactor` unless `principal` is a member.
    pub fn require_benefactor(&self, principal: &Principal) -> Result<(), CustodyError> {
        if self.is_benefactor(principal) {
            Ok(())
        } else {
            debug!(caller = %principal, "Rejected non-benefactor caller");
            Err(CustodyError::NotBenefactor(principal.clone()))
        }
    }

    /// Benefactors in construction order.
    pub fn list(&self) -> &[Principal] {
        &self.benefactors
    }

    pub fn maximum_allowance(&self) -> Amount {
        self.maximum_allowance
    }

    pub fn len(&self) -> usize {
        self.benefactors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.benefactors.is_empty()
    }
}
