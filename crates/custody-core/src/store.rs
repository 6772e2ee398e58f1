use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::CustodyError;
use crate::registry::BenefactorRegistry;
use crate::types::{Allowance, AllowanceId, AllowanceSnapshot, Amount, Principal};

/// Owns every allowance record and the ordered active-id working set.
///
/// Records are never deleted: exhausted allowances leave the active set but
/// stay queryable by id. The active set keeps creation order; removal shifts
/// the survivors instead of swapping them.
#[derive(Clone, Debug)]
pub struct AllowanceStore {
    records: BTreeMap<AllowanceId, Allowance>,
    active: Vec<AllowanceId>,
    next_id: AllowanceId,
}

/// State of one allowance captured before a mutation, for rollback.
#[derive(Clone, Debug)]
pub struct StoreCheckpoint {
    record: Allowance,
    active_position: Option<usize>,
}

impl AllowanceStore {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            active: Vec::new(),
            next_id: AllowanceId::FIRST,
        }
    }

    /// Create an allowance on behalf of an already-authorized benefactor.
    ///
    /// Arguments are validated before an id is taken, so a rejected creation
    /// does not consume one.
    pub fn create(
        &mut self,
        registry: &BenefactorRegistry,
        amount: Amount,
        beneficiary: Principal,
        required_approvals: usize,
        creator: Principal,
    ) -> Result<AllowanceId, CustodyError> {
        if amount == 0 {
            return Err(CustodyError::ZeroAmount);
        }
        let maximum = registry.maximum_allowance();
        if amount > maximum {
            return Err(CustodyError::AmountExceedsMaximum { amount, maximum });
        }
        if beneficiary.is_null() {
            return Err(CustodyError::NullBeneficiary);
        }

        let id = self.next_id;
        self.next_id = id.next();
        self.records.insert(
            id,
            Allowance {
                id,
                total: amount,
                spent: 0,
                beneficiary,
                required_approvals,
                approvers: vec![creator],
            },
        );
        self.active.push(id);

        info!(allowance_id = %id, amount, required_approvals, "Allowance stored");
        Ok(id)
    }

    pub fn get(&self, id: AllowanceId) -> Option<&Allowance> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: AllowanceId) -> Option<&mut Allowance> {
        self.records.get_mut(&id)
    }

    /// Record snapshot, active or archived. `None` for a never-created id.
    pub fn snapshot(&self, id: AllowanceId) -> Option<AllowanceSnapshot> {
        self.records
            .get(&id)
            .map(|record| record.snapshot(self.is_active(id)))
    }

    pub fn is_active(&self, id: AllowanceId) -> bool {
        self.active.contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active ids in creation order.
    pub fn active_ids(&self) -> &[AllowanceId] {
        &self.active
    }

    /// Number of allowances ever created, archived included.
    pub fn created_count(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Allowance> {
        self.records.values()
    }

    /// Drop `id` from the active set, preserving the order of the rest.
    ///
    /// Returns `false` when the id was not active.
    pub fn remove_from_active(&mut self, id: AllowanceId) -> bool {
        match self.active.iter().position(|a| *a == id) {
            Some(index) => {
                self.active.remove(index);
                debug!(allowance_id = %id, remaining_active = self.active.len(), "Removed from active set");
                true
            }
            None => false,
        }
    }

    pub fn checkpoint(&self, id: AllowanceId) -> Option<StoreCheckpoint> {
        let record = self.records.get(&id)?.clone();
        Some(StoreCheckpoint {
            record,
            active_position: self.active.iter().position(|a| *a == id),
        })
    }

    /// Put one allowance back exactly as it was at `checkpoint`.
    pub fn restore(&mut self, checkpoint: StoreCheckpoint) {
        let id = checkpoint.record.id;
        self.active.retain(|a| *a != id);
        if let Some(position) = checkpoint.active_position {
            let position = position.min(self.active.len());
            self.active.insert(position, id);
        }
        self.records.insert(id, checkpoint.record);
        debug!(allowance_id = %id, "Allowance restored from checkpoint");
    }
}

impl Default for AllowanceStore {
    fn default() -> Self {
        Self::new()
    }
}
