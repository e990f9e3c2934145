//! Guardian registry: who guards an account, in what order, and how many must agree.

use crate::error::GuardianError;
use crate::quorum::QuorumPolicy;
use keyward_store::{GuardianRecord, GuardianStore};
use keyward_types::{AccountId, GuardianId, RequestType};
use std::sync::Arc;
use tracing::{debug, info};

/// Quorum requirement resolved for one account and request type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quorum {
    pub required: u32,
    pub guardian_count: u32,
}

pub struct GuardianRegistry {
    store: Arc<dyn GuardianStore>,
    quorum: Arc<dyn QuorumPolicy>,
}

impl GuardianRegistry {
    pub fn new(store: Arc<dyn GuardianStore>, quorum: Arc<dyn QuorumPolicy>) -> Self {
        Self { store, quorum }
    }

    pub fn quorum_policy(&self) -> &dyn QuorumPolicy {
        self.quorum.as_ref()
    }

    /// Enroll (or re-enroll) a guardian for an account.
    ///
    /// An account may not guard itself, and `private` accounts cannot act as
    /// guardians since they belong to no federation.
    pub fn register(&self, record: GuardianRecord) -> Result<(), GuardianError> {
        if record.guardian_id.as_str() == record.account_id.as_str() {
            return Err(GuardianError::InvalidEnrollment(format!(
                "account {} cannot guard itself",
                record.account_id
            )));
        }
        if !record.role.is_federated() {
            return Err(GuardianError::InvalidEnrollment(format!(
                "guardian {} has role {} and cannot hold approval authority",
                record.guardian_id, record.role
            )));
        }
        self.store.put_guardian(&record)?;
        info!(
            account = %record.account_id,
            guardian = %record.guardian_id,
            role = %record.role,
            active = record.active,
            "guardian registered"
        );
        Ok(())
    }

    /// Mark a guardian inactive. The row is kept for audit.
    pub fn deactivate(
        &self,
        account: &AccountId,
        guardian: &GuardianId,
    ) -> Result<(), GuardianError> {
        let mut record = self
            .store
            .get_guardian(account, guardian)?
            .ok_or_else(|| not_found(account, guardian))?;
        if !record.active {
            return Ok(());
        }
        record.active = false;
        self.store.put_guardian(&record)?;
        info!(account = %account, guardian = %guardian, "guardian deactivated");
        Ok(())
    }

    /// Active guardians of `account`, highest authority first, ties by id.
    pub fn resolve_guardians(
        &self,
        account: &AccountId,
    ) -> Result<Vec<GuardianRecord>, GuardianError> {
        let mut guardians: Vec<GuardianRecord> = self
            .store
            .guardians_for_account(account)?
            .into_iter()
            .filter(|g| g.active)
            .collect();
        guardians.sort_by(|a, b| {
            b.role
                .cmp(&a.role)
                .then_with(|| a.guardian_id.cmp(&b.guardian_id))
        });
        debug!(account = %account, count = guardians.len(), "resolved guardians");
        Ok(guardians)
    }

    /// The active guardian `guardian` of `account`.
    pub fn guardian(
        &self,
        account: &AccountId,
        guardian: &GuardianId,
    ) -> Result<GuardianRecord, GuardianError> {
        match self.store.get_guardian(account, guardian)? {
            Some(record) if record.active => Ok(record),
            _ => Err(not_found(account, guardian)),
        }
    }

    pub fn is_guardian_of(
        &self,
        account: &AccountId,
        guardian: &GuardianId,
    ) -> Result<bool, GuardianError> {
        Ok(self
            .store
            .get_guardian(account, guardian)?
            .is_some_and(|g| g.active))
    }

    /// Quorum for a request of `request_type` against `account`.
    pub fn required_approvals(
        &self,
        account: &AccountId,
        request_type: RequestType,
    ) -> Result<Quorum, GuardianError> {
        let guardians = self.resolve_guardians(account)?;
        self.quorum_for(account, &guardians, request_type)
    }

    /// Quorum computed over an already resolved guardian set.
    pub fn quorum_for(
        &self,
        account: &AccountId,
        guardians: &[GuardianRecord],
        request_type: RequestType,
    ) -> Result<Quorum, GuardianError> {
        if guardians.is_empty() {
            return Err(GuardianError::NoGuardiansConfigured(account.to_string()));
        }
        let required = self.quorum.required_approvals(guardians, request_type);
        Ok(Quorum {
            required,
            guardian_count: guardians.len() as u32,
        })
    }
}

fn not_found(account: &AccountId, guardian: &GuardianId) -> GuardianError {
    GuardianError::GuardianNotFound {
        account: account.to_string(),
        guardian: guardian.to_string(),
    }
}
