//! Guardian registry rows.

use crate::StoreError;
use keyward_types::{AccountId, AccountRole, GuardianId, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

/// A guardian enrolled for one account's federation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianRecord {
    pub account_id: AccountId,
    pub guardian_id: GuardianId,
    /// Key used to verify this guardian's approvals and to seal their shard.
    pub public_key: PublicKey,
    /// Address on the external messaging channel.
    pub contact: String,
    pub role: AccountRole,
    pub active: bool,
    pub added_at: Timestamp,
}

/// Trait for guardian registry storage.
pub trait GuardianStore: Send + Sync {
    /// Insert or replace a guardian row, keyed by (account, guardian).
    fn put_guardian(&self, record: &GuardianRecord) -> Result<(), StoreError>;

    fn get_guardian(
        &self,
        account: &AccountId,
        guardian: &GuardianId,
    ) -> Result<Option<GuardianRecord>, StoreError>;

    /// All rows for an account, active or not.
    fn guardians_for_account(&self, account: &AccountId) -> Result<Vec<GuardianRecord>, StoreError>;
}
