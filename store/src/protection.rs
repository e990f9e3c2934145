//! Protection generations: one row per sharding of an account's key.

use crate::{SealedShardRecord, StoreError};
use keyward_crypto::Commitment;
use keyward_types::{AccountId, ProtectionId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionMetadata {
    pub id: ProtectionId,
    pub account_id: AccountId,
    /// Starts at 1 and increases by one on every rotation.
    pub generation: u32,
    pub guardian_count: u32,
    pub threshold_required: u32,
    /// Commitment to the protected secret; reconstructions must match it.
    pub secret_commitment: Commitment,
    pub active: bool,
    pub shards_stored: bool,
    pub recovery_count: u32,
    pub created_at: Timestamp,
    pub archived_at: Option<Timestamp>,
}

/// Trait for protection metadata storage.
///
/// Rows are never deleted; superseded generations are archived.
pub trait ProtectionStore: Send + Sync {
    /// In one atomic operation: store `shards`, insert `next` as the account's
    /// active generation and archive the previously active one. Returns the
    /// archived id.
    ///
    /// `next.generation` must be one past the account's latest generation,
    /// otherwise nothing is written and the call fails with `Conflict`
    /// (`expected` is the latest generation the caller saw, `found` the
    /// actual one). Any shard already present fails with `Duplicate`.
    fn rotate_protection(
        &self,
        next: &ProtectionMetadata,
        shards: &[SealedShardRecord],
        now: Timestamp,
    ) -> Result<Option<ProtectionId>, StoreError>;

    fn get_protection(&self, id: &ProtectionId) -> Result<ProtectionMetadata, StoreError>;

    fn active_protection(&self, account: &AccountId)
        -> Result<Option<ProtectionMetadata>, StoreError>;

    /// Every generation for the account, oldest first.
    fn protection_history(&self, account: &AccountId)
        -> Result<Vec<ProtectionMetadata>, StoreError>;

    fn increment_recovery_count(&self, id: &ProtectionId) -> Result<u32, StoreError>;
}
