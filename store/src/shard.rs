//! Sealed guardian shard records.

use crate::StoreError;
use keyward_crypto::{Commitment, SealedBox};
use keyward_types::{AccountId, GuardianId, ProtectionId, Timestamp};
use serde::{Deserialize, Serialize};

/// One guardian's shard, sealed to that guardian's key.
///
/// Keyed by (guardian, protection generation). The plaintext shard never
/// reaches the store; `commitment` lets a released shard be checked against
/// what was sealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedShardRecord {
    pub guardian_id: GuardianId,
    pub protection_id: ProtectionId,
    pub account_id: AccountId,
    pub shard_index: u8,
    pub threshold: u8,
    pub total: u8,
    pub sealed: SealedBox,
    pub commitment: Commitment,
    pub created_at: Timestamp,
}

/// Trait for sealed shard lookups.
///
/// Shards are written only together with their generation, through
/// [`ProtectionStore::rotate_protection`](crate::ProtectionStore::rotate_protection).
pub trait ShardStore: Send + Sync {
    fn sealed_shard(
        &self,
        protection: &ProtectionId,
        guardian: &GuardianId,
    ) -> Result<Option<SealedShardRecord>, StoreError>;

    fn sealed_shards_for_protection(
        &self,
        protection: &ProtectionId,
    ) -> Result<Vec<SealedShardRecord>, StoreError>;
}
