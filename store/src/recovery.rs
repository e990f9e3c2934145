//! Recovery request records and their storage trait.

use crate::StoreError;
use keyward_types::{
    AccountId, AccountRole, GuardianId, ProtectionId, RecoveryMethod, RequestId, RequestStatus,
    RequestType, Signature, Timestamp, Urgency,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

/// A verified guardian approval, kept for audit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub guardian_id: GuardianId,
    pub signature: Signature,
    /// Encoded shard released with a key-recovery approval.
    pub shard: Option<Vec<u8>>,
    /// Freshness timestamp the guardian signed.
    pub issued_at: Timestamp,
    pub recorded_at: Timestamp,
}

impl ApprovalRecord {
    /// Wipe any released shard bytes.
    pub fn clear_shard(&mut self) {
        if let Some(mut shard) = self.shard.take() {
            shard.zeroize();
        }
    }
}

impl fmt::Debug for ApprovalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalRecord")
            .field("guardian_id", &self.guardian_id)
            .field("signature", &self.signature)
            .field("has_shard", &self.shard.is_some())
            .field("issued_at", &self.issued_at)
            .field("recorded_at", &self.recorded_at)
            .finish()
    }
}

/// A recovery or emergency request and its approval tally.
///
/// `current_approvals()` is derived from the approval map, so the count and the
/// set of signatures cannot drift apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub id: RequestId,
    pub account_id: AccountId,
    pub account_role: AccountRole,
    pub request_type: RequestType,
    pub reason: String,
    pub urgency: Urgency,
    pub recovery_method: RecoveryMethod,
    pub status: RequestStatus,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    /// Approvals needed, fixed at creation. Weighted quorum policies may
    /// need more than this many when light guardians approve.
    pub required_approvals: u32,
    /// Protection generation whose shards a key-recovery request reconstructs.
    pub protection_id: Option<ProtectionId>,
    pub approvals: BTreeMap<GuardianId, ApprovalRecord>,
    /// Guardians who declined, with the time of rejection.
    pub rejections: BTreeMap<GuardianId, Timestamp>,
    /// Optimistic-concurrency counter, bumped on every persisted change.
    pub version: u64,
}

impl RecoveryRequest {
    pub fn current_approvals(&self) -> u32 {
        self.approvals.len() as u32
    }

    /// Whether `guardian` has already approved or rejected this request.
    pub fn has_responded(&self, guardian: &GuardianId) -> bool {
        self.approvals.contains_key(guardian) || self.rejections.contains_key(guardian)
    }

    pub fn is_past_expiry(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Trait for recovery request storage.
pub trait RecoveryStore: Send + Sync {
    /// Insert `request` only if its account has fewer than `limit` requests
    /// created at or after `day_start`. Check and insert are atomic.
    ///
    /// Returns the number of requests created in the window, including this one.
    /// Fails with `LimitReached` when the window is full, and `Duplicate` if the
    /// id already exists.
    fn insert_within_daily_limit(
        &self,
        request: &RecoveryRequest,
        day_start: Timestamp,
        limit: u32,
    ) -> Result<u32, StoreError>;

    fn get_request(&self, id: &RequestId) -> Result<RecoveryRequest, StoreError>;

    /// Replace the stored request if its version still equals
    /// `expected_version`; otherwise fail with `Conflict`.
    fn update_request(
        &self,
        expected_version: u64,
        request: &RecoveryRequest,
    ) -> Result<(), StoreError>;

    fn requests_for_account(&self, account: &AccountId) -> Result<Vec<RecoveryRequest>, StoreError>;

    fn count_created_since(&self, account: &AccountId, since: Timestamp) -> Result<u32, StoreError>;

    /// Ids of pending or approved requests whose `expires_at` is before `cutoff`.
    fn requests_expiring_before(&self, cutoff: Timestamp) -> Result<Vec<RequestId>, StoreError>;
}
