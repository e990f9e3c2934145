//! Nullable store: thread-safe in-memory storage for testing.
//!
//! Compound operations (daily-limit insert, version-checked update,
//! generation rotation with its shards) hold the table locks for their whole
//! duration, so they are atomic the same way a transactional backend makes
//! them. Rotation takes the protection lock before the shard lock.

use keyward_store::{
    GuardianRecord, GuardianStore, ProtectionMetadata, ProtectionStore, RecoveryRequest,
    RecoveryStore, SealedShardRecord, ShardStore, StoreError,
};
use keyward_types::{AccountId, GuardianId, ProtectionId, RequestId, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// An in-memory implementation of every keyward store trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    guardians: Mutex<HashMap<(AccountId, GuardianId), GuardianRecord>>,
    protections: Mutex<HashMap<ProtectionId, ProtectionMetadata>>,
    shards: Mutex<HashMap<(ProtectionId, GuardianId), SealedShardRecord>>,
    requests: Mutex<HashMap<RequestId, RecoveryRequest>>,
    /// Pending forced conflicts for `update_request`.
    injected_conflicts: AtomicU32,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            guardians: Mutex::new(HashMap::new()),
            protections: Mutex::new(HashMap::new()),
            shards: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            injected_conflicts: AtomicU32::new(0),
        }
    }

    /// Make the next `count` calls to `update_request` fail with `Conflict`,
    /// as if another instance had written first.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Overwrite a request without a version check (test setup only).
    pub fn force_request(&self, request: RecoveryRequest) {
        self.requests.lock().unwrap().insert(request.id, request);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardianStore for NullStore {
    fn put_guardian(&self, record: &GuardianRecord) -> Result<(), StoreError> {
        self.guardians.lock().unwrap().insert(
            (record.account_id.clone(), record.guardian_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn get_guardian(
        &self,
        account: &AccountId,
        guardian: &GuardianId,
    ) -> Result<Option<GuardianRecord>, StoreError> {
        Ok(self
            .guardians
            .lock()
            .unwrap()
            .get(&(account.clone(), guardian.clone()))
            .cloned())
    }

    fn guardians_for_account(&self, account: &AccountId) -> Result<Vec<GuardianRecord>, StoreError> {
        Ok(self
            .guardians
            .lock()
            .unwrap()
            .values()
            .filter(|g| &g.account_id == account)
            .cloned()
            .collect())
    }
}

impl ProtectionStore for NullStore {
    fn rotate_protection(
        &self,
        next: &ProtectionMetadata,
        shards: &[SealedShardRecord],
        now: Timestamp,
    ) -> Result<Option<ProtectionId>, StoreError> {
        let mut protections = self.protections.lock().unwrap();
        let mut stored_shards = self.shards.lock().unwrap();
        if protections.contains_key(&next.id) {
            return Err(StoreError::Duplicate(next.id.to_string()));
        }
        let latest = protections
            .values()
            .filter(|row| row.account_id == next.account_id)
            .map(|row| row.generation)
            .max()
            .unwrap_or(0);
        if next.generation != latest + 1 {
            return Err(StoreError::Conflict {
                expected: u64::from(next.generation.saturating_sub(1)),
                found: u64::from(latest),
            });
        }
        for record in shards {
            if stored_shards.contains_key(&(record.protection_id, record.guardian_id.clone())) {
                return Err(StoreError::Duplicate(format!(
                    "{}/{}",
                    record.protection_id, record.guardian_id
                )));
            }
        }

        for record in shards {
            stored_shards.insert(
                (record.protection_id, record.guardian_id.clone()),
                record.clone(),
            );
        }
        let mut archived = None;
        for row in protections.values_mut() {
            if row.account_id == next.account_id && row.active {
                row.active = false;
                row.archived_at = Some(now);
                archived = Some(row.id);
            }
        }
        protections.insert(next.id, next.clone());
        Ok(archived)
    }

    fn get_protection(&self, id: &ProtectionId) -> Result<ProtectionMetadata, StoreError> {
        self.protections
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn active_protection(
        &self,
        account: &AccountId,
    ) -> Result<Option<ProtectionMetadata>, StoreError> {
        Ok(self
            .protections
            .lock()
            .unwrap()
            .values()
            .find(|p| &p.account_id == account && p.active)
            .cloned())
    }

    fn protection_history(&self, account: &AccountId) -> Result<Vec<ProtectionMetadata>, StoreError> {
        let mut history: Vec<ProtectionMetadata> = self
            .protections
            .lock()
            .unwrap()
            .values()
            .filter(|p| &p.account_id == account)
            .cloned()
            .collect();
        history.sort_by_key(|p| p.generation);
        Ok(history)
    }

    fn increment_recovery_count(&self, id: &ProtectionId) -> Result<u32, StoreError> {
        let mut protections = self.protections.lock().unwrap();
        let row = protections
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.recovery_count += 1;
        Ok(row.recovery_count)
    }
}

impl ShardStore for NullStore {
    fn sealed_shard(
        &self,
        protection: &ProtectionId,
        guardian: &GuardianId,
    ) -> Result<Option<SealedShardRecord>, StoreError> {
        Ok(self
            .shards
            .lock()
            .unwrap()
            .get(&(*protection, guardian.clone()))
            .cloned())
    }

    fn sealed_shards_for_protection(
        &self,
        protection: &ProtectionId,
    ) -> Result<Vec<SealedShardRecord>, StoreError> {
        let mut records: Vec<SealedShardRecord> = self
            .shards
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.protection_id == protection)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.shard_index);
        Ok(records)
    }
}

impl RecoveryStore for NullStore {
    fn insert_within_daily_limit(
        &self,
        request: &RecoveryRequest,
        day_start: Timestamp,
        limit: u32,
    ) -> Result<u32, StoreError> {
        let mut requests = self.requests.lock().unwrap();
        if requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate(request.id.to_string()));
        }
        let count = requests
            .values()
            .filter(|r| r.account_id == request.account_id && r.created_at >= day_start)
            .count() as u32;
        if count >= limit {
            return Err(StoreError::LimitReached { count, limit });
        }
        requests.insert(request.id, request.clone());
        Ok(count + 1)
    }

    fn get_request(&self, id: &RequestId) -> Result<RecoveryRequest, StoreError> {
        self.requests
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update_request(
        &self,
        expected_version: u64,
        request: &RecoveryRequest,
    ) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().unwrap();
        let stored = requests
            .get_mut(&request.id)
            .ok_or_else(|| StoreError::NotFound(request.id.to_string()))?;
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        *stored = request.clone();
        Ok(())
    }

    fn requests_for_account(&self, account: &AccountId) -> Result<Vec<RecoveryRequest>, StoreError> {
        let mut requests: Vec<RecoveryRequest> = self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.account_id == account)
            .cloned()
            .collect();
        requests.sort_by_key(|r| (r.created_at, r.id));
        Ok(requests)
    }

    fn count_created_since(&self, account: &AccountId, since: Timestamp) -> Result<u32, StoreError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.account_id == account && r.created_at >= since)
            .count() as u32)
    }

    fn requests_expiring_before(&self, cutoff: Timestamp) -> Result<Vec<RequestId>, StoreError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status.is_active() && r.expires_at < cutoff)
            .map(|r| r.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_crypto::SealedBox;
    use keyward_types::{
        AccountRole, RecoveryMethod, RequestStatus, RequestType, Urgency, SECS_PER_DAY,
    };
    use std::collections::BTreeMap;

    fn request(account: &str, created: u64) -> RecoveryRequest {
        RecoveryRequest {
            id: RequestId::random(),
            account_id: AccountId::new(account),
            account_role: AccountRole::Adult,
            request_type: RequestType::AccountRestoration,
            reason: "lost device".into(),
            urgency: Urgency::Normal,
            recovery_method: RecoveryMethod::GuardianConsensus,
            status: RequestStatus::Pending,
            created_at: Timestamp::new(created),
            expires_at: Timestamp::new(created + 100),
            required_approvals: 2,
            protection_id: None,
            approvals: BTreeMap::new(),
            rejections: BTreeMap::new(),
            version: 0,
        }
    }

    fn protection(account: &str, generation: u32) -> ProtectionMetadata {
        ProtectionMetadata {
            id: ProtectionId::random(),
            account_id: AccountId::new(account),
            generation,
            guardian_count: 3,
            threshold_required: 2,
            secret_commitment: [generation as u8; 32],
            active: true,
            shards_stored: true,
            recovery_count: 0,
            created_at: Timestamp::new(10),
            archived_at: None,
        }
    }

    #[test]
    fn daily_limit_counts_only_today() {
        let store = NullStore::new();
        let day = 10 * SECS_PER_DAY;
        store
            .insert_within_daily_limit(&request("a", day - 1), Timestamp::new(day - SECS_PER_DAY), 2)
            .unwrap();
        let today = Timestamp::new(day);
        assert_eq!(store.insert_within_daily_limit(&request("a", day + 1), today, 2).unwrap(), 1);
        assert_eq!(store.insert_within_daily_limit(&request("a", day + 2), today, 2).unwrap(), 2);
        assert_eq!(
            store.insert_within_daily_limit(&request("a", day + 3), today, 2),
            Err(StoreError::LimitReached { count: 2, limit: 2 })
        );
        // other accounts are unaffected
        assert!(store.insert_within_daily_limit(&request("b", day + 3), today, 2).is_ok());
    }

    #[test]
    fn update_checks_version() {
        let store = NullStore::new();
        let mut req = request("a", 0);
        store.insert_within_daily_limit(&req, Timestamp::EPOCH, 5).unwrap();
        req.version = 1;
        store.update_request(0, &req).unwrap();
        assert_eq!(
            store.update_request(0, &req),
            Err(StoreError::Conflict { expected: 0, found: 1 })
        );
    }

    #[test]
    fn injected_conflicts_are_consumed() {
        let store = NullStore::new();
        let mut req = request("a", 0);
        store.insert_within_daily_limit(&req, Timestamp::EPOCH, 5).unwrap();
        store.inject_conflicts(1);
        req.version = 1;
        assert!(store.update_request(0, &req).is_err());
        assert!(store.update_request(0, &req).is_ok());
    }

    fn shard(protection: &ProtectionMetadata, guardian: &str, index: u8) -> SealedShardRecord {
        SealedShardRecord {
            guardian_id: GuardianId::new(guardian),
            protection_id: protection.id,
            account_id: protection.account_id.clone(),
            shard_index: index,
            threshold: 2,
            total: 3,
            sealed: SealedBox {
                ephemeral_public: [index; 32],
                ciphertext: vec![index; 48],
            },
            commitment: [index; 32],
            created_at: protection.created_at,
        }
    }

    #[test]
    fn rotation_archives_previous_generation() {
        let store = NullStore::new();
        let first = protection("a", 1);
        let shards = [shard(&first, "bob", 0), shard(&first, "carol", 1)];
        assert_eq!(store.rotate_protection(&first, &shards, Timestamp::new(20)).unwrap(), None);
        let second = protection("a", 2);
        assert_eq!(
            store.rotate_protection(&second, &[], Timestamp::new(30)).unwrap(),
            Some(first.id)
        );

        let history = store.protection_history(&AccountId::new("a")).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].active);
        assert_eq!(history[0].archived_at, Some(Timestamp::new(30)));
        assert_eq!(
            store.active_protection(&AccountId::new("a")).unwrap().map(|p| p.id),
            Some(second.id)
        );
        assert_eq!(store.sealed_shards_for_protection(&first.id).unwrap().len(), 2);
    }

    #[test]
    fn rotation_refuses_a_taken_generation() {
        let store = NullStore::new();
        let first = protection("a", 1);
        store.rotate_protection(&first, &[], Timestamp::new(20)).unwrap();

        // a second writer that also read "no generations yet"
        let racing = protection("a", 1);
        let shards = [shard(&racing, "bob", 0)];
        assert_eq!(
            store.rotate_protection(&racing, &shards, Timestamp::new(21)),
            Err(StoreError::Conflict { expected: 0, found: 1 })
        );
        // nothing of the losing rotation was written
        assert!(store.sealed_shard(&racing.id, &GuardianId::new("bob")).unwrap().is_none());
        assert!(store.get_protection(&racing.id).is_err());
        assert_eq!(
            store.active_protection(&AccountId::new("a")).unwrap().map(|p| p.id),
            Some(first.id)
        );
    }

    #[test]
    fn rotation_with_a_stored_shard_writes_nothing() {
        let store = NullStore::new();
        let first = protection("a", 1);
        let bob = shard(&first, "bob", 0);
        store.rotate_protection(&first, &[bob.clone()], Timestamp::new(20)).unwrap();

        let mut second = protection("a", 2);
        second.id = first.id;
        let third = protection("a", 2);
        assert!(matches!(
            store.rotate_protection(&second, &[], Timestamp::new(30)),
            Err(StoreError::Duplicate(_))
        ));
        let mut reused = bob;
        reused.protection_id = first.id;
        assert!(matches!(
            store.rotate_protection(&third, &[reused], Timestamp::new(30)),
            Err(StoreError::Duplicate(_))
        ));
        assert!(store.get_protection(&third.id).is_err());
        assert_eq!(store.protection_history(&AccountId::new("a")).unwrap().len(), 1);
    }

    #[test]
    fn expiring_requests_skip_terminal() {
        let store = NullStore::new();
        let live = request("a", 0);
        let mut done = request("a", 0);
        done.status = RequestStatus::Completed;
        store.force_request(live.clone());
        store.force_request(done);
        assert_eq!(store.requests_expiring_before(Timestamp::new(101)).unwrap(), vec![live.id]);
        assert!(store.requests_expiring_before(Timestamp::new(100)).unwrap().is_empty());
    }
}
