//! Recovery request lifecycle.
//!
//! ```text
//! pending ──► approved ──► completed
//!    │            │
//!    ├──► rejected└──► expired
//!    └──► expired
//! ```
//!
//! Every mutation is serialized twice: an in-process async mutex per request
//! id, and the store's optimistic `version` check. The mutex keeps local
//! callers from wasting work; the version check is what makes a write safe
//! against other instances sharing the store. Conflicts are retried a bounded
//! number of times from a fresh read.

use crate::config::{RecoveryConfig, RejectionPolicy};
use crate::verifier::{check_replay, SignatureVerifier, SignedApproval};
use crate::RecoveryError;
use keyward_guardians::{FractionalQuorum, QuorumPolicy};
use keyward_store::{ApprovalRecord, GuardianRecord, RecoveryRequest, RecoveryStore, StoreError};
use keyward_types::{
    AccountRole, Clock, Decision, GuardianId, RequestId, RequestStatus, Signature, Timestamp,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Attempts at a version-checked write before giving up.
pub const MAX_UPDATE_RETRIES: u32 = 8;

/// Result of recording one guardian decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub request_id: RequestId,
    pub decision: Decision,
    pub status: RequestStatus,
    pub current_approvals: u32,
    pub required_approvals: u32,
    pub rejections: u32,
    /// True for exactly one approval: the one that moved the request to `approved`.
    pub reached_quorum: bool,
    /// True when a rejection ended the request.
    pub terminated: bool,
}

impl ApprovalOutcome {
    fn from_request(request: &RecoveryRequest, decision: Decision) -> Self {
        Self {
            request_id: request.id,
            decision,
            status: request.status,
            current_approvals: request.current_approvals(),
            required_approvals: request.required_approvals,
            rejections: request.rejections.len() as u32,
            reached_quorum: false,
            terminated: false,
        }
    }
}

pub struct RecoveryStateMachine {
    store: Arc<dyn RecoveryStore>,
    clock: Arc<dyn Clock>,
    verifier: SignatureVerifier,
    max_daily_attempts: u32,
    rejection_policy: RejectionPolicy,
    quorum: Arc<dyn QuorumPolicy>,
    locks: Mutex<HashMap<RequestId, Arc<AsyncMutex<()>>>>,
}

impl RecoveryStateMachine {
    pub fn new(
        store: Arc<dyn RecoveryStore>,
        clock: Arc<dyn Clock>,
        verifier: SignatureVerifier,
        max_daily_attempts: u32,
        rejection_policy: RejectionPolicy,
        quorum: Arc<dyn QuorumPolicy>,
    ) -> Self {
        Self {
            store,
            clock,
            verifier,
            max_daily_attempts,
            rejection_policy,
            quorum,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Machine with the configured fractional quorum.
    pub fn from_config(
        store: Arc<dyn RecoveryStore>,
        clock: Arc<dyn Clock>,
        config: &RecoveryConfig,
    ) -> Self {
        let quorum = Arc::new(FractionalQuorum::from_fraction(config.consensus_threshold));
        Self::with_quorum_policy(store, clock, config, quorum)
    }

    pub fn with_quorum_policy(
        store: Arc<dyn RecoveryStore>,
        clock: Arc<dyn Clock>,
        config: &RecoveryConfig,
        quorum: Arc<dyn QuorumPolicy>,
    ) -> Self {
        Self::new(
            store,
            clock,
            SignatureVerifier::from_config(config),
            config.max_daily_attempts,
            config.rejection_policy,
            quorum,
        )
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn max_daily_attempts(&self) -> u32 {
        self.max_daily_attempts
    }

    /// Persist a new pending request, enforcing the per-account daily limit.
    ///
    /// The window is the UTC calendar day of the request's `created_at`.
    /// Returns the number of requests the account has created that day,
    /// including this one.
    pub fn create(&self, request: &RecoveryRequest) -> Result<u32, RecoveryError> {
        if request.status != RequestStatus::Pending
            || request.version != 0
            || !request.approvals.is_empty()
            || !request.rejections.is_empty()
        {
            return Err(RecoveryError::InvalidParameters(
                "new requests must be pending with no decisions".into(),
            ));
        }
        if request.required_approvals == 0 {
            return Err(RecoveryError::InvalidParameters(
                "required approvals must be at least 1".into(),
            ));
        }
        if request.expires_at <= request.created_at {
            return Err(RecoveryError::InvalidParameters(
                "request must expire after it is created".into(),
            ));
        }

        let day_start = request.created_at.day_start();
        match self
            .store
            .insert_within_daily_limit(request, day_start, self.max_daily_attempts)
        {
            Ok(attempts) => {
                info!(
                    request_id = %request.id,
                    account = %request.account_id,
                    request_type = %request.request_type,
                    required = request.required_approvals,
                    attempts,
                    "recovery request created"
                );
                Ok(attempts)
            }
            Err(StoreError::LimitReached { count, limit }) => {
                warn!(account = %request.account_id, count, limit, "daily recovery limit reached");
                Err(RecoveryError::RateLimitExceeded {
                    attempts: count,
                    limit,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, request_id: &RequestId) -> Result<RecoveryRequest, RecoveryError> {
        self.store.get_request(request_id).map_err(|e| match e {
            StoreError::NotFound(_) => RecoveryError::RequestNotFound(request_id.to_string()),
            other => other.into(),
        })
    }

    /// Add a verified approval. Flips the request to `approved` in the same
    /// write that reaches the quorum.
    ///
    /// `electorate` is the guardian set whose approvals count towards the
    /// request; the quorum policy judges the approving set against it.
    pub async fn record_approval(
        &self,
        request_id: &RequestId,
        guardian: &GuardianRecord,
        approval: &SignedApproval,
        electorate: &[GuardianRecord],
    ) -> Result<ApprovalOutcome, RecoveryError> {
        if approval.decision != Decision::Approve {
            return Err(RecoveryError::InvalidParameters(
                "record_approval needs an approve decision".into(),
            ));
        }
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let mut signature: Option<Signature> = None;
        for attempt in 0..MAX_UPDATE_RETRIES {
            let current = self.get(request_id)?;
            let now = self.clock.now();
            ensure_open(&current, now)?;
            let sig = match &signature {
                // Only replay can change between retries; the signature
                // itself was already verified against the immutable digest.
                Some(sig) => {
                    check_replay(&current, &approval.guardian_id)?;
                    sig.clone()
                }
                None => {
                    let sig = self
                        .verifier
                        .check_approval(&current, guardian, approval, now)
                        .await?;
                    signature = Some(sig.clone());
                    sig
                }
            };

            let mut next = current.clone();
            next.approvals.insert(
                approval.guardian_id.clone(),
                ApprovalRecord {
                    guardian_id: approval.guardian_id.clone(),
                    signature: sig,
                    shard: approval.shard.as_ref().map(|s| s.to_vec()),
                    issued_at: approval.issued_at,
                    recorded_at: now,
                },
            );
            let approvers: Vec<GuardianId> = next.approvals.keys().cloned().collect();
            let reached_quorum =
                self.quorum
                    .is_satisfied(electorate, &approvers, next.required_approvals);
            if reached_quorum {
                next.status = RequestStatus::Approved;
            }
            next.version += 1;

            match self.store.update_request(current.version, &next) {
                Ok(()) => {
                    let mut outcome = ApprovalOutcome::from_request(&next, Decision::Approve);
                    outcome.reached_quorum = reached_quorum;
                    info!(
                        request_id = %request_id,
                        guardian = %approval.guardian_id,
                        current = outcome.current_approvals,
                        required = outcome.required_approvals,
                        reached_quorum,
                        "approval recorded"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Conflict { expected, found }) => {
                    debug!(
                        request_id = %request_id,
                        attempt,
                        expected,
                        found,
                        "approval write conflicted, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(retries_exhausted(request_id))
    }

    /// Record a verified rejection. Whether it ends the request depends on
    /// the configured [`RejectionPolicy`].
    pub async fn record_rejection(
        &self,
        request_id: &RequestId,
        guardian: &GuardianRecord,
        rejection: &SignedApproval,
    ) -> Result<ApprovalOutcome, RecoveryError> {
        if rejection.decision != Decision::Reject {
            return Err(RecoveryError::InvalidParameters(
                "record_rejection needs a reject decision".into(),
            ));
        }
        if rejection.shard.is_some() {
            return Err(RecoveryError::InvalidParameters(
                "a rejection cannot carry a shard".into(),
            ));
        }
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let mut verified = false;
        for attempt in 0..MAX_UPDATE_RETRIES {
            let current = self.get(request_id)?;
            let now = self.clock.now();
            ensure_open(&current, now)?;
            if verified {
                check_replay(&current, &rejection.guardian_id)?;
            } else {
                self.verifier
                    .check_approval(&current, guardian, rejection, now)
                    .await?;
                verified = true;
            }

            let mut next = current.clone();
            next.rejections.insert(rejection.guardian_id.clone(), now);
            let terminated = self.rejection_terminates(guardian.role);
            if terminated {
                next.status = RequestStatus::Rejected;
                for record in next.approvals.values_mut() {
                    record.clear_shard();
                }
            }
            next.version += 1;

            match self.store.update_request(current.version, &next) {
                Ok(()) => {
                    if terminated {
                        self.forget_lock(request_id);
                    }
                    let mut outcome = ApprovalOutcome::from_request(&next, Decision::Reject);
                    outcome.terminated = terminated;
                    info!(
                        request_id = %request_id,
                        guardian = %rejection.guardian_id,
                        terminated,
                        policy = ?self.rejection_policy,
                        "rejection recorded"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Conflict { expected, found }) => {
                    debug!(
                        request_id = %request_id,
                        attempt,
                        expected,
                        found,
                        "rejection write conflicted, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(retries_exhausted(request_id))
    }

    fn rejection_terminates(&self, role: AccountRole) -> bool {
        match self.rejection_policy {
            RejectionPolicy::Informational => false,
            RejectionPolicy::GuardianRoleVeto => role == AccountRole::Guardian,
            RejectionPolicy::AnyGuardianVeto => true,
        }
    }

    /// Expire every pending or approved request whose `expires_at` is before
    /// `now`. Returns the ids this call expired.
    ///
    /// Idempotent: a second sweep finds nothing. Requests that reach a
    /// terminal status concurrently are skipped, never reverted.
    pub async fn expire_due(&self, now: Timestamp) -> Result<Vec<RequestId>, RecoveryError> {
        let due = self.store.requests_expiring_before(now)?;
        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            match self.expire_one(&id, now).await {
                Ok(true) => expired.push(id),
                Ok(false) => {}
                Err(e) => warn!(request_id = %id, error = %e, "failed to expire request"),
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired recovery requests");
        }
        Ok(expired)
    }

    async fn expire_one(
        &self,
        request_id: &RequestId,
        now: Timestamp,
    ) -> Result<bool, RecoveryError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        for attempt in 0..MAX_UPDATE_RETRIES {
            let current = self.get(request_id)?;
            if !current.status.is_active() || !current.is_past_expiry(now) {
                return Ok(false);
            }
            let mut next = current.clone();
            next.status = RequestStatus::Expired;
            for record in next.approvals.values_mut() {
                record.clear_shard();
            }
            next.version += 1;
            match self.store.update_request(current.version, &next) {
                Ok(()) => {
                    self.forget_lock(request_id);
                    debug!(request_id = %request_id, from = %current.status, "request expired");
                    return Ok(true);
                }
                Err(StoreError::Conflict { expected, found }) => {
                    debug!(
                        request_id = %request_id,
                        attempt,
                        expected,
                        found,
                        "expiry write conflicted, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(retries_exhausted(request_id))
    }

    /// Mark an approved request `completed`.
    pub async fn complete(&self, request_id: &RequestId) -> Result<RecoveryRequest, RecoveryError> {
        self.complete_with(request_id, |_| async { Ok(()) })
            .await
            .map(|(request, ())| request)
    }

    /// Run `execute` on the approved request, then mark it `completed`.
    ///
    /// `execute` runs under the request's lock and sees the request with its
    /// released shards. If it fails the request stays `approved`. Returns the
    /// completed request (shards wiped) with `execute`'s output.
    pub async fn complete_with<T, F, Fut>(
        &self,
        request_id: &RequestId,
        execute: F,
    ) -> Result<(RecoveryRequest, T), RecoveryError>
    where
        F: FnOnce(RecoveryRequest) -> Fut,
        Fut: Future<Output = Result<T, RecoveryError>>,
    {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let current = self.get(request_id)?;
        ensure_executable(&current, self.clock.now())?;
        let output = execute(current.clone()).await?;

        let mut current = current;
        for attempt in 0..MAX_UPDATE_RETRIES {
            let mut next = current.clone();
            next.status = RequestStatus::Completed;
            for record in next.approvals.values_mut() {
                record.clear_shard();
            }
            next.version += 1;
            match self.store.update_request(current.version, &next) {
                Ok(()) => {
                    self.forget_lock(request_id);
                    info!(request_id = %request_id, "recovery request completed");
                    return Ok((next, output));
                }
                Err(StoreError::Conflict { expected, found }) => {
                    debug!(
                        request_id = %request_id,
                        attempt,
                        expected,
                        found,
                        "completion write conflicted, retrying"
                    );
                    current = self.get(request_id)?;
                    ensure_executable(&current, self.clock.now())?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(retries_exhausted(request_id))
    }

    fn lock_for(&self, request_id: &RequestId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(*request_id).or_default())
    }

    /// Drop the lock entry of a request that reached a terminal status.
    /// Late callers get a fresh mutex; the version check still orders them.
    fn forget_lock(&self, request_id: &RequestId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(request_id);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

/// A request accepts decisions only while pending and unexpired.
fn ensure_open(request: &RecoveryRequest, now: Timestamp) -> Result<(), RecoveryError> {
    if request.status != RequestStatus::Pending || request.is_past_expiry(now) {
        return Err(RecoveryError::RequestExpired(request.id.to_string()));
    }
    Ok(())
}

fn ensure_executable(request: &RecoveryRequest, now: Timestamp) -> Result<(), RecoveryError> {
    match request.status {
        RequestStatus::Approved if request.is_past_expiry(now) => {
            Err(RecoveryError::RequestExpired(request.id.to_string()))
        }
        RequestStatus::Approved => Ok(()),
        RequestStatus::Expired => Err(RecoveryError::RequestExpired(request.id.to_string())),
        from => Err(RecoveryError::InvalidTransition {
            from,
            to: RequestStatus::Completed,
        }),
    }
}

fn retries_exhausted(request_id: &RequestId) -> RecoveryError {
    RecoveryError::Internal(format!(
        "request {request_id} kept changing; gave up after {MAX_UPDATE_RETRIES} attempts"
    ))
}
