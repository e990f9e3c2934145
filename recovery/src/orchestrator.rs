//! End-to-end recovery workflow.
//!
//! `initiate` checks the requester against the role policy, resolves the
//! guardian quorum and opens a request. `approve` validates a guardian's
//! signed decision and updates the tally. `execute` finishes an approved
//! request, reconstructing the key for key-recovery requests. Guardian
//! notices go out on spawned tasks and never affect the result of a call.
//!
//! The electorate of a request is the set of guardians whose approvals count:
//! the holders of the targeted generation's shards for key recovery, the
//! account's active guardians otherwise.

use crate::config::RecoveryConfig;
use crate::notify::{summarize, NotificationDispatcher};
use crate::policy::check_authority;
use crate::protection::ProtectionManager;
use crate::state_machine::{ApprovalOutcome, RecoveryStateMachine};
use crate::sweeper::ExpirySweeper;
use crate::verifier::SignedApproval;
use crate::RecoveryError;
use keyward_guardians::{
    FractionalQuorum, GuardianChannel, GuardianNotice, GuardianRegistry, NoticeKind, QuorumPolicy,
};
use keyward_crypto::{secret_commitment, shard_commitment};
use keyward_sharing::{decode_shard, reconstruct, Shard};
use keyward_store::{
    GuardianRecord, GuardianStore, ProtectionStore, RecoveryRequest, RecoveryStore, ShardStore,
};
use keyward_types::{
    AccountId, AccountRole, Clock, Decision, ProtectionId, RecoveryMethod, RequestId,
    RequestStatus, RequestType, Timestamp, Urgency,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use zeroize::Zeroizing;

const MAX_REASON_LEN: usize = 500;

/// Storage handles the orchestrator works against.
#[derive(Clone)]
pub struct Backend {
    pub guardians: Arc<dyn GuardianStore>,
    pub protections: Arc<dyn ProtectionStore>,
    pub shards: Arc<dyn ShardStore>,
    pub requests: Arc<dyn RecoveryStore>,
}

impl Backend {
    /// Use one store for every table.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: GuardianStore + ProtectionStore + ShardStore + RecoveryStore + 'static,
    {
        Self {
            guardians: store.clone(),
            protections: store.clone(),
            shards: store.clone(),
            requests: store,
        }
    }
}

/// Input to [`RecoveryOrchestrator::initiate`].
#[derive(Clone, Debug)]
pub struct InitiateParams {
    pub account_id: AccountId,
    pub account_role: AccountRole,
    pub request_type: RequestType,
    pub reason: String,
    pub urgency: Urgency,
    pub recovery_method: RecoveryMethod,
    /// Set when a steward or guardian has pre-authorized an offspring's
    /// emergency-liquidity request.
    pub elevated_approval: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InitiatedRequest {
    pub request_id: RequestId,
    pub required_approvals: u32,
    /// Size of the request's electorate.
    pub guardian_count: u32,
    pub expires_at: Timestamp,
}

/// A request as shown to clients: counts and status, no signatures or shards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub urgency: Urgency,
    pub reason: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub required_approvals: u32,
    pub current_approvals: u32,
    pub rejections: u32,
}

impl From<&RecoveryRequest> for RequestSummary {
    fn from(r: &RecoveryRequest) -> Self {
        Self {
            id: r.id,
            request_type: r.request_type,
            status: r.status,
            urgency: r.urgency,
            reason: r.reason.clone(),
            created_at: r.created_at,
            expires_at: r.expires_at,
            required_approvals: r.required_approvals,
            current_approvals: r.current_approvals(),
            rejections: r.rejections.len() as u32,
        }
    }
}

/// Recovery activity for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecoveryStatus {
    /// Pending and approved requests.
    pub active: Vec<RequestSummary>,
    /// Requests in a terminal status (completed, rejected or expired).
    pub completed: Vec<RequestSummary>,
    /// Requests created since midnight UTC.
    pub daily_attempts: u32,
    pub daily_limit: u32,
}

/// Reconstructed key material. Wiped on drop; `Debug` shows only the length.
pub struct RecoveredSecret(Zeroizing<Vec<u8>>);

impl RecoveredSecret {
    pub fn expose_secret(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RecoveredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoveredSecret([REDACTED; {}])", self.0.len())
    }
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub request_id: RequestId,
    pub request_type: RequestType,
    /// Present for key-recovery requests only.
    pub secret: Option<RecoveredSecret>,
}

pub struct RecoveryOrchestrator {
    config: RecoveryConfig,
    registry: Arc<GuardianRegistry>,
    machine: Arc<RecoveryStateMachine>,
    protection: ProtectionManager,
    notifier: NotificationDispatcher,
    backend: Backend,
    clock: Arc<dyn Clock>,
}

impl RecoveryOrchestrator {
    /// Build an orchestrator using the configured fractional quorum.
    pub fn new(
        config: RecoveryConfig,
        backend: Backend,
        channel: Arc<dyn GuardianChannel>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RecoveryError> {
        let quorum = Arc::new(FractionalQuorum::from_fraction(config.consensus_threshold));
        Self::with_quorum_policy(config, backend, channel, clock, quorum)
    }

    pub fn with_quorum_policy(
        config: RecoveryConfig,
        backend: Backend,
        channel: Arc<dyn GuardianChannel>,
        clock: Arc<dyn Clock>,
        quorum: Arc<dyn QuorumPolicy>,
    ) -> Result<Self, RecoveryError> {
        config.validate()?;
        let registry = Arc::new(GuardianRegistry::new(backend.guardians.clone(), quorum.clone()));
        let machine = Arc::new(RecoveryStateMachine::with_quorum_policy(
            backend.requests.clone(),
            clock.clone(),
            &config,
            quorum,
        ));
        let notifier = NotificationDispatcher::from_config(channel, &config);
        let protection = ProtectionManager::new(
            registry.clone(),
            backend.protections.clone(),
            backend.shards.clone(),
            notifier.clone(),
            clock.clone(),
        );
        info!(
            quorum = registry.quorum_policy().name(),
            rejection_policy = ?config.rejection_policy,
            max_daily_attempts = config.max_daily_attempts,
            "recovery orchestrator ready"
        );
        Ok(Self {
            config,
            registry,
            machine,
            protection,
            notifier,
            backend,
            clock,
        })
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn registry(&self) -> &GuardianRegistry {
        &self.registry
    }

    pub fn protection(&self) -> &ProtectionManager {
        &self.protection
    }

    /// Shared handle for background work such as the expiry sweeper.
    pub fn state_machine(&self) -> Arc<RecoveryStateMachine> {
        Arc::clone(&self.machine)
    }

    /// Start the expiry sweeper at the configured interval.
    pub fn spawn_sweeper(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        ExpirySweeper::spawn(
            self.state_machine(),
            self.clock.clone(),
            Duration::from_secs(self.config.sweep_interval_secs),
            shutdown,
        )
    }

    /// Open a new recovery request and notify its electorate.
    pub async fn initiate(
        &self,
        params: InitiateParams,
    ) -> Result<InitiatedRequest, RecoveryError> {
        let reason = params.reason.trim();
        if reason.is_empty() || reason.len() > MAX_REASON_LEN {
            return Err(RecoveryError::InvalidParameters(format!(
                "reason must be 1..={MAX_REASON_LEN} bytes"
            )));
        }
        check_authority(
            &params.account_id,
            params.account_role,
            params.request_type,
            params.recovery_method,
            params.elevated_approval,
        )?;

        let guardians = self.registry.resolve_guardians(&params.account_id)?;
        let (protection, electorate) = if params.request_type.requires_shards() {
            let protection = self.protection.active_protection(&params.account_id)?;
            let holders = self.shard_holders(&protection.id, &guardians)?;
            let threshold = protection.threshold_required as usize;
            if holders.len() < threshold {
                return Err(RecoveryError::InsufficientShards {
                    have: holders.len(),
                    need: threshold,
                });
            }
            (Some(protection), holders)
        } else {
            (None, guardians)
        };

        let quorum =
            self.registry
                .quorum_for(&params.account_id, &electorate, params.request_type)?;
        // Reconstruction needs `threshold` released shards; the electorate
        // holds at least that many, so the request stays reachable.
        let required = protection
            .as_ref()
            .map_or(quorum.required, |p| quorum.required.max(p.threshold_required));
        let protection_id = protection.map(|p| p.id);

        let now = self.clock.now();
        let request = RecoveryRequest {
            id: RequestId::random(),
            account_id: params.account_id.clone(),
            account_role: params.account_role,
            request_type: params.request_type,
            reason: reason.to_string(),
            urgency: params.urgency,
            recovery_method: params.recovery_method,
            status: RequestStatus::Pending,
            created_at: now,
            expires_at: now.plus_secs(self.config.ttl_for(params.request_type)),
            required_approvals: required,
            protection_id,
            approvals: BTreeMap::new(),
            rejections: BTreeMap::new(),
            version: 0,
        };
        self.machine.create(&request)?;

        self.notify(
            electorate,
            NoticeKind::RecoveryRequested,
            &request,
            &format!("{} ({} approvals needed)", request.request_type, required),
        );

        Ok(InitiatedRequest {
            request_id: request.id,
            required_approvals: required,
            guardian_count: quorum.guardian_count,
            expires_at: request.expires_at,
        })
    }

    /// Record a guardian's signed decision on a request.
    pub async fn approve(
        &self,
        request_id: &RequestId,
        approval: SignedApproval,
    ) -> Result<ApprovalOutcome, RecoveryError> {
        let request = self.machine.get(request_id)?;
        let guardian = self
            .registry
            .guardian(&request.account_id, &approval.guardian_id)?;

        match approval.decision {
            Decision::Approve => {
                self.check_released_shard(&request, &guardian, &approval)?;
                let electorate = self.electorate(&request)?;
                let outcome = self
                    .machine
                    .record_approval(request_id, &guardian, &approval, &electorate)
                    .await?;
                if outcome.reached_quorum {
                    self.notify_account(
                        &request,
                        NoticeKind::QuorumReached,
                        &format!(
                            "{} of {} approvals",
                            outcome.current_approvals, outcome.required_approvals
                        ),
                    );
                }
                Ok(outcome)
            }
            Decision::Reject => {
                let outcome = self
                    .machine
                    .record_rejection(request_id, &guardian, &approval)
                    .await?;
                if outcome.terminated {
                    self.notify_account(
                        &request,
                        NoticeKind::RequestRejected,
                        &format!("rejected by {}", guardian.guardian_id),
                    );
                }
                Ok(outcome)
            }
        }
    }

    /// Active and finished requests for `account`, plus today's attempt count.
    pub fn status(&self, account: &AccountId) -> Result<RecoveryStatus, RecoveryError> {
        let requests = self.backend.requests.requests_for_account(account)?;
        let day_start = self.clock.now().day_start();
        let daily_attempts = self.backend.requests.count_created_since(account, day_start)?;

        let (active, completed): (Vec<_>, Vec<_>) =
            requests.iter().partition(|r| r.status.is_active());
        Ok(RecoveryStatus {
            active: active.into_iter().map(RequestSummary::from).collect(),
            completed: completed.into_iter().map(RequestSummary::from).collect(),
            daily_attempts,
            daily_limit: self.config.max_daily_attempts,
        })
    }

    /// Finish an approved request.
    ///
    /// Key-recovery requests reconstruct the key from the shards guardians
    /// released with their approvals; other types only acknowledge that the
    /// external action was carried out. A reconstruction that does not match
    /// the generation's secret commitment fails and leaves the request
    /// `approved`.
    pub async fn execute(
        &self,
        request_id: &RequestId,
    ) -> Result<ExecutionResult, RecoveryError> {
        let protections = self.backend.protections.clone();
        let (request, secret) = self
            .machine
            .complete_with(request_id, |request| async move {
                let Some(protection_id) = request
                    .protection_id
                    .filter(|_| request.request_type.requires_shards())
                else {
                    return Ok::<_, RecoveryError>(None);
                };
                let expected = protections.get_protection(&protection_id)?.secret_commitment;
                let shards = released_shards(&request)?;
                let secret = tokio::task::spawn_blocking(move || reconstruct(&shards)).await??;
                if secret_commitment(&protection_id, &secret) != expected {
                    warn!(
                        request_id = %request.id,
                        protection_id = %protection_id,
                        "reconstructed key failed its commitment check"
                    );
                    return Err(RecoveryError::ReconstructionMismatch(protection_id.to_string()));
                }
                Ok(Some(RecoveredSecret(secret)))
            })
            .await?;

        if let Some(protection_id) = &request.protection_id {
            match self.backend.protections.increment_recovery_count(protection_id) {
                Ok(count) => {
                    info!(protection_id = %protection_id, recovery_count = count, "key recovered")
                }
                Err(e) => {
                    warn!(protection_id = %protection_id, error = %e, "recovery count not updated")
                }
            }
        }
        info!(
            request_id = %request_id,
            request_type = %request.request_type,
            reconstructed = secret.is_some(),
            "recovery request executed"
        );
        Ok(ExecutionResult {
            request_id: request.id,
            request_type: request.request_type,
            secret,
        })
    }

    /// Guardians of `guardians` holding a shard of generation `protection`.
    fn shard_holders(
        &self,
        protection: &ProtectionId,
        guardians: &[GuardianRecord],
    ) -> Result<Vec<GuardianRecord>, RecoveryError> {
        let mut holders = Vec::with_capacity(guardians.len());
        for g in guardians {
            if self.backend.shards.sealed_shard(protection, &g.guardian_id)?.is_some() {
                holders.push(g.clone());
            }
        }
        Ok(holders)
    }

    fn electorate(&self, request: &RecoveryRequest) -> Result<Vec<GuardianRecord>, RecoveryError> {
        let guardians = self.registry.resolve_guardians(&request.account_id)?;
        match request.protection_id {
            Some(protection) if request.request_type.requires_shards() => {
                self.shard_holders(&protection, &guardians)
            }
            _ => Ok(guardians),
        }
    }

    /// Key-recovery approvals must carry the approver's own shard of the
    /// targeted generation, byte for byte as it was sealed; other approvals
    /// carry none.
    fn check_released_shard(
        &self,
        request: &RecoveryRequest,
        guardian: &GuardianRecord,
        approval: &SignedApproval,
    ) -> Result<(), RecoveryError> {
        let protection_id = request
            .protection_id
            .filter(|_| request.request_type.requires_shards());
        let Some(protection_id) = protection_id else {
            if approval.shard.is_some() {
                return Err(RecoveryError::InvalidParameters(format!(
                    "{} approvals do not release shards",
                    request.request_type
                )));
            }
            return Ok(());
        };

        let bytes = approval.shard.as_ref().ok_or_else(|| {
            RecoveryError::InvalidParameters("key-recovery approval must release a shard".into())
        })?;
        let shard = decode_shard(bytes)?;
        let record = self.protection.sealed_shard(&protection_id, &guardian.guardian_id)?;
        if shard.index() != record.shard_index
            || shard.threshold() != record.threshold
            || shard.total() != record.total
            || shard_commitment(&protection_id, bytes) != record.commitment
        {
            return Err(RecoveryError::InvalidParameters(format!(
                "released shard does not match guardian {}'s shard record",
                guardian.guardian_id
            )));
        }
        Ok(())
    }

    fn notify(
        &self,
        recipients: Vec<GuardianRecord>,
        kind: NoticeKind,
        request: &RecoveryRequest,
        detail: &str,
    ) {
        let notice = GuardianNotice {
            kind,
            request_id: Some(request.id),
            protection_id: request.protection_id,
            urgency: request.urgency,
            summary: summarize(kind, request.account_id.as_str(), detail),
        };
        self.notifier.dispatch(recipients, notice);
    }

    /// Notify every active guardian of the request's account. A failed
    /// lookup is logged; it never fails the decision that triggered it.
    fn notify_account(&self, request: &RecoveryRequest, kind: NoticeKind, detail: &str) {
        match self.registry.resolve_guardians(&request.account_id) {
            Ok(guardians) => self.notify(guardians, kind, request, detail),
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "could not resolve guardians to notify")
            }
        }
    }
}

fn released_shards(request: &RecoveryRequest) -> Result<Vec<Shard>, RecoveryError> {
    request
        .approvals
        .values()
        .filter_map(|a| a.shard.as_deref())
        .map(|bytes| decode_shard(bytes).map_err(RecoveryError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovered_secret_debug_is_redacted() {
        let secret = RecoveredSecret(Zeroizing::new(b"super secret seed".to_vec()));
        let shown = format!("{secret:?}");
        assert_eq!(shown, "RecoveredSecret([REDACTED; 17])");
        assert_eq!(secret.expose_secret(), b"super secret seed");
    }

    #[test]
    fn summary_drops_signatures_and_shards() {
        use keyward_store::ApprovalRecord;
        use keyward_types::{GuardianId, Signature};

        let mut approvals = BTreeMap::new();
        approvals.insert(
            GuardianId::new("bob"),
            ApprovalRecord {
                guardian_id: GuardianId::new("bob"),
                signature: Signature([0x5A; 64]),
                shard: Some(vec![0xC3; 33]),
                issued_at: Timestamp::new(1),
                recorded_at: Timestamp::new(1),
            },
        );
        let request = RecoveryRequest {
            id: RequestId::new([1; 16]),
            account_id: AccountId::new("alice"),
            account_role: AccountRole::Adult,
            request_type: RequestType::KeyRecovery,
            reason: "lost".into(),
            urgency: Urgency::Low,
            recovery_method: RecoveryMethod::GuardianConsensus,
            status: RequestStatus::Pending,
            created_at: Timestamp::new(1),
            expires_at: Timestamp::new(2),
            required_approvals: 2,
            protection_id: None,
            approvals,
            rejections: BTreeMap::new(),
            version: 1,
        };
        let summary = RequestSummary::from(&request);
        assert_eq!(summary.current_approvals, 1);
        let shown = format!("{summary:?}");
        assert!(!shown.contains("90"));
        assert!(!shown.contains("195"));
    }
}
