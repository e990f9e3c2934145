//! Best-effort guardian notifications.
//!
//! Notices fan out concurrently, one task per guardian, each retried with a
//! fixed backoff. Dispatch is spawned, so a slow or failing channel never
//! holds up request creation or approval; outcomes are only logged and
//! collected in a [`DeliveryReport`].

use crate::config::RecoveryConfig;
use futures_util::future::join_all;
use keyward_guardians::{DeliveryOutcome, GuardianChannel, GuardianNotice, NoticeKind};
use keyward_store::GuardianRecord;
use keyward_types::GuardianId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-guardian results of one notice fan-out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<GuardianId>,
    /// Guardians whose every attempt failed, with the last failure reason.
    pub failed: Vec<(GuardianId, String)>,
    /// Total send attempts across all guardians.
    pub attempts: u32,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    channel: Arc<dyn GuardianChannel>,
    retries: u32,
    backoff: Duration,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn GuardianChannel>, retries: u32, backoff: Duration) -> Self {
        Self {
            channel,
            retries,
            backoff,
        }
    }

    pub fn from_config(channel: Arc<dyn GuardianChannel>, config: &RecoveryConfig) -> Self {
        Self::new(
            channel,
            config.notification_retries,
            Duration::from_millis(config.notification_backoff_ms),
        )
    }

    /// Spawn delivery of `notice` to every recipient and return immediately.
    pub fn dispatch(
        &self,
        recipients: Vec<GuardianRecord>,
        notice: GuardianNotice,
    ) -> JoinHandle<DeliveryReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.deliver(&recipients, &notice).await })
    }

    /// Deliver `notice` to every recipient concurrently and wait for the report.
    pub async fn deliver(
        &self,
        recipients: &[GuardianRecord],
        notice: &GuardianNotice,
    ) -> DeliveryReport {
        let sends = recipients.iter().map(|g| async move {
            let (outcome, attempts) = self.deliver_one(&g.contact, notice).await;
            (g.guardian_id.clone(), outcome, attempts)
        });

        let mut report = DeliveryReport::default();
        for (guardian, outcome, attempts) in join_all(sends).await {
            report.attempts += attempts;
            match outcome {
                DeliveryOutcome::Delivered => report.delivered.push(guardian),
                DeliveryOutcome::Failed(reason) => {
                    warn!(
                        guardian = %guardian,
                        kind = ?notice.kind,
                        attempts,
                        %reason,
                        "guardian notification dropped"
                    );
                    report.failed.push((guardian, reason));
                }
            }
        }
        debug!(
            kind = ?notice.kind,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "notification fan-out finished"
        );
        report
    }

    async fn deliver_one(&self, contact: &str, notice: &GuardianNotice) -> (DeliveryOutcome, u32) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.channel.notify(contact, notice).await;
            if outcome.is_delivered() || attempts > self.retries {
                return (outcome, attempts);
            }
            tokio::time::sleep(self.backoff).await;
        }
    }
}

/// Summary line for a notice. Identifiers and urgency only.
pub fn summarize(kind: NoticeKind, subject: &str, detail: &str) -> String {
    let headline = match kind {
        NoticeKind::RecoveryRequested => "recovery requested",
        NoticeKind::QuorumReached => "guardian quorum reached",
        NoticeKind::RequestRejected => "recovery request rejected",
        NoticeKind::ProtectionSetup => "you now hold a key shard",
    };
    format!("{headline} for {subject}: {detail}")
}
