//! Background task that moves overdue requests to `Expired`.

use crate::state_machine::RecoveryStateMachine;
use keyward_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct ExpirySweeper;

impl ExpirySweeper {
    /// Sweep every `interval` until `shutdown` fires or its sender is dropped.
    ///
    /// Expiry goes through the state machine's per-request lock and version
    /// check, so several sweepers over one store never double-expire.
    pub fn spawn(
        machine: Arc<RecoveryStateMachine>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        info!("expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let now = clock.now();
                        match machine.expire_due(now).await {
                            Ok(expired) if !expired.is_empty() => {
                                info!(swept = expired.len(), %now, "expiry sweep finished");
                            }
                            Ok(_) => debug!(%now, "expiry sweep found nothing due"),
                            Err(e) => warn!(error = %e, "expiry sweep failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecoveryConfig;
    use keyward_nullables::{NullClock, NullStore};
    use keyward_store::{RecoveryRequest, RecoveryStore};
    use keyward_types::{
        AccountId, AccountRole, RecoveryMethod, RequestId, RequestStatus, RequestType, Timestamp,
        Urgency,
    };
    use std::collections::BTreeMap;

    fn request(now: Timestamp, ttl: u64) -> RecoveryRequest {
        RecoveryRequest {
            id: RequestId::random(),
            account_id: AccountId::new("alice"),
            account_role: AccountRole::Adult,
            request_type: RequestType::AccountRestoration,
            reason: "phone lost".into(),
            urgency: Urgency::Normal,
            recovery_method: RecoveryMethod::GuardianConsensus,
            status: RequestStatus::Pending,
            created_at: now,
            expires_at: now.plus_secs(ttl),
            required_approvals: 2,
            protection_id: None,
            approvals: BTreeMap::new(),
            rejections: BTreeMap::new(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn sweeps_until_shutdown() {
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::new(86_400 * 200));
        let machine = Arc::new(RecoveryStateMachine::from_config(
            store.clone(),
            clock.clone(),
            &RecoveryConfig::default(),
        ));

        let short = request(clock.now(), 10);
        let long = request(clock.now(), 10_000);
        machine.create(&short).unwrap();
        machine.create(&long).unwrap();
        clock.advance(11);

        let (tx, rx) = broadcast::channel(1);
        let handle = ExpirySweeper::spawn(machine, clock, Duration::from_millis(5), rx);

        for _ in 0..100 {
            if store.get_request(&short.id).unwrap().status == RequestStatus::Expired {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.get_request(&short.id).unwrap().status, RequestStatus::Expired);
        assert_eq!(store.get_request(&long.id).unwrap().status, RequestStatus::Pending);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
