//! Key protection setup and rotation.
//!
//! Protecting a key splits it among the account's guardians and seals each
//! shard to its holder, so the store only ever sees ciphertext and
//! commitments. Every call creates a new generation and archives the previous
//! one in the same store write; existing shard sets are never rewritten.

use crate::notify::{summarize, NotificationDispatcher};
use crate::state_machine::MAX_UPDATE_RETRIES;
use crate::RecoveryError;
use keyward_crypto::{open_sealed, seal_to, secret_commitment, shard_commitment};
use keyward_guardians::{GuardianNotice, GuardianRegistry, NoticeKind};
use keyward_sharing::{decode_shard, encode_shard, split, Shard, SplitPolicy};
use keyward_store::{
    GuardianRecord, ProtectionMetadata, ProtectionStore, SealedShardRecord, ShardStore, StoreError,
};
use keyward_types::{AccountId, Clock, GuardianId, PrivateKey, ProtectionId, Timestamp, Urgency};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

pub struct ProtectionManager {
    registry: Arc<GuardianRegistry>,
    protections: Arc<dyn ProtectionStore>,
    shards: Arc<dyn ShardStore>,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl ProtectionManager {
    pub fn new(
        registry: Arc<GuardianRegistry>,
        protections: Arc<dyn ProtectionStore>,
        shards: Arc<dyn ShardStore>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            protections,
            shards,
            notifier,
            clock,
        }
    }

    /// Shard `secret` among `guardians`, any `threshold` of whom can restore it.
    ///
    /// Every guardian must be an active guardian of `account`. The new
    /// generation becomes the account's active protection.
    pub async fn protect(
        &self,
        account: &AccountId,
        secret: &[u8],
        guardians: &[GuardianId],
        threshold: usize,
        policy: SplitPolicy,
    ) -> Result<ProtectionMetadata, RecoveryError> {
        if guardians.is_empty() {
            return Err(RecoveryError::NoGuardiansConfigured(account.to_string()));
        }
        let unique: BTreeSet<&GuardianId> = guardians.iter().collect();
        if unique.len() != guardians.len() {
            return Err(RecoveryError::InvalidParameters(
                "a guardian may hold only one shard per generation".into(),
            ));
        }
        let holders = guardians
            .iter()
            .map(|g| self.registry.guardian(account, g))
            .collect::<Result<Vec<GuardianRecord>, _>>()?;

        let now = self.clock.now();
        let protection_id = ProtectionId::random();
        let commitment = secret_commitment(&protection_id, secret);

        let secret = Zeroizing::new(secret.to_vec());
        let total = holders.len();
        let sealing_for = holders.clone();
        let owner = account.clone();
        let records = tokio::task::spawn_blocking(move || {
            let shards = split(&secret, total, threshold, policy)?;
            shards
                .iter()
                .zip(sealing_for.iter())
                .map(|(shard, guardian)| -> Result<SealedShardRecord, RecoveryError> {
                    let encoded = Zeroizing::new(encode_shard(shard));
                    Ok(SealedShardRecord {
                        guardian_id: guardian.guardian_id.clone(),
                        protection_id,
                        account_id: owner.clone(),
                        shard_index: shard.index(),
                        threshold: shard.threshold(),
                        total: shard.total(),
                        sealed: seal_to(&encoded, &guardian.public_key)?,
                        commitment: shard_commitment(&protection_id, &encoded),
                        created_at: now,
                    })
                })
                .collect::<Result<Vec<_>, RecoveryError>>()
        })
        .await??;

        let mut metadata = ProtectionMetadata {
            id: protection_id,
            account_id: account.clone(),
            generation: 0,
            guardian_count: total as u32,
            threshold_required: threshold as u32,
            secret_commitment: commitment,
            active: true,
            shards_stored: true,
            recovery_count: 0,
            created_at: now,
            archived_at: None,
        };
        let archived = self.store_generation(&mut metadata, &records, now)?;
        let generation = metadata.generation;
        info!(
            account = %account,
            protection_id = %protection_id,
            generation,
            guardians = total,
            threshold,
            archived = ?archived,
            "key protection stored"
        );

        self.notifier.dispatch(
            holders,
            GuardianNotice {
                kind: NoticeKind::ProtectionSetup,
                request_id: None,
                protection_id: Some(protection_id),
                urgency: Urgency::Normal,
                summary: summarize(
                    NoticeKind::ProtectionSetup,
                    account.as_str(),
                    &format!("generation {generation}, {threshold} of {total} needed"),
                ),
            },
        );
        Ok(metadata)
    }

    /// Write the generation after the account's latest, together with its
    /// shards. Another `protect` taking that number first is retried from a
    /// fresh read.
    fn store_generation(
        &self,
        metadata: &mut ProtectionMetadata,
        records: &[SealedShardRecord],
        now: Timestamp,
    ) -> Result<Option<ProtectionId>, RecoveryError> {
        for attempt in 0..MAX_UPDATE_RETRIES {
            metadata.generation = self
                .protections
                .protection_history(&metadata.account_id)?
                .last()
                .map_or(1, |p| p.generation + 1);
            match self.protections.rotate_protection(metadata, records, now) {
                Ok(archived) => return Ok(archived),
                Err(StoreError::Conflict { expected, found }) => {
                    debug!(
                        account = %metadata.account_id,
                        attempt,
                        expected,
                        found,
                        "generation taken concurrently, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(RecoveryError::Internal(format!(
            "generation for {} kept changing; gave up after {MAX_UPDATE_RETRIES} attempts",
            metadata.account_id
        )))
    }

    pub fn active_protection(
        &self,
        account: &AccountId,
    ) -> Result<ProtectionMetadata, RecoveryError> {
        self.protections
            .active_protection(account)?
            .ok_or_else(|| RecoveryError::NoActiveProtection(account.to_string()))
    }

    /// All generations for `account`, oldest first.
    pub fn history(&self, account: &AccountId) -> Result<Vec<ProtectionMetadata>, RecoveryError> {
        Ok(self.protections.protection_history(account)?)
    }

    /// The sealed shard `guardian` holds in generation `protection`.
    pub fn sealed_shard(
        &self,
        protection: &ProtectionId,
        guardian: &GuardianId,
    ) -> Result<SealedShardRecord, RecoveryError> {
        self.shards
            .sealed_shard(protection, guardian)?
            .ok_or_else(|| {
                RecoveryError::InvalidParameters(format!(
                    "guardian {guardian} holds no shard of protection {protection}"
                ))
            })
    }
}

/// Open a sealed shard with the holder's private key.
///
/// The decoded shard must match the metadata stored beside the ciphertext.
pub fn open_sealed_shard(
    guardian_private: &PrivateKey,
    record: &SealedShardRecord,
) -> Result<Shard, RecoveryError> {
    let plaintext = open_sealed(&record.sealed, guardian_private)?;
    let shard = decode_shard(&plaintext)?;
    if shard.index() != record.shard_index
        || shard.threshold() != record.threshold
        || shard.total() != record.total
    {
        return Err(RecoveryError::InvalidParameters(
            "sealed shard does not match its record".into(),
        ));
    }
    Ok(shard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_crypto::generate_keypair;
    use keyward_guardians::FractionalQuorum;
    use keyward_nullables::{NullChannel, NullClock, NullStore};
    use keyward_sharing::reconstruct;
    use keyward_types::{AccountRole, KeyPair, Timestamp};
    use std::time::Duration;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    struct Fixture {
        manager: ProtectionManager,
        registry: Arc<GuardianRegistry>,
        channel: Arc<NullChannel>,
        keys: Vec<(GuardianId, KeyPair)>,
    }

    fn fixture(names: &[&str]) -> Fixture {
        let store = Arc::new(NullStore::new());
        let channel = Arc::new(NullChannel::new());
        let clock = Arc::new(NullClock::new(1_700_000_000));
        let registry = Arc::new(GuardianRegistry::new(
            store.clone(),
            Arc::new(FractionalQuorum::from_fraction(0.75)),
        ));
        let mut keys = Vec::new();
        for name in names {
            let kp = generate_keypair();
            registry
                .register(GuardianRecord {
                    account_id: AccountId::new("alice"),
                    guardian_id: GuardianId::new(*name),
                    public_key: kp.public,
                    contact: format!("npub-{name}"),
                    role: AccountRole::Adult,
                    active: true,
                    added_at: Timestamp::new(0),
                })
                .unwrap();
            keys.push((GuardianId::new(*name), kp));
        }
        let notifier = NotificationDispatcher::new(channel.clone(), 0, Duration::ZERO);
        let manager = ProtectionManager::new(
            registry.clone(),
            store.clone(),
            store,
            notifier,
            clock,
        );
        Fixture {
            manager,
            registry,
            channel,
            keys,
        }
    }

    fn ids(f: &Fixture) -> Vec<GuardianId> {
        f.keys.iter().map(|(id, _)| id.clone()).collect()
    }

    #[tokio::test]
    async fn guardians_can_open_and_reconstruct() {
        let f = fixture(&["bob", "carol", "dave"]);
        let alice = AccountId::new("alice");
        let meta = f
            .manager
            .protect(&alice, SECRET, &ids(&f), 2, SplitPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(meta.generation, 1);
        assert_eq!(meta.guardian_count, 3);
        assert_eq!(meta.threshold_required, 2);

        let opened: Vec<Shard> = f.keys[1..]
            .iter()
            .map(|(id, kp)| {
                let record = f.manager.sealed_shard(&meta.id, id).unwrap();
                open_sealed_shard(&kp.private, &record).unwrap()
            })
            .collect();
        assert_eq!(reconstruct(&opened).unwrap().as_slice(), SECRET);
    }

    #[tokio::test]
    async fn records_commit_to_shards_and_secret() {
        let f = fixture(&["bob", "carol", "dave"]);
        let meta = f
            .manager
            .protect(&AccountId::new("alice"), SECRET, &ids(&f), 2, SplitPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(meta.secret_commitment, secret_commitment(&meta.id, SECRET));
        assert_ne!(meta.secret_commitment, secret_commitment(&meta.id, b"another key"));

        for (id, kp) in &f.keys {
            let record = f.manager.sealed_shard(&meta.id, id).unwrap();
            let shard = open_sealed_shard(&kp.private, &record).unwrap();
            assert_eq!(record.commitment, shard_commitment(&meta.id, &encode_shard(&shard)));
        }
    }

    #[tokio::test]
    async fn a_guardian_cannot_open_anothers_shard() {
        let f = fixture(&["bob", "carol"]);
        let meta = f
            .manager
            .protect(&AccountId::new("alice"), SECRET, &ids(&f), 2, SplitPolicy::Strict)
            .await
            .unwrap();
        let carols = f.manager.sealed_shard(&meta.id, &f.keys[1].0).unwrap();
        assert!(matches!(
            open_sealed_shard(&f.keys[0].1.private, &carols),
            Err(RecoveryError::InvalidParameters(_))
        ));
    }

    #[tokio::test]
    async fn rotation_archives_the_previous_generation() {
        let f = fixture(&["bob", "carol", "dave"]);
        let alice = AccountId::new("alice");
        let first = f
            .manager
            .protect(&alice, SECRET, &ids(&f), 2, SplitPolicy::Strict)
            .await
            .unwrap();
        let second = f
            .manager
            .protect(&alice, SECRET, &ids(&f), 3, SplitPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(second.generation, 2);
        assert_eq!(f.manager.active_protection(&alice).unwrap().id, second.id);

        let history = f.manager.history(&alice).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
        assert!(!history[0].active);
        // archived shards stay readable for in-flight recoveries
        assert!(f.manager.sealed_shard(&first.id, &f.keys[0].0).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_protections_take_distinct_generations() {
        let f = Arc::new(fixture(&["bob", "carol", "dave"]));
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move {
                    let alice = AccountId::new("alice");
                    let guardians = ids(&f);
                    f.manager
                        .protect(&alice, SECRET, &guardians, 2, SplitPolicy::Strict)
                        .await
                })
            })
            .collect();
        let mut generations = Vec::new();
        for task in tasks {
            generations.push(task.await.unwrap().unwrap().generation);
        }
        generations.sort_unstable();
        assert_eq!(generations, vec![1, 2, 3, 4]);

        let history = f.manager.history(&AccountId::new("alice")).unwrap();
        assert_eq!(history.iter().filter(|p| p.active).count(), 1);
        assert_eq!(history.last().map(|p| p.active), Some(true));
    }

    #[tokio::test]
    async fn rejects_unknown_or_inactive_guardians() {
        let f = fixture(&["bob", "carol"]);
        let alice = AccountId::new("alice");
        let mut guardians = ids(&f);
        guardians.push(GuardianId::new("stranger"));
        assert!(matches!(
            f.manager.protect(&alice, SECRET, &guardians, 2, SplitPolicy::Strict).await,
            Err(RecoveryError::GuardianNotFound { .. })
        ));

        f.registry.deactivate(&alice, &GuardianId::new("carol")).unwrap();
        assert!(matches!(
            f.manager.protect(&alice, SECRET, &ids(&f), 2, SplitPolicy::Strict).await,
            Err(RecoveryError::GuardianNotFound { .. })
        ));
        assert!(matches!(
            f.manager.active_protection(&alice),
            Err(RecoveryError::NoActiveProtection(_))
        ));
    }

    #[tokio::test]
    async fn rejects_bad_thresholds_and_duplicates() {
        let f = fixture(&["bob", "carol"]);
        let alice = AccountId::new("alice");
        for t in [0, 3] {
            assert!(matches!(
                f.manager.protect(&alice, SECRET, &ids(&f), t, SplitPolicy::Strict).await,
                Err(RecoveryError::InvalidParameters(_))
            ));
        }
        let dup = vec![GuardianId::new("bob"), GuardianId::new("bob")];
        assert!(matches!(
            f.manager.protect(&alice, SECRET, &dup, 1, SplitPolicy::Strict).await,
            Err(RecoveryError::InvalidParameters(_))
        ));
        assert!(matches!(
            f.manager.protect(&alice, SECRET, &[], 1, SplitPolicy::Strict).await,
            Err(RecoveryError::NoGuardiansConfigured(_))
        ));
    }

    #[tokio::test]
    async fn holders_are_notified_without_shard_content() {
        let f = fixture(&["bob", "carol"]);
        let meta = f
            .manager
            .protect(&AccountId::new("alice"), SECRET, &ids(&f), 2, SplitPolicy::Strict)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let notices = f.channel.delivered_to("npub-bob");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::ProtectionSetup);
        assert_eq!(notices[0].protection_id, Some(meta.id));
        assert!(!notices[0].summary.contains("0123456789"));
    }
}
