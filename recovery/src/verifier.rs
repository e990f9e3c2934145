//! Guardian decision signatures.
//!
//! A guardian signs an [`ApprovalFingerprint`]: Blake2b-256 over a domain tag,
//! the request id, the request digest, the decision, the hash of any released
//! shard and the guardian's `issued_at`. The raw secret is never signed.
//!
//! Checks run in a fixed order: replay, signature format, freshness, then the
//! Ed25519 verification itself.

use crate::config::RecoveryConfig;
use crate::RecoveryError;
use keyward_crypto::{
    blake2b_256, blake2b_256_multi, parse_signature_hex, sign_message, verify_signature,
};
use keyward_store::{GuardianRecord, RecoveryRequest};
use keyward_types::{Decision, GuardianId, PrivateKey, PublicKey, RequestId, Signature, Timestamp};
use std::fmt;
use zeroize::Zeroizing;

const REQUEST_DIGEST_DOMAIN: &[u8] = b"keyward-request-v1";
const FINGERPRINT_DOMAIN: &[u8] = b"keyward-approval-v1";

/// Digest over the fields of a request that never change after creation.
pub trait RequestDigest {
    fn digest(&self) -> [u8; 32];
}

impl RequestDigest for RecoveryRequest {
    fn digest(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(128 + self.reason.len());
        put_field(&mut buf, REQUEST_DIGEST_DOMAIN);
        put_field(&mut buf, self.id.as_bytes());
        put_field(&mut buf, self.account_id.as_str().as_bytes());
        put_field(&mut buf, self.account_role.as_str().as_bytes());
        put_field(&mut buf, self.request_type.as_str().as_bytes());
        put_field(&mut buf, self.reason.as_bytes());
        put_field(&mut buf, self.urgency.as_str().as_bytes());
        put_field(&mut buf, self.recovery_method.as_str().as_bytes());
        buf.extend_from_slice(&self.created_at.as_secs().to_be_bytes());
        buf.extend_from_slice(&self.expires_at.as_secs().to_be_bytes());
        buf.extend_from_slice(&self.required_approvals.to_be_bytes());
        match &self.protection_id {
            Some(id) => {
                buf.push(1);
                buf.extend_from_slice(id.as_bytes());
            }
            None => buf.push(0),
        }
        blake2b_256(&buf)
    }
}

/// Length-prefix a variable field so adjacent fields cannot run together.
fn put_field(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// The 32-byte message a guardian signs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApprovalFingerprint([u8; 32]);

impl ApprovalFingerprint {
    pub fn new(
        request_id: &RequestId,
        request_digest: &[u8; 32],
        decision: Decision,
        shard: Option<&[u8]>,
        issued_at: Timestamp,
    ) -> Self {
        let shard_hash = shard.map(blake2b_256).unwrap_or([0u8; 32]);
        Self(blake2b_256_multi(&[
            FINGERPRINT_DOMAIN,
            request_id.as_bytes(),
            request_digest,
            &[decision.tag()],
            &shard_hash,
            &issued_at.as_secs().to_be_bytes(),
        ]))
    }

    pub fn for_request(
        request: &RecoveryRequest,
        decision: Decision,
        shard: Option<&[u8]>,
        issued_at: Timestamp,
    ) -> Self {
        Self::new(&request.id, &request.digest(), decision, shard, issued_at)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A guardian's signed decision on one request, as submitted to `approve`.
#[derive(Clone)]
pub struct SignedApproval {
    pub guardian_id: GuardianId,
    pub decision: Decision,
    /// Hex-encoded Ed25519 signature over the fingerprint.
    pub signature_hex: String,
    pub issued_at: Timestamp,
    /// Encoded shard released with a key-recovery approval.
    pub shard: Option<Zeroizing<Vec<u8>>>,
}

impl SignedApproval {
    /// Build and sign a decision on `request` (the guardian's side).
    pub fn sign(
        request: &RecoveryRequest,
        guardian_id: GuardianId,
        private_key: &PrivateKey,
        decision: Decision,
        shard: Option<Zeroizing<Vec<u8>>>,
        issued_at: Timestamp,
    ) -> Self {
        let fingerprint = ApprovalFingerprint::for_request(
            request,
            decision,
            shard.as_ref().map(|s| s.as_slice()),
            issued_at,
        );
        let signature = sign_message(fingerprint.as_bytes(), private_key);
        Self {
            guardian_id,
            decision,
            signature_hex: hex::encode(signature.as_bytes()),
            issued_at,
            shard,
        }
    }

    pub fn fingerprint(&self, request: &RecoveryRequest) -> ApprovalFingerprint {
        ApprovalFingerprint::for_request(
            request,
            self.decision,
            self.shard.as_ref().map(|s| s.as_slice()),
            self.issued_at,
        )
    }
}

impl fmt::Debug for SignedApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedApproval")
            .field("guardian_id", &self.guardian_id)
            .field("decision", &self.decision)
            .field("issued_at", &self.issued_at)
            .field("has_shard", &self.shard.is_some())
            .finish_non_exhaustive()
    }
}

/// Validates guardian decisions against a request.
#[derive(Clone, Copy, Debug)]
pub struct SignatureVerifier {
    max_signature_age_secs: u64,
    max_clock_skew_secs: u64,
}

impl SignatureVerifier {
    pub fn new(max_signature_age_secs: u64, max_clock_skew_secs: u64) -> Self {
        Self {
            max_signature_age_secs,
            max_clock_skew_secs,
        }
    }

    pub fn from_config(config: &RecoveryConfig) -> Self {
        Self::new(config.max_signature_age_secs, config.max_clock_skew_secs)
    }

    /// Plain Ed25519 verification of `message`.
    pub fn verify(&self, public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
        verify_signature(message, signature, public_key)
    }

    /// Run every check on `approval` and return the parsed signature.
    ///
    /// The Ed25519 verification runs on the blocking pool.
    pub async fn check_approval(
        &self,
        request: &RecoveryRequest,
        guardian: &GuardianRecord,
        approval: &SignedApproval,
        now: Timestamp,
    ) -> Result<Signature, RecoveryError> {
        check_replay(request, &approval.guardian_id)?;
        let signature = parse_signature_hex(&approval.signature_hex)?;
        self.check_freshness(approval.issued_at, now)?;

        let fingerprint = approval.fingerprint(request);
        let public_key = guardian.public_key;
        let sig = signature.clone();
        let valid = tokio::task::spawn_blocking(move || {
            verify_signature(fingerprint.as_bytes(), &sig, &public_key)
        })
        .await?;
        if !valid {
            return Err(RecoveryError::SignatureInvalid(format!(
                "signature from guardian {} does not verify",
                approval.guardian_id
            )));
        }
        Ok(signature)
    }

    /// `issued_at` must be no older than the maximum age and no further in
    /// the future than the allowed skew.
    pub fn check_freshness(
        &self,
        issued_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), RecoveryError> {
        if issued_at > now.plus_secs(self.max_clock_skew_secs) {
            return Err(RecoveryError::SignatureInvalid(format!(
                "issued_at {issued_at} is ahead of now {now}"
            )));
        }
        if issued_at.elapsed_since(now) > self.max_signature_age_secs {
            return Err(RecoveryError::SignatureInvalid(format!(
                "issued_at {issued_at} is older than {}s",
                self.max_signature_age_secs
            )));
        }
        Ok(())
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::from_config(&RecoveryConfig::default())
    }
}

/// A guardian may answer a request once, approve or reject.
pub(crate) fn check_replay(
    request: &RecoveryRequest,
    guardian: &GuardianId,
) -> Result<(), RecoveryError> {
    if request.has_responded(guardian) {
        return Err(RecoveryError::DuplicateApproval {
            request: request.id.to_string(),
            guardian: guardian.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_crypto::generate_keypair;
    use keyward_store::ApprovalRecord;
    use keyward_types::{
        AccountId, AccountRole, KeyPair, RecoveryMethod, RequestStatus, RequestType, Urgency,
    };
    use std::collections::BTreeMap;

    const NOW: u64 = 1_700_000_000;

    fn request() -> RecoveryRequest {
        RecoveryRequest {
            id: RequestId::new([7; 16]),
            account_id: AccountId::new("alice"),
            account_role: AccountRole::Adult,
            request_type: RequestType::AccountRestoration,
            reason: "phone lost".into(),
            urgency: Urgency::High,
            recovery_method: RecoveryMethod::GuardianConsensus,
            status: RequestStatus::Pending,
            created_at: Timestamp::new(NOW - 100),
            expires_at: Timestamp::new(NOW + 3_600),
            required_approvals: 2,
            protection_id: None,
            approvals: BTreeMap::new(),
            rejections: BTreeMap::new(),
            version: 0,
        }
    }

    fn guardian(kp: &KeyPair) -> GuardianRecord {
        GuardianRecord {
            account_id: AccountId::new("alice"),
            guardian_id: GuardianId::new("bob"),
            public_key: kp.public,
            contact: "npub-bob".into(),
            role: AccountRole::Steward,
            active: true,
            added_at: Timestamp::new(0),
        }
    }

    fn approve(req: &RecoveryRequest, kp: &KeyPair, issued_at: u64) -> SignedApproval {
        SignedApproval::sign(
            req,
            GuardianId::new("bob"),
            &kp.private,
            Decision::Approve,
            None,
            Timestamp::new(issued_at),
        )
    }

    #[test]
    fn digest_ignores_mutable_fields() {
        let req = request();
        let mut later = req.clone();
        later.status = RequestStatus::Approved;
        later.version = 9;
        later.rejections.insert(GuardianId::new("carol"), Timestamp::new(NOW));
        assert_eq!(req.digest(), later.digest());

        let mut other = req.clone();
        other.reason = "different".into();
        assert_ne!(req.digest(), other.digest());
    }

    #[test]
    fn fingerprint_binds_decision_and_shard() {
        let req = request();
        let at = Timestamp::new(NOW);
        let approve = ApprovalFingerprint::for_request(&req, Decision::Approve, None, at);
        let reject = ApprovalFingerprint::for_request(&req, Decision::Reject, None, at);
        let with_shard =
            ApprovalFingerprint::for_request(&req, Decision::Approve, Some(b"shard"), at);
        assert_ne!(approve, reject);
        assert_ne!(approve, with_shard);
    }

    #[tokio::test]
    async fn valid_approval_passes() {
        let kp = generate_keypair();
        let req = request();
        let approval = approve(&req, &kp, NOW);
        let verifier = SignatureVerifier::default();
        let sig = verifier
            .check_approval(&req, &guardian(&kp), &approval, Timestamp::new(NOW))
            .await
            .unwrap();
        assert!(verifier.verify(
            &kp.public,
            &sig,
            approval.fingerprint(&req).as_bytes()
        ));
    }

    #[tokio::test]
    async fn replay_is_reported_before_format() {
        let kp = generate_keypair();
        let mut req = request();
        req.approvals.insert(
            GuardianId::new("bob"),
            ApprovalRecord {
                guardian_id: GuardianId::new("bob"),
                signature: Signature([0; 64]),
                shard: None,
                issued_at: Timestamp::new(NOW),
                recorded_at: Timestamp::new(NOW),
            },
        );
        let mut approval = approve(&req, &kp, NOW);
        approval.signature_hex = "zz".into();
        let err = SignatureVerifier::default()
            .check_approval(&req, &guardian(&kp), &approval, Timestamp::new(NOW))
            .await
            .unwrap_err();
        assert!(matches!(err, RecoveryError::DuplicateApproval { .. }));
    }

    #[tokio::test]
    async fn short_hex_is_invalid_parameters() {
        let kp = generate_keypair();
        let req = request();
        let mut approval = approve(&req, &kp, NOW);
        approval.signature_hex.truncate(127);
        let err = SignatureVerifier::default()
            .check_approval(&req, &guardian(&kp), &approval, Timestamp::new(NOW))
            .await
            .unwrap_err();
        assert!(matches!(err, RecoveryError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn stale_and_future_signatures_are_invalid() {
        let kp = generate_keypair();
        let req = request();
        let verifier = SignatureVerifier::new(900, 60);
        for issued in [NOW - 901, NOW + 61] {
            let approval = approve(&req, &kp, issued);
            let err = verifier
                .check_approval(&req, &guardian(&kp), &approval, Timestamp::new(NOW))
                .await
                .unwrap_err();
            assert!(matches!(err, RecoveryError::SignatureInvalid(_)), "issued {issued}");
        }
        // boundaries are inclusive
        for issued in [NOW - 900, NOW + 60] {
            let approval = approve(&req, &kp, issued);
            assert!(verifier
                .check_approval(&req, &guardian(&kp), &approval, Timestamp::new(NOW))
                .await
                .is_ok());
        }
    }

    #[tokio::test]
    async fn wrong_key_or_tampered_request_fails() {
        let kp = generate_keypair();
        let other = generate_keypair();
        let req = request();
        let approval = approve(&req, &other, NOW);
        let err = SignatureVerifier::default()
            .check_approval(&req, &guardian(&kp), &approval, Timestamp::new(NOW))
            .await
            .unwrap_err();
        assert!(matches!(err, RecoveryError::SignatureInvalid(_)));

        let approval = approve(&req, &kp, NOW);
        let mut tampered = req.clone();
        tampered.required_approvals = 1;
        let err = SignatureVerifier::default()
            .check_approval(&tampered, &guardian(&kp), &approval, Timestamp::new(NOW))
            .await
            .unwrap_err();
        assert!(matches!(err, RecoveryError::SignatureInvalid(_)));
    }

    #[test]
    fn debug_hides_shard_and_signature() {
        let kp = generate_keypair();
        let mut approval = approve(&request(), &kp, NOW);
        approval.shard = Some(Zeroizing::new(vec![0xAB; 8]));
        let shown = format!("{approval:?}");
        assert!(shown.contains("has_shard: true"));
        assert!(!shown.contains(&approval.signature_hex));
        assert!(!shown.contains("171"));
    }
}
