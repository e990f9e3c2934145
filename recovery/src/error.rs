use keyward_crypto::CryptoError;
use keyward_guardians::GuardianError;
use keyward_sharing::ShardingError;
use keyward_store::StoreError;
use keyward_types::RequestStatus;
use thiserror::Error;

/// Errors surfaced by the recovery core.
///
/// Messages carry identifiers and counts only; never signatures, shard
/// payloads or key material.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("recovery request not found: {0}")]
    RequestNotFound(String),

    #[error("guardian {guardian} is not an active guardian of account {account}")]
    GuardianNotFound { account: String, guardian: String },

    #[error("recovery request {0} is expired or no longer accepting decisions")]
    RequestExpired(String),

    #[error("daily recovery attempt limit reached: {attempts} of {limit}")]
    RateLimitExceeded { attempts: u32, limit: u32 },

    #[error("insufficient shards: have {have}, need {need}")]
    InsufficientShards { have: usize, need: usize },

    #[error("shards disagree on threshold, share count or payload length")]
    ThresholdMismatch,

    #[error("guardian signature rejected: {0}")]
    SignatureInvalid(String),

    #[error("guardian {guardian} already responded to request {request}")]
    DuplicateApproval { request: String, guardian: String },

    #[error("account {0} has no active guardians configured")]
    NoGuardiansConfigured(String),

    #[error("insufficient authority: {0}")]
    InsufficientAuthority(String),

    #[error("account {0} has no active key protection")]
    NoActiveProtection(String),

    #[error("reconstructed key does not match protection {0}")]
    ReconstructionMismatch(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ShardingError> for RecoveryError {
    fn from(e: ShardingError) -> Self {
        match e {
            ShardingError::InvalidParameters(msg) => Self::InvalidParameters(msg),
            ShardingError::InsufficientShards { have, need } => {
                Self::InsufficientShards { have, need }
            }
            ShardingError::ThresholdMismatch => Self::ThresholdMismatch,
        }
    }
}

impl From<GuardianError> for RecoveryError {
    fn from(e: GuardianError) -> Self {
        match e {
            GuardianError::NoGuardiansConfigured(account) => Self::NoGuardiansConfigured(account),
            GuardianError::GuardianNotFound { account, guardian } => {
                Self::GuardianNotFound { account, guardian }
            }
            GuardianError::InvalidEnrollment(msg) => Self::InvalidParameters(msg),
            GuardianError::Store(e) => Self::Store(e),
        }
    }
}

impl From<CryptoError> for RecoveryError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidHexLength { .. }
            | CryptoError::MalformedHex
            | CryptoError::InvalidPublicKey
            | CryptoError::Open => Self::InvalidParameters(e.to_string()),
            CryptoError::Seal => Self::Internal(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for RecoveryError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {e}"))
    }
}
