use keyward_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("account {0} has no active guardians configured")]
    NoGuardiansConfigured(String),

    #[error("guardian {guardian} is not an active guardian of account {account}")]
    GuardianNotFound { account: String, guardian: String },

    #[error("invalid guardian enrollment: {0}")]
    InvalidEnrollment(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
