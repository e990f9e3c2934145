use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid hex length: expected {expected} chars, got {got}")]
    InvalidHexLength { expected: usize, got: usize },

    #[error("malformed hex encoding")]
    MalformedHex,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("sealing failed")]
    Seal,

    #[error("opening sealed data failed: authentication check failed")]
    Open,
}
