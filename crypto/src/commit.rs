//! Commitments fixed when a key is protected.
//!
//! Each encoded shard and the protected secret itself are hashed under their
//! own domain tag and the protection id, so a commitment from one generation
//! never matches material from another. Released shards and reconstructed
//! keys are checked against them before anything is trusted.

use crate::hash::blake2b_256_multi;
use keyward_types::ProtectionId;

pub type Commitment = [u8; 32];

const SHARD_DOMAIN: &[u8] = b"keyward-shard-commitment-v1";
const SECRET_DOMAIN: &[u8] = b"keyward-secret-commitment-v1";

/// Commitment to one encoded shard (header and payload) of `protection`.
pub fn shard_commitment(protection: &ProtectionId, encoded_shard: &[u8]) -> Commitment {
    blake2b_256_multi(&[SHARD_DOMAIN, protection.as_bytes(), encoded_shard])
}

/// Commitment to the secret protected as `protection`.
pub fn secret_commitment(protection: &ProtectionId, secret: &[u8]) -> Commitment {
    blake2b_256_multi(&[SECRET_DOMAIN, protection.as_bytes(), secret])
}
