//! Guardian identity keys.
//!
//! A guardian is identified by a single Ed25519 key. It signs approval
//! decisions with it, and receives sealed shards on the same key's X25519
//! (Montgomery) form, so enrolling a guardian never needs a second key.

use crate::CryptoError;
use ed25519_dalek::{SigningKey, VerifyingKey};
use keyward_types::{KeyPair, PrivateKey, PublicKey};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

/// Fresh identity from the OS random source.
pub fn generate_keypair() -> KeyPair {
    let mut seed = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut seed[..]);
    keypair_from_seed(&seed)
}

/// Deterministic identity for a 32-byte seed. The seed is the private key.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing = SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing.verifying_key().to_bytes()),
        private: PrivateKey(*seed),
    }
}

/// The X25519 key shards are sealed to for the holder of `identity`.
pub fn sealing_public(identity: &PublicKey) -> Result<[u8; 32], CryptoError> {
    let verifying =
        VerifyingKey::from_bytes(identity.as_bytes()).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(verifying.to_montgomery().to_bytes())
}

/// X25519 secret matching [`sealing_public`] of the same identity.
pub(crate) fn sealing_secret(identity: &PrivateKey) -> StaticSecret {
    let scalar = Zeroizing::new(SigningKey::from_bytes(&identity.0).to_scalar_bytes());
    StaticSecret::from(*scalar)
}
