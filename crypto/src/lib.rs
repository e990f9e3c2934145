//! Cryptographic primitives for keyward.
//!
//! - **Ed25519** for guardian approval signatures
//! - **Blake2b** for request digests, approval fingerprints and shard commitments
//! - **X25519 + ChaCha20-Poly1305** for sealing shards to individual guardians

pub mod commit;
pub mod error;
pub mod hash;
pub mod keys;
pub mod seal;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use commit::{secret_commitment, shard_commitment, Commitment};
pub use keys::{generate_keypair, keypair_from_seed, sealing_public};
pub use seal::{open_sealed, seal_to, SealedBox};
pub use sign::{parse_public_key_hex, parse_signature_hex, sign_message, verify_signature};
