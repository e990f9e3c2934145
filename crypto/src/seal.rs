//! Sealing data to a guardian's Ed25519 identity.
//!
//! The sender draws an ephemeral X25519 secret, runs Diffie-Hellman against
//! the recipient's X25519 form of their Ed25519 key, derives a symmetric key
//! with Blake2b and encrypts with ChaCha20-Poly1305. The nonce is the first
//! 12 bytes of the ephemeral public key, unique per sealing.

use crate::hash::blake2b_256_multi;
use crate::keys::{sealing_public, sealing_secret};
use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use keyward_types::{PrivateKey, PublicKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

const SEAL_CONTEXT: &[u8] = b"keyward-shard-seal-v1";

/// Ciphertext sealed to one recipient, plus the ephemeral key needed to open it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    pub ephemeral_public: [u8; 32],
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Debug for SealedBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBox")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Seal `plaintext` so that only the holder of `recipient`'s private key can open it.
pub fn seal_to(plaintext: &[u8], recipient: &PublicKey) -> Result<SealedBox, CryptoError> {
    let recipient_x = sealing_public(recipient)?;

    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519Public::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&X25519Public::from(recipient_x));

    let cipher = cipher_for(shared.as_bytes(), ephemeral_public.as_bytes(), &recipient_x);
    let ciphertext = cipher
        .encrypt(nonce_for(ephemeral_public.as_bytes()), plaintext)
        .map_err(|_| CryptoError::Seal)?;

    Ok(SealedBox {
        ephemeral_public: *ephemeral_public.as_bytes(),
        ciphertext,
    })
}

/// Open a box sealed to the owner of `recipient_private`.
pub fn open_sealed(
    sealed: &SealedBox,
    recipient_private: &PrivateKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let secret = sealing_secret(recipient_private);
    let recipient_x = X25519Public::from(&secret);
    let shared = secret.diffie_hellman(&X25519Public::from(sealed.ephemeral_public));

    let cipher = cipher_for(
        shared.as_bytes(),
        &sealed.ephemeral_public,
        recipient_x.as_bytes(),
    );
    cipher
        .decrypt(
            nonce_for(&sealed.ephemeral_public),
            sealed.ciphertext.as_slice(),
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Open)
}

fn cipher_for(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> ChaCha20Poly1305 {
    let sym_key = Zeroizing::new(blake2b_256_multi(&[
        SEAL_CONTEXT,
        shared,
        ephemeral,
        recipient,
    ]));
    ChaCha20Poly1305::new(Key::from_slice(sym_key.as_slice()))
}

fn nonce_for(ephemeral: &[u8; 32]) -> &Nonce {
    Nonce::from_slice(&ephemeral[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn seal_open_roundtrip() {
        let guardian = generate_keypair();
        let sealed = seal_to(b"shard bytes", &guardian.public).unwrap();

        // plaintext + 16-byte Poly1305 tag
        assert_eq!(sealed.ciphertext.len(), 11 + 16);

        let opened = open_sealed(&sealed, &guardian.private).unwrap();
        assert_eq!(opened.as_slice(), b"shard bytes");
    }

    #[test]
    fn wrong_recipient_fails() {
        let guardian = keypair_from_seed(&[1u8; 32]);
        let other = keypair_from_seed(&[2u8; 32]);
        let sealed = seal_to(b"payload", &guardian.public).unwrap();
        assert_eq!(
            open_sealed(&sealed, &other.private).unwrap_err(),
            CryptoError::Open
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let guardian = generate_keypair();
        let mut sealed = seal_to(b"payload", &guardian.public).unwrap();
        sealed.ciphertext[0] ^= 0xFF;
        assert!(open_sealed(&sealed, &guardian.private).is_err());
    }

    #[test]
    fn each_seal_uses_fresh_ephemeral_key() {
        let guardian = generate_keypair();
        let a = seal_to(b"same", &guardian.public).unwrap();
        let b = seal_to(b"same", &guardian.public).unwrap();
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn debug_hides_ciphertext() {
        let guardian = generate_keypair();
        let sealed = seal_to(b"secret", &guardian.public).unwrap();
        let shown = format!("{:?}", sealed);
        assert!(shown.contains("ciphertext_len"));
        assert!(!shown.contains("ephemeral_public"));
    }
}
