//! Ed25519 message signing, verification and wire-format parsing.
//!
//! Signatures arrive hex-encoded. Parsing validates the exact length and the
//! alphabet before any curve arithmetic runs.

use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use keyward_types::{PrivateKey, PublicKey, Signature};

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Uses `ed25519-dalek`'s standard verification, which rejects non-canonical
/// signatures. Returns `false` for an invalid public key.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Parse a 128-char hex signature.
pub fn parse_signature_hex(s: &str) -> Result<Signature, CryptoError> {
    let bytes: [u8; 64] = decode_fixed(s)?;
    Ok(Signature(bytes))
}

/// Parse a 64-char hex Ed25519 public key and check it is a valid point.
pub fn parse_public_key_hex(s: &str) -> Result<PublicKey, CryptoError> {
    let bytes: [u8; 32] = decode_fixed(s)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(PublicKey(bytes))
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CryptoError> {
    if s.len() != N * 2 {
        return Err(CryptoError::InvalidHexLength {
            expected: N * 2,
            got: s.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).map_err(|_| CryptoError::MalformedHex)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let msg = b"approve recovery request";
        let sig = sign_message(msg, &kp.private);
        assert!(verify_signature(msg, &sig, &kp.public));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"correct message", &kp.private);
        assert!(!verify_signature(b"wrong message", &sig, &kp.public));
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = generate_keypair();
        let kp2 = generate_keypair();
        let sig = sign_message(b"test", &kp1.private);
        assert!(!verify_signature(b"test", &sig, &kp2.public));
    }

    #[test]
    fn signature_deterministic() {
        let kp = keypair_from_seed(&[99u8; 32]);
        let sig1 = sign_message(b"deterministic", &kp.private);
        let sig2 = sign_message(b"deterministic", &kp.private);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn invalid_public_key() {
        let kp = generate_keypair();
        let sig = sign_message(b"test", &kp.private);
        assert!(!verify_signature(b"test", &sig, &PublicKey([0xFF; 32])));
    }

    #[test]
    fn signature_hex_roundtrip() {
        let kp = generate_keypair();
        let sig = sign_message(b"hex", &kp.private);
        let encoded = hex::encode(sig.as_bytes());
        assert_eq!(encoded.len(), Signature::HEX_LEN);
        assert_eq!(parse_signature_hex(&encoded).unwrap(), sig);
    }

    #[test]
    fn signature_hex_wrong_length() {
        assert_eq!(
            parse_signature_hex("abcd").unwrap_err(),
            CryptoError::InvalidHexLength {
                expected: 128,
                got: 4
            }
        );
    }

    #[test]
    fn signature_hex_bad_alphabet() {
        let bad = "g".repeat(128);
        assert_eq!(
            parse_signature_hex(&bad).unwrap_err(),
            CryptoError::MalformedHex
        );
    }

    #[test]
    fn public_key_hex_rejects_garbage_point() {
        let kp = keypair_from_seed(&[5u8; 32]);
        let good = hex::encode(kp.public.as_bytes());
        assert_eq!(parse_public_key_hex(&good).unwrap(), kp.public);
        assert!(parse_public_key_hex(&"zz".repeat(32)).is_err());
    }
}
