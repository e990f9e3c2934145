//! Identifiers for accounts, guardians, recovery requests and protection generations.

use crate::TypeError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a protected account.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

/// Identifier of a guardian within a federation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GuardianId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Parse an identifier, rejecting empty or whitespace-only input.
            pub fn parse(raw: &str) -> Result<Self, TypeError> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(TypeError::EmptyId);
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(AccountId);
string_id!(GuardianId);

/// A 16-byte random identifier of a recovery request.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId([u8; 16]);

/// A 16-byte random identifier of one protection generation (one sharding).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtectionId([u8; 16]);

macro_rules! random_id {
    ($name:ident) => {
        impl $name {
            pub const LEN: usize = 16;

            pub fn new(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Draw a fresh identifier from the OS random source.
            pub fn random() -> Self {
                let mut bytes = [0u8; 16];
                rand::rngs::OsRng.fill_bytes(&mut bytes);
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Parse the 32-char lowercase or uppercase hex form.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let bytes = decode_16(s)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}\u{2026})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(&self.0))
            }
        }
    };
}

random_id!(RequestId);
random_id!(ProtectionId);

fn decode_16(s: &str) -> Result<[u8; 16], TypeError> {
    if s.len() != 32 {
        return Err(TypeError::InvalidIdLength {
            expected: 32,
            got: s.len(),
        });
    }
    let mut out = [0u8; 16];
    hex::decode_to_slice(s, &mut out).map_err(|_| TypeError::InvalidIdHex)?;
    Ok(out)
}
