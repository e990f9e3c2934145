//! A single shard of a split secret.

use std::fmt;
use zeroize::Zeroizing;

/// One shard: the evaluations of every per-byte polynomial at `x = index + 1`,
/// together with the parameters of the split that produced it.
///
/// `Debug` never prints the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Shard {
    index: u8,
    threshold: u8,
    total: u8,
    payload: Zeroizing<Vec<u8>>,
}

impl Shard {
    /// Assemble a shard from its parts. Validation happens in the codec and
    /// in `reconstruct`; this constructor only stores the values.
    pub fn from_parts(index: u8, threshold: u8, total: u8, payload: Vec<u8>) -> Self {
        Self {
            index,
            threshold,
            total,
            payload: Zeroizing::new(payload),
        }
    }

    /// 0-based position within the split; unique per split.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Number of shards required to reconstruct.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Number of shards the secret was split into.
    pub fn total(&self) -> u8 {
        self.total
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The field element this shard was evaluated at.
    pub(crate) fn x(&self) -> u8 {
        self.index.wrapping_add(1)
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
