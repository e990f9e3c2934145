//! Splitting and reconstruction.

use crate::gf256::{eval_polynomial, interpolate_at_zero, Gf256};
use crate::{Shard, ShardingError};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::collections::BTreeSet;
use zeroize::Zeroizing;

/// Largest supported share count: x-coordinates are the non-zero bytes.
pub const MAX_SHARES: usize = 255;

/// How a split with `threshold == 1` is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SplitPolicy {
    /// `threshold == 1` is only accepted for a single shard.
    #[default]
    Strict,
    /// Accept `threshold == 1` with several shards: every shard then equals the
    /// secret, so each holder alone can recover it.
    AllowSinglePointOfFailure,
}

/// Split `secret` into `total` shards, any `threshold` of which reconstruct it.
pub fn split(
    secret: &[u8],
    total: usize,
    threshold: usize,
    policy: SplitPolicy,
) -> Result<Vec<Shard>, ShardingError> {
    split_with_rng(secret, total, threshold, policy, &mut OsRng)
}

/// [`split`] with a caller-provided randomness source.
pub fn split_with_rng<R: RngCore + CryptoRng>(
    secret: &[u8],
    total: usize,
    threshold: usize,
    policy: SplitPolicy,
    rng: &mut R,
) -> Result<Vec<Shard>, ShardingError> {
    validate_split(secret, total, threshold, policy)?;
    // validate_split bounds both values to 1..=255
    let total_u8 = total as u8;
    let threshold_u8 = threshold as u8;

    if total == 1 {
        return Ok(vec![Shard::from_parts(0, 1, 1, secret.to_vec())]);
    }

    let mut payloads: Vec<Vec<u8>> = (0..total).map(|_| Vec::with_capacity(secret.len())).collect();
    let mut coefficients = Zeroizing::new(vec![Gf256::ZERO; threshold]);
    let mut random = Zeroizing::new(vec![0u8; threshold.saturating_sub(1)]);

    for &byte in secret {
        rng.fill_bytes(random.as_mut_slice());
        coefficients[0] = Gf256::new(byte);
        for (slot, r) in coefficients[1..].iter_mut().zip(random.iter()) {
            *slot = Gf256::new(*r);
        }
        for (i, payload) in payloads.iter_mut().enumerate() {
            let x = Gf256::new(i as u8 + 1);
            payload.push(eval_polynomial(&coefficients, x).value());
        }
    }

    Ok(payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| Shard::from_parts(i as u8, threshold_u8, total_u8, payload))
        .collect())
}

fn validate_split(
    secret: &[u8],
    total: usize,
    threshold: usize,
    policy: SplitPolicy,
) -> Result<(), ShardingError> {
    if secret.is_empty() {
        return Err(ShardingError::InvalidParameters("secret is empty".into()));
    }
    if total < 1 || total > MAX_SHARES {
        return Err(ShardingError::InvalidParameters(format!(
            "share count {total} outside 1..={MAX_SHARES}"
        )));
    }
    if threshold < 1 {
        return Err(ShardingError::InvalidParameters(
            "threshold must be at least 1".into(),
        ));
    }
    if threshold > total {
        return Err(ShardingError::InvalidParameters(format!(
            "threshold {threshold} exceeds share count {total}"
        )));
    }
    if threshold == 1 && total > 1 && policy != SplitPolicy::AllowSinglePointOfFailure {
        return Err(ShardingError::InvalidParameters(
            "threshold 1 with several shards requires an explicit single-point-of-failure policy"
                .into(),
        ));
    }
    Ok(())
}

/// Reconstruct the secret from at least `threshold` shards of one split.
///
/// The threshold is read from the shards. Any `threshold`-subset of a split
/// yields the same secret regardless of order.
pub fn reconstruct(shards: &[Shard]) -> Result<Zeroizing<Vec<u8>>, ShardingError> {
    let first = shards.first().ok_or(ShardingError::InsufficientShards {
        have: 0,
        need: 1,
    })?;
    let threshold = first.threshold() as usize;
    let total = first.total();
    let len = first.payload().len();

    if shards
        .iter()
        .any(|s| {
            s.threshold() as usize != threshold || s.total() != total || s.payload().len() != len
        })
    {
        return Err(ShardingError::ThresholdMismatch);
    }
    if threshold == 0 || threshold > total as usize || len == 0 {
        return Err(ShardingError::InvalidParameters(
            "shard metadata is inconsistent".into(),
        ));
    }

    let mut seen = BTreeSet::new();
    for shard in shards {
        if shard.index() >= total {
            return Err(ShardingError::InvalidParameters(format!(
                "shard index {} outside split of {}",
                shard.index(),
                total
            )));
        }
        if !seen.insert(shard.index()) {
            return Err(ShardingError::InvalidParameters(format!(
                "duplicate shard index {}",
                shard.index()
            )));
        }
    }
    if shards.len() < threshold {
        return Err(ShardingError::InsufficientShards {
            have: shards.len(),
            need: threshold,
        });
    }

    // Any `threshold` distinct shards determine the polynomials; take the
    // lowest indices so the choice does not depend on input order.
    let mut chosen: Vec<&Shard> = shards.iter().collect();
    chosen.sort_by_key(|s| s.index());
    chosen.truncate(threshold);

    let xs: Vec<Gf256> = chosen.iter().map(|s| Gf256::new(s.x())).collect();
    let mut ys = Zeroizing::new(vec![Gf256::ZERO; threshold]);
    let mut secret = Zeroizing::new(Vec::with_capacity(len));
    for byte_idx in 0..len {
        for (y, shard) in ys.iter_mut().zip(chosen.iter()) {
            *y = Gf256::new(shard.payload()[byte_idx]);
        }
        secret.push(interpolate_at_zero(&xs, &ys).value());
    }
    Ok(secret)
}
