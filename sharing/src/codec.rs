//! Versioned wire encoding for shards.
//!
//! Layout: `[version][index][threshold][total][payload ...]`, all single bytes
//! except the payload. The hex form is the same bytes, lowercase.

use crate::{Shard, ShardingError};

pub const CODEC_VERSION: u8 = 1;
const HEADER_LEN: usize = 4;

/// Encode a shard for storage or transport.
pub fn encode_shard(shard: &Shard) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + shard.payload().len());
    out.push(CODEC_VERSION);
    out.push(shard.index());
    out.push(shard.threshold());
    out.push(shard.total());
    out.extend_from_slice(shard.payload());
    out
}

/// Decode a shard, validating the header before accepting the payload.
pub fn decode_shard(bytes: &[u8]) -> Result<Shard, ShardingError> {
    if bytes.len() <= HEADER_LEN {
        return Err(ShardingError::InvalidParameters(format!(
            "encoded shard too short: {} bytes",
            bytes.len()
        )));
    }
    let (version, index, threshold, total) = (bytes[0], bytes[1], bytes[2], bytes[3]);
    if version != CODEC_VERSION {
        return Err(ShardingError::InvalidParameters(format!(
            "unsupported shard codec version {version}"
        )));
    }
    if total == 0 || index >= total {
        return Err(ShardingError::InvalidParameters(format!(
            "shard index {index} outside split of {total}"
        )));
    }
    if threshold == 0 || threshold > total {
        return Err(ShardingError::InvalidParameters(format!(
            "threshold {threshold} invalid for split of {total}"
        )));
    }
    Ok(Shard::from_parts(
        index,
        threshold,
        total,
        bytes[HEADER_LEN..].to_vec(),
    ))
}

pub fn shard_to_hex(shard: &Shard) -> String {
    hex::encode(encode_shard(shard))
}

pub fn shard_from_hex(s: &str) -> Result<Shard, ShardingError> {
    let bytes = hex::decode(s)
        .map_err(|_| ShardingError::InvalidParameters("malformed shard hex".into()))?;
    decode_shard(&bytes)
}
