//! Threshold secret sharing for guardian key protection.
//!
//! A secret is split into `N` shards such that any `T` of them reconstruct it
//! and fewer than `T` reveal nothing. The scheme is Shamir's over GF(2^8):
//! every secret byte gets its own random polynomial of degree `T - 1` whose
//! constant term is that byte, and shard `i` carries the evaluations at
//! `x = i + 1`.
//!
//! - [`gf256`]: field arithmetic (Rijndael polynomial `0x11B`)
//! - [`engine`]: `split` / `reconstruct`
//! - [`codec`]: the versioned binary and hex shard encoding

pub mod codec;
pub mod engine;
pub mod error;
pub mod gf256;
pub mod shard;

pub use codec::{decode_shard, encode_shard, shard_from_hex, shard_to_hex, CODEC_VERSION};
pub use engine::{reconstruct, split, split_with_rng, SplitPolicy, MAX_SHARES};
pub use error::ShardingError;
pub use shard::Shard;
