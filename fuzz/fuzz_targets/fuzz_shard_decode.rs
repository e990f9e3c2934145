#![no_main]

use libfuzzer_sys::fuzz_target;

use keyward_sharing::{decode_shard, encode_shard, reconstruct};

// Decoding untrusted shard bytes must never panic, and whatever decodes
// must re-encode to the same bytes.
fuzz_target!(|data: &[u8]| {
    let Ok(shard) = decode_shard(data) else {
        return;
    };
    assert_eq!(encode_shard(&shard), data);

    // Reconstruction from a lone (possibly inconsistent) shard may fail but
    // must not panic.
    let _ = reconstruct(std::slice::from_ref(&shard));

    // Two halves of the input as two shards.
    let mid = data.len() / 2;
    if let (Ok(a), Ok(b)) = (decode_shard(&data[..mid]), decode_shard(&data[mid..])) {
        let _ = reconstruct(&[a, b]);
    }
});
