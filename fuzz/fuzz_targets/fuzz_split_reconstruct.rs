#![no_main]

use libfuzzer_sys::fuzz_target;

use keyward_sharing::{reconstruct, split, SplitPolicy};

// Any `threshold` shards of a successful split restore the secret.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let total = (data[0] % 16) as usize + 1;
    let threshold = (data[1] as usize % total) + 1;
    let secret = &data[2..];

    let Ok(shards) = split(secret, total, threshold, SplitPolicy::AllowSinglePointOfFailure)
    else {
        return;
    };
    assert_eq!(shards.len(), total);

    let start = data[0] as usize % (total - threshold + 1);
    let subset = &shards[start..start + threshold];
    let restored = reconstruct(subset).expect("threshold shards reconstruct");
    assert_eq!(restored.as_slice(), secret);
});
