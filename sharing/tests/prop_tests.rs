use proptest::prelude::*;

use keyward_sharing::{
    decode_shard, encode_shard, reconstruct, split, Shard, ShardingError, SplitPolicy,
};

/// Every k-subset of `0..n`, as index vectors.
fn subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn go(start: usize, n: usize, k: usize, cur: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if cur.len() == k {
            out.push(cur.clone());
            return;
        }
        for i in start..n {
            cur.push(i);
            go(i + 1, n, k, cur, out);
            cur.pop();
        }
    }
    let mut out = Vec::new();
    go(0, n, k, &mut Vec::new(), &mut out);
    out
}

fn policy_for(threshold: usize) -> SplitPolicy {
    if threshold == 1 {
        SplitPolicy::AllowSinglePointOfFailure
    } else {
        SplitPolicy::Strict
    }
}

fn pick(shards: &[Shard], idx: &[usize]) -> Vec<Shard> {
    idx.iter().map(|&i| shards[i].clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any T-subset, in either order, reconstructs the secret (small N: exhaustive).
    #[test]
    fn every_threshold_subset_reconstructs(
        secret in prop::collection::vec(any::<u8>(), 1..48),
        (n, t) in (1usize..=7).prop_flat_map(|n| (Just(n), 1usize..=n)),
    ) {
        let shards = split(&secret, n, t, policy_for(t)).unwrap();
        for idx in subsets(n, t) {
            let subset = pick(&shards, &idx);
            let recovered = reconstruct(&subset).unwrap();
            prop_assert_eq!(recovered.as_slice(), secret.as_slice());

            let mut reversed = subset.clone();
            reversed.reverse();
            let recovered = reconstruct(&reversed).unwrap();
            prop_assert_eq!(recovered.as_slice(), secret.as_slice());
        }
    }

    /// For N up to 20, a shuffled random T-subset reconstructs the secret.
    #[test]
    fn random_threshold_subset_reconstructs(
        secret in prop::collection::vec(any::<u8>(), 1..64),
        (n, t, order) in (1usize..=20)
            .prop_flat_map(|n| (Just(n), 1usize..=n))
            .prop_flat_map(|(n, t)| (Just(n), Just(t), Just((0..n).collect::<Vec<_>>()).prop_shuffle())),
    ) {
        let shards = split(&secret, n, t, policy_for(t)).unwrap();
        let subset = pick(&shards, &order[..t]);
        let recovered = reconstruct(&subset).unwrap();
        prop_assert_eq!(recovered.as_slice(), secret.as_slice());
    }

    /// Any (T-1)-subset fails with InsufficientShards.
    #[test]
    fn below_threshold_always_fails(
        secret in prop::collection::vec(any::<u8>(), 1..32),
        (n, t, order) in (2usize..=20)
            .prop_flat_map(|n| (Just(n), 2usize..=n))
            .prop_flat_map(|(n, t)| (Just(n), Just(t), Just((0..n).collect::<Vec<_>>()).prop_shuffle())),
    ) {
        let shards = split(&secret, n, t, SplitPolicy::Strict).unwrap();
        let subset = pick(&shards, &order[..t - 1]);
        prop_assert_eq!(
            reconstruct(&subset).unwrap_err(),
            ShardingError::InsufficientShards { have: t - 1, need: t }
        );
    }

    /// Decoding arbitrary bytes never panics, and anything it accepts re-encodes identically.
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(shard) = decode_shard(&bytes) {
            prop_assert_eq!(encode_shard(&shard), bytes);
        }
    }
}
