use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keyward_sharing::{reconstruct, split, SplitPolicy};

fn split_bench(c: &mut Criterion) {
    let secret = [0x5Au8; 32];

    c.bench_function("split_32B_3_of_5", |b| {
        b.iter(|| split(black_box(&secret), 5, 3, SplitPolicy::Strict))
    });
    c.bench_function("split_32B_14_of_20", |b| {
        b.iter(|| split(black_box(&secret), 20, 14, SplitPolicy::Strict))
    });
}

fn reconstruct_bench(c: &mut Criterion) {
    let secret = [0x5Au8; 32];
    let small = split(&secret, 5, 3, SplitPolicy::Strict).unwrap();
    let large = split(&secret, 20, 14, SplitPolicy::Strict).unwrap();

    c.bench_function("reconstruct_32B_3_of_5", |b| {
        b.iter(|| reconstruct(black_box(&small[..3])))
    });
    c.bench_function("reconstruct_32B_14_of_20", |b| {
        b.iter(|| reconstruct(black_box(&large[..14])))
    });
}

criterion_group!(benches, split_bench, reconstruct_bench);
criterion_main!(benches);
