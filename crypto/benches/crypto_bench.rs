use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn ed25519_sign_bench(c: &mut Criterion) {
    let kp = keyward_crypto::generate_keypair();
    let msg = [42u8; 32];

    c.bench_function("ed25519_sign_fingerprint", |b| {
        b.iter(|| keyward_crypto::sign_message(black_box(&msg), &kp.private))
    });
}

fn ed25519_verify_bench(c: &mut Criterion) {
    let kp = keyward_crypto::generate_keypair();
    let msg = [42u8; 32];
    let sig = keyward_crypto::sign_message(&msg, &kp.private);

    c.bench_function("ed25519_verify_fingerprint", |b| {
        b.iter(|| keyward_crypto::verify_signature(black_box(&msg), &sig, &kp.public))
    });
}

fn blake2b_multi_bench(c: &mut Criterion) {
    let parts: Vec<&[u8]> = vec![&[1u8; 16], &[2u8; 32], &[3u8; 32], &[4u8; 8]];

    c.bench_function("blake2b_256_fingerprint_parts", |b| {
        b.iter(|| keyward_crypto::blake2b_256_multi(black_box(&parts)))
    });
}

fn seal_open_bench(c: &mut Criterion) {
    let kp = keyward_crypto::generate_keypair();
    let shard = [7u8; 36];
    let sealed = keyward_crypto::seal_to(&shard, &kp.public).unwrap();

    c.bench_function("seal_shard_36B", |b| {
        b.iter(|| keyward_crypto::seal_to(black_box(&shard), &kp.public))
    });
    c.bench_function("open_shard_36B", |b| {
        b.iter(|| keyward_crypto::open_sealed(black_box(&sealed), &kp.private))
    });
}

criterion_group!(
    benches,
    ed25519_sign_bench,
    ed25519_verify_bench,
    blake2b_multi_bench,
    seal_open_bench
);
criterion_main!(benches);
