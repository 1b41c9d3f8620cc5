use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qnet_sharding::ShardCoordinator;

fn bench_shard_assignment(c: &mut Criterion) {
    let coordinator = ShardCoordinator::new(256, (0..256).collect());
    c.bench_function("shard_assignment", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let address = format!("address_{i}");
            black_box(coordinator.shard_of(black_box(&address)));
            i += 1;
        });
    });
}

fn bench_intra_shard_transfer(c: &mut Criterion) {
    // Single managed shard so sender/receiver always fall in the same shard
    // and every call exercises the full validate-and-apply path.
    let coordinator = ShardCoordinator::new(1, vec![0]);
    coordinator.seed_balance("bench-sender", 1_000_000_000, 0).unwrap();

    c.bench_function("process_intra_shard_transfer", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce += 1;
            let to = format!("bench-recipient-{nonce}");
            let _ = coordinator.process_intra_shard_transfer(
                black_box("bench-sender"),
                black_box(&to),
                black_box(1),
                black_box(nonce),
                black_box(nonce),
            );
        });
    });
}

fn bench_shard_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard_stats");
    for account_count in [100u64, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("get_shard_stats", account_count), account_count, |b, &count| {
            let coordinator = ShardCoordinator::new(1, vec![0]);
            for i in 0..count {
                coordinator.seed_balance(&format!("stats-account-{i}"), 1_000, 0).unwrap();
            }
            b.iter(|| {
                black_box(coordinator.get_shard_stats());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shard_assignment, bench_intra_shard_transfer, bench_shard_stats);
criterion_main!(benches);
