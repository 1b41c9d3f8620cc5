use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qnet_core::envelope::{BoundVerifier, SignatureAlgorithm, SignatureVerifier, VerifierRegistry};
use qnet_core::hash::hash256;
use qnet_consensus::{CommitRevealConsensus, ReputationConfig, ReputationRegistry};
use std::sync::Arc;

struct AlwaysValid;
impl SignatureVerifier for AlwaysValid {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::LatticeL3
    }
    fn verify(&self, _message: &[u8], signature: &[u8], _public_key: &[u8]) -> bool {
        !signature.is_empty()
    }
}

fn engine(node_ids: &[String]) -> CommitRevealConsensus {
    let mut registry = VerifierRegistry::new();
    registry.register(Box::new(AlwaysValid));
    let verifier = Arc::new(BoundVerifier::new(registry, SignatureAlgorithm::LatticeL3));
    let reputation = Arc::new(ReputationRegistry::new(ReputationConfig::default()));
    for node_id in node_ids {
        reputation.register_node(node_id);
    }
    CommitRevealConsensus::new(verifier, reputation)
}

fn bench_commit_reveal_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_reveal_round");
    for node_count in [10usize, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::new("full_round", node_count), node_count, |b, &count| {
            let node_ids: Vec<String> = (0..count).map(|i| format!("node_{i}")).collect();

            b.iter(|| {
                let mut consensus = engine(&node_ids);
                consensus.start_round(node_ids.clone(), 0, 60, 30, 10).unwrap();

                for node_id in &node_ids {
                    let value = format!("reveal-{node_id}");
                    let hash = hash256(value.as_bytes());
                    let _ = consensus.submit_commit(node_id, &hash, b"sig", b"pk", 1);
                }
                for node_id in &node_ids {
                    let value = format!("reveal-{node_id}");
                    let _ = consensus.submit_reveal(node_id, &value, 2);
                }
                black_box(consensus.finalize_round(3, 0.67, 3, 120).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_single_commit(c: &mut Criterion) {
    let node_ids: Vec<String> = (0..100).map(|i| format!("node_{i}")).collect();
    c.bench_function("submit_commit", |b| {
        b.iter(|| {
            let mut consensus = engine(&node_ids);
            consensus.start_round(node_ids.clone(), 0, 60, 30, 10).unwrap();
            let hash = hash256(b"reveal-value");
            black_box(consensus.submit_commit(black_box(&node_ids[0]), &hash, b"sig", b"pk", 1).unwrap());
        });
    });
}

criterion_group!(benches, bench_commit_reveal_round, bench_single_commit);
criterion_main!(benches);
