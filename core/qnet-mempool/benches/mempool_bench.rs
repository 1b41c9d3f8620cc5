use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qnet_mempool::{Mempool, MempoolConfig, TxPriority};
use qnet_state::transaction::{gas_limits, Transaction, TransactionType};

fn tx(sender: String, nonce: u64, gas_price: u64) -> Transaction {
    Transaction::new(
        sender.clone(),
        Some("recipient".into()),
        100,
        nonce,
        gas_price,
        gas_limits::TRANSFER,
        1_700_000_000,
        None,
        TransactionType::Transfer { from: sender, to: "recipient".into(), amount: 100 },
    )
}

fn bench_mempool_operations(c: &mut Criterion) {
    let mempool = Mempool::new_simple(MempoolConfig::default());
    let mut group = c.benchmark_group("mempool_operations");

    group.bench_function("add_transaction", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            let sender = format!("sender_{}", nonce % 1000);
            let _ = mempool.add_transaction(black_box(tx(sender, nonce / 1000, 10)));
            nonce += 1;
        });
    });

    for i in 0..1000 {
        let _ = mempool.add_transaction(tx(format!("setup_sender_{i}"), 0, 10 + (i % 100)));
    }

    group.bench_function("get_sender_transactions", |b| {
        b.iter(|| {
            black_box(mempool.get_sender_transactions(black_box("setup_sender_0")));
        });
    });

    group.bench_function("get_microblock_transactions_2000", |b| {
        b.iter(|| {
            black_box(mempool.get_microblock_transactions(black_box(2000)));
        });
    });

    group.finish();
}

fn bench_priority_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_ordering");
    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("sort_by_gas_price", size), size, |b, &size| {
            let txs: Vec<Transaction> = (0..size).map(|i| tx(format!("sender_{i}"), 0, (i % 1000) as u64)).collect();
            b.iter(|| {
                let mut priorities: Vec<_> = txs.iter().map(TxPriority::new).collect();
                priorities.sort_by(|a, b| b.cmp(a));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mempool_operations, bench_priority_ordering);
criterion_main!(benches);
