//! # Session Core Benchmarks
//!
//! Hot paths of the messaging layer:
//!
//! | Path | Runs |
//! |------|------|
//! | Destination dedup | every send |
//! | Message id dedup | every received copy |
//! | Subclient address prefixing | every packet per subclient |
//! | Reconnect backoff | every failed dial |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mc_session::{
    add_identifier, backoff_delay, dedup_destinations, remove_identifier, MessageDeduplicator,
    MessageId,
};
use rand::Rng;
use std::time::Duration;

// ============================================================================
// Destination dedup
// ============================================================================

fn bench_dedup_destinations(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup-destinations");
    let mut rng = rand::thread_rng();

    for size in [4usize, 64, 1024] {
        // Drawn from half as many distinct peers.
        let dests: Vec<String> = (0..size)
            .map(|_| format!("peer-{}", rng.gen_range(0..size / 2)))
            .collect();

        group.throughput(Throughput::Elements(dests.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &dests, |b, dests| {
            b.iter(|| dedup_destinations(black_box(dests)));
        });
    }
    group.finish();
}

// ============================================================================
// Message id dedup
// ============================================================================

fn bench_message_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("message-dedup");

    // Four copies per message, the fan-out of a default client.
    let ids: Vec<MessageId> = (0..1024).map(|_| MessageId::random()).collect();
    group.throughput(Throughput::Elements((ids.len() * 4) as u64));
    group.bench_function("first-seen-4-copies", |b| {
        b.iter(|| {
            let dedup = MessageDeduplicator::new(1024);
            let mut fresh = 0usize;
            for id in &ids {
                for _ in 0..4 {
                    if dedup.first_seen(*id) {
                        fresh += 1;
                    }
                }
            }
            black_box(fresh)
        });
    });

    group.bench_function("evicting-cache", |b| {
        let dedup = MessageDeduplicator::new(64);
        b.iter(|| black_box(dedup.first_seen(MessageId::random())));
    });
    group.finish();
}

// ============================================================================
// Subclient addresses
// ============================================================================

fn bench_subclient_addresses(c: &mut Criterion) {
    let mut group = c.benchmark_group("subclient-address");
    let address = format!("client.{}", hex::encode([7u8; 32]));

    group.bench_function("add", |b| {
        b.iter(|| add_identifier(black_box(&address), black_box(3)));
    });

    let prefixed = add_identifier(&address, 3);
    group.bench_function("remove", |b| {
        b.iter(|| remove_identifier(black_box(&prefixed)));
    });
    group.finish();
}

// ============================================================================
// Backoff
// ============================================================================

fn bench_backoff(c: &mut Criterion) {
    let min = Duration::from_millis(100);
    let max = Duration::from_secs(5);
    c.bench_function("backoff-delay", |b| {
        b.iter(|| {
            for attempt in 0..16 {
                black_box(backoff_delay(black_box(attempt), min, max));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_dedup_destinations,
    bench_message_dedup,
    bench_subclient_addresses,
    bench_backoff
);
criterion_main!(benches);
