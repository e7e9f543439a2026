//! Wire decoding benchmarks.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ironfeed_bench::fixtures;
use ironfeed_core::{ControlFrame, SubscriptionKey, Channel, decode_frame};
use std::hint::black_box;

fn benchmark_decode_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_snapshot");
    for levels in [10usize, 100, 1000] {
        let text = fixtures::snapshot_frame("BTC-USD", levels);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_function(format!("{levels}_levels"), |b| {
            b.iter(|| decode_frame(black_box(&text)))
        });
    }
    group.finish();
}

fn benchmark_decode_update(c: &mut Criterion) {
    let text = fixtures::update_frame("BTC-USD", 42, 4);
    c.bench_function("decode_update", |b| {
        b.iter(|| decode_frame(black_box(&text)))
    });
}

fn benchmark_decode_trades(c: &mut Criterion) {
    let text = fixtures::trades_frame("BTC-USD", 20);
    c.bench_function("decode_trades_20", |b| {
        b.iter(|| decode_frame(black_box(&text)))
    });
}

fn benchmark_encode_subscribe(c: &mut Criterion) {
    let key = SubscriptionKey::new(Channel::Level2, "BTC-USD");
    c.bench_function("encode_subscribe", |b| {
        b.iter(|| ControlFrame::subscribe(black_box(&key)).encode())
    });
}

criterion_group!(
    benches,
    benchmark_decode_snapshot,
    benchmark_decode_update,
    benchmark_decode_trades,
    benchmark_encode_subscribe
);
criterion_main!(benches);
