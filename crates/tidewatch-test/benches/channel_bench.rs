//! Benchmarks for the current-value channel

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tidewatch_channel::CurrentValueChannel;

fn bench_send_without_readers(c: &mut Criterion) {
    let channel = CurrentValueChannel::new();
    let mut i = 0u64;

    c.bench_function("channel_send_no_readers", |b| {
        b.iter(|| {
            i += 1;
            channel.send(black_box(i));
        })
    });
}

fn bench_send_and_receive(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let channel = CurrentValueChannel::new();
    let mut readers: Vec<_> = (0..8).map(|_| channel.subscribe()).collect();
    let mut i = 0u64;

    c.bench_function("channel_send_receive_8_readers", |b| {
        b.iter(|| {
            i += 1;
            channel.send(i);
            runtime.block_on(async {
                for reader in readers.iter_mut() {
                    black_box(reader.next().await);
                }
            });
        })
    });
}

fn bench_latest(c: &mut Criterion) {
    let channel = CurrentValueChannel::new();
    channel.send(vec![0u8; 64]);

    c.bench_function("channel_latest", |b| b.iter(|| black_box(channel.latest())));
}

criterion_group!(
    benches,
    bench_send_without_readers,
    bench_send_and_receive,
    bench_latest
);
criterion_main!(benches);
