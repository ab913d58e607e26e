//! Push/chain benchmarks for padflow pads.

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use padflow::buffer::{Buffer, BufferList};
use padflow::event::{Event, Segment};
use padflow::flow::FlowSuccess;
use padflow::pad::{Pad, PadDirection, ProbeReturn, ProbeType};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An active, linked src/sink pair whose sink counts bytes.
fn linked_pair() -> (Pad, Pad, Arc<AtomicUsize>) {
    let bytes = Arc::new(AtomicUsize::new(0));
    let counter = bytes.clone();
    let src = Pad::new("src", PadDirection::Src);
    let sink = Pad::builder("sink", PadDirection::Sink)
        .chain_function(move |_, buffer| {
            counter.fetch_add(buffer.len(), Ordering::Relaxed);
            Ok(FlowSuccess::Ok)
        })
        .build();
    src.link(&sink).unwrap();
    src.set_active(true).unwrap();
    sink.set_active(true).unwrap();
    src.push_event(Event::stream_start("bench"));
    src.push_event(Event::segment(Segment::new_time(0, None)));
    (src, sink, bytes)
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");

    for size in [64, 1024, 64 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (src, _sink, _bytes) = linked_pair();
            let payload = Bytes::from(vec![0u8; size]);
            b.iter(|| black_box(src.push(Buffer::from_bytes(payload.clone()))));
        });
    }

    group.finish();
}

fn bench_push_with_probes(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_with_probes");
    group.throughput(Throughput::Elements(1));

    for probes in [1, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(probes), probes, |b, &probes| {
            let (src, _sink, _bytes) = linked_pair();
            for _ in 0..probes {
                src.add_probe(ProbeType::BUFFER, |_, info| {
                    black_box(info.buffer());
                    ProbeReturn::Ok
                });
            }
            // Never matches buffers, only has to be skipped.
            src.add_probe(ProbeType::EVENT_DOWNSTREAM, |_, _| ProbeReturn::Ok);
            b.iter(|| black_box(src.push(Buffer::from_static(b"probe"))));
        });
    }

    group.finish();
}

fn bench_push_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_list");

    for len in [8, 64].iter() {
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let (src, _sink, _bytes) = linked_pair();
            b.iter(|| {
                let list: BufferList = (0..len).map(|_| Buffer::from_static(b"item")).collect();
                black_box(src.push_list(list))
            });
        });
    }

    group.finish();
}

fn bench_pull_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("pull_range");
    group.throughput(Throughput::Bytes(4096));

    let data = Bytes::from(vec![7u8; 1 << 20]);
    let src = Pad::builder("src", PadDirection::Src)
        .getrange_function(move |_, offset, size| {
            let start = offset as usize % data.len();
            let end = (start + size as usize).min(data.len());
            Ok(Buffer::from_bytes(data.slice(start..end)))
        })
        .build();
    let sink = Pad::new("sink", PadDirection::Sink);
    src.link(&sink).unwrap();
    sink.activate_pull(true).unwrap();

    let mut offset = 0u64;
    group.bench_function("4k", |b| {
        b.iter(|| {
            offset = offset.wrapping_add(4096);
            black_box(sink.pull_range(offset, 4096))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_push,
    bench_push_with_probes,
    bench_push_list,
    bench_pull_range
);
criterion_main!(benches);
