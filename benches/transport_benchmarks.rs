use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hap_server::protocol::transport::{FrameReader, FrameWriter};

fn frame_round_trip_benchmark(c: &mut Criterion) {
    let key = [0x11u8; 32];
    let mut writer = FrameWriter::new(&key).unwrap();

    let payload = vec![0u8; 900];
    let mut group = c.benchmark_group("framed_transport");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("encode_single_frame", |b| {
        b.iter(|| writer.encode(black_box(&payload)).unwrap());
    });

    // Each iteration needs its own reader: the read counter is folded into
    // the AEAD nonce, so replaying the same ciphertext against a reader
    // that has already advanced fails the tag check (by design, §8
    // property 1).
    let encoded = writer.encode(&payload).unwrap();
    group.bench_function("decode_single_frame", |b| {
        b.iter_batched(
            || FrameReader::new(&key).unwrap(),
            |mut reader| {
                reader.feed(black_box(&encoded));
                reader.decode_all().unwrap()
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn multi_frame_decode_benchmark(c: &mut Criterion) {
    let key = [0x22u8; 32];
    let mut writer = FrameWriter::new(&key).unwrap();

    let payload = vec![0u8; 4096];
    let encoded = writer.encode(&payload).unwrap();

    let mut group = c.benchmark_group("framed_transport");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("decode_multi_frame_4k", |b| {
        b.iter_batched(
            || FrameReader::new(&key).unwrap(),
            |mut reader| {
                reader.feed(black_box(&encoded));
                reader.decode_all().unwrap()
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, frame_round_trip_benchmark, multi_frame_decode_benchmark);
criterion_main!(benches);
