//! Wire codec encoding/decoding benchmarks.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use limitd_protocol::{
    Decoder, Encoder, ErrorInfo, Request, Response, TakeResult, WireReader, WireWriter,
};

fn create_test_request(key_size: usize) -> Request {
    Request::take("bench-1", "ip", "k".repeat(key_size), 1).with_skip_response(true)
}

fn create_test_responses() -> Vec<(&'static str, Response)> {
    vec![
        (
            "take",
            Response::take(
                1233u64,
                TakeResult {
                    conformant: true,
                    remaining: 99,
                    reset: 1_700_000_000,
                    limit: 100,
                },
            ),
        ),
        ("pong", Response::pong("bench-1", 1)),
        (
            "error",
            Response::error("bench-1", ErrorInfo::unknown_bucket_type()),
        ),
    ]
}

fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");

    for value in [1u64, 300, 1 << 35, u64::MAX] {
        let mut writer = WireWriter::new();
        writer.put_varint(value);
        let encoded = writer.into_inner();

        group.bench_with_input(BenchmarkId::new("encode", value), &value, |b, &value| {
            b.iter(|| {
                let mut writer = WireWriter::with_capacity(10);
                writer.put_varint(black_box(value));
                black_box(writer.into_inner())
            });
        });
        group.bench_with_input(BenchmarkId::new("decode", value), &encoded, |b, encoded| {
            b.iter(|| black_box(WireReader::new(encoded).read_varint().unwrap()));
        });
    }

    group.finish();
}

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encode");

    for size in [8, 64, 1024] {
        let request = create_test_request(size);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| black_box(request.encode()));
        });
    }

    group.finish();
}

fn bench_request_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_decode");

    for size in [8, 64, 1024] {
        let encoded = create_test_request(size).encode();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| black_box(Request::decode(encoded).unwrap()));
        });
    }

    group.finish();
}

fn bench_response_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_encode");

    for (name, response) in create_test_responses() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(name), &response, |b, response| {
            b.iter(|| black_box(response.encode()));
        });
    }

    group.finish();
}

fn bench_response_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_decode");

    for (name, response) in create_test_responses() {
        let encoded = response.encode();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(name), &encoded, |b, encoded| {
            b.iter(|| black_box(Response::decode(encoded).unwrap()));
        });
    }

    group.finish();
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode");

    for count in [10, 100, 1000] {
        let mut stream = BytesMut::new();
        for i in 0..count {
            let request = Request::take(i as u64, "ip", "10.0.0.1", 1);
            stream.extend_from_slice(&Encoder::encode_request(&request).unwrap());
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(stream);
                let mut decoded = 0;
                while let Some(request) = decoder.decode_request().unwrap() {
                    black_box(request);
                    decoded += 1;
                }
                decoded
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_varint,
    bench_request_encode,
    bench_request_decode,
    bench_response_encode,
    bench_response_decode,
    bench_stream_decode,
);

criterion_main!(benches);
