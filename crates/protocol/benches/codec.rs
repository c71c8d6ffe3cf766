//! Codec throughput benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use protocol::{DecodeOutcome, Message, decode, encode};

fn bench_encode(c: &mut Criterion) {
    let touch = Message::Touch {
        action: protocol::TouchAction::Move,
        x: 0.42,
        y: 0.58,
    };
    c.bench_function("encode_touch", |b| {
        b.iter(|| encode(black_box(&touch)).unwrap())
    });

    let audio = Message::mic_audio(vec![0u8; 2048]);
    c.bench_function("encode_audio_2k", |b| {
        b.iter(|| encode(black_box(&audio)).unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    // a typical compressed video frame
    let mut payload = Vec::new();
    for value in [1280u32, 720, 0, 65_536, 0] {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    payload.extend_from_slice(&vec![0xabu8; 65_536]);
    let mut frame = protocol::MessageHeader::to_bytes(0x06, payload.len() as u32).to_vec();
    frame.extend_from_slice(&payload);

    c.bench_function("decode_video_64k", |b| {
        b.iter(|| {
            let DecodeOutcome::Message { message, .. } = decode(black_box(&frame)).unwrap() else {
                unreachable!();
            };
            message
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
