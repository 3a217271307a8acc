use cellmqtt::network::mqtt::packet::{self, Publish};
use cellmqtt::network::mqtt::QoS;
use criterion::{Criterion, Throughput};
use heapless::Vec;
use std::hint::black_box;

pub fn bench_encode_publish(c: &mut Criterion) {
    let payload = b"The message to publish on a button event";
    let mut group = c.benchmark_group("encode_publish");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for qos in [QoS::AtMostOnce, QoS::AtLeastOnce] {
        group.bench_function(format!("{:?}", qos), |b| {
            let mut out: Vec<u8, 128> = Vec::new();
            b.iter(|| {
                out.clear();
                let publish = Publish {
                    topic: "my/publish/topic",
                    payload,
                    qos,
                    message_id: 0x1234,
                    dup: false,
                    retain: false,
                };
                packet::encode_publish(&mut out, black_box(&publish)).unwrap();
                black_box(out.len())
            });
        });
    }
    group.finish();
}

pub fn bench_decode_stream(c: &mut Criterion) {
    // CONNACK, a few PUBACKs and PINGRESPs back to back.
    let mut stream: Vec<u8, 128> = Vec::new();
    stream.extend_from_slice(&[0x20, 0x02, 0x00, 0x00]).unwrap();
    for id in 1..=8u16 {
        let [hi, lo] = id.to_be_bytes();
        stream.extend_from_slice(&[0x40, 0x02, hi, lo]).unwrap();
        stream.extend_from_slice(&[0xD0, 0x00]).unwrap();
    }

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("stream", |b| {
        b.iter(|| {
            let mut rest = black_box(&stream[..]);
            let mut count = 0;
            while let Some((packet, used)) = packet::decode(rest).unwrap() {
                black_box(packet);
                rest = &rest[used..];
                count += 1;
            }
            count
        });
    });
    group.finish();
}
