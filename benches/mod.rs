use criterion::{criterion_group, criterion_main};

mod codec;

criterion_group!(
    benches,
    codec::bench_encode_publish,
    codec::bench_decode_stream,
    supervisor::bench_connected_tick,
    supervisor::bench_button_publish
);
criterion_main!(benches);
