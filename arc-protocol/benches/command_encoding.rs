use std::hint::black_box;

use arc_protocol::{
    codec::{CommandPacket, decode_command, decode_command_list, encode_command},
    commands::*,
    config::BoardConfig,
};
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_command", |b| {
        b.iter(|| encode_command(black_box("TOUT")))
    });
}

fn bench_decode(c: &mut Criterion) {
    c.bench_function("decode_command mnemonic", |b| {
        b.iter(|| decode_command(black_box(SEX)))
    });
    c.bench_function("decode_command hex", |b| {
        b.iter(|| decode_command(black_box(0x212223)))
    });
    c.bench_function("decode_command_list", |b| {
        b.iter(|| decode_command_list(black_box(DON), black_box(&[TIM_ID, SOS, AMP_LR])))
    });
}

fn bench_packet(c: &mut Criterion) {
    c.bench_function("command packet", |b| {
        b.iter(|| {
            CommandPacket::new(black_box(&[TIM_ID, WRM, Y_MEM | 0x10, 0x1234]))
                .map(|packet| packet.tagged_words().collect::<Vec<_>>())
        })
    });
}

fn bench_board_config(c: &mut Criterion) {
    c.bench_function("board config decode", |b| {
        b.iter(|| BoardConfig::decode(black_box(ARC45 | ARC22 | SHUTTER_CC | ALL_READOUTS)))
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_packet,
    bench_board_config
);
criterion_main!(benches);
