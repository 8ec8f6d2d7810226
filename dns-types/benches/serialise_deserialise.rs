use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::net::Ipv4Addr;

use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;

fn question_message() -> Message {
    Message {
        header: Header {
            id: 1234,
            is_response: false,
            opcode: Opcode::Standard,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: true,
            recursion_available: false,
            rcode: Rcode::NoError,
        },
        questions: vec![Question {
            name: domain("www.example.com."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        }],
        answers: Vec::new(),
        authority: Vec::new(),
        additional: Vec::new(),
    }
}

#[allow(non_snake_case)]
fn bench__question(c: &mut Criterion) {
    let message = question_message();

    c.bench_function("serialise/question", |b| {
        b.iter_batched(
            || message.clone(),
            |message| message.serialise(),
            BatchSize::SmallInput,
        )
    });

    let serialised = message.serialise().unwrap();
    c.bench_function("deserialise/question", |b| {
        b.iter(|| Message::from_octets(black_box(&serialised)))
    });
}

#[allow(non_snake_case)]
fn bench__answer__small(c: &mut Criterion) {
    let mut message = question_message().make_response_shell(Rcode::NoError);
    message.answers = vec![a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 1))];

    c.bench_function("serialise/answer/small", |b| {
        b.iter_batched(
            || message.clone(),
            |message| message.serialise(),
            BatchSize::SmallInput,
        )
    });

    let serialised = message.serialise().unwrap();
    c.bench_function("deserialise/answer/small", |b| {
        b.iter(|| Message::from_octets(black_box(&serialised)))
    });
}

#[allow(non_snake_case)]
fn bench__answer__big(c: &mut Criterion) {
    let mut message = question_message().make_response_shell(Rcode::NoError);
    message.answers = (0..64)
        .map(|i| a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, i)))
        .collect();

    c.bench_function("serialise/answer/big", |b| {
        b.iter_batched(
            || message.clone(),
            |message| message.serialise(),
            BatchSize::SmallInput,
        )
    });

    let serialised = message.serialise().unwrap();
    c.bench_function("deserialise/answer/big", |b| {
        b.iter(|| Message::from_octets(black_box(&serialised)))
    });
}

criterion_group!(
    benches,
    bench__question,
    bench__answer__small,
    bench__answer__big
);
criterion_main!(benches);
