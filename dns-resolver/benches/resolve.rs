use criterion::{criterion_group, criterion_main, Criterion};

use dns_resolver::resolve;
use dns_types::protocol::types::test_util::domain;
use dns_types::protocol::types::RecordType;
use dns_types::zones::types::{SOA, ZoneStore};
use std::net::Ipv4Addr;

fn fixture() -> ZoneStore {
    let mut store = ZoneStore::new();
    let apex = domain("example.test.");
    store.insert_soa(
        apex.clone(),
        300,
        SOA {
            mname: domain("ns1.example.test."),
            rname: domain("hostmaster.example.test."),
            serial: 1,
            refresh: 3600,
            retry: 600,
            expire: 86400,
            minimum: 300,
        },
    );
    store.insert(
        apex.clone(),
        300,
        dns_types::protocol::types::RecordTypeWithData::NS {
            nsdname: domain("ns1.example.test."),
        },
    );
    for i in 0..256u8 {
        store.insert(
            domain(&format!("host{i}.example.test.")),
            300,
            dns_types::protocol::types::RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, i),
            },
        );
    }
    store.insert(
        domain("alias.example.test."),
        300,
        dns_types::protocol::types::RecordTypeWithData::CNAME {
            cname: domain("host0.example.test."),
        },
    );
    store.insert(
        domain("*.wild.example.test."),
        300,
        dns_types::protocol::types::RecordTypeWithData::A {
            address: Ipv4Addr::new(192, 0, 2, 250),
        },
    );
    store.finish_apex(&apex);
    store
}

#[allow(non_snake_case)]
fn bench__exact_match(c: &mut Criterion) {
    let store = fixture();
    let qname = domain("host128.example.test.");
    c.bench_function("resolve exact match", |b| {
        b.iter(|| resolve(&qname, RecordType::A, &store));
    });
}

#[allow(non_snake_case)]
fn bench__cname_chase(c: &mut Criterion) {
    let store = fixture();
    let qname = domain("alias.example.test.");
    c.bench_function("resolve cname chase", |b| {
        b.iter(|| resolve(&qname, RecordType::A, &store));
    });
}

#[allow(non_snake_case)]
fn bench__wildcard(c: &mut Criterion) {
    let store = fixture();
    let qname = domain("anything.wild.example.test.");
    c.bench_function("resolve wildcard synthesis", |b| {
        b.iter(|| resolve(&qname, RecordType::A, &store));
    });
}

#[allow(non_snake_case)]
fn bench__nxdomain(c: &mut Criterion) {
    let store = fixture();
    let qname = domain("nope.example.test.");
    c.bench_function("resolve nxdomain", |b| {
        b.iter(|| resolve(&qname, RecordType::A, &store));
    });
}

criterion_group!(
    benches,
    bench__exact_match,
    bench__cname_chase,
    bench__wildcard,
    bench__nxdomain
);
criterion_main!(benches);
