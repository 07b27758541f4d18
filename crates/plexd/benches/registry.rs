// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Export registry micro-benchmarks: announce, query and revoke throughput
//! at a few registry sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use plexd::{Capability, CapabilitySet, ExportRecord, ExportTable, OwnerId, PublishMethod};
use std::time::Duration;

fn record(endpoint: &str, cap: &str) -> ExportRecord {
    ExportRecord::new(
        OwnerId::generate(),
        CapabilitySet::from_names(&[cap]),
        PublishMethod::TcpRpc,
        endpoint,
        Duration::from_secs(30),
    )
}

fn populated(n: usize) -> ExportTable {
    let table = ExportTable::new();
    for i in 0..n {
        let cap = if i % 10 == 0 { "hot" } else { "cold" };
        table.announce(record(&format!("tcp://host:{}", 10_000 + i), cap));
    }
    table
}

fn bench_announce(c: &mut Criterion) {
    c.bench_function("announce_into_1k", |b| {
        let table = populated(1_000);
        let mut i = 0u32;
        b.iter(|| {
            i += 1;
            table.announce(record(&format!("tcp://bench:{}", i), "bench"));
        });
    });
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_by_capability");
    for size in [100usize, 1_000, 10_000] {
        let table = populated(size);
        let capability = Capability::new("hot");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| table.query_by_capability(&capability));
        });
    }
    group.finish();
}

fn bench_revoke_absent(c: &mut Criterion) {
    c.bench_function("revoke_absent_in_1k", |b| {
        let table = populated(1_000);
        let owner = OwnerId::generate();
        b.iter(|| table.revoke(&owner, PublishMethod::TcpRpc, "tcp://nowhere:1"));
    });
}

criterion_group!(benches, bench_announce, bench_query, bench_revoke_absent);
criterion_main!(benches);
