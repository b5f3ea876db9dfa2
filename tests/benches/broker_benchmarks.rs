//! # Channel Broker Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | Port ids | `allocate_pair` on the caller's thread |
//! | URL patterns | match cost for the pattern shapes targets declare |
//! | Routing | messages through a running coordination loop |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mc_broker::adapters::InMemoryEnvironment;
use mc_broker::{
    BrokerConfig, BrokerService, MessageBrokerApi, OpenChannelRequest, PortIdAllocator,
    TargetDescriptor, UrlPattern,
};
use shared_types::{ContextId, Message, SourceContext};
use std::time::Duration;

fn bench_port_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("port-ids");
    let allocator = PortIdAllocator::new();
    group.bench_function("allocate_pair", |b| b.iter(|| black_box(allocator.allocate_pair())));

    let small = PortIdAllocator::with_period(16);
    group.bench_function("allocate_pair_wrapping", |b| {
        b.iter(|| black_box(small.allocate_pair()))
    });
    group.finish();
}

fn bench_url_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("url-patterns");
    let url = "https://app.example.com/some/deep/path/page.html?query=1";

    for pattern in [
        "<all_urls>",
        "https://app.example.com/*",
        "*://*.example.com/*",
        "https://*/some/*/path/*.html*",
    ] {
        let parsed = UrlPattern::parse(pattern).expect("bench pattern");
        group.bench_with_input(BenchmarkId::new("matches", pattern), &parsed, |b, p| {
            b.iter(|| black_box(p.matches(black_box(url))))
        });
    }
    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("routing");
    group.measurement_time(Duration::from_secs(10));

    for batch in [1usize, 100, 1_000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("post_message", batch), &batch, |b, &batch| {
            let env = InMemoryEnvironment::new();
            env.targets.install(TargetDescriptor::new("target"));
            env.activation.set_resident("target", ContextId(100));
            let (broker, _task) = runtime
                .block_on(async { BrokerService::new(BrokerConfig::default(), env.ports()).spawn() });
            let opener = broker
                .open_channel(OpenChannelRequest::new(
                    SourceContext::identity(ContextId(1), "bench"),
                    "target",
                    "",
                ))
                .expect("open");

            b.iter(|| {
                runtime.block_on(async {
                    for _ in 0..batch {
                        broker.post_message(opener, Message::new("payload")).expect("post");
                    }
                    broker.status().await.expect("status");
                });
                env.dispatcher.clear();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_port_allocation, bench_url_patterns, bench_routing);
criterion_main!(benches);
