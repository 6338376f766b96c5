//! Usage observation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use llmusage::config::Settings;
use llmusage::services::{AiStats, HandlerRegistry, RequestContext, UsageObserver};
use serde_json::{json, Value};
use std::sync::Arc;

/// Create an observer with private statistics
fn create_test_observer() -> UsageObserver {
    UsageObserver::new(&Settings::default(), None).with_stats(Arc::new(AiStats::new()))
}

/// Create a REST chat completion with some message content
fn create_openai_response() -> Value {
    json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello! How can I help you today?"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 15, "completion_tokens": 10, "total_tokens": 25}
    })
}

/// Create an Anthropic event stream of the given length
fn create_anthropic_events(deltas: usize) -> Vec<Value> {
    let mut events = vec![json!({
        "type": "message_start",
        "message": {"model": "claude-sonnet-4-5", "usage": {"input_tokens": 25, "output_tokens": 1}}
    })];
    events.extend((0..deltas).map(|i| {
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": format!("token{}", i)}})
    }));
    events.push(json!({"type": "message_delta", "usage": {"output_tokens": deltas}}));
    events.push(json!({"type": "message_stop"}));
    events
}

/// Benchmark: registry resolution
fn bench_resolve(c: &mut Criterion) {
    let registry = HandlerRegistry::with_defaults();

    c.bench_function("resolve_known_library", |b| {
        b.iter(|| registry.resolve(black_box("AWSSDK.BedrockRuntime, Version=3.7.0.0")))
    });

    c.bench_function("resolve_unknown_library", |b| {
        b.iter(|| registry.resolve(black_box("System.Net.Http, Version=8.0.0.0")))
    });
}

/// Benchmark: single-shot extraction and commit
fn bench_single_shot(c: &mut Criterion) {
    let observer = create_test_observer();
    let raw = create_openai_response();
    let ctx = RequestContext::new();

    c.bench_function("observe_openai_response", |b| {
        b.iter(|| {
            observer.on_call_completed(
                black_box("OpenAI"),
                black_box("OpenAI.Chat.ChatClient.CompleteChat"),
                black_box(&raw),
                &ctx,
            )
        })
    });

    let unknown = json!({"choices": [], "data": {"nested": [1, 2, 3]}});
    c.bench_function("observe_unknown_shape", |b| {
        b.iter(|| observer.on_call_completed("OpenAI", "CompleteChat", black_box(&unknown), &ctx))
    });
}

/// Benchmark: per-chunk stream overhead at several stream lengths
fn bench_stream(c: &mut Criterion) {
    let observer = create_test_observer();
    let mut group = c.benchmark_group("stream_observation");

    for deltas in [10usize, 100, 1000] {
        let events = create_anthropic_events(deltas);

        group.bench_with_input(BenchmarkId::new("passthrough", deltas), &events, |b, events| {
            b.iter(|| events.iter().cloned().map(black_box).count())
        });

        group.bench_with_input(BenchmarkId::new("observed", deltas), &events, |b, events| {
            let ctx = RequestContext::new();
            b.iter(|| {
                observer
                    .on_infallible_stream("Anthropic", "Anthropic.Messages.StreamAsync", events.iter().cloned(), &ctx)
                    .map(black_box)
                    .count()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_single_shot, bench_stream);

criterion_main!(benches);
