//! Benchmarks for the request/response translation hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use vertex_gateway::config::GenerationDefaults;
use vertex_gateway::openai::{ChatCompletionRequest, ChatMessage};
use vertex_gateway::translate::request::build_generate_request;
use vertex_gateway::translate::stream::{ChunkTranslator, SentenceBuffer};
use vertex_gateway::vertex::types::GenerateContentResponse;

fn bench_request_translation(c: &mut Criterion) {
    // A 200-turn conversation.
    let mut messages = vec![ChatMessage::text("system", "You are a helpful assistant.")];
    for i in 0..100 {
        messages.push(ChatMessage::text("user", &format!("Question number {i}?")));
        messages.push(ChatMessage::text("assistant", &format!("Answer number {i}.")));
    }
    let request: ChatCompletionRequest = serde_json::from_value(json!({
        "model": "gpt-4",
        "messages": messages,
        "temperature": 0.3,
        "stop": ["\n\n"]
    }))
    .unwrap();
    let defaults = GenerationDefaults::default();

    c.bench_function("build_generate_request_200_turns", |b| {
        b.iter(|| black_box(build_generate_request(black_box(&request), &defaults).unwrap()))
    });
}

fn bench_stream_translation(c: &mut Criterion) {
    // 1,000 small stream events of a few tokens each.
    let events: Vec<GenerateContentResponse> = (0..1_000)
        .map(|i| {
            let text = if i % 7 == 0 { "end. " } else { "some words " };
            serde_json::from_value(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            }))
            .unwrap()
        })
        .collect();

    c.bench_function("stream_1k_events_sentence_buffered", |b| {
        b.iter(|| {
            let mut translator = ChunkTranslator::new("gpt-4", SentenceBuffer::new(200), true);
            let mut n = 0;
            for event in events.iter().cloned() {
                n += translator.on_response(event).len();
            }
            n += translator.finish().len();
            black_box(n);
        })
    });

    c.bench_function("sentence_buffer_push_10k", |b| {
        b.iter(|| {
            let mut buffer = SentenceBuffer::new(200);
            let mut n = 0;
            for i in 0..10_000 {
                let piece = if i % 13 == 0 { "stop. " } else { "tok " };
                n += buffer.push(black_box(piece)).len();
            }
            black_box((n, buffer.flush()));
        })
    });
}

criterion_group!(benches, bench_request_translation, bench_stream_translation);
criterion_main!(benches);
