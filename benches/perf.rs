use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use pitchside::news::{BODY_MAX_CHARS, NewsPayload, clamp_text, create_fields};
use pitchside::sports_api::parse_data_envelope;
use pitchside::store::{Document, Fields, FieldValue, OrderBy, sort_documents};
use pitchside::store::firestore::parse_run_query;

const STANDINGS_JSON: &str = include_str!("../tests/fixtures/standings_season.json");
const RUN_QUERY_JSON: &str = include_str!("../tests/fixtures/firestore_run_query.json");

fn news_documents(count: usize) -> Vec<Document> {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let mut fields = Fields::new();
            fields.insert(
                "publishedAt".to_string(),
                FieldValue::Timestamp(base + Duration::hours((i % 97) as i64)),
            );
            fields.insert(
                "createdAt".to_string(),
                FieldValue::Timestamp(base + Duration::minutes(i as i64)),
            );
            Document {
                id: format!("doc{i:05}"),
                fields,
            }
        })
        .collect()
}

fn bench_clamp_body(c: &mut Criterion) {
    let raw = format!("  {}  ", "é".repeat(BODY_MAX_CHARS * 2));
    c.bench_function("clamp_body", |b| {
        b.iter(|| black_box(clamp_text(black_box(&raw), BODY_MAX_CHARS)))
    });
}

fn bench_create_fields(c: &mut Criterion) {
    let payload = NewsPayload {
        title: "Matchday 12 roundup ".repeat(10),
        body: "Full time. ".repeat(2_000),
        image_url: Some(" https://img.test/a.png ".to_string()),
        published_at: None,
    };
    c.bench_function("create_fields", |b| {
        b.iter(|| black_box(create_fields(black_box(&payload))))
    });
}

fn bench_sort_news(c: &mut Criterion) {
    let docs = news_documents(2_000);
    let order = [OrderBy::desc("publishedAt"), OrderBy::desc("createdAt")];
    c.bench_function("sort_news_2000", |b| {
        b.iter(|| black_box(sort_documents(docs.clone(), &order)))
    });
}

fn bench_standings_parse(c: &mut Criterion) {
    c.bench_function("standings_parse", |b| {
        b.iter(|| black_box(parse_data_envelope(black_box(STANDINGS_JSON)).unwrap()))
    });
}

fn bench_run_query_parse(c: &mut Criterion) {
    c.bench_function("run_query_parse", |b| {
        b.iter(|| black_box(parse_run_query(black_box(RUN_QUERY_JSON)).unwrap()))
    });
}

criterion_group!(
    perf,
    bench_clamp_body,
    bench_create_fields,
    bench_sort_news,
    bench_standings_parse,
    bench_run_query_parse
);
criterion_main!(perf);
