//! End-to-end parse benchmarks.
//!
//! The rule table is built before measuring so every sample reflects a warm
//! parser.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shike_engine::{lunar_to_solar, solar_to_lunar, ParseOptions, TimeBaseInput, TimeParser};

const EXPRESSIONS: [(&str, &str); 8] = [
    ("date", "2015年8月12日"),
    ("clock", "明天下午3点半"),
    ("festival", "去年中秋节前后"),
    ("lunar", "农历八月十五"),
    ("span", "12月9日零时至12月16日24时"),
    ("delta", "三年以上"),
    ("delta_conversion", "未来三天内"),
    ("period", "每周五下午4点"),
];

fn bench_parse(c: &mut Criterion) {
    let parser = TimeParser::new();
    let base = TimeBaseInput::Text("2021-06-14 10:00:00".to_string());
    let options = ParseOptions::default();
    let mut group = c.benchmark_group("parse");

    for (name, text) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| parser.parse(black_box(text), &base, &options));
        });
    }

    group.finish();
}

fn bench_lunar(c: &mut Criterion) {
    let mut group = c.benchmark_group("lunar");

    group.bench_function("lunar_to_solar", |b| {
        b.iter(|| lunar_to_solar(black_box(2033), black_box(11), black_box(15), black_box(true)));
    });

    let date = chrono::NaiveDate::from_ymd_opt(2021, 9, 21).unwrap();
    group.bench_function("solar_to_lunar", |b| {
        b.iter(|| solar_to_lunar(black_box(date)));
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_lunar);
criterion_main!(benches);
