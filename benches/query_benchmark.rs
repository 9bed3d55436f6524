use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;
use structdb::core::config::Config;
use structdb::core::types::DataTypeFamily;
use structdb::query::cache::QueryCache;
use structdb::query::dialect::DialectKind;
use structdb::query::generator::{QueryGenerator, QueryShape};
use structdb::query::parser::parse_lambda;
use structdb::query::query::QueryBuilder;
use structdb::schema::schema::StructureSchema;

fn schema() -> StructureSchema {
    StructureSchema::builder("Item")
        .guid_id("Id")
        .index("Int1", DataTypeFamily::Integer)
        .index("String1", DataTypeFamily::String)
        .index("Bool1", DataTypeFamily::Boolean)
        .enumerable("Tags", DataTypeFamily::String)
        .build()
        .unwrap()
}

const EXPRESSION: &str =
    "i => (i.Int1 >= low && i.Int1 < high) || (i.String1.StartsWith(\"abc\") && !i.Bool1) || i.Tags.Contains(\"x\")";

/// Benchmark the text front-end alone
fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_lambda", |b| {
        b.iter(|| black_box(parse_lambda(EXPRESSION).unwrap()));
    });
}

/// Benchmark lowering plus SQL generation for both dialects
fn bench_compile(c: &mut Criterion) {
    let schema = schema();
    let mut group = c.benchmark_group("compile");

    for dialect in [DialectKind::RowNumber, DialectKind::OffsetFetch] {
        let generator = QueryGenerator::new(&Config::default().with_dialect(dialect));
        group.bench_function(format!("{:?}", dialect), |b| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let low: i64 = rng.gen_range(0..1000);
                let query = QueryBuilder::new(&schema)
                    .bind("low", low)
                    .bind("high", low + 100)
                    .filter(EXPRESSION)
                    .unwrap()
                    .order_by("i => i.String1")
                    .unwrap()
                    .page(1, 50)
                    .unwrap()
                    .build();
                black_box(generator.generate(&schema, &query).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark cache hits for a fixed query
fn bench_cached(c: &mut Criterion) {
    let schema = schema();
    let generator = QueryGenerator::new(&Config::default());
    let cache = QueryCache::new(256);
    let query = QueryBuilder::new(&schema)
        .bind("low", 1)
        .bind("high", 2)
        .filter(EXPRESSION)
        .unwrap()
        .build();

    c.bench_function("cached_generate", |b| {
        b.iter(|| black_box(cache.get_or_generate(&generator, &schema, &query, QueryShape::Full).unwrap()));
    });
}

criterion_group!(benches, bench_parse, bench_compile, bench_cached);
criterion_main!(benches);
