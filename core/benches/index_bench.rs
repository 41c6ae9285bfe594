use criterion::{criterion_group, criterion_main, Criterion};
use spimi_core::tokenizer::Tokenizer;
use spimi_core::{build_index, IndexConfig, SearchConfig, Searcher, SourceDocument};

const WORDS: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet", "kilo", "lima", "mike",
    "november", "oscar", "papa", "quebec", "romeo", "sierra", "tango", "uniform", "victor", "whiskey", "xray",
];

fn corpus(n: usize) -> Vec<SourceDocument> {
    (0..n)
        .map(|i| {
            let body: Vec<&str> = (0..40).map(|j| WORDS[(i * 7 + j * j) % WORDS.len()]).collect();
            SourceDocument::new(format!("doc-{i}"), vec![WORDS[i % WORDS.len()].to_string(), body.join(" ")])
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = corpus(50).iter().flat_map(|d| d.fields.clone()).collect::<Vec<_>>().join("\n");
    let tokenizer = Tokenizer::default();
    c.bench_function("tokenize_fifty_documents", |b| b.iter(|| tokenizer.tokenize(&text)));
}

fn bench_build(c: &mut Criterion) {
    let docs = corpus(2_000);
    let mut group = c.benchmark_group("build");
    group.sample_size(10);
    group.bench_function("in_memory", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            build_index(IndexConfig::new(dir.path()), docs.iter().cloned().map(Ok)).unwrap()
        })
    });
    group.bench_function("spilling", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let cfg = IndexConfig { memory_budget_mb: 0.05, max_index_segment_mb: 0.01, ..IndexConfig::new(dir.path()) };
            build_index(cfg, docs.iter().cloned().map(Ok)).unwrap()
        })
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = IndexConfig { max_index_segment_mb: 0.01, ..IndexConfig::new(dir.path()) };
    build_index(cfg, corpus(2_000).into_iter().map(Ok)).unwrap();
    let searcher = Searcher::open(&SearchConfig::new(dir.path())).unwrap();
    c.bench_function("query_three_terms", |b| b.iter(|| searcher.query("echo tango kilo").unwrap()));
}

criterion_group!(benches, bench_tokenize, bench_build, bench_query);
criterion_main!(benches);
