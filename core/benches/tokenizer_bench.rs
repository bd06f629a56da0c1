use criterion::{criterion_group, criterion_main, Criterion};
use revdex_core::tokenizer::tokenize;

const REVIEW: &str = "The GPS map is really useful, but the screen cracked after a week. \
    Audio quality is poor and the wifi signal drops constantly. Would not buy again!";

fn bench_tokenize(c: &mut Criterion) {
    let text = REVIEW.repeat(64);
    c.bench_function("tokenize_reviews", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
