use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ronin::{lexer, token::FileId};

const STACK: &str = include_str!("../../demos/stack.rn");

fn bench_lexer(c: &mut Criterion) {
    c.bench_function("lex stack.rn", |b| {
        let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
        b.iter(|| {
            tokens.clear();
            lexer::lex(black_box(STACK), FileId(0), &mut tokens);
        });
    });
}

criterion_group!(benches, bench_lexer);
criterion_main!(benches);
