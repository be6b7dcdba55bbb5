use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ronin::{lexer, parser, token::FileId};

const STACK: &str = include_str!("../../demos/stack.rn");

fn bench_parser(c: &mut Criterion) {
    let tokens = lexer::lex_in_new(STACK, FileId(0));
    c.bench_function("parse stack.rn", |b| {
        b.iter(|| parser::parse_tokens(black_box(&tokens), FileId(0)));
    });
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
