use bussin::lexer::tokenize;
use bussin::slang::canonicalize;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

// A reasonably varied unit, repeated to get a meaningful input size
const UNIT: &str = r#"
// Calculate the nth Fibonacci number
fn fib(n) {
    if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }
}

/* a block comment
   spanning lines */
let config = { name: "bench", "retries": 3, nested: [1, 2.5, -4, "esc \"q\" \n\t"] }
for (let i = 0; i < 10; i++) {
    config.retries += i * -1
    config.nested[0] = i > 5 -> "big" | "small"
}
try { missing } catch { print(error.message) }
"#;

fn bench_input() -> String {
    UNIT.repeat(64)
}

fn slang_input() -> String {
    r#"
bruh fib(n) {
    sus (n < 2) { n } impostor { fib(n - 1) + fib(n - 2) }
}
bet xs be [nocap, cap, fake] rn
yall (bet i be 0; i < 3; i++) { waffle("bet stays", xs[i] fr nocap) }
"#
    .repeat(64)
}

fn bench_tokenizers(c: &mut Criterion) {
    let input = bench_input();
    let slang = slang_input();
    let mut group = c.benchmark_group("Lexer");

    group.bench_with_input(BenchmarkId::new("tokenize", "canonical"), &input, |b, input| {
        b.iter(|| tokenize(black_box(input)))
    });

    group.bench_with_input(BenchmarkId::new("canonicalize", "slang"), &slang, |b, input| {
        b.iter(|| canonicalize(black_box(input)))
    });

    group.bench_with_input(
        BenchmarkId::new("canonicalize+tokenize", "slang"),
        &slang,
        |b, input| b.iter(|| tokenize(&canonicalize(black_box(input))).map(|tokens| tokens.len())),
    );

    group.finish();
}

criterion_group!(benches, bench_tokenizers);
criterion_main!(benches);
