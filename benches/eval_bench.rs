use bussin::{Environment, evaluate, parse_str};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const PROGRAMS: [(&str, &str); 3] = [
    (
        "fib",
        "fn fib(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } } fib(18)",
    ),
    (
        "loop_paths",
        r#"
        let grid = { rows: [] }
        for (let i = 0; i < 200; i++) {
            push(grid.rows, { index: i, cells: [i, i * 2, i * 3] })
            grid.rows[i].cells[1] += 1
        }
        len(grid.rows)
        "#,
    ),
    (
        "closures",
        r#"
        fn counter() { let n = 0; fn () { n++ } }
        let next = counter()
        for (let i = 0; i < 500; i++) { next() }
        next()
        "#,
    ),
];

fn bench_evaluator(c: &mut Criterion) {
    let mut group = c.benchmark_group("Evaluator");

    for (name, source) in PROGRAMS {
        let program = match parse_str(source) {
            Ok(program) => program,
            Err(e) => panic!("benchmark program '{}' failed to parse: {}", name, e),
        };
        group.bench_with_input(BenchmarkId::new("evaluate", name), &program, |b, program| {
            b.iter(|| {
                let env = Environment::new_global_populated();
                evaluate(black_box(program), &env)
            })
        });
        group.bench_with_input(BenchmarkId::new("parse+evaluate", name), &source, |b, source| {
            b.iter(|| {
                let env = Environment::new_global_populated();
                parse_str(black_box(source)).map(|program| evaluate(&program, &env).is_ok())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluator);
criterion_main!(benches);
