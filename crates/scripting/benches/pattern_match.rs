//! Benchmarks for pattern matching and statement parsing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_scripting::builtins::default_registry;
use trellis_scripting::pattern::compile;
use trellis_scripting::ParserState;

const PATTERNS: &[(&str, &str, &str)] = &[
    ("literal", "[the] event", "the event"),
    ("placeholders", "%objects% (is|are) [not] %objects%", "{x} is not 1, 2 or 3"),
    (
        "choices",
        "%number% (is|are) (greater|more|less|smaller) than [or equal to] %number%",
        "{score} is greater than or equal to 100",
    ),
    ("regex", "set \\{<.+>\\} to %object%", "set {players::%{_i}%::name} to \"steve\""),
];

fn bench_matching(c: &mut Criterion) {
    let Ok(registry) = default_registry() else {
        return;
    };
    let mut group = c.benchmark_group("pattern_match");
    for (name, source, input) in PATTERNS {
        let Ok(pattern) = compile(source, registry.types()) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| pattern.matches(black_box(input)))
        });
    }
    group.finish();
}

fn bench_statements(c: &mut Criterion) {
    let Ok(registry) = default_registry() else {
        return;
    };
    let lines = [
        "broadcast \"hello %{_name}%\"",
        "add 1 to {counter}",
        "{counter} is greater than 10",
        "wait 5 ticks",
    ];
    c.bench_function("parse_statements", |b| {
        b.iter(|| {
            let mut state = ParserState::new(registry.clone());
            for line in lines {
                black_box(state.parse_statement(black_box(line)));
            }
        })
    });
}

criterion_group!(benches, bench_matching, bench_statements);
criterion_main!(benches);
