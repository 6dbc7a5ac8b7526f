// Benchmark tree-sitter parsing and code-unit extraction throughput.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use skald_units::{CodeUnitExtractor, ExtractOptions};

fn generate_python_source(functions: usize) -> String {
    use std::fmt::Write;
    let mut src = String::new();
    for i in 0..functions {
        let _ = write!(
            src,
            "def func_{i}(x):\n    \"\"\"Doc for func_{i}.\"\"\"\n    return helper_{i}(x + 1)\n\n"
        );
    }
    src
}

fn generate_python_classes(classes: usize, methods: usize) -> String {
    use std::fmt::Write;
    let mut src = String::new();
    for c in 0..classes {
        let _ = writeln!(src, "class Service{c}:");
        for m in 0..methods {
            let _ = write!(src, "    def method_{m}(self, x):\n        return x * {m}\n\n");
        }
    }
    src
}

fn bench_top_level(c: &mut Criterion) {
    let extractor = CodeUnitExtractor::python();
    let mut group = c.benchmark_group("extract_top_level");

    for func_count in [10, 50, 200] {
        let source = generate_python_source(func_count);
        group.bench_with_input(
            BenchmarkId::new("python_functions", func_count),
            &source,
            |b, src| {
                b.iter(|| extractor.extract(src, "bench.py").unwrap());
            },
        );
    }
    group.finish();
}

fn bench_nested(c: &mut Criterion) {
    let extractor = CodeUnitExtractor::python().with_options(ExtractOptions {
        include_nested: true,
    });
    let mut group = c.benchmark_group("extract_nested");

    for class_count in [5, 20] {
        let source = generate_python_classes(class_count, 10);
        group.bench_with_input(
            BenchmarkId::new("python_methods", class_count),
            &source,
            |b, src| {
                b.iter(|| extractor.extract(src, "bench.py").unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_top_level, bench_nested);
criterion_main!(benches);
