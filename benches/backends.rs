//! Backend Benchmarks
//!
//! Compares the per-evaluation cost of the interpreting and compiling backends, and
//! the one-time cost of setting an expression on each of them.
//!
//! ## Benchmark Structure
//!
//! ### 1. Evaluation (`benchmark_evaluation`)
//! Every expression is set once during setup; only `evaluate` is measured. The bound
//! variables are owned by the benchmark and stay alive for the whole group.
//!
//! ### 2. Compilation Time (`benchmark_compilation`)
//! Measures `set_expression`, which parses and compiles eagerly. For the compiling
//! backend this includes code generation, the optimizer pipeline and finalization.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench backends`

use std::{cell::Cell, hint::black_box};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use formula_jit::{BackendChoice, Formula};

const EXPRESSIONS: [(&str, &str); 6] = [
    ("simple_add", "a + 1.1"),
    ("polynomial", "a^2 / (2 * pi / b) - a / 2.2"),
    ("nested_expr", "((a + b) * (a - b)) / ((c + 1) * (c - 1))"),
    ("comparisons", "if(a > b, a, b) + (c <= a) * sign(b - c)"),
    ("functions", "sin(a) * cos(b) + sqrt(a^2 + b^2) / (1 + exp(-c))"),
    ("assignment", "c = ln(a + 2) + log2(b + 1) * 0.5"),
];

/// Variables shared by every formula of a benchmark.
struct Inputs {
    a: Cell<f64>,
    b: Cell<f64>,
    c: Cell<f64>,
}

impl Inputs {
    fn new() -> Self {
        Self {
            a: Cell::new(2.5),
            b: Cell::new(1.8),
            c: Cell::new(0.7),
        }
    }

    fn bind(&self, formula: &mut Formula) {
        // SAFETY: `Inputs` outlives every formula bound to it in this file.
        unsafe {
            formula.set_variable("a", self.a.as_ptr());
            formula.set_variable("b", self.b.as_ptr());
            formula.set_variable("c", self.c.as_ptr());
        }
    }
}

fn benchmark_evaluation(c: &mut Criterion) {
    let inputs = Inputs::new();
    let mut group = c.benchmark_group("Evaluation");

    for backend in BackendChoice::ALL {
        for (name, expression) in EXPRESSIONS {
            let Some(mut formula) = Formula::new(backend) else {
                continue;
            };
            inputs.bind(&mut formula);
            if !formula.set_expression(expression) {
                continue;
            }

            group.bench_function(BenchmarkId::new(backend.name(), name), |b| {
                b.iter(|| {
                    inputs.a.set(black_box(2.5));
                    black_box(formula.evaluate())
                })
            });
        }
    }

    group.finish();
}

fn benchmark_compilation(c: &mut Criterion) {
    let inputs = Inputs::new();
    let mut group = c.benchmark_group("Compilation Time");

    for backend in BackendChoice::ALL {
        let Some(mut formula) = Formula::new(backend) else {
            continue;
        };
        inputs.bind(&mut formula);

        for (name, expression) in EXPRESSIONS {
            group.bench_with_input(
                BenchmarkId::new(backend.name(), name),
                expression,
                |b, expression| b.iter(|| black_box(formula.set_expression(expression))),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_evaluation, benchmark_compilation);
criterion_main!(benches);
