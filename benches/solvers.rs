use criterion::{black_box, criterion_group, criterion_main, Criterion};

use descent::{
    quasi_newton, NonSmooth, Objective, QuasiNewtonConfig, QuasiNewtonMethod,
};

struct Rosenbrock;

impl Objective<f64> for Rosenbrock {
    fn dim(&self) -> usize {
        2
    }

    fn value(&mut self, x: &[f64]) -> f64 {
        100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2)
    }

    fn gradient(&mut self, x: &[f64]) -> Result<Vec<f64>, NonSmooth> {
        Ok(vec![
            -400.0 * x[0] * (x[1] - x[0] * x[0]) - 2.0 * (1.0 - x[0]),
            200.0 * (x[1] - x[0] * x[0]),
        ])
    }
}

fn bench_rosenbrock(c: &mut Criterion) {
    let mut group = c.benchmark_group("rosenbrock");
    for (name, method) in [
        ("bfgs", QuasiNewtonMethod::Bfgs),
        ("lbfgs", QuasiNewtonMethod::LimitedMemoryBfgs { memory: 10 }),
    ] {
        let config = QuasiNewtonConfig {
            method,
            ..QuasiNewtonConfig::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| {
                quasi_newton(&mut Rosenbrock, black_box(&[-1.2, 1.0]), &config).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rosenbrock);
criterion_main!(benches);
