//! End-to-end solver runs on the standard test problems.

use descent::{
    coordinate_descent, gauss_newton, gradient_descent, newton, quasi_newton,
    CoordinateDescentConfig, GaussNewtonConfig, GradientDescentConfig, LeastSquares,
    LeastSquaresMethod, LeastSquaresObjective, LineSearch, NewtonConfig, NonSmooth, Objective,
    QuadraticFunction, QuasiNewtonConfig, QuasiNewtonMethod, TerminationReason,
};

/// f(x) = 100 (x1 - x0^2)^2 + (1 - x0)^2, minimum at (1, 1).
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

    fn hessian(&mut self, x: &[f64]) -> Result<Vec<Vec<f64>>, NonSmooth> {
        Ok(vec![
            vec![-400.0 * (x[1] - 3.0 * x[0] * x[0]) + 2.0, -400.0 * x[0]],
            vec![-400.0 * x[0], 200.0],
        ])
    }
}

struct RosenbrockResiduals;

impl LeastSquaresObjective<f64> for RosenbrockResiduals {
    fn dim(&self) -> usize {
        2
    }

    fn residuals(&mut self, x: &[f64]) -> Vec<f64> {
        vec![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]]
    }

    fn jacobian(&mut self, x: &[f64]) -> Vec<Vec<f64>> {
        vec![vec![-20.0 * x[0], 10.0], vec![-1.0, 0.0]]
    }
}

fn quadratic() -> QuadraticFunction<f64> {
    QuadraticFunction::new(vec![vec![1.0, 0.5], vec![0.5, 1.0]], vec![1.0, 2.0])
}

const ROSENBROCK_START: [f64; 2] = [-1.2, 1.0];

fn assert_near(x: &[f64], expected: &[f64], tol: f64, label: &str) {
    for (a, b) in x.iter().zip(expected.iter()) {
        assert!(
            (a - b).abs() < tol,
            "{}: got {:?}, expected {:?} within {}",
            label,
            x,
            expected,
            tol
        );
    }
}

#[test]
fn gradient_descent_quadratic() {
    let result = gradient_descent(
        &mut quadratic(),
        &[0.0, 0.0],
        &GradientDescentConfig::default(),
    )
    .unwrap();
    assert_near(&result.x, &[0.0, 2.0], 1e-2, "gradient descent");
}

#[test]
fn newton_rosenbrock() {
    let result = newton(&mut Rosenbrock, &ROSENBROCK_START, &NewtonConfig::default()).unwrap();
    assert_near(&result.x, &[1.0, 1.0], 0.2, "newton");
}

#[test]
fn quasi_newton_rosenbrock() {
    for method in [
        QuasiNewtonMethod::Bfgs,
        QuasiNewtonMethod::LimitedMemoryBfgs { memory: 10 },
    ] {
        let config = QuasiNewtonConfig {
            method,
            ..QuasiNewtonConfig::default()
        };
        let result = quasi_newton(&mut Rosenbrock, &ROSENBROCK_START, &config).unwrap();
        assert_near(&result.x, &[1.0, 1.0], 0.2, &format!("{:?}", method));
    }
}

#[test]
fn gauss_newton_rosenbrock() {
    for method in [LeastSquaresMethod::Qr, LeastSquaresMethod::Svd] {
        let mut obj = LeastSquares::new(RosenbrockResiduals);
        let config = GaussNewtonConfig {
            method,
            ..GaussNewtonConfig::default()
        };
        let result = gauss_newton(&mut obj, &ROSENBROCK_START, &config).unwrap();
        assert_near(&result.x, &[1.0, 1.0], 0.2, &format!("{:?}", method));
    }
}

#[test]
fn coordinate_descent_quadratic() {
    let result = coordinate_descent(
        &mut quadratic(),
        &[0.0, 0.0],
        &CoordinateDescentConfig::default(),
    )
    .unwrap();
    assert_near(&result.x, &[0.0, 2.0], 1e-2, "coordinate descent");
}

#[test]
fn exact_line_search_on_quadratic() {
    let obj = quadratic();
    let config = GradientDescentConfig {
        line_search: LineSearch::Exact {
            hessian: obj.a().to_vec(),
        },
        ..GradientDescentConfig::default()
    };
    let result = gradient_descent(&mut quadratic(), &[0.0, 0.0], &config).unwrap();
    assert_near(&result.x, &[0.0, 2.0], 1e-2, "exact line search");
}

#[test]
fn evaluation_counts_are_populated() {
    let result = quasi_newton(
        &mut Rosenbrock,
        &ROSENBROCK_START,
        &QuasiNewtonConfig::default(),
    )
    .unwrap();
    assert!(result.evals.values > 0);
    assert!(result.evals.gradients > 0);
    // Every iteration re-evaluates at least once
    assert!(result.evals.values >= result.iterations);
}

#[test]
fn iteration_cap_is_honored() {
    let config = QuasiNewtonConfig {
        convergence: descent::ConvergenceParams {
            max_iterations: 3,
            check_point: false,
            check_objective: false,
            check_gradient: false,
            ..descent::ConvergenceParams::default()
        },
        ..QuasiNewtonConfig::default()
    };
    let result = quasi_newton(&mut Rosenbrock, &ROSENBROCK_START, &config).unwrap();
    assert_eq!(result.iterations, 3);
    assert!(matches!(result.termination, TerminationReason::MaxIterations));
}

#[test]
fn finite_difference_fallback_matches_analytic_gradient() {
    /// Rosenbrock with only `value` implemented.
    struct ValueOnly;
    impl Objective<f64> for ValueOnly {
        fn dim(&self) -> usize {
            2
        }
        fn value(&mut self, x: &[f64]) -> f64 {
            100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2)
        }
    }

    let x = [0.3, -0.7];
    let numeric = ValueOnly.gradient(&x).unwrap();
    let analytic = Rosenbrock.gradient(&x).unwrap();
    for (n, a) in numeric.iter().zip(analytic.iter()) {
        assert!((n - a).abs() < 1e-4, "numeric {:?} vs analytic {:?}", numeric, analytic);
    }
}
