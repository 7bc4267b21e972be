//! Gauss-Newton for nonlinear least squares `f = 1/2 ||r(x)||^2`.
//!
//! Each direction solves the linearized subproblem `min_d ||J d + r||` with a
//! selectable dense method, then a line search globalizes the step.

use std::fmt;

use num_traits::Float;

use crate::convergence::ConvergenceParams;
use crate::error::OptimError;
use crate::line_search::{LineSearch, WolfeParams};
use crate::linalg::{
    cholesky, cholesky_solve, conjugate_gradient, matvec_t, qr_least_squares, svd_least_squares,
};
use crate::objective::{LeastSquares, LeastSquaresObjective, Tally};
use crate::result::OptimResult;
use crate::state::{self, IterationState, Strategy};

/// Dense method used for the linearized subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LeastSquaresMethod {
    /// Normal equations `J^T J d = -J^T r` by Cholesky. Fastest, fails on
    /// rank-deficient Jacobians.
    Cholesky,
    /// Householder QR on `J` directly. More stable than the normal equations.
    Qr,
    /// Singular value decomposition with small-singular-value cutoff.
    /// Handles rank deficiency.
    Svd,
    /// Conjugate gradients on the normal equations.
    ConjugateGradient,
}

/// Configuration for [`gauss_newton`].
#[derive(Debug, Clone)]
pub struct GaussNewtonConfig<F> {
    pub method: LeastSquaresMethod,
    pub line_search: LineSearch<F>,
    pub convergence: ConvergenceParams<F>,
}

impl Default for GaussNewtonConfig<f64> {
    fn default() -> Self {
        GaussNewtonConfig {
            method: LeastSquaresMethod::Qr,
            // The Gauss-Newton step already solves the local model, so the
            // search never extrapolates past it
            line_search: LineSearch::StrongWolfe(WolfeParams {
                max_step: 1.0,
                ..WolfeParams::default()
            }),
            convergence: ConvergenceParams::default(),
        }
    }
}

impl Default for GaussNewtonConfig<f32> {
    fn default() -> Self {
        GaussNewtonConfig {
            method: LeastSquaresMethod::Qr,
            // The Gauss-Newton step already solves the local model, so the
            // search never extrapolates past it
            line_search: LineSearch::StrongWolfe(WolfeParams {
                max_step: 1.0,
                ..WolfeParams::default()
            }),
            convergence: ConvergenceParams::default(),
        }
    }
}

/// `J^T J` without forming `J^T`.
fn gram<F: Float>(j: &[Vec<F>]) -> Vec<Vec<F>> {
    let n = j.first().map_or(0, Vec::len);
    let mut g = vec![vec![F::zero(); n]; n];
    for row in j {
        for i in 0..n {
            for k in 0..n {
                g[i][k] = g[i][k] + row[i] * row[k];
            }
        }
    }
    g
}

struct GaussNewtonStrategy {
    method: LeastSquaresMethod,
}

impl<F, L> Strategy<F, LeastSquares<L>> for GaussNewtonStrategy
where
    F: Float + fmt::Debug,
    L: LeastSquaresObjective<F>,
{
    fn update_direction(
        &mut self,
        obj: &mut Tally<'_, LeastSquares<L>>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError> {
        let inner = obj.inner_mut().inner_mut();
        let r = inner.residuals(&state.point);
        let j = inner.jacobian(&state.point);
        let neg_r: Vec<F> = r.iter().map(|&ri| -ri).collect();

        let direction = match self.method {
            LeastSquaresMethod::Cholesky => {
                let rhs = matvec_t(&j, &neg_r);
                cholesky(&gram(&j)).map(|l| cholesky_solve(&l, &rhs))
            }
            LeastSquaresMethod::Qr => qr_least_squares(&j, &neg_r),
            LeastSquaresMethod::Svd => svd_least_squares(&j, &neg_r),
            LeastSquaresMethod::ConjugateGradient => {
                let rhs = matvec_t(&j, &neg_r);
                let tol = F::from(1e-10).unwrap();
                Some(conjugate_gradient(&gram(&j), &rhs, tol, rhs.len() * 10))
            }
        };
        match direction {
            Some(d) => Ok(d),
            // Rank-deficient Jacobian: fall back to the gradient direction
            None => {
                log::debug!("rank-deficient Jacobian at iteration {}", state.iteration);
                Ok(matvec_t(&j, &neg_r))
            }
        }
    }
}

/// Minimize `1/2 ||r(x)||^2` with the Gauss-Newton method from `x0`.
pub fn gauss_newton<F, L>(
    obj: &mut LeastSquares<L>,
    x0: &[F],
    config: &GaussNewtonConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    L: LeastSquaresObjective<F>,
{
    let mut strategy = GaussNewtonStrategy {
        method: config.method,
    };
    state::run(
        obj,
        x0,
        &config.convergence,
        &config.line_search,
        &mut strategy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rosenbrock as residuals: r = (10(x1 - x0^2), 1 - x0).
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

    /// Overdetermined linear fit: r_i = a_i . x - y_i.
    struct LinearFit {
        rows: Vec<Vec<f64>>,
        y: Vec<f64>,
    }

    impl LeastSquaresObjective<f64> for LinearFit {
        fn dim(&self) -> usize {
            2
        }

        fn residuals(&mut self, x: &[f64]) -> Vec<f64> {
            self.rows
                .iter()
                .zip(self.y.iter())
                .map(|(row, &yi)| row[0] * x[0] + row[1] * x[1] - yi)
                .collect()
        }

        fn jacobian(&mut self, _x: &[f64]) -> Vec<Vec<f64>> {
            self.rows.clone()
        }
    }

    #[test]
    fn rosenbrock_all_methods() {
        for method in [
            LeastSquaresMethod::Cholesky,
            LeastSquaresMethod::Qr,
            LeastSquaresMethod::Svd,
            LeastSquaresMethod::ConjugateGradient,
        ] {
            let mut obj = LeastSquares::new(RosenbrockResiduals);
            let config = GaussNewtonConfig {
                method,
                ..GaussNewtonConfig::default()
            };
            let result = gauss_newton(&mut obj, &[-1.2, 1.0], &config).unwrap();
            assert!(
                (result.x[0] - 1.0).abs() < 0.2 && (result.x[1] - 1.0).abs() < 0.2,
                "{:?} converged to {:?}",
                method,
                result.x
            );
        }
    }

    #[test]
    fn full_unit_step_solves_a_consistent_system() {
        // One full Gauss-Newton step lands exactly on the solution of a
        // consistent linear system
        let mut obj = LeastSquares::new(LinearFit {
            rows: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            y: vec![1.0, 2.0, 3.0],
        });
        let config = GaussNewtonConfig {
            convergence: ConvergenceParams {
                max_iterations: 1,
                ..ConvergenceParams::default()
            },
            ..GaussNewtonConfig::default()
        };
        let result = gauss_newton(&mut obj, &[0.0, 0.0], &config).unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-10, "x = {:?}", result.x);
        assert!((result.x[1] - 2.0).abs() < 1e-10, "x = {:?}", result.x);
    }

    #[test]
    fn overdetermined_linear_fit() {
        // Exactly consistent system, solution (1, 2)
        let mut obj = LeastSquares::new(LinearFit {
            rows: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            y: vec![1.0, 2.0, 3.0],
        });
        let result = gauss_newton(&mut obj, &[0.0, 0.0], &GaussNewtonConfig::default()).unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-6, "x = {:?}", result.x);
        assert!((result.x[1] - 2.0).abs() < 1e-6, "x = {:?}", result.x);
    }
}
