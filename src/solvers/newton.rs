//! Newton's method with an exact Hessian solve, optionally restricted to a
//! linear-equality constraint manifold through projection.

use std::fmt;

use num_traits::Float;

use crate::constraint::LinearEqualityConstraint;
use crate::convergence::ConvergenceParams;
use crate::error::OptimError;
use crate::line_search::LineSearch;
use crate::linalg::lu_solve;
use crate::objective::{Objective, Tally};
use crate::result::OptimResult;
use crate::state::{self, IterationState, Strategy};

/// Configuration for [`newton`].
#[derive(Debug, Clone)]
pub struct NewtonConfig<F> {
    pub line_search: LineSearch<F>,
    pub convergence: ConvergenceParams<F>,
    pub equality: Option<LinearEqualityConstraint<F>>,
}

impl Default for NewtonConfig<f64> {
    fn default() -> Self {
        NewtonConfig {
            line_search: LineSearch::default(),
            convergence: ConvergenceParams::default(),
            equality: None,
        }
    }
}

impl Default for NewtonConfig<f32> {
    fn default() -> Self {
        NewtonConfig {
            line_search: LineSearch::default(),
            convergence: ConvergenceParams::default(),
            equality: None,
        }
    }
}

struct NewtonStrategy<'a, F> {
    equality: Option<&'a LinearEqualityConstraint<F>>,
}

impl<F: Float + fmt::Debug, O: Objective<F> + ?Sized> Strategy<F, O> for NewtonStrategy<'_, F> {
    fn update_direction(
        &mut self,
        obj: &mut Tally<'_, O>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError> {
        let hessian = obj.hessian(&state.point)?;
        let neg_grad: Vec<F> = state.gradient.iter().map(|&g| -g).collect();
        match lu_solve(&hessian, &neg_grad) {
            Some(d) => Ok(d),
            // Singular Hessian: take a steepest-descent step instead
            None => {
                log::debug!("singular Hessian at iteration {}", state.iteration);
                Ok(neg_grad)
            }
        }
    }

    fn update_point(
        &mut self,
        point: &mut Vec<F>,
        _state: &IterationState<F>,
    ) -> Result<(), OptimError> {
        if let Some(eq) = self.equality {
            *point = eq.project(point)?;
        }
        Ok(())
    }
}

/// Minimize `obj` with Newton's method from `x0`.
///
/// The Hessian comes from [`Objective::hessian`], which falls back to central
/// finite differences unless the objective overrides it.
pub fn newton<F, O>(
    obj: &mut O,
    x0: &[F],
    config: &NewtonConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
{
    let mut start = x0.to_vec();
    if let Some(eq) = &config.equality {
        start = eq.project(&start)?;
    }
    let mut strategy = NewtonStrategy {
        equality: config.equality.as_ref(),
    };
    state::run(
        obj,
        &start,
        &config.convergence,
        &config.line_search,
        &mut strategy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::QuadraticFunction;

    #[test]
    fn one_step_on_quadratic() {
        let mut obj =
            QuadraticFunction::new(vec![vec![2.0, 0.3], vec![0.3, 4.0]], vec![1.0, -2.0]);
        let result = newton(&mut obj, &[10.0, -10.0], &NewtonConfig::default()).unwrap();
        // Newton solves a quadratic in one full step
        assert!(result.iterations <= 3, "took {} iterations", result.iterations);
        let grad = obj.gradient(&result.x).unwrap();
        assert!(grad.iter().all(|&g| g.abs() < 1e-6), "grad = {:?}", grad);
    }

    #[test]
    fn equality_constrained_stays_on_manifold() {
        let mut obj =
            QuadraticFunction::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![0.0, 0.0]);
        let eq = LinearEqualityConstraint::new(vec![vec![1.0, 1.0]], vec![2.0]).unwrap();
        let config = NewtonConfig {
            equality: Some(eq.clone()),
            ..NewtonConfig::default()
        };
        let result = newton(&mut obj, &[5.0, -1.0], &config).unwrap();
        assert!(eq.is_satisfied(&result.x, 1e-8));
        // min 0.5|x|^2 on x0 + x1 = 2 is (1, 1)
        assert!((result.x[0] - 1.0).abs() < 1e-4, "x = {:?}", result.x);
        assert!((result.x[1] - 1.0).abs() < 1e-4, "x = {:?}", result.x);
    }
}
