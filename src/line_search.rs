//! Step-size selection along a fixed descent direction.
//!
//! Three searches are provided: an interpolation-based search enforcing the
//! strong Wolfe conditions (Nocedal & Wright, algorithms 3.5/3.6), an exact
//! closed-form minimization for quadratic objectives with positive-definite
//! Hessian, and a backtracking Armijo search.

use num_traits::Float;

use crate::error::OptimError;
use crate::linalg::{axpy, cholesky, dot, matvec};
use crate::objective::Objective;

/// Maximum zoom iterations with no improvement in the objective value.
const MAX_ITERATIONS_WITH_NO_IMPROVEMENT: usize = 10;
/// Minimum allowed distance between an interpolated step size and the
/// endpoints of the current bracketing interval.
const MIN_DISTANCE_FROM_ENDPOINTS: f64 = 1e-3;

/// How the first trial step size of each search is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepSizeInit<F> {
    /// Always start from a unit step. The right choice for Newton-family
    /// methods, where the unit step is eventually always accepted.
    Unit,
    /// Start from a fixed constant.
    Constant(F),
    /// Scale the previous step so the first-order decrease
    /// `alpha * g^T d` matches the previous iteration.
    ConserveFirstOrderChange,
}

/// Parameters for the strong Wolfe interpolation search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WolfeParams<F> {
    /// Sufficient-decrease constant (default: 1e-4).
    pub c1: F,
    /// Curvature constant (default: 0.9).
    pub c2: F,
    /// Maximum allowed step size (default: 10).
    pub max_step: F,
    /// Initial step-size guess (default: unit).
    pub init: StepSizeInit<F>,
}

impl Default for WolfeParams<f64> {
    fn default() -> Self {
        WolfeParams {
            c1: 1e-4,
            c2: 0.9,
            max_step: 10.0,
            init: StepSizeInit::Unit,
        }
    }
}

impl Default for WolfeParams<f32> {
    fn default() -> Self {
        WolfeParams {
            c1: 1e-4,
            c2: 0.9,
            max_step: 10.0,
            init: StepSizeInit::Unit,
        }
    }
}

/// Parameters for the backtracking Armijo search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmijoParams<F> {
    /// Sufficient-decrease constant (default: 1e-4).
    pub c: F,
    /// Backtracking factor (default: 0.5).
    pub rho: F,
    /// Initial step size (default: 1.0).
    pub alpha_init: F,
    /// Minimum step size before declaring failure (default: 1e-16).
    pub alpha_min: F,
}

impl Default for ArmijoParams<f64> {
    fn default() -> Self {
        ArmijoParams {
            c: 1e-4,
            rho: 0.5,
            alpha_init: 1.0,
            alpha_min: 1e-16,
        }
    }
}

impl Default for ArmijoParams<f32> {
    fn default() -> Self {
        ArmijoParams {
            c: 1e-4,
            rho: 0.5,
            alpha_init: 1.0,
            alpha_min: 1e-8,
        }
    }
}

/// The step-size selection strategy used by a line-search solver.
#[derive(Debug, Clone)]
pub enum LineSearch<F> {
    /// Strong Wolfe conditions via bracketing and cubic-interpolation zoom.
    StrongWolfe(WolfeParams<F>),
    /// Backtracking search enforcing the Armijo condition only.
    Backtracking(ArmijoParams<F>),
    /// Closed-form exact minimization for a quadratic objective with the
    /// given symmetric positive-definite Hessian.
    Exact { hessian: Vec<Vec<F>> },
}

impl<F: Float> Default for LineSearch<F>
where
    WolfeParams<F>: Default,
{
    fn default() -> Self {
        LineSearch::StrongWolfe(WolfeParams::default())
    }
}

/// Outcome of one step-size computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSearchOutcome<F> {
    /// A step size satisfying the configured acceptance test.
    Accepted(F),
    /// The objective was non-smooth at a trial point; the caller keeps the
    /// previous step size for this iteration.
    NonSmoothSkip,
    /// No acceptable step was found.
    Failed,
}

/// Iteration history consumed by the step-size initialization methods.
pub(crate) struct SearchHistory<'a, F> {
    pub previous_gradient: &'a [F],
    pub previous_direction: &'a [F],
    pub previous_step_size: F,
}

impl<F: Float> LineSearch<F> {
    /// Validate the configuration before any iteration runs.
    pub(crate) fn validate(&self) -> Result<(), OptimError> {
        match self {
            LineSearch::StrongWolfe(p) => {
                if !(p.c1 > F::zero() && p.c1 < F::one()) {
                    return Err(OptimError::InvalidConfiguration(
                        "Wolfe c1 must lie in (0, 1)".into(),
                    ));
                }
                if !(p.c2 > p.c1 && p.c2 < F::one()) {
                    return Err(OptimError::InvalidConfiguration(
                        "Wolfe c2 must lie in (c1, 1)".into(),
                    ));
                }
                if p.max_step <= F::zero() {
                    return Err(OptimError::InvalidConfiguration(
                        "Wolfe maximum step size must be positive".into(),
                    ));
                }
            }
            LineSearch::Backtracking(p) => {
                if p.rho <= F::zero() || p.rho >= F::one() {
                    return Err(OptimError::InvalidConfiguration(
                        "Armijo backtracking factor must lie in (0, 1)".into(),
                    ));
                }
            }
            LineSearch::Exact { hessian } => {
                if cholesky(hessian).is_none() {
                    return Err(OptimError::InvalidConfiguration(
                        "exact line search requires a symmetric positive-definite Hessian".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Choose a step size along `direction` from `x`.
    ///
    /// `f_x` and `grad_x` are the objective value and gradient at `x`;
    /// `history` carries the previous iteration for the
    /// conserve-first-order-change initialization.
    pub(crate) fn step_size<O: Objective<F>>(
        &self,
        obj: &mut O,
        x: &[F],
        direction: &[F],
        f_x: F,
        grad_x: &[F],
        history: Option<&SearchHistory<'_, F>>,
    ) -> LineSearchOutcome<F> {
        match self {
            LineSearch::Exact { hessian } => {
                // phi'(alpha) = g.d + alpha d^T A d = 0
                let gd = dot(grad_x, direction);
                let ad = matvec(hessian, direction);
                let dad = dot(direction, &ad);
                if dad <= F::zero() {
                    return LineSearchOutcome::Failed;
                }
                LineSearchOutcome::Accepted(-gd / dad)
            }
            LineSearch::Backtracking(params) => {
                backtracking_armijo(obj, x, direction, f_x, grad_x, params)
            }
            LineSearch::StrongWolfe(params) => {
                let init = initial_step(params, grad_x, direction, history);
                strong_wolfe(obj, x, direction, f_x, grad_x, init, params)
            }
        }
    }
}

fn initial_step<F: Float>(
    params: &WolfeParams<F>,
    grad_x: &[F],
    direction: &[F],
    history: Option<&SearchHistory<'_, F>>,
) -> F {
    match params.init {
        StepSizeInit::Unit => F::one(),
        StepSizeInit::Constant(c) => c,
        StepSizeInit::ConserveFirstOrderChange => match history {
            Some(h) => {
                let denom = dot(grad_x, direction);
                if denom == F::zero() {
                    F::one()
                } else {
                    h.previous_step_size * dot(h.previous_gradient, h.previous_direction) / denom
                }
            }
            // First iteration: no history yet
            None => F::one(),
        },
    }
}

/// Backtracking line search satisfying the Armijo condition
/// `f(x + alpha*d) <= f(x) + c * alpha * g^T d`.
fn backtracking_armijo<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    f_x: F,
    grad_x: &[F],
    params: &ArmijoParams<F>,
) -> LineSearchOutcome<F> {
    let dg = dot(grad_x, d);

    // Not a descent direction
    if dg >= F::zero() {
        return LineSearchOutcome::Failed;
    }

    let mut alpha = params.alpha_init;
    loop {
        if alpha < params.alpha_min {
            return LineSearchOutcome::Failed;
        }
        let f_new = obj.value(&axpy(x, alpha, d));
        if f_new <= f_x + params.c * alpha * dg {
            return LineSearchOutcome::Accepted(alpha);
        }
        alpha = alpha * params.rho;
    }
}

/// Directional derivative `phi'(alpha) = grad f(x + alpha d) . d`.
///
/// Returns `None` when the objective is non-smooth at the trial point.
fn phi_prime<F: Float, O: Objective<F>>(obj: &mut O, x: &[F], d: &[F], alpha: F) -> Option<F> {
    let grad = obj.gradient(&axpy(x, alpha, d)).ok()?;
    Some(dot(&grad, d))
}

/// Bracketing phase of the strong Wolfe search (algorithm 3.5).
fn strong_wolfe<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    phi0: F,
    grad_x: &[F],
    init: F,
    params: &WolfeParams<F>,
) -> LineSearchOutcome<F> {
    let two = F::one() + F::one();
    let phi_prime0 = dot(grad_x, d);

    let mut a0 = F::zero();
    let mut phi_a0 = phi0;
    let mut a1 = init;
    if a1 <= F::zero() {
        a1 = params.max_step / two;
    } else if a1 > params.max_step {
        a1 = params.max_step;
    }

    let mut first = true;
    loop {
        let phi_a1 = obj.value(&axpy(x, a1, d));
        if phi_a1 > phi0 + params.c1 * a1 * phi_prime0 || (phi_a1 >= phi_a0 && !first) {
            return zoom(obj, x, d, phi0, phi_prime0, a0, a1, params);
        }
        let phi_prime_a1 = match phi_prime(obj, x, d, a1) {
            Some(v) => v,
            None => return LineSearchOutcome::NonSmoothSkip,
        };
        if phi_prime_a1.abs() <= -params.c2 * phi_prime0 {
            log::trace!("line search accepted step in bracketing phase");
            return LineSearchOutcome::Accepted(a1);
        }
        if phi_prime_a1 >= F::zero() {
            return zoom(obj, x, d, phi0, phi_prime0, a1, a0, params);
        }
        // The slope is still negative at the cap; Armijo was verified above
        if a1 >= params.max_step {
            return LineSearchOutcome::Accepted(params.max_step);
        }
        a0 = a1;
        phi_a0 = phi_a1;
        a1 = (two * a1).min(params.max_step);
        first = false;
    }
}

/// Zoom phase (algorithm 3.6): shrink `[a_low, a_high]` with cubic
/// interpolation until a step satisfying both Wolfe conditions is found.
/// `a_low` always holds the smallest objective value among Armijo-satisfying
/// steps generated so far; it need not be smaller than `a_high`.
#[allow(clippy::too_many_arguments)]
fn zoom<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    phi0: F,
    phi_prime0: F,
    mut a_low: F,
    mut a_high: F,
    params: &WolfeParams<F>,
) -> LineSearchOutcome<F> {
    let mut best_value = F::infinity();
    let mut best_iteration = 0usize;
    let mut iteration = 0usize;

    loop {
        let a_new = match cubic_interpolation(obj, x, d, a_low, a_high) {
            Some(a) => a,
            None => return LineSearchOutcome::NonSmoothSkip,
        };
        let phi_new = obj.value(&axpy(x, a_new, d));
        let phi_low = obj.value(&axpy(x, a_low, d));

        if phi_new > phi0 + params.c1 * a_new * phi_prime0 || phi_new >= phi_low {
            a_high = a_new;
        } else {
            let phi_prime_new = match phi_prime(obj, x, d, a_new) {
                Some(v) => v,
                None => return LineSearchOutcome::NonSmoothSkip,
            };
            if phi_prime_new.abs() <= -params.c2 * phi_prime0 {
                return LineSearchOutcome::Accepted(a_new);
            }
            if phi_prime_new * (a_high - a_low) >= F::zero() {
                a_high = a_low;
            }
            a_low = a_new;
        }

        // Give up once the objective stops improving
        iteration += 1;
        if phi_new < best_value {
            best_value = phi_new;
            best_iteration = iteration;
        } else if iteration - best_iteration > MAX_ITERATIONS_WITH_NO_IMPROVEMENT {
            return LineSearchOutcome::Accepted(a_new);
        }
    }
}

/// Step size minimizing the cubic model of `phi` on `[a_low, a_high]`,
/// clamped away from the interval endpoints.
fn cubic_interpolation<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    a_low: F,
    a_high: F,
) -> Option<F> {
    let two = F::one() + F::one();
    let three = two + F::one();
    let min_dist = F::from(MIN_DISTANCE_FROM_ENDPOINTS).unwrap();

    let phi_low = obj.value(&axpy(x, a_low, d));
    let phi_high = obj.value(&axpy(x, a_high, d));
    let phi_prime_low = phi_prime(obj, x, d, a_low)?;
    let phi_prime_high = phi_prime(obj, x, d, a_high)?;

    let d1 = phi_prime_low + phi_prime_high - three * (phi_low - phi_high) / (a_low - a_high);
    let radicand = d1 * d1 - phi_prime_low * phi_prime_high;
    let mut a_new = if radicand >= F::zero() {
        let d2 = (a_high - a_low).signum() * radicand.sqrt();
        a_high - (a_high - a_low) * (phi_prime_high + d2 - d1)
            / (phi_prime_high - phi_prime_low + two * d2)
    } else {
        (a_low + a_high) / two
    };

    // Fall back to the better endpoint when the minimizer is outside the
    // interval or worse than an endpoint
    let (lo, hi) = if a_low <= a_high {
        (a_low, a_high)
    } else {
        (a_high, a_low)
    };
    if a_new >= lo && a_new <= hi {
        let phi_new = obj.value(&axpy(x, a_new, d));
        if phi_low <= phi_new {
            a_new = if phi_low <= phi_high { a_low } else { a_high };
        } else if phi_high <= phi_new {
            a_new = a_high;
        }
    } else {
        a_new = if phi_low <= phi_high { a_low } else { a_high };
    }

    if (a_new - a_low).abs() <= min_dist || (a_new - a_high).abs() <= min_dist {
        a_new = (a_low + a_high) / two;
    }

    Some(a_new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::QuadraticFunction;

    /// f(x) = 0.5 * (x0^2 + x1^2)
    fn sphere() -> QuadraticFunction<f64> {
        QuadraticFunction::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![0.0, 0.0])
    }

    #[test]
    fn exact_step_on_quadratic() {
        let mut obj = sphere();
        let x = vec![2.0, 3.0];
        let grad = obj.gradient(&x).unwrap();
        let d: Vec<f64> = grad.iter().map(|&g| -g).collect();
        let search = LineSearch::Exact {
            hessian: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        let f_x = obj.value(&x);
        match search.step_size(&mut obj, &x, &d, f_x, &grad, None) {
            // For the sphere the exact step along -g is 1
            LineSearchOutcome::Accepted(alpha) => assert!((alpha - 1.0).abs() < 1e-12),
            other => panic!("expected accepted step, got {:?}", other),
        }
    }

    #[test]
    fn exact_rejects_indefinite_hessian() {
        let search = LineSearch::Exact {
            hessian: vec![vec![1.0, 2.0], vec![2.0, 1.0]],
        };
        assert!(search.validate().is_err());
    }

    #[test]
    fn wolfe_finds_descending_step() {
        let mut obj = sphere();
        let x = vec![2.0, 3.0];
        let f_x = obj.value(&x);
        let grad = obj.gradient(&x).unwrap();
        let d: Vec<f64> = grad.iter().map(|&g| -g).collect();
        let search: LineSearch<f64> = LineSearch::default();
        match search.step_size(&mut obj, &x, &d, f_x, &grad, None) {
            LineSearchOutcome::Accepted(alpha) => {
                assert!(alpha > 0.0);
                let f_new = obj.value(&axpy(&x, alpha, &d));
                assert!(f_new < f_x, "step should decrease the objective");
            }
            other => panic!("expected accepted step, got {:?}", other),
        }
    }

    #[test]
    fn armijo_full_step_on_quadratic() {
        let mut obj = sphere();
        let x = vec![2.0, 3.0];
        let f_x = obj.value(&x);
        let grad = obj.gradient(&x).unwrap();
        let d: Vec<f64> = grad.iter().map(|&g| -g).collect();
        let search = LineSearch::Backtracking(ArmijoParams::default());
        match search.step_size(&mut obj, &x, &d, f_x, &grad, None) {
            LineSearchOutcome::Accepted(alpha) => assert!((alpha - 1.0).abs() < 1e-12),
            other => panic!("expected accepted step, got {:?}", other),
        }
    }

    #[test]
    fn armijo_non_descent_fails() {
        let mut obj = sphere();
        let x = vec![2.0, 3.0];
        let f_x = obj.value(&x);
        let grad = obj.gradient(&x).unwrap();
        let d = grad.clone(); // ascent direction
        let search = LineSearch::Backtracking(ArmijoParams::default());
        assert_eq!(
            search.step_size(&mut obj, &x, &d, f_x, &grad, None),
            LineSearchOutcome::Failed
        );
    }

    #[test]
    fn wolfe_step_capped_by_max_step_still_decreases() {
        /// f(x) = -x + e^(5(x-9)): long shallow descent, then a steep wall
        /// just inside the step cap.
        struct Wall;
        impl Objective<f64> for Wall {
            fn dim(&self) -> usize {
                1
            }
            fn value(&mut self, x: &[f64]) -> f64 {
                -x[0] + (5.0 * (x[0] - 9.0)).exp()
            }
            fn gradient(&mut self, x: &[f64]) -> Result<Vec<f64>, crate::error::NonSmooth> {
                Ok(vec![-1.0 + 5.0 * (5.0 * (x[0] - 9.0)).exp()])
            }
        }

        let mut obj = Wall;
        let x = vec![0.0];
        let d = vec![1.0];
        let f_x = obj.value(&x);
        let grad = obj.gradient(&x).unwrap();
        let params = WolfeParams {
            c2: 0.5,
            ..WolfeParams::default()
        };
        let search = LineSearch::StrongWolfe(params.clone());
        match search.step_size(&mut obj, &x, &d, f_x, &grad, None) {
            LineSearchOutcome::Accepted(alpha) => {
                // f(max_step) is far above f(x); the cap must not be
                // accepted unexamined
                assert!(alpha < params.max_step);
                let f_new = obj.value(&axpy(&x, alpha, &d));
                assert!(f_new <= f_x + params.c1 * alpha * dot(&grad, &d));
            }
            other => panic!("expected accepted step, got {:?}", other),
        }
    }

    #[test]
    fn nonsmooth_trial_point_skips() {
        /// |x| objective: non-smooth gradient at any probe that lands on 0.
        struct NonSmoothAtOrigin;
        impl Objective<f64> for NonSmoothAtOrigin {
            fn dim(&self) -> usize {
                1
            }
            fn value(&mut self, x: &[f64]) -> f64 {
                x[0].abs()
            }
            fn gradient(&mut self, x: &[f64]) -> Result<Vec<f64>, crate::error::NonSmooth> {
                if x[0] == 0.0 {
                    Err(crate::error::NonSmooth)
                } else {
                    Ok(vec![x[0].signum()])
                }
            }
        }

        let mut obj = NonSmoothAtOrigin;
        let x = vec![1.0];
        let d = vec![-1.0];
        let f_x = 1.0;
        let grad = vec![1.0];
        let search: LineSearch<f64> = LineSearch::default();
        // The unit trial step lands exactly on the kink at 0
        assert_eq!(
            search.step_size(&mut obj, &x, &d, f_x, &grad, None),
            LineSearchOutcome::NonSmoothSkip
        );
    }
}
