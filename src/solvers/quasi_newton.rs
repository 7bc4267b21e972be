//! Quasi-Newton solvers maintaining an inverse-Hessian approximation.
//!
//! The dense variants (DFP, BFGS, SR1, Broyden) keep an explicit `n x n`
//! matrix `H ~ (grad^2 f)^-1` and step along `d = -H g`. The limited-memory
//! variant reconstructs `H g` from the last `m` curvature pairs with the
//! two-loop recursion and never forms the matrix.

use std::collections::VecDeque;
use std::fmt;

use num_traits::Float;

use crate::convergence::ConvergenceParams;
use crate::error::OptimError;
use crate::line_search::LineSearch;
use crate::linalg::{dot, identity, matvec, norm};
use crate::objective::{Objective, Tally};
use crate::result::OptimResult;
use crate::state::{self, IterationState, Strategy};

/// Relative threshold below which the SR1 update is skipped.
const SR1_SKIP_TOLERANCE: f64 = 1e-8;

/// Inverse-Hessian update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QuasiNewtonMethod {
    /// Davidon-Fletcher-Powell rank-two update.
    Dfp,
    /// Broyden-Fletcher-Goldfarb-Shanno rank-two update.
    Bfgs,
    /// Symmetric rank-one update. Not guaranteed positive definite; the
    /// update is skipped for near-degenerate curvature pairs.
    Sr1,
    /// Broyden's rank-one secant update.
    Broyden,
    /// Limited-memory BFGS keeping `memory` curvature pairs.
    LimitedMemoryBfgs { memory: usize },
}

/// Configuration for [`quasi_newton`].
#[derive(Debug, Clone)]
pub struct QuasiNewtonConfig<F> {
    /// Update rule (default: BFGS).
    pub method: QuasiNewtonMethod,
    pub line_search: LineSearch<F>,
    pub convergence: ConvergenceParams<F>,
}

impl Default for QuasiNewtonConfig<f64> {
    fn default() -> Self {
        QuasiNewtonConfig {
            method: QuasiNewtonMethod::Bfgs,
            line_search: LineSearch::default(),
            convergence: ConvergenceParams::default(),
        }
    }
}

impl Default for QuasiNewtonConfig<f32> {
    fn default() -> Self {
        QuasiNewtonConfig {
            method: QuasiNewtonMethod::Bfgs,
            line_search: LineSearch::default(),
            convergence: ConvergenceParams::default(),
        }
    }
}

/// `H += s s^T / (y.s) - (H y)(H y)^T / (y.H y)`
fn dfp_update<F: Float>(h: &mut [Vec<F>], s: &[F], y: &[F]) {
    let ys = dot(y, s);
    if ys == F::zero() {
        return;
    }
    let hy = matvec(h, y);
    let yhy = dot(y, &hy);
    for i in 0..h.len() {
        for j in 0..h.len() {
            h[i][j] = h[i][j] + s[i] * s[j] / ys
                - if yhy == F::zero() {
                    F::zero()
                } else {
                    hy[i] * hy[j] / yhy
                };
        }
    }
}

/// `H = (I - rho s y^T) H (I - rho y s^T) + rho s s^T` with `rho = 1/(y.s)`.
fn bfgs_update<F: Float>(h: &mut [Vec<F>], s: &[F], y: &[F]) {
    let ys = dot(y, s);
    if ys == F::zero() {
        return;
    }
    let rho = F::one() / ys;
    let hy = matvec(h, y);
    let yhy = dot(y, &hy);
    for i in 0..h.len() {
        for j in 0..h.len() {
            h[i][j] = h[i][j] - rho * (s[i] * hy[j] + hy[i] * s[j])
                + rho * (F::one() + rho * yhy) * s[i] * s[j];
        }
    }
}

/// `H += u u^T / (u.y)` with `u = s - H y`; skipped when `|u.y|` is below
/// `tol * |y| * |u|`.
fn sr1_update<F: Float>(h: &mut [Vec<F>], s: &[F], y: &[F]) {
    let hy = matvec(h, y);
    let u: Vec<F> = s.iter().zip(hy.iter()).map(|(&si, &hyi)| si - hyi).collect();
    let uy = dot(&u, y);
    let tol = F::from(SR1_SKIP_TOLERANCE).unwrap();
    // `<=` so an exactly degenerate pair (u = 0, both sides zero) skips too
    if uy.abs() <= tol * norm(y) * norm(&u) {
        return;
    }
    for i in 0..h.len() {
        for j in 0..h.len() {
            h[i][j] = h[i][j] + u[i] * u[j] / uy;
        }
    }
}

/// `H += (s - H y)(s^T H) / (s.H y)`.
fn broyden_update<F: Float>(h: &mut [Vec<F>], s: &[F], y: &[F]) {
    let hy = matvec(h, y);
    let shy = dot(s, &hy);
    if shy == F::zero() {
        return;
    }
    let u: Vec<F> = s.iter().zip(hy.iter()).map(|(&si, &hyi)| si - hyi).collect();
    // s^T H, with H symmetric only for the symmetric updates, so compute it
    // as a proper row-vector product
    let n = h.len();
    let mut sh = vec![F::zero(); n];
    for j in 0..n {
        for i in 0..n {
            sh[j] = sh[j] + s[i] * h[i][j];
        }
    }
    for i in 0..n {
        for j in 0..n {
            h[i][j] = h[i][j] + u[i] * sh[j] / shy;
        }
    }
}

/// Two-loop recursion computing `-H g` from the stored curvature pairs.
fn lbfgs_direction<F: Float>(gradient: &[F], pairs: &VecDeque<(Vec<F>, Vec<F>)>) -> Vec<F> {
    if pairs.is_empty() {
        return gradient.iter().map(|&g| -g).collect();
    }

    let mut q = gradient.to_vec();
    let mut alphas = Vec::with_capacity(pairs.len());
    for (s, y) in pairs.iter().rev() {
        let rho = F::one() / dot(y, s);
        let alpha = rho * dot(s, &q);
        for (qi, &yi) in q.iter_mut().zip(y.iter()) {
            *qi = *qi - alpha * yi;
        }
        alphas.push((rho, alpha));
    }

    // Scale by the most recent curvature estimate
    let (s_last, y_last) = pairs.back().unwrap();
    let gamma = dot(s_last, y_last) / dot(y_last, y_last);
    let mut r: Vec<F> = q.iter().map(|&qi| gamma * qi).collect();

    for ((s, y), &(rho, alpha)) in pairs.iter().zip(alphas.iter().rev()) {
        let beta = rho * dot(y, &r);
        for (ri, &si) in r.iter_mut().zip(s.iter()) {
            *ri = *ri + (alpha - beta) * si;
        }
    }

    r.iter().map(|&ri| -ri).collect()
}

enum Memory<F> {
    Dense(Vec<Vec<F>>),
    Limited {
        pairs: VecDeque<(Vec<F>, Vec<F>)>,
        capacity: usize,
    },
}

struct QuasiNewtonStrategy<F> {
    method: QuasiNewtonMethod,
    memory: Memory<F>,
}

impl<F: Float> QuasiNewtonStrategy<F> {
    fn new(method: QuasiNewtonMethod, n: usize) -> Self {
        let memory = match method {
            QuasiNewtonMethod::LimitedMemoryBfgs { memory } => Memory::Limited {
                pairs: VecDeque::with_capacity(memory),
                capacity: memory,
            },
            _ => Memory::Dense(identity(n)),
        };
        QuasiNewtonStrategy { method, memory }
    }
}

impl<F: Float, O: Objective<F> + ?Sized> Strategy<F, O> for QuasiNewtonStrategy<F> {
    fn update_direction(
        &mut self,
        _obj: &mut Tally<'_, O>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError> {
        if state.iteration > 0 {
            let s: Vec<F> = state
                .point
                .iter()
                .zip(state.previous_point.iter())
                .map(|(&a, &b)| a - b)
                .collect();
            let y: Vec<F> = state
                .gradient
                .iter()
                .zip(state.previous_gradient.iter())
                .map(|(&a, &b)| a - b)
                .collect();

            match &mut self.memory {
                Memory::Dense(h) => {
                    // First curvature pair: rescale the identity to the
                    // gradient's natural length scale before updating
                    if state.iteration == 1 {
                        let yy = dot(&y, &y);
                        if yy > F::zero() {
                            let scale = dot(&y, &s) / yy;
                            for row in h.iter_mut() {
                                for v in row.iter_mut() {
                                    *v = *v * scale;
                                }
                            }
                        }
                    }
                    match self.method {
                        QuasiNewtonMethod::Dfp => dfp_update(h, &s, &y),
                        QuasiNewtonMethod::Bfgs => bfgs_update(h, &s, &y),
                        QuasiNewtonMethod::Sr1 => sr1_update(h, &s, &y),
                        QuasiNewtonMethod::Broyden => broyden_update(h, &s, &y),
                        QuasiNewtonMethod::LimitedMemoryBfgs { .. } => unreachable!(),
                    }
                }
                Memory::Limited { pairs, capacity } => {
                    // Curvature guard: only pairs with y.s > 0 keep the
                    // implicit matrix positive definite
                    if dot(&y, &s) > F::epsilon() * norm(&y) * norm(&s) {
                        if pairs.len() == *capacity {
                            pairs.pop_front();
                        }
                        pairs.push_back((s, y));
                    }
                }
            }
        }

        let direction = match &self.memory {
            Memory::Dense(h) => matvec(h, &state.gradient)
                .into_iter()
                .map(|v| -v)
                .collect(),
            Memory::Limited { pairs, .. } => lbfgs_direction(&state.gradient, pairs),
        };
        Ok(direction)
    }
}

/// Minimize `obj` with the configured quasi-Newton method from `x0`.
pub fn quasi_newton<F, O>(
    obj: &mut O,
    x0: &[F],
    config: &QuasiNewtonConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
{
    if let QuasiNewtonMethod::LimitedMemoryBfgs { memory } = config.method {
        if memory == 0 {
            return Err(OptimError::InvalidConfiguration(
                "L-BFGS memory must be at least 1".into(),
            ));
        }
    }
    let mut strategy = QuasiNewtonStrategy::new(config.method, x0.len());
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
    use crate::objective::QuadraticFunction;
    use approx::assert_relative_eq;

    fn quadratic() -> QuadraticFunction<f64> {
        QuadraticFunction::new(vec![vec![1.0, 0.5], vec![0.5, 1.0]], vec![1.0, 2.0])
    }

    #[test]
    fn bfgs_update_preserves_symmetry() {
        let mut h = identity::<f64>(3);
        let s = vec![0.3, -0.1, 0.7];
        let y = vec![0.2, 0.1, 0.5];
        bfgs_update(&mut h, &s, &y);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(h[i][j], h[j][i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn bfgs_satisfies_secant_equation() {
        let mut h = identity::<f64>(3);
        let s = vec![0.3, -0.1, 0.7];
        let y = vec![0.2, 0.1, 0.5];
        bfgs_update(&mut h, &s, &y);
        // H y = s after the update
        let hy = matvec(&h, &y);
        for (hyi, si) in hy.iter().zip(s.iter()) {
            assert_relative_eq!(*hyi, *si, epsilon = 1e-12);
        }
    }

    #[test]
    fn dfp_satisfies_secant_equation() {
        let mut h = identity::<f64>(3);
        let s = vec![0.5, 0.2, -0.4];
        let y = vec![0.4, 0.3, -0.2];
        dfp_update(&mut h, &s, &y);
        let hy = matvec(&h, &y);
        for (hyi, si) in hy.iter().zip(s.iter()) {
            assert_relative_eq!(*hyi, *si, epsilon = 1e-12);
        }
    }

    #[test]
    fn sr1_skips_degenerate_pair() {
        let mut h = identity::<f64>(2);
        // s == H y makes the update denominator vanish
        let y = vec![1.0, 2.0];
        let s = vec![1.0, 2.0];
        let before = h.clone();
        sr1_update(&mut h, &s, &y);
        assert_eq!(h, before);
    }

    #[test]
    fn sr1_satisfies_secant_equation() {
        let mut h = identity::<f64>(2);
        let s = vec![0.8, -0.3];
        let y = vec![0.5, 0.4];
        sr1_update(&mut h, &s, &y);
        let hy = matvec(&h, &y);
        for (hyi, si) in hy.iter().zip(s.iter()) {
            assert_relative_eq!(*hyi, *si, epsilon = 1e-12);
        }
    }

    #[test]
    fn broyden_satisfies_secant_equation() {
        let mut h = identity::<f64>(2);
        let s = vec![0.8, -0.3];
        let y = vec![0.5, 0.4];
        broyden_update(&mut h, &s, &y);
        let hy = matvec(&h, &y);
        for (hyi, si) in hy.iter().zip(s.iter()) {
            assert_relative_eq!(*hyi, *si, epsilon = 1e-12);
        }
    }

    #[test]
    fn bfgs_direction_is_descent() {
        // With y.s > 0 the updated H stays positive definite, so -H g is a
        // strict descent direction for any gradient
        let mut h = identity::<f64>(3);
        let s = vec![0.3, -0.1, 0.7];
        let y = vec![0.2, 0.1, 0.5];
        assert!(dot(&y, &s) > 0.0);
        bfgs_update(&mut h, &s, &y);
        for g in [
            vec![1.0, 0.0, 0.0],
            vec![-2.0, 3.0, 1.0],
            vec![0.1, -0.1, 0.4],
        ] {
            let d: Vec<f64> = matvec(&h, &g).into_iter().map(|v| -v).collect();
            assert!(dot(&g, &d) < 0.0, "not a descent direction for {:?}", g);
        }
    }

    #[test]
    fn two_loop_matches_steepest_descent_without_pairs() {
        let g = vec![1.0, -2.0, 3.0];
        let d = lbfgs_direction::<f64>(&g, &VecDeque::new());
        assert_eq!(d, vec![-1.0, 2.0, -3.0]);
    }

    #[test]
    fn all_methods_solve_the_quadratic() {
        for method in [
            QuasiNewtonMethod::Dfp,
            QuasiNewtonMethod::Bfgs,
            QuasiNewtonMethod::Sr1,
            QuasiNewtonMethod::Broyden,
            QuasiNewtonMethod::LimitedMemoryBfgs { memory: 10 },
        ] {
            let mut obj = quadratic();
            let config = QuasiNewtonConfig {
                method,
                ..QuasiNewtonConfig::default()
            };
            let result = quasi_newton(&mut obj, &[0.0, 0.0], &config).unwrap();
            assert!(
                (result.x[0] - 0.0).abs() < 1e-2 && (result.x[1] - 2.0).abs() < 1e-2,
                "{:?} converged to {:?}",
                method,
                result.x
            );
        }
    }

    #[test]
    fn default_method_is_bfgs() {
        assert_eq!(
            QuasiNewtonConfig::<f64>::default().method,
            QuasiNewtonMethod::Bfgs
        );
        assert_eq!(
            QuasiNewtonConfig::<f32>::default().method,
            QuasiNewtonMethod::Bfgs
        );
    }

    #[test]
    fn zero_memory_is_rejected() {
        let mut obj = quadratic();
        let config = QuasiNewtonConfig {
            method: QuasiNewtonMethod::LimitedMemoryBfgs { memory: 0 },
            ..QuasiNewtonConfig::default()
        };
        assert!(matches!(
            quasi_newton(&mut obj, &[0.0, 0.0], &config),
            Err(OptimError::InvalidConfiguration(_))
        ));
    }
}
