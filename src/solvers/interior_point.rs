//! Primal interior-point method for smooth inequality constraints
//! `c_i(x) <= 0`, with optional linear equality constraints.
//!
//! The solver minimizes a sequence of barrier objectives
//! `tau * f(x) - sum_i ln(-c_i(x))` for growing `tau`, warm-starting each
//! stage from the previous solution. When the starting point is not strictly
//! feasible, a phase-I problem (minimize `t` subject to `c_i(x) - t <= 0`)
//! is solved with the same machinery first.

use std::fmt;

use num_traits::Float;

use crate::constraint::{InequalityConstraint, LinearEqualityConstraint};
use crate::convergence::ConvergenceParams;
use crate::error::{NonSmooth, OptimError};
use crate::line_search::{ArmijoParams, LineSearch};
use crate::linalg::lu_solve;
use crate::objective::{Objective, Tally};
use crate::result::{Evaluations, OptimResult, TerminationReason};
use crate::state::{self, IterationState, Strategy};

/// Inner solver used for each barrier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InnerSolver {
    /// Newton steps on the barrier, solved through the KKT system when
    /// equality constraints are present. Falls back to steepest descent on a
    /// singular system.
    #[default]
    Newton,
    /// Steepest descent on the barrier.
    GradientDescent,
}

/// Configuration for [`interior_point`].
#[derive(Debug, Clone)]
pub struct InteriorPointConfig<F> {
    /// Starting barrier weight `tau` (default: 1).
    pub initial_barrier: F,
    /// Multiplicative growth of `tau` per stage (default: 2).
    pub barrier_growth: F,
    /// The solve stops once `growth / tau` drops to this value (default: 1e-6).
    pub barrier_ratio_tolerance: F,
    /// Cap on the number of barrier stages.
    pub max_barrier_updates: usize,
    /// Slack put between the phase-I start and the constraint boundary.
    pub feasibility_margin: F,
    /// Solver for the inner barrier minimizations (default: Newton).
    pub inner_solver: InnerSolver,
    /// Line search for the inner solves. Backtracking by default: the
    /// barrier objective is infinite outside the feasible region, which the
    /// interpolating searches do not handle.
    pub line_search: LineSearch<F>,
    /// Convergence of each inner solve.
    pub inner_convergence: ConvergenceParams<F>,
    pub equality: Option<LinearEqualityConstraint<F>>,
    /// Optional extra stopping predicate on the current point, checked after
    /// every inner iteration.
    pub custom_stop: Option<fn(&[F]) -> bool>,
}

impl Default for InteriorPointConfig<f64> {
    fn default() -> Self {
        InteriorPointConfig {
            initial_barrier: 1.0,
            barrier_growth: 2.0,
            barrier_ratio_tolerance: 1e-6,
            max_barrier_updates: 64,
            feasibility_margin: 1e-3,
            inner_solver: InnerSolver::default(),
            line_search: LineSearch::Backtracking(ArmijoParams::default()),
            inner_convergence: ConvergenceParams::default(),
            equality: None,
            custom_stop: None,
        }
    }
}

impl Default for InteriorPointConfig<f32> {
    fn default() -> Self {
        InteriorPointConfig {
            initial_barrier: 1.0,
            barrier_growth: 2.0,
            barrier_ratio_tolerance: 1e-5,
            max_barrier_updates: 64,
            feasibility_margin: 1e-3,
            inner_solver: InnerSolver::default(),
            line_search: LineSearch::Backtracking(ArmijoParams::default()),
            inner_convergence: ConvergenceParams::default(),
            equality: None,
            custom_stop: None,
        }
    }
}

/// `tau * f(x) - sum ln(-c_i(x))`, infinite outside the strictly feasible
/// region.
struct BarrierObjective<'a, F, O: ?Sized> {
    tau: F,
    inner: &'a mut O,
    constraints: &'a [&'a dyn InequalityConstraint<F>],
}

impl<F: Float, O: Objective<F> + ?Sized> Objective<F> for BarrierObjective<'_, F, O> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn value(&mut self, x: &[F]) -> F {
        let mut barrier = F::zero();
        for c in self.constraints {
            let ci = c.value(x);
            if ci >= F::zero() {
                return F::infinity();
            }
            barrier = barrier - (-ci).ln();
        }
        self.tau * self.inner.value(x) + barrier
    }

    fn gradient(&mut self, x: &[F]) -> Result<Vec<F>, NonSmooth> {
        let mut g: Vec<F> = self
            .inner
            .gradient(x)?
            .into_iter()
            .map(|gi| self.tau * gi)
            .collect();
        for c in self.constraints {
            let ci = c.value(x);
            for (gi, &dci) in g.iter_mut().zip(c.gradient(x).iter()) {
                *gi = *gi - dci / ci;
            }
        }
        Ok(g)
    }

    fn hessian(&mut self, x: &[F]) -> Result<Vec<Vec<F>>, NonSmooth> {
        let n = self.dim();
        let mut h: Vec<Vec<F>> = self
            .inner
            .hessian(x)?
            .into_iter()
            .map(|row| row.into_iter().map(|v| self.tau * v).collect())
            .collect();
        for c in self.constraints {
            let ci = c.value(x);
            let dc = c.gradient(x);
            let d2c = c.hessian(x);
            for i in 0..n {
                for j in 0..n {
                    h[i][j] = h[i][j] + dc[i] * dc[j] / (ci * ci) - d2c[i][j] / ci;
                }
            }
        }
        Ok(h)
    }
}

/// Newton direction for the barrier. With equality constraints the step is
/// taken from the KKT system `[[H, A^T], [A, 0]] [d, nu] = [-g, 0]`, which
/// keeps the step tangent to the constraint manifold.
fn newton_direction<F: Float>(
    h: &[Vec<F>],
    neg_g: &[F],
    equality: Option<&LinearEqualityConstraint<F>>,
) -> Option<Vec<F>> {
    let eq = match equality {
        None => return lu_solve(h, neg_g),
        Some(eq) => eq,
    };
    let n = neg_g.len();
    let m = eq.num_rows();
    let mut kkt = vec![vec![F::zero(); n + m]; n + m];
    for i in 0..n {
        kkt[i][..n].copy_from_slice(&h[i]);
    }
    for (k, row) in eq.matrix().iter().enumerate() {
        for (j, &a) in row.iter().enumerate() {
            kkt[n + k][j] = a;
            kkt[j][n + k] = a;
        }
    }
    let mut rhs = vec![F::zero(); n + m];
    rhs[..n].copy_from_slice(neg_g);
    let solution = lu_solve(&kkt, &rhs)?;
    Some(solution[..n].to_vec())
}

/// Inner barrier minimization, with equality projection and the custom
/// stopping predicate.
struct BarrierDescent<'a, F> {
    newton: bool,
    equality: Option<&'a LinearEqualityConstraint<F>>,
    stop: Option<fn(&[F]) -> bool>,
}

impl<F: Float, O: Objective<F> + ?Sized> Strategy<F, O> for BarrierDescent<'_, F> {
    fn update_direction(
        &mut self,
        obj: &mut Tally<'_, O>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError> {
        let neg_g: Vec<F> = state.gradient.iter().map(|&g| -g).collect();
        if self.newton {
            let h = obj.hessian(&state.point)?;
            match newton_direction(&h, &neg_g, self.equality) {
                Some(d) => return Ok(d),
                None => log::debug!("singular barrier system, taking a steepest-descent step"),
            }
        }
        Ok(neg_g)
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

    fn check(&mut self, state: &IterationState<F>) -> Option<TerminationReason> {
        match self.stop {
            Some(stop) if stop(&state.point) => Some(TerminationReason::CustomCriterion),
            _ => None,
        }
    }
}

fn add_evals(total: &mut Evaluations, part: Evaluations) {
    total.values += part.values;
    total.gradients += part.gradients;
    total.hessians += part.hessians;
}

/// Barrier continuation shared by phase-I and the main solve. Returns the
/// aggregate of all inner runs; the `value` field holds the barrier value of
/// the last stage, which callers overwrite.
fn barrier_loop<F, O>(
    obj: &mut O,
    constraints: &[&dyn InequalityConstraint<F>],
    x0: &[F],
    equality: Option<&LinearEqualityConstraint<F>>,
    stop: Option<fn(&[F]) -> bool>,
    inner_solver: InnerSolver,
    config: &InteriorPointConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
{
    let mut tau = config.initial_barrier;
    let mut x = x0.to_vec();
    let mut value = F::nan();
    let mut iterations = 0;
    let mut evals = Evaluations::default();

    for stage in 0..config.max_barrier_updates {
        let mut barrier = BarrierObjective {
            tau,
            inner: &mut *obj,
            constraints,
        };
        let mut strategy = BarrierDescent {
            newton: matches!(inner_solver, InnerSolver::Newton),
            equality,
            stop,
        };
        let inner = state::run(
            &mut barrier,
            &x,
            &config.inner_convergence,
            &config.line_search,
            &mut strategy,
        )?;
        x = inner.x;
        value = inner.value;
        iterations += inner.iterations;
        add_evals(&mut evals, inner.evals);

        if matches!(inner.termination, TerminationReason::CustomCriterion) {
            return Ok(OptimResult {
                x,
                value,
                iterations,
                evals,
                termination: TerminationReason::CustomCriterion,
            });
        }

        let ratio = config.barrier_growth / tau;
        tau = tau * config.barrier_growth;
        log::debug!("barrier stage {}: tau = {:?}, ratio = {:?}", stage, tau, ratio);
        if ratio <= config.barrier_ratio_tolerance {
            return Ok(OptimResult {
                x,
                value,
                iterations,
                evals,
                termination: TerminationReason::BarrierConverged,
            });
        }
    }

    Ok(OptimResult {
        x,
        value,
        iterations,
        evals,
        termination: TerminationReason::MaxIterations,
    })
}

/// Phase-I objective over `(t, x)`: minimize `t`.
struct PhaseOne {
    dim: usize,
}

impl<F: Float> Objective<F> for PhaseOne {
    fn dim(&self) -> usize {
        self.dim
    }

    fn value(&mut self, z: &[F]) -> F {
        z[0]
    }

    fn gradient(&mut self, z: &[F]) -> Result<Vec<F>, NonSmooth> {
        let mut g = vec![F::zero(); z.len()];
        g[0] = F::one();
        Ok(g)
    }

    fn hessian(&mut self, z: &[F]) -> Result<Vec<Vec<F>>, NonSmooth> {
        Ok(vec![vec![F::zero(); z.len()]; z.len()])
    }
}

/// `c_i(x) - t <= 0` over `(t, x)`.
struct ShiftedConstraint<'a, F> {
    inner: &'a dyn InequalityConstraint<F>,
}

impl<F: Float> InequalityConstraint<F> for ShiftedConstraint<'_, F> {
    fn dim(&self) -> usize {
        self.inner.dim() + 1
    }

    fn value(&self, z: &[F]) -> F {
        self.inner.value(&z[1..]) - z[0]
    }

    fn gradient(&self, z: &[F]) -> Vec<F> {
        let mut g = Vec::with_capacity(z.len());
        g.push(-F::one());
        g.extend(self.inner.gradient(&z[1..]));
        g
    }

    fn hessian(&self, z: &[F]) -> Vec<Vec<F>> {
        let n = z.len();
        let mut h = vec![vec![F::zero(); n]; n];
        let inner = self.inner.hessian(&z[1..]);
        for i in 1..n {
            for j in 1..n {
                h[i][j] = inner[i - 1][j - 1];
            }
        }
        h
    }
}

fn negative_first_coordinate<F: Float>(z: &[F]) -> bool {
    z[0] < F::zero()
}

/// Find a strictly feasible point by solving the phase-I problem.
fn phase_one<F>(
    constraints: &[&dyn InequalityConstraint<F>],
    x0: &[F],
    equality: Option<&LinearEqualityConstraint<F>>,
    config: &InteriorPointConfig<F>,
) -> Result<(Vec<F>, usize, Evaluations), OptimError>
where
    F: Float + fmt::Debug,
{
    let worst = constraints
        .iter()
        .map(|c| c.value(x0))
        .fold(F::neg_infinity(), F::max);
    let mut z0 = Vec::with_capacity(x0.len() + 1);
    z0.push(worst + config.feasibility_margin);
    z0.extend_from_slice(x0);

    let shifted: Vec<ShiftedConstraint<'_, F>> = constraints
        .iter()
        .map(|&c| ShiftedConstraint { inner: c })
        .collect();
    let shifted_refs: Vec<&dyn InequalityConstraint<F>> = shifted
        .iter()
        .map(|c| c as &dyn InequalityConstraint<F>)
        .collect();

    // Lift the equality constraint to (t, x) with a zero column for t
    let lifted_eq = match equality {
        Some(eq) => {
            let rows: Vec<Vec<F>> = eq
                .matrix()
                .iter()
                .map(|row| {
                    let mut r = Vec::with_capacity(row.len() + 1);
                    r.push(F::zero());
                    r.extend(row.iter().cloned());
                    r
                })
                .collect();
            Some(LinearEqualityConstraint::new(rows, eq.rhs().to_vec())?)
        }
        None => None,
    };

    let mut objective = PhaseOne { dim: z0.len() };
    // The phase-one objective is linear, so its stages run steepest descent
    let result = barrier_loop(
        &mut objective,
        &shifted_refs,
        &z0,
        lifted_eq.as_ref(),
        Some(negative_first_coordinate::<F> as fn(&[F]) -> bool),
        InnerSolver::GradientDescent,
        config,
    )?;

    if matches!(result.termination, TerminationReason::CustomCriterion) {
        Ok((result.x[1..].to_vec(), result.iterations, result.evals))
    } else {
        Err(OptimError::Infeasible)
    }
}

/// Minimize `obj` subject to `c_i(x) <= 0` (and optionally `A x = b`) from
/// `x0`, which need not be feasible.
pub fn interior_point<F, O>(
    obj: &mut O,
    constraints: &[&dyn InequalityConstraint<F>],
    x0: &[F],
    config: &InteriorPointConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
{
    if constraints.is_empty() {
        return Err(OptimError::InvalidConfiguration(
            "interior point needs at least one inequality constraint".into(),
        ));
    }
    if config.barrier_growth <= F::one() {
        return Err(OptimError::InvalidConfiguration(
            "barrier growth factor must exceed 1".into(),
        ));
    }
    if config.initial_barrier <= F::zero() {
        return Err(OptimError::InvalidConfiguration(
            "initial barrier weight must be positive".into(),
        ));
    }

    let mut start = x0.to_vec();
    if let Some(eq) = &config.equality {
        start = eq.project(&start)?;
    }

    let mut phase_one_iterations = 0;
    let mut phase_one_evals = Evaluations::default();
    if constraints.iter().any(|c| c.value(&start) >= F::zero()) {
        log::debug!("starting point infeasible, entering phase one");
        let (feasible, iters, evals) =
            phase_one(constraints, &start, config.equality.as_ref(), config)?;
        start = feasible;
        phase_one_iterations = iters;
        phase_one_evals = evals;
    }

    let mut result = barrier_loop(
        obj,
        constraints,
        &start,
        config.equality.as_ref(),
        config.custom_stop,
        config.inner_solver,
        config,
    )?;
    result.iterations += phase_one_iterations;
    add_evals(&mut result.evals, phase_one_evals);
    // Report the true objective, not the last barrier value
    result.value = obj.value(&result.x);
    result.evals.values += 1;
    Ok(result)
}
