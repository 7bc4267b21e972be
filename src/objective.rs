//! Objective-function traits and adapters.
//!
//! Implementors provide function evaluation and optionally analytic
//! derivatives; gradients and Hessians fall back to finite differences.
//! Methods take `&mut self` to allow caching and internal buffers.

use num_traits::Float;

use crate::derivatives::{central_gradient, central_hessian};
use crate::error::NonSmooth;
use crate::result::Evaluations;

/// Trait for optimization objectives.
///
/// `gradient` and `hessian` return `Err(NonSmooth)` at points where the
/// objective is not differentiable; smooth objectives never return `Err`.
/// The default implementations approximate derivatives with central finite
/// differences, so an implementor only has to supply `value` to get a
/// working (derivative-free) objective. Implementors with an analytic
/// gradient may build a cheaper Hessian with
/// [`forward_hessian_from_gradient`](crate::derivatives::forward_hessian_from_gradient).
pub trait Objective<F: Float> {
    /// Number of input variables.
    fn dim(&self) -> usize;

    /// Evaluate the objective at `x`.
    fn value(&mut self, x: &[F]) -> F;

    /// Evaluate the gradient at `x`.
    fn gradient(&mut self, x: &[F]) -> Result<Vec<F>, NonSmooth> {
        Ok(central_gradient(&mut |p| self.value(p), x))
    }

    /// Evaluate the Hessian at `x`, row-major.
    fn hessian(&mut self, x: &[F]) -> Result<Vec<Vec<F>>, NonSmooth> {
        Ok(central_hessian(&mut |p| self.value(p), x))
    }
}

/// A least-squares objective `f(x) = 1/2 ||r(x)||^2`.
///
/// Consumed by the Gauss-Newton solver, which never forms the Hessian and
/// instead solves the linearized subproblem built from the Jacobian.
pub trait LeastSquaresObjective<F: Float> {
    /// Number of input variables.
    fn dim(&self) -> usize;

    /// Residual vector `r(x)`.
    fn residuals(&mut self, x: &[F]) -> Vec<F>;

    /// Jacobian of the residuals at `x` (`m x n`, row per residual).
    fn jacobian(&mut self, x: &[F]) -> Vec<Vec<F>>;
}

/// Adapter presenting a [`LeastSquaresObjective`] as a plain [`Objective`]
/// with `f = 1/2 ||r||^2` and `grad f = J^T r`.
pub struct LeastSquares<L> {
    inner: L,
}

impl<L> LeastSquares<L> {
    pub fn new(inner: L) -> Self {
        LeastSquares { inner }
    }

    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }
}

impl<F: Float, L: LeastSquaresObjective<F>> Objective<F> for LeastSquares<L> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn value(&mut self, x: &[F]) -> F {
        let r = self.inner.residuals(x);
        let two = F::one() + F::one();
        crate::linalg::dot(&r, &r) / two
    }

    fn gradient(&mut self, x: &[F]) -> Result<Vec<F>, NonSmooth> {
        let r = self.inner.residuals(x);
        let j = self.inner.jacobian(x);
        Ok(crate::linalg::matvec_t(&j, &r))
    }
}

/// A quadratic function `f(x) = 1/2 x^T A x - b^T x` with constant Hessian.
///
/// Gradient `A x - b`, minimizer `A^{-1} b` when `A` is positive definite.
/// Pairs naturally with the exact line search.
#[derive(Debug, Clone)]
pub struct QuadraticFunction<F> {
    a: Vec<Vec<F>>,
    b: Vec<F>,
}

impl<F: Float> QuadraticFunction<F> {
    pub fn new(a: Vec<Vec<F>>, b: Vec<F>) -> Self {
        debug_assert_eq!(a.len(), b.len());
        QuadraticFunction { a, b }
    }

    pub fn a(&self) -> &[Vec<F>] {
        &self.a
    }

    pub fn b(&self) -> &[F] {
        &self.b
    }
}

impl<F: Float> Objective<F> for QuadraticFunction<F> {
    fn dim(&self) -> usize {
        self.b.len()
    }

    fn value(&mut self, x: &[F]) -> F {
        let two = F::one() + F::one();
        let ax = crate::linalg::matvec(&self.a, x);
        crate::linalg::dot(x, &ax) / two - crate::linalg::dot(&self.b, x)
    }

    fn gradient(&mut self, x: &[F]) -> Result<Vec<F>, NonSmooth> {
        let ax = crate::linalg::matvec(&self.a, x);
        Ok(ax.iter().zip(&self.b).map(|(&axi, &bi)| axi - bi).collect())
    }

    fn hessian(&mut self, _x: &[F]) -> Result<Vec<Vec<F>>, NonSmooth> {
        Ok(self.a.clone())
    }
}

/// Objective evaluated through stochastic gradient estimates.
///
/// The solver owns mini-batch sampling: it draws `batch` as indices into
/// `0..num_terms()` (with or without replacement, from a seeded RNG) and the
/// objective averages the per-term gradients over that batch. The true
/// objective value is never observed by the stochastic solvers.
pub trait StochasticObjective<F: Float> {
    /// Number of input variables.
    fn dim(&self) -> usize;

    /// Number of terms (data points) the full gradient sums over.
    fn num_terms(&self) -> usize;

    /// Gradient estimate at `x` from the given batch of term indices.
    fn gradient_estimate(&mut self, x: &[F], batch: &[usize]) -> Vec<F>;
}

/// Wrapper counting every evaluation the solvers perform.
///
/// All objective access during a solve goes through a tally, so the counts
/// reported in [`OptimResult`](crate::result::OptimResult) are exact and
/// monotone, and the function-evaluation cap sees every call.
pub(crate) struct Tally<'a, O: ?Sized> {
    inner: &'a mut O,
    evals: Evaluations,
}

impl<'a, O: ?Sized> Tally<'a, O> {
    pub fn new(inner: &'a mut O) -> Self {
        Tally {
            inner,
            evals: Evaluations::default(),
        }
    }

    pub fn evals(&self) -> Evaluations {
        self.evals
    }

    /// Direct access to the wrapped objective (for collaborator interfaces
    /// outside the value/gradient/Hessian contract, e.g. Jacobians).
    pub fn inner_mut(&mut self) -> &mut O {
        self.inner
    }
}

impl<'a, F: Float, O: Objective<F> + ?Sized> Objective<F> for Tally<'a, O> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn value(&mut self, x: &[F]) -> F {
        self.evals.values += 1;
        self.inner.value(x)
    }

    fn gradient(&mut self, x: &[F]) -> Result<Vec<F>, NonSmooth> {
        self.evals.gradients += 1;
        self.inner.gradient(x)
    }

    fn hessian(&mut self, x: &[F]) -> Result<Vec<Vec<F>>, NonSmooth> {
        self.evals.hessians += 1;
        self.inner.hessian(x)
    }
}
