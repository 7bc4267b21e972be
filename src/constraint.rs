//! Constraint types consumed by the constrained solvers.
//!
//! Linear equality constraints `A x = b` support exact projection through a
//! KKT system. Inequality constraints `c(x) <= 0` are a trait so the
//! interior-point solver can handle arbitrary smooth constraints; a linear
//! implementation is provided. [`Bounds`] holds simple box constraints
//! enforced by clamping.

use num_traits::Float;

use crate::error::OptimError;
use crate::linalg::{lu_solve, matvec};

/// Linear equality constraint `A x = b`.
#[derive(Debug, Clone)]
pub struct LinearEqualityConstraint<F> {
    a: Vec<Vec<F>>,
    b: Vec<F>,
}

impl<F: Float> LinearEqualityConstraint<F> {
    pub fn new(a: Vec<Vec<F>>, b: Vec<F>) -> Result<Self, OptimError> {
        if a.len() != b.len() {
            return Err(OptimError::InvalidConfiguration(format!(
                "constraint matrix has {} rows but the right-hand side has {} entries",
                a.len(),
                b.len()
            )));
        }
        if a.is_empty() {
            return Err(OptimError::InvalidConfiguration(
                "equality constraint needs at least one row".into(),
            ));
        }
        let n = a[0].len();
        if a.iter().any(|row| row.len() != n) {
            return Err(OptimError::InvalidConfiguration(
                "constraint matrix rows have inconsistent lengths".into(),
            ));
        }
        Ok(LinearEqualityConstraint { a, b })
    }

    /// Number of variables the constraint acts on.
    pub fn dim(&self) -> usize {
        self.a[0].len()
    }

    /// Number of constraint rows.
    pub fn num_rows(&self) -> usize {
        self.a.len()
    }

    /// Stack another constraint's rows below this one's.
    pub fn append(&mut self, other: &LinearEqualityConstraint<F>) -> Result<(), OptimError> {
        if other.dim() != self.dim() {
            return Err(OptimError::InvalidConfiguration(
                "cannot append equality constraints of different dimension".into(),
            ));
        }
        self.a.extend(other.a.iter().cloned());
        self.b.extend(other.b.iter().cloned());
        Ok(())
    }

    /// Residual `A x - b`.
    pub fn residual(&self, x: &[F]) -> Vec<F> {
        matvec(&self.a, x)
            .into_iter()
            .zip(self.b.iter())
            .map(|(ax, &bi)| ax - bi)
            .collect()
    }

    /// Whether `|A x - b|` stays within `tol` component-wise.
    pub fn is_satisfied(&self, x: &[F], tol: F) -> bool {
        self.residual(x).iter().all(|&r| r.abs() <= tol)
    }

    /// Euclidean projection of `x` onto the affine set `A y = b`.
    ///
    /// Solves the KKT system `[[I, A^T], [A, 0]] [y; nu] = [x; b]`.
    pub fn project(&self, x: &[F]) -> Result<Vec<F>, OptimError> {
        let n = self.dim();
        let m = self.a.len();
        if x.len() != n {
            return Err(OptimError::InvalidConfiguration(format!(
                "cannot project a point of dimension {} onto constraints over {} variables",
                x.len(),
                n
            )));
        }

        let mut kkt = vec![vec![F::zero(); n + m]; n + m];
        for i in 0..n {
            kkt[i][i] = F::one();
        }
        for (i, row) in self.a.iter().enumerate() {
            for (j, &aij) in row.iter().enumerate() {
                kkt[j][n + i] = aij;
                kkt[n + i][j] = aij;
            }
        }
        let mut rhs = x.to_vec();
        rhs.extend(self.b.iter().cloned());

        let solution = lu_solve(&kkt, &rhs).ok_or(OptimError::SingularConstraintSystem)?;
        Ok(solution[..n].to_vec())
    }

    pub fn matrix(&self) -> &[Vec<F>] {
        &self.a
    }

    pub fn rhs(&self) -> &[F] {
        &self.b
    }
}

/// Smooth inequality constraint `c(x) <= 0`.
pub trait InequalityConstraint<F: Float> {
    fn dim(&self) -> usize;
    fn value(&self, x: &[F]) -> F;
    fn gradient(&self, x: &[F]) -> Vec<F>;

    /// Constraint Hessian. Zero for affine constraints, which is the default.
    fn hessian(&self, x: &[F]) -> Vec<Vec<F>> {
        let _ = x;
        vec![vec![F::zero(); self.dim()]; self.dim()]
    }
}

/// Linear inequality constraint `a^T x - b <= 0`.
#[derive(Debug, Clone)]
pub struct LinearInequalityConstraint<F> {
    pub a: Vec<F>,
    pub b: F,
}

impl<F: Float> InequalityConstraint<F> for LinearInequalityConstraint<F> {
    fn dim(&self) -> usize {
        self.a.len()
    }

    fn value(&self, x: &[F]) -> F {
        x.iter()
            .zip(self.a.iter())
            .fold(F::zero(), |acc, (&xi, &ai)| acc + ai * xi)
            - self.b
    }

    fn gradient(&self, _x: &[F]) -> Vec<F> {
        self.a.clone()
    }
}

/// Box constraints `lower <= x <= upper`, either side optional.
#[derive(Debug, Clone, Default)]
pub struct Bounds<F> {
    lower: Option<Vec<F>>,
    upper: Option<Vec<F>>,
}

impl<F: Float> Bounds<F> {
    pub fn new(lower: Option<Vec<F>>, upper: Option<Vec<F>>) -> Self {
        Bounds { lower, upper }
    }

    /// The same scalar bounds applied to every coordinate.
    pub fn uniform(lower: F, upper: F, dim: usize) -> Self {
        Bounds {
            lower: Some(vec![lower; dim]),
            upper: Some(vec![upper; dim]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    pub fn validate(&self, dim: usize) -> Result<(), OptimError> {
        for side in [&self.lower, &self.upper].into_iter().flatten() {
            if side.len() != dim {
                return Err(OptimError::InvalidConfiguration(format!(
                    "bounds have dimension {} but the problem has {} variables",
                    side.len(),
                    dim
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (&self.lower, &self.upper) {
            if lo.iter().zip(hi.iter()).any(|(&l, &u)| l > u) {
                return Err(OptimError::InvalidConfiguration(
                    "lower bound exceeds upper bound".into(),
                ));
            }
        }
        Ok(())
    }

    /// Clamp `x` into the box, component-wise.
    pub fn clamp(&self, x: &mut [F]) {
        if let Some(lo) = &self.lower {
            for (xi, &l) in x.iter_mut().zip(lo.iter()) {
                if *xi < l {
                    *xi = l;
                }
            }
        }
        if let Some(hi) = &self.upper {
            for (xi, &u) in x.iter_mut().zip(hi.iter()) {
                if *xi > u {
                    *xi = u;
                }
            }
        }
    }
}
