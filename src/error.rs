use thiserror::Error;

/// Signal returned by gradient/Hessian evaluation at a point where the
/// objective is not differentiable (e.g. a max-of-functions objective).
///
/// This is a recoverable signal, not a failure: the line search skips its
/// step-size update when a trial point turns out to be non-smooth. Solvers
/// that need a gradient to compute the search direction convert it into
/// [`OptimError::NonSmoothObjective`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("objective is not differentiable at the query point")]
pub struct NonSmooth;

/// Fatal errors surfaced by `solve` entry points.
///
/// Configuration errors are raised before any iteration runs. Numerical
/// breakdown mid-run (singular Hessian, failed line search) is not an error:
/// it terminates the solve with the last valid point and a describing
/// [`TerminationReason`](crate::result::TerminationReason).
#[derive(Debug, Error)]
pub enum OptimError {
    /// A solver that requires a smooth objective hit a non-differentiable
    /// point while computing its search direction.
    #[error("objective is non-smooth where a gradient is required")]
    NonSmoothObjective(#[from] NonSmooth),

    /// Projection onto a linear-equality constraint manifold failed because
    /// the constraint coefficient matrix is singular.
    #[error("linear equality constraint matrix is singular")]
    SingularConstraintSystem,

    /// Mutually exclusive or out-of-range options were combined.
    #[error("invalid solver configuration: {0}")]
    InvalidConfiguration(String),

    /// The phase-I feasibility search could not find a strictly feasible
    /// starting point for the inequality constraints.
    #[error("no strictly feasible point satisfies the inequality constraints")]
    Infeasible,
}
