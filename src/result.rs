use std::fmt;

/// Running evaluation counts for one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evaluations {
    /// Objective value evaluations.
    pub values: usize,
    /// Gradient evaluations (including finite-difference fallbacks).
    pub gradients: usize,
    /// Hessian evaluations.
    pub hessians: usize,
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimResult<F> {
    /// Solution point.
    pub x: Vec<F>,
    /// Objective value at the solution.
    pub value: F,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Evaluation counts consumed by the solve.
    pub evals: Evaluations,
    /// Reason for termination.
    pub termination: TerminationReason,
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// L2 norm of the point change fell below tolerance.
    PointChange,
    /// Relative change in objective value fell below tolerance.
    ObjectiveChange,
    /// Gradient norm fell below tolerance.
    GradientNorm,
    /// Reached the maximum number of iterations.
    MaxIterations,
    /// Reached the maximum number of objective function evaluations.
    MaxFunctionEvaluations,
    /// Barrier ratio fell below tolerance (interior-point solver).
    BarrierConverged,
    /// A caller-supplied stopping criterion was satisfied.
    CustomCriterion,
    /// Line search could not find an acceptable step.
    LineSearchFailed,
    /// A numerical error occurred (e.g. singular Hessian, NaN).
    NumericalError,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::PointChange => write!(f, "point change below tolerance"),
            TerminationReason::ObjectiveChange => {
                write!(f, "relative objective change below tolerance")
            }
            TerminationReason::GradientNorm => write!(f, "gradient norm below tolerance"),
            TerminationReason::MaxIterations => write!(f, "maximum iterations reached"),
            TerminationReason::MaxFunctionEvaluations => {
                write!(f, "maximum function evaluations reached")
            }
            TerminationReason::BarrierConverged => {
                write!(f, "barrier ratio below tolerance")
            }
            TerminationReason::CustomCriterion => {
                write!(f, "custom stopping criterion satisfied")
            }
            TerminationReason::LineSearchFailed => write!(f, "line search failed"),
            TerminationReason::NumericalError => write!(f, "numerical error"),
        }
    }
}
