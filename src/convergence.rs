use num_traits::Float;

use crate::linalg::{distance, max_norm, norm};
use crate::result::TerminationReason;
use crate::state::IterationState;

/// Which norm the gradient convergence criterion uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GradientNorm {
    /// Plain L2 norm of the gradient.
    #[default]
    L2,
    /// Max-norm scaled by `1 + |objective value|`, the criterion used by
    /// conjugate-gradient-style strategies.
    ScaledMax,
}

/// Parameters controlling convergence checks.
///
/// Each criterion can be toggled individually; the solve terminates when any
/// enabled criterion triggers. The iteration and function-evaluation caps
/// apply unconditionally. Immutable for the lifetime of a solve.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceParams<F> {
    /// Hard cap on iterations (default: 10_000).
    pub max_iterations: usize,
    /// Hard cap on objective value evaluations (default: 1_000_000).
    pub max_function_evaluations: usize,
    /// Point convergence: stop when `||x_k - x_{k-1}|| <= point_tolerance`
    /// (default: 1e-10).
    pub point_tolerance: F,
    /// Objective convergence: stop when
    /// `|f_{k-1} - f_k| / |f_{k-1}| <= objective_tolerance` (default: 1e-10).
    pub objective_tolerance: F,
    /// Gradient convergence: stop when the gradient norm falls at or below
    /// this value (default: 1e-5).
    pub gradient_tolerance: F,
    /// Enable the point-change criterion (default: true).
    pub check_point: bool,
    /// Enable the objective-change criterion (default: true).
    pub check_objective: bool,
    /// Enable the gradient-norm criterion (default: true).
    pub check_gradient: bool,
    /// Norm used by the gradient criterion (default: L2).
    pub gradient_norm: GradientNorm,
}

impl Default for ConvergenceParams<f64> {
    fn default() -> Self {
        ConvergenceParams {
            max_iterations: 10_000,
            max_function_evaluations: 1_000_000,
            point_tolerance: 1e-10,
            objective_tolerance: 1e-10,
            gradient_tolerance: 1e-5,
            check_point: true,
            check_objective: true,
            check_gradient: true,
            gradient_norm: GradientNorm::L2,
        }
    }
}

impl Default for ConvergenceParams<f32> {
    fn default() -> Self {
        ConvergenceParams {
            max_iterations: 10_000,
            max_function_evaluations: 1_000_000,
            point_tolerance: 1e-6,
            objective_tolerance: 1e-6,
            gradient_tolerance: 1e-3,
            check_point: true,
            check_objective: true,
            check_gradient: true,
            gradient_norm: GradientNorm::L2,
        }
    }
}

/// Evaluate the termination conditions for the current iteration state.
///
/// Pure function of its inputs: calling it twice without an intervening
/// iteration update returns the same answer. Criteria are only consulted
/// once at least one iteration has completed; the hard caps are checked
/// regardless of the per-criterion toggles.
pub fn check_termination<F: Float>(
    params: &ConvergenceParams<F>,
    state: &IterationState<F>,
    value_evaluations: usize,
) -> Option<TerminationReason> {
    if state.iteration == 0 {
        return None;
    }

    if state.iteration >= params.max_iterations {
        return Some(TerminationReason::MaxIterations);
    }
    if value_evaluations >= params.max_function_evaluations {
        return Some(TerminationReason::MaxFunctionEvaluations);
    }

    if params.check_point {
        let point_change = distance(&state.point, &state.previous_point);
        if point_change <= params.point_tolerance {
            return Some(TerminationReason::PointChange);
        }
    }

    if params.check_objective {
        let objective_change =
            ((state.previous_value - state.value) / state.previous_value).abs();
        if objective_change <= params.objective_tolerance {
            return Some(TerminationReason::ObjectiveChange);
        }
    }

    if params.check_gradient {
        let gradient_norm = match params.gradient_norm {
            GradientNorm::L2 => norm(&state.gradient),
            GradientNorm::ScaledMax => {
                max_norm(&state.gradient) / (F::one() + state.value.abs())
            }
        };
        if gradient_norm <= params.gradient_tolerance {
            return Some(TerminationReason::GradientNorm);
        }
    }

    None
}
