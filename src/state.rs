//! Double-buffered iteration state and the shared solver driver.
//!
//! Every line-search solver follows the same iteration protocol: compute a
//! search direction, choose a step size, shift the current buffers into the
//! previous ones, take the step, then refresh the value and gradient at the
//! new point. The solver-specific parts plug in through [`Strategy`].

use std::fmt;

use num_traits::Float;

use crate::convergence::{check_termination, ConvergenceParams};
use crate::error::OptimError;
use crate::line_search::{LineSearch, LineSearchOutcome, SearchHistory};
use crate::linalg::{axpy, norm};
use crate::objective::{Objective, Tally};
use crate::result::{OptimResult, TerminationReason};

/// Snapshot of the current and previous iterate.
///
/// `previous_*` fields hold the iterate before the most recent point update;
/// they are unspecified until the first update has happened (`iteration > 0`).
#[derive(Debug, Clone)]
pub struct IterationState<F> {
    pub iteration: usize,
    pub point: Vec<F>,
    pub previous_point: Vec<F>,
    pub value: F,
    pub previous_value: F,
    pub gradient: Vec<F>,
    pub previous_gradient: Vec<F>,
    pub direction: Vec<F>,
    pub previous_direction: Vec<F>,
    pub step_size: F,
    pub previous_step_size: F,
}

impl<F: Float> IterationState<F> {
    fn new(point: Vec<F>, value: F, gradient: Vec<F>) -> Self {
        let n = point.len();
        IterationState {
            iteration: 0,
            previous_point: point.clone(),
            point,
            value,
            previous_value: value,
            previous_gradient: gradient.clone(),
            gradient,
            direction: vec![F::zero(); n],
            previous_direction: vec![F::zero(); n],
            step_size: F::one(),
            previous_step_size: F::one(),
        }
    }

    /// Shift the current buffers into the previous ones and install the new
    /// direction and step size. The new point and its value/gradient are
    /// filled in by the caller afterwards.
    fn advance(&mut self, direction: Vec<F>, step_size: F) {
        std::mem::swap(&mut self.previous_point, &mut self.point);
        std::mem::swap(&mut self.previous_gradient, &mut self.gradient);
        self.previous_value = self.value;
        self.previous_direction = std::mem::replace(&mut self.direction, direction);
        self.previous_step_size = self.step_size;
        self.step_size = step_size;
        self.point = axpy(&self.previous_point, step_size, &self.direction);
    }
}

/// Solver-specific hooks plugged into [`run`].
pub(crate) trait Strategy<F: Float, O: Objective<F> + ?Sized> {
    /// Compute the search direction at the current iterate.
    fn update_direction(
        &mut self,
        obj: &mut Tally<'_, O>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError>;

    /// Adjust the freshly stepped point in place (projection, clamping,
    /// cycle bookkeeping). Called after the step, before re-evaluation;
    /// `state.point` is empty for the duration of the call, the stepped
    /// point is the `point` argument.
    fn update_point(
        &mut self,
        _point: &mut Vec<F>,
        _state: &IterationState<F>,
    ) -> Result<(), OptimError> {
        Ok(())
    }

    /// Extra termination criterion checked after the shared ones.
    fn check(&mut self, _state: &IterationState<F>) -> Option<TerminationReason> {
        None
    }
}

/// Shared driver for all line-search solvers.
pub(crate) fn run<F, O, S>(
    obj: &mut O,
    x0: &[F],
    convergence: &ConvergenceParams<F>,
    line_search: &LineSearch<F>,
    strategy: &mut S,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
    S: Strategy<F, O>,
{
    line_search.validate()?;
    if x0.len() != obj.dim() {
        return Err(OptimError::InvalidConfiguration(format!(
            "initial point has dimension {} but the objective expects {}",
            x0.len(),
            obj.dim()
        )));
    }

    let mut tally = Tally::new(obj);
    let value = tally.value(x0);
    let gradient = tally.gradient(x0)?;
    let mut state = IterationState::new(x0.to_vec(), value, gradient);

    let termination = loop {
        let direction = strategy.update_direction(&mut tally, &state)?;

        let history = if state.iteration > 0 {
            Some(SearchHistory {
                previous_gradient: &state.previous_gradient,
                previous_direction: &state.previous_direction,
                previous_step_size: state.previous_step_size,
            })
        } else {
            None
        };
        let step_size = match line_search.step_size(
            &mut tally,
            &state.point,
            &direction,
            state.value,
            &state.gradient,
            history.as_ref(),
        ) {
            LineSearchOutcome::Accepted(alpha) => alpha,
            // Non-smooth trial point: reuse the last step size
            LineSearchOutcome::NonSmoothSkip => state.step_size,
            LineSearchOutcome::Failed => break TerminationReason::LineSearchFailed,
        };

        state.advance(direction, step_size);
        let mut point = std::mem::take(&mut state.point);
        let hooked = strategy.update_point(&mut point, &state);
        state.point = point;
        hooked?;
        state.value = tally.value(&state.point);
        state.gradient = tally.gradient(&state.point)?;
        state.iteration += 1;

        log::debug!(
            "iteration {:>5}: f = {:?}, |g| = {:?}, alpha = {:?}",
            state.iteration,
            state.value,
            norm(&state.gradient),
            state.step_size
        );

        if !state.value.is_finite() {
            break TerminationReason::NumericalError;
        }
        if let Some(reason) = strategy.check(&state) {
            break reason;
        }
        if let Some(reason) = check_termination(convergence, &state, tally.evals().values) {
            break reason;
        }
    };

    log::debug!(
        "terminated after {} iterations: {}",
        state.iteration,
        termination
    );

    Ok(OptimResult {
        x: state.point,
        value: state.value,
        iterations: state.iteration,
        evals: tally.evals(),
        termination,
    })
}
