//! Steepest descent, optionally projected onto linear equality constraints
//! or clamped into box constraints.

use std::fmt;

use num_traits::Float;

use crate::constraint::{Bounds, LinearEqualityConstraint};
use crate::convergence::ConvergenceParams;
use crate::error::OptimError;
use crate::line_search::LineSearch;
use crate::objective::{Objective, Tally};
use crate::result::OptimResult;
use crate::state::{self, IterationState, Strategy};

/// Configuration for [`gradient_descent`].
///
/// `bounds` and `equality` are mutually exclusive: clamping a projected point
/// would leave the constraint manifold.
#[derive(Debug, Clone)]
pub struct GradientDescentConfig<F> {
    pub line_search: LineSearch<F>,
    pub convergence: ConvergenceParams<F>,
    pub bounds: Option<Bounds<F>>,
    pub equality: Option<LinearEqualityConstraint<F>>,
}

impl Default for GradientDescentConfig<f64> {
    fn default() -> Self {
        GradientDescentConfig {
            line_search: LineSearch::default(),
            convergence: ConvergenceParams::default(),
            bounds: None,
            equality: None,
        }
    }
}

impl Default for GradientDescentConfig<f32> {
    fn default() -> Self {
        GradientDescentConfig {
            line_search: LineSearch::default(),
            convergence: ConvergenceParams::default(),
            bounds: None,
            equality: None,
        }
    }
}

struct SteepestDescent<'a, F> {
    bounds: Option<&'a Bounds<F>>,
    equality: Option<&'a LinearEqualityConstraint<F>>,
}

impl<F: Float, O: Objective<F> + ?Sized> Strategy<F, O> for SteepestDescent<'_, F> {
    fn update_direction(
        &mut self,
        _obj: &mut Tally<'_, O>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError> {
        Ok(state.gradient.iter().map(|&g| -g).collect())
    }

    fn update_point(
        &mut self,
        point: &mut Vec<F>,
        _state: &IterationState<F>,
    ) -> Result<(), OptimError> {
        if let Some(eq) = self.equality {
            *point = eq.project(point)?;
        }
        if let Some(bounds) = self.bounds {
            bounds.clamp(point);
        }
        Ok(())
    }
}

/// Minimize `obj` by steepest descent from `x0`.
pub fn gradient_descent<F, O>(
    obj: &mut O,
    x0: &[F],
    config: &GradientDescentConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
{
    if config.bounds.is_some() && config.equality.is_some() {
        return Err(OptimError::InvalidConfiguration(
            "box and equality constraints cannot be combined".into(),
        ));
    }
    if let Some(bounds) = &config.bounds {
        bounds.validate(x0.len())?;
    }

    // Start from a point that already satisfies the constraint
    let mut start = x0.to_vec();
    if let Some(eq) = &config.equality {
        start = eq.project(&start)?;
    }
    if let Some(bounds) = &config.bounds {
        bounds.clamp(&mut start);
    }

    let mut strategy = SteepestDescent {
        bounds: config.bounds.as_ref(),
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
