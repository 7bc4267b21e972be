//! Coordinate descent: line searches along one coordinate axis at a time.
//!
//! The sign of each axis step comes from a forward probe of the objective
//! rather than the gradient, so the method tolerates objectives whose
//! per-coordinate derivatives are unreliable. The cycle-and-join-endpoints
//! order adds an extra search along the displacement accumulated over the
//! last full cycle, which accelerates progress along narrow valleys.

use std::fmt;

use num_traits::Float;

use crate::convergence::ConvergenceParams;
use crate::error::OptimError;
use crate::line_search::{LineSearch, StepSizeInit, WolfeParams};
use crate::linalg::norm;
use crate::objective::{Objective, Tally};
use crate::result::OptimResult;
use crate::state::{self, IterationState, Strategy};

/// Order in which coordinates are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateOrder {
    /// `0, 1, ..., n-1, 0, 1, ...`
    Cycle,
    /// `0, 1, ..., n-1, n-2, ..., 0, 1, ...`
    BackAndForth,
    /// A full cycle followed by one search along the total displacement of
    /// that cycle.
    CycleAndJoinEndpoints,
}

/// Configuration for [`coordinate_descent`].
#[derive(Debug, Clone)]
pub struct CoordinateDescentConfig<F> {
    pub order: CoordinateOrder,
    pub line_search: LineSearch<F>,
    pub convergence: ConvergenceParams<F>,
}

impl Default for CoordinateDescentConfig<f64> {
    fn default() -> Self {
        CoordinateDescentConfig {
            order: CoordinateOrder::CycleAndJoinEndpoints,
            // Axis steps of a similar scale tend to repeat, so carrying the
            // previous first-order decrease forward saves bracketing work
            line_search: LineSearch::StrongWolfe(WolfeParams {
                init: StepSizeInit::ConserveFirstOrderChange,
                ..WolfeParams::default()
            }),
            convergence: ConvergenceParams::default(),
        }
    }
}

impl Default for CoordinateDescentConfig<f32> {
    fn default() -> Self {
        CoordinateDescentConfig {
            order: CoordinateOrder::CycleAndJoinEndpoints,
            line_search: LineSearch::StrongWolfe(WolfeParams {
                init: StepSizeInit::ConserveFirstOrderChange,
                ..WolfeParams::default()
            }),
            convergence: ConvergenceParams::default(),
        }
    }
}

struct CoordinateStrategy<F> {
    order: CoordinateOrder,
    dim: usize,
    /// Next coordinate to search; `dim` denotes the join step.
    next: usize,
    forward: bool,
    cycle_start: Vec<F>,
}

impl<F: Float> CoordinateStrategy<F> {
    fn new(order: CoordinateOrder, dim: usize) -> Self {
        CoordinateStrategy {
            order,
            dim,
            next: 0,
            forward: true,
            cycle_start: Vec::new(),
        }
    }

    /// Advance the coordinate automaton and return the slot to search next.
    fn advance(&mut self) -> usize {
        let current = self.next;
        match self.order {
            CoordinateOrder::Cycle => {
                self.next = (current + 1) % self.dim;
            }
            CoordinateOrder::BackAndForth => {
                if self.dim == 1 {
                    self.next = 0;
                } else if self.forward {
                    if current + 1 == self.dim {
                        self.forward = false;
                        self.next = current - 1;
                    } else {
                        self.next = current + 1;
                    }
                } else if current == 0 {
                    self.forward = true;
                    self.next = 1;
                } else {
                    self.next = current - 1;
                }
            }
            CoordinateOrder::CycleAndJoinEndpoints => {
                self.next = (current + 1) % (self.dim + 1);
            }
        }
        current
    }
}

impl<F: Float, O: Objective<F> + ?Sized> Strategy<F, O> for CoordinateStrategy<F> {
    fn update_direction(
        &mut self,
        obj: &mut Tally<'_, O>,
        state: &IterationState<F>,
    ) -> Result<Vec<F>, OptimError> {
        let slot = self.advance();
        if self.cycle_start.is_empty() {
            self.cycle_start = state.point.clone();
        }

        let mut direction = if slot == self.dim {
            // Join step: search along the displacement of the whole cycle
            let d: Vec<F> = state
                .point
                .iter()
                .zip(self.cycle_start.iter())
                .map(|(&a, &b)| a - b)
                .collect();
            // The next cycle measures its displacement from the point
            // reached before this join step, not after it
            self.cycle_start = state.point.clone();
            if norm(&d) == F::zero() {
                let mut e = vec![F::zero(); self.dim];
                e[0] = F::one();
                e
            } else {
                d
            }
        } else {
            let mut e = vec![F::zero(); self.dim];
            e[slot] = F::one();
            e
        };

        // Probe the objective a small step ahead to decide the sign
        let eps = F::epsilon().sqrt();
        let probe: Vec<F> = state
            .point
            .iter()
            .zip(direction.iter())
            .map(|(&xi, &di)| xi + eps * di)
            .collect();
        if obj.value(&probe) >= state.value {
            for d in direction.iter_mut() {
                *d = -*d;
            }
        }
        Ok(direction)
    }
}

/// Minimize `obj` by coordinate descent from `x0`.
pub fn coordinate_descent<F, O>(
    obj: &mut O,
    x0: &[F],
    config: &CoordinateDescentConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: Objective<F> + ?Sized,
{
    if x0.is_empty() {
        return Err(OptimError::InvalidConfiguration(
            "coordinate descent needs at least one variable".into(),
        ));
    }
    let mut strategy = CoordinateStrategy::new(config.order, x0.len());
    state::run(
        obj,
        x0,
        &config.convergence,
        &config.line_search,
        &mut strategy,
    )
}
