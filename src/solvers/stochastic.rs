//! Stochastic gradient solvers over mini-batch gradient estimates.
//!
//! The solver owns batch sampling: indices into the objective's terms are
//! drawn from a seeded RNG, so runs with the same seed are reproducible.
//! Termination is based on the point staying put for a configured number of
//! consecutive iterations, since the true objective value is never observed.

use std::fmt;

use num_traits::Float;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constraint::Bounds;
use crate::error::OptimError;
use crate::linalg::distance;
use crate::objective::StochasticObjective;
use crate::result::{Evaluations, OptimResult, TerminationReason};

/// Per-coordinate direction scaling method.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StochasticMethod<F> {
    /// Plain stochastic gradient descent: `d = -g`.
    Sgd,
    /// AdaGrad: accumulate squared gradients, `d = -g / sqrt(G)`.
    AdaGrad,
    /// RMSProp: leaky squared-gradient cache with the given decay.
    RmsProp { decay: F },
}

/// Step-size schedule `alpha_k`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepSchedule<F> {
    /// The same step size every iteration.
    Constant(F),
    /// `alpha_k = (tau + k + 1)^(-kappa)`.
    Scaled { tau: F, kappa: F },
}

impl<F: Float> StepSchedule<F> {
    fn step(&self, iteration: usize) -> F {
        match *self {
            StepSchedule::Constant(c) => c,
            StepSchedule::Scaled { tau, kappa } => {
                let k = F::from(iteration).unwrap();
                (tau + k + F::one()).powf(-kappa)
            }
        }
    }
}

/// Configuration for [`stochastic_gradient_descent`].
#[derive(Debug, Clone)]
pub struct StochasticConfig<F> {
    pub method: StochasticMethod<F>,
    pub schedule: StepSchedule<F>,
    pub batch_size: usize,
    pub sample_with_replacement: bool,
    /// RNG seed; runs with the same seed visit the same batches.
    pub seed: Option<u64>,
    pub max_iterations: usize,
    pub point_tolerance: F,
    /// Number of consecutive no-move iterations required to stop.
    pub required_consecutive: usize,
    /// L1 regularization weight for the dual-averaging update. Requires a
    /// squared-gradient cache, so plain [`StochasticMethod::Sgd`] is not
    /// supported.
    pub l1_weight: Option<F>,
    pub bounds: Option<Bounds<F>>,
}

impl Default for StochasticConfig<f64> {
    fn default() -> Self {
        StochasticConfig {
            method: StochasticMethod::AdaGrad,
            schedule: StepSchedule::Scaled {
                tau: 10.0,
                kappa: 0.75,
            },
            batch_size: 100,
            sample_with_replacement: false,
            seed: None,
            max_iterations: 10_000,
            point_tolerance: 1e-10,
            required_consecutive: 1,
            l1_weight: None,
            bounds: None,
        }
    }
}

impl Default for StochasticConfig<f32> {
    fn default() -> Self {
        StochasticConfig {
            method: StochasticMethod::AdaGrad,
            schedule: StepSchedule::Scaled {
                tau: 10.0,
                kappa: 0.75,
            },
            batch_size: 100,
            sample_with_replacement: false,
            seed: None,
            max_iterations: 10_000,
            point_tolerance: 1e-6,
            required_consecutive: 1,
            l1_weight: None,
            bounds: None,
        }
    }
}

fn sample_batch(rng: &mut StdRng, num_terms: usize, size: usize, with_replacement: bool) -> Vec<usize> {
    if with_replacement {
        let dist = Uniform::from(0..num_terms);
        (0..size).map(|_| dist.sample(rng)).collect()
    } else if size >= num_terms {
        (0..num_terms).collect()
    } else {
        // Partial Fisher-Yates over the index range
        let mut indices: Vec<usize> = (0..num_terms).collect();
        for i in 0..size {
            let j = rng.gen_range(i..num_terms);
            indices.swap(i, j);
        }
        indices.truncate(size);
        indices
    }
}

/// Minimize the expected objective by stochastic gradient steps from `x0`.
pub fn stochastic_gradient_descent<F, O>(
    obj: &mut O,
    x0: &[F],
    config: &StochasticConfig<F>,
) -> Result<OptimResult<F>, OptimError>
where
    F: Float + fmt::Debug,
    O: StochasticObjective<F> + ?Sized,
{
    if x0.len() != obj.dim() {
        return Err(OptimError::InvalidConfiguration(format!(
            "initial point has dimension {} but the objective expects {}",
            x0.len(),
            obj.dim()
        )));
    }
    if obj.num_terms() == 0 || config.batch_size == 0 {
        return Err(OptimError::InvalidConfiguration(
            "objective terms and batch size must both be nonzero".into(),
        ));
    }
    if config.l1_weight.is_some() && matches!(config.method, StochasticMethod::Sgd) {
        return Err(OptimError::InvalidConfiguration(
            "L1 dual averaging requires AdaGrad or RMSProp".into(),
        ));
    }
    if let Some(bounds) = &config.bounds {
        bounds.validate(x0.len())?;
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let n = x0.len();
    let eps = F::min_positive_value().sqrt();
    let mut x = x0.to_vec();
    let mut cache = vec![F::zero(); n];
    // Running gradient sum for the dual-averaging update
    let mut dual = vec![F::zero(); n];
    let mut evals = Evaluations::default();
    let mut consecutive = 0;
    let mut iteration = 0;
    let termination = loop {
        if iteration >= config.max_iterations {
            break TerminationReason::MaxIterations;
        }

        let batch = sample_batch(
            &mut rng,
            obj.num_terms(),
            config.batch_size,
            config.sample_with_replacement,
        );
        let grad = obj.gradient_estimate(&x, &batch);
        evals.gradients += 1;

        match config.method {
            StochasticMethod::Sgd => {}
            StochasticMethod::AdaGrad => {
                for (ci, &gi) in cache.iter_mut().zip(grad.iter()) {
                    *ci = *ci + gi * gi;
                }
            }
            StochasticMethod::RmsProp { decay } => {
                for (ci, &gi) in cache.iter_mut().zip(grad.iter()) {
                    *ci = decay * *ci + (F::one() - decay) * gi * gi;
                }
            }
        }

        let alpha = config.schedule.step(iteration);
        let mut next = x.clone();
        match config.l1_weight {
            Some(lambda) => {
                // Dual averaging: the point is rebuilt from the running
                // gradient average, not incremented
                let k = F::from(iteration).unwrap();
                for (di, &gi) in dual.iter_mut().zip(grad.iter()) {
                    *di = *di + gi;
                }
                for i in 0..n {
                    let mean = dual[i].abs() / (k + F::one());
                    next[i] = if mean <= lambda {
                        F::zero()
                    } else {
                        let denom = cache[i].sqrt() + eps;
                        -alpha * k * dual[i].signum() * (mean - lambda) / denom
                    };
                }
            }
            None => {
                for i in 0..n {
                    let scale = match config.method {
                        StochasticMethod::Sgd => F::one(),
                        StochasticMethod::AdaGrad | StochasticMethod::RmsProp { .. } => {
                            cache[i].sqrt() + eps
                        }
                    };
                    next[i] = x[i] - alpha * grad[i] / scale;
                }
            }
        }
        if let Some(bounds) = &config.bounds {
            bounds.clamp(&mut next);
        }

        let moved = distance(&next, &x);
        x = next;
        iteration += 1;
        log::trace!("iteration {:>6}: moved {:?}", iteration, moved);

        if moved <= config.point_tolerance {
            consecutive += 1;
            if consecutive >= config.required_consecutive {
                break TerminationReason::PointChange;
            }
        } else {
            consecutive = 0;
        }
    };

    // The stochastic solvers never see objective values
    Ok(OptimResult {
        x,
        value: F::nan(),
        iterations: iteration,
        evals,
        termination,
    })
}
