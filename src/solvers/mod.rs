//! Solver entry points.
//!
//! Every deterministic solver is a free function taking the objective, an
//! initial point and a configuration struct, and returns an
//! [`OptimResult`](crate::result::OptimResult) or an
//! [`OptimError`](crate::error::OptimError) for invalid configurations.

pub mod coordinate_descent;
pub mod gauss_newton;
pub mod gradient_descent;
pub mod interior_point;
pub mod newton;
pub mod quasi_newton;
pub mod stochastic;

pub use coordinate_descent::{coordinate_descent, CoordinateDescentConfig, CoordinateOrder};
pub use gauss_newton::{gauss_newton, GaussNewtonConfig, LeastSquaresMethod};
pub use gradient_descent::{gradient_descent, GradientDescentConfig};
pub use interior_point::{interior_point, InnerSolver, InteriorPointConfig};
pub use newton::{newton, NewtonConfig};
pub use quasi_newton::{quasi_newton, QuasiNewtonConfig, QuasiNewtonMethod};
pub use stochastic::{
    stochastic_gradient_descent, StepSchedule, StochasticConfig, StochasticMethod,
};
