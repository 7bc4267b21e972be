pub mod constraint;
pub mod convergence;
pub mod derivatives;
pub mod error;
pub mod line_search;
pub mod linalg;
pub mod objective;
pub mod result;
pub mod solvers;
mod state;

pub use constraint::{
    Bounds, InequalityConstraint, LinearEqualityConstraint, LinearInequalityConstraint,
};
pub use convergence::{ConvergenceParams, GradientNorm};
pub use error::{NonSmooth, OptimError};
pub use line_search::{ArmijoParams, LineSearch, StepSizeInit, WolfeParams};
pub use objective::{
    LeastSquares, LeastSquaresObjective, Objective, QuadraticFunction, StochasticObjective,
};
pub use result::{Evaluations, OptimResult, TerminationReason};
pub use solvers::coordinate_descent::{
    coordinate_descent, CoordinateDescentConfig, CoordinateOrder,
};
pub use solvers::gauss_newton::{gauss_newton, GaussNewtonConfig, LeastSquaresMethod};
pub use solvers::gradient_descent::{gradient_descent, GradientDescentConfig};
pub use solvers::interior_point::{interior_point, InnerSolver, InteriorPointConfig};
pub use solvers::newton::{newton, NewtonConfig};
pub use solvers::quasi_newton::{quasi_newton, QuasiNewtonConfig, QuasiNewtonMethod};
pub use solvers::stochastic::{
    stochastic_gradient_descent, StepSchedule, StochasticConfig, StochasticMethod,
};
pub use state::IterationState;
