//! Finite-difference approximation of gradients and Hessians.
//!
//! Used as the fallback when an objective does not provide analytic
//! derivatives, which also keeps the coordinate-descent solver fully
//! derivative-free. Step sizes follow the usual truncation/rounding
//! trade-off: `sqrt(eps)` for forward differences, `cbrt(eps)` for central
//! differences.

use num_traits::Float;

use crate::error::NonSmooth;

/// Forward-difference gradient approximation.
pub fn forward_gradient<F: Float>(f: &mut impl FnMut(&[F]) -> F, x: &[F]) -> Vec<F> {
    let eps = F::epsilon().sqrt();
    let fx = f(x);
    let mut grad = vec![F::zero(); x.len()];
    let mut probe = x.to_vec();
    for i in 0..x.len() {
        probe[i] = x[i] + eps;
        grad[i] = (f(&probe) - fx) / eps;
        probe[i] = x[i];
    }
    grad
}

/// Central-difference gradient approximation.
pub fn central_gradient<F: Float>(f: &mut impl FnMut(&[F]) -> F, x: &[F]) -> Vec<F> {
    let eps = F::epsilon().cbrt();
    let two = F::one() + F::one();
    let mut grad = vec![F::zero(); x.len()];
    let mut probe = x.to_vec();
    for i in 0..x.len() {
        probe[i] = x[i] + eps;
        let forward = f(&probe);
        probe[i] = x[i] - eps;
        let backward = f(&probe);
        probe[i] = x[i];
        grad[i] = (forward - backward) / (two * eps);
    }
    grad
}

/// Central-difference Hessian approximation from function values only.
pub fn central_hessian<F: Float>(f: &mut impl FnMut(&[F]) -> F, x: &[F]) -> Vec<Vec<F>> {
    let n = x.len();
    let eps = F::epsilon().cbrt();
    let two = F::one() + F::one();
    let four = two * two;
    let fx = f(x);
    let mut h = vec![vec![F::zero(); n]; n];
    let mut probe = x.to_vec();

    for i in 0..n {
        for j in i..n {
            let entry = if i == j {
                // Fourth-order accurate second derivative on the diagonal
                probe[i] = x[i] + two * eps;
                let t1 = f(&probe);
                probe[i] = x[i] + eps;
                let t2 = f(&probe);
                probe[i] = x[i] - eps;
                let t3 = f(&probe);
                probe[i] = x[i] - two * eps;
                let t4 = f(&probe);
                probe[i] = x[i];
                let sixteen = four * four;
                let thirty = F::from(30.0).unwrap();
                let twelve = F::from(12.0).unwrap();
                (-t1 + sixteen * t2 - thirty * fx + sixteen * t3 - t4) / (twelve * eps * eps)
            } else {
                probe[i] = x[i] + eps;
                probe[j] = x[j] + eps;
                let t1 = f(&probe);
                probe[j] = x[j] - eps;
                let t2 = f(&probe);
                probe[i] = x[i] - eps;
                probe[j] = x[j] + eps;
                let t3 = f(&probe);
                probe[j] = x[j] - eps;
                let t4 = f(&probe);
                probe[i] = x[i];
                probe[j] = x[j];
                (t1 - t2 - t3 + t4) / (four * eps * eps)
            };
            h[i][j] = entry;
            h[j][i] = entry;
        }
    }

    h
}

/// Forward-difference Hessian approximation built from gradient evaluations.
///
/// Cheaper and more accurate than [`central_hessian`] when an analytic
/// gradient is available. Propagates the [`NonSmooth`] signal from any
/// probed gradient.
pub fn forward_hessian_from_gradient<F: Float>(
    grad: &mut impl FnMut(&[F]) -> Result<Vec<F>, NonSmooth>,
    x: &[F],
) -> Result<Vec<Vec<F>>, NonSmooth> {
    let n = x.len();
    let eps = F::epsilon().sqrt();
    let g0 = grad(x)?;
    let mut h = vec![vec![F::zero(); n]; n];
    let mut probe = x.to_vec();

    for i in 0..n {
        probe[i] = x[i] + eps;
        let gi = grad(&probe)?;
        probe[i] = x[i];
        for j in 0..n {
            h[j][i] = (gi[j] - g0[j]) / eps;
        }
    }

    // Symmetrize: forward differences of an exact gradient are not
    let two = F::one() + F::one();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = (h[i][j] + h[j][i]) / two;
            h[i][j] = avg;
            h[j][i] = avg;
        }
    }

    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadratic(x: &[f64]) -> f64 {
        // f = x0^2 + 3 x0 x1 + 2 x1^2
        x[0] * x[0] + 3.0 * x[0] * x[1] + 2.0 * x[1] * x[1]
    }

    #[test]
    fn central_gradient_of_quadratic() {
        let x = [1.5, -0.5];
        let g = central_gradient(&mut |p| quadratic(p), &x);
        // Analytic: [2 x0 + 3 x1, 3 x0 + 4 x1]
        assert_relative_eq!(g[0], 2.0 * 1.5 + 3.0 * -0.5, epsilon = 1e-6);
        assert_relative_eq!(g[1], 3.0 * 1.5 + 4.0 * -0.5, epsilon = 1e-6);
    }

    #[test]
    fn forward_gradient_of_quadratic() {
        let x = [2.0, 1.0];
        let g = forward_gradient(&mut |p| quadratic(p), &x);
        assert_relative_eq!(g[0], 7.0, epsilon = 1e-5);
        assert_relative_eq!(g[1], 10.0, epsilon = 1e-5);
    }

    #[test]
    fn central_hessian_of_quadratic() {
        let x = [0.3, 0.7];
        let h = central_hessian(&mut |p| quadratic(p), &x);
        assert_relative_eq!(h[0][0], 2.0, epsilon = 1e-3);
        assert_relative_eq!(h[0][1], 3.0, epsilon = 1e-3);
        assert_relative_eq!(h[1][0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(h[1][1], 4.0, epsilon = 1e-3);
    }

    #[test]
    fn hessian_from_gradient_matches() {
        let x = [0.3, 0.7];
        let mut grad = |p: &[f64]| {
            Ok(vec![2.0 * p[0] + 3.0 * p[1], 3.0 * p[0] + 4.0 * p[1]])
        };
        let h = forward_hessian_from_gradient(&mut grad, &x).unwrap();
        assert_relative_eq!(h[0][0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(h[0][1], 3.0, epsilon = 1e-5);
        assert_relative_eq!(h[1][1], 4.0, epsilon = 1e-5);
    }
}
