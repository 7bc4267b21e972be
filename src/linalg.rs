//! Dense linear-algebra kernels used by the solvers.
//!
//! Matrices are row-major `Vec<Vec<F>>`; vectors are slices. Everything here
//! is allocation-light and deliberately simple: the solvers in this crate
//! work on small-to-medium dense systems.

use num_traits::Float;

/// Compute the dot product of two vectors.
pub fn dot<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    let mut s = F::zero();
    for i in 0..a.len() {
        s = s + a[i] * b[i];
    }
    s
}

/// Compute the L2 norm of a vector.
pub fn norm<F: Float>(v: &[F]) -> F {
    dot(v, v).sqrt()
}

/// Compute the max-norm (largest absolute component) of a vector.
pub fn max_norm<F: Float>(v: &[F]) -> F {
    let mut m = F::zero();
    for &x in v {
        if x.abs() > m {
            m = x.abs();
        }
    }
    m
}

/// L2 norm of `a - b`.
pub fn distance<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    let mut s = F::zero();
    for i in 0..a.len() {
        let d = a[i] - b[i];
        s = s + d * d;
    }
    s.sqrt()
}

/// Compute `x + alpha * d` into a fresh vector.
pub fn axpy<F: Float>(x: &[F], alpha: F, d: &[F]) -> Vec<F> {
    debug_assert_eq!(x.len(), d.len());
    x.iter().zip(d).map(|(&xi, &di)| xi + alpha * di).collect()
}

/// Matrix-vector product `A * x`.
pub fn matvec<F: Float>(a: &[Vec<F>], x: &[F]) -> Vec<F> {
    a.iter().map(|row| dot(row, x)).collect()
}

/// Transposed matrix-vector product `A^T * x`.
pub fn matvec_t<F: Float>(a: &[Vec<F>], x: &[F]) -> Vec<F> {
    let n = if a.is_empty() { 0 } else { a[0].len() };
    let mut out = vec![F::zero(); n];
    for (row, &xi) in a.iter().zip(x) {
        for j in 0..n {
            out[j] = out[j] + row[j] * xi;
        }
    }
    out
}

/// The `n x n` identity matrix.
pub fn identity<F: Float>(n: usize) -> Vec<Vec<F>> {
    let mut m = vec![vec![F::zero(); n]; n];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = F::one();
    }
    m
}

/// Result of LU factorization with partial pivoting.
///
/// Stores the combined L/U factors in a single matrix (L below diagonal,
/// U on and above diagonal) plus the row permutation.
pub struct LuFactors<F> {
    lu: Vec<Vec<F>>,
    perm: Vec<usize>,
    n: usize,
}

/// Factorize an `n x n` matrix via LU decomposition with partial pivoting.
///
/// Returns `None` if the matrix is singular (zero or near-zero pivot).
// Explicit indexing is clearer for pivoted LU: row/col indices drive pivot search and elimination
#[allow(clippy::needless_range_loop)]
pub fn lu_factor<F: Float>(a: &[Vec<F>]) -> Option<LuFactors<F>> {
    let n = a.len();
    debug_assert!(a.iter().all(|row| row.len() == n));

    let mut lu: Vec<Vec<F>> = a.to_vec();
    let mut perm: Vec<usize> = (0..n).collect();

    let eps = F::from(1e-12).unwrap_or_else(F::epsilon);

    for col in 0..n {
        let mut max_val = lu[col][col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let v = lu[row][col].abs();
            if v > max_val {
                max_val = v;
                max_row = row;
            }
        }

        if max_val < eps {
            return None; // Singular
        }

        if max_row != col {
            lu.swap(col, max_row);
            perm.swap(col, max_row);
        }

        let pivot = lu[col][col];

        for row in (col + 1)..n {
            let factor = lu[row][col] / pivot;
            lu[row][col] = factor; // Store L factor
            for j in (col + 1)..n {
                let val = lu[col][j];
                lu[row][j] = lu[row][j] - factor * val;
            }
        }
    }

    Some(LuFactors { lu, perm, n })
}

/// Solve `A * x = b` using a pre-computed LU factorization.
// Explicit indexing is clearer for forward/back substitution with permuted indices
#[allow(clippy::needless_range_loop)]
pub fn lu_back_solve<F: Float>(factors: &LuFactors<F>, b: &[F]) -> Vec<F> {
    let n = factors.n;
    debug_assert_eq!(b.len(), n);

    let mut y = vec![F::zero(); n];
    for i in 0..n {
        y[i] = b[factors.perm[i]];
    }

    // Forward substitution (L has unit diagonal)
    for i in 1..n {
        for j in 0..i {
            let l_ij = factors.lu[i][j];
            let y_j = y[j];
            y[i] = y[i] - l_ij * y_j;
        }
    }

    // Back substitution
    let mut x = vec![F::zero(); n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum = sum - factors.lu[i][j] * x[j];
        }
        x[i] = sum / factors.lu[i][i];
    }

    x
}

/// Solve `A * x = b` via LU factorization with partial pivoting.
///
/// Returns `None` if the matrix is singular.
pub fn lu_solve<F: Float>(a: &[Vec<F>], b: &[F]) -> Option<Vec<F>> {
    let factors = lu_factor(a)?;
    Some(lu_back_solve(&factors, b))
}

/// Cholesky factorization `A = L * L^T` of a symmetric matrix.
///
/// Returns the lower-triangular factor, or `None` if `A` is not positive
/// definite. Doubles as the positive-definiteness check used by the exact
/// line search.
pub fn cholesky<F: Float>(a: &[Vec<F>]) -> Option<Vec<Vec<F>>> {
    let n = a.len();
    let mut l = vec![vec![F::zero(); n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum = sum - l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= F::zero() {
                    return None; // Not positive definite
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    Some(l)
}

/// Solve `A * x = b` given the Cholesky factor `L` of `A`.
#[allow(clippy::needless_range_loop)]
pub fn cholesky_solve<F: Float>(l: &[Vec<F>], b: &[F]) -> Vec<F> {
    let n = l.len();

    // L * y = b
    let mut y = vec![F::zero(); n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum = sum - l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // L^T * x = y
    let mut x = vec![F::zero(); n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum = sum - l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    x
}

/// Solve the least-squares problem `min ||J x - y||` via Householder QR.
///
/// Requires `J` to be `m x n` with `m >= n`. Returns `None` if `J` is
/// rank-deficient.
#[allow(clippy::needless_range_loop)]
pub fn qr_least_squares<F: Float>(j: &[Vec<F>], y: &[F]) -> Option<Vec<F>> {
    let m = j.len();
    let n = if m == 0 { return None } else { j[0].len() };
    if m < n {
        return None;
    }

    let mut r: Vec<Vec<F>> = j.to_vec();
    let mut rhs: Vec<F> = y.to_vec();
    let eps = F::from(1e-12).unwrap_or_else(F::epsilon);

    for k in 0..n {
        // Householder vector for column k
        let mut alpha = F::zero();
        for i in k..m {
            alpha = alpha + r[i][k] * r[i][k];
        }
        alpha = alpha.sqrt();
        if alpha < eps {
            return None; // Rank deficient
        }
        if r[k][k] > F::zero() {
            alpha = -alpha;
        }

        let mut v = vec![F::zero(); m];
        for i in k..m {
            v[i] = r[i][k];
        }
        v[k] = v[k] - alpha;
        let vnorm2 = dot(&v, &v);
        if vnorm2 < eps {
            continue;
        }
        let two = F::one() + F::one();

        // Apply the reflection to the remaining columns and the rhs
        for col in k..n {
            let mut proj = F::zero();
            for i in k..m {
                proj = proj + v[i] * r[i][col];
            }
            let scale = two * proj / vnorm2;
            for i in k..m {
                r[i][col] = r[i][col] - scale * v[i];
            }
        }
        let mut proj = F::zero();
        for i in k..m {
            proj = proj + v[i] * rhs[i];
        }
        let scale = two * proj / vnorm2;
        for i in k..m {
            rhs[i] = rhs[i] - scale * v[i];
        }
    }

    // Back substitution on the upper-triangular part
    let mut x = vec![F::zero(); n];
    for i in (0..n).rev() {
        if r[i][i].abs() < eps {
            return None;
        }
        let mut sum = rhs[i];
        for col in (i + 1)..n {
            sum = sum - r[i][col] * x[col];
        }
        x[i] = sum / r[i][i];
    }

    Some(x)
}

/// Solve the least-squares problem `min ||J x - y||` via one-sided Jacobi SVD.
///
/// Robust to rank deficiency: singular values below `eps * sigma_max` are
/// treated as zero (minimum-norm solution on the remaining subspace).
#[allow(clippy::needless_range_loop)]
pub fn svd_least_squares<F: Float>(j: &[Vec<F>], y: &[F]) -> Option<Vec<F>> {
    let m = j.len();
    let n = if m == 0 { return None } else { j[0].len() };

    // Work columnwise: b[k] is the k-th column of J, rotated in place.
    let mut b: Vec<Vec<F>> = (0..n).map(|k| (0..m).map(|i| j[i][k]).collect()).collect();
    let mut v = identity::<F>(n);

    let tol = F::from(1e-12).unwrap_or_else(F::epsilon);
    let max_sweeps = 60;

    for _ in 0..max_sweeps {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let app = dot(&b[p], &b[p]);
                let aqq = dot(&b[q], &b[q]);
                let apq = dot(&b[p], &b[q]);
                if apq.abs() <= tol * (app * aqq).sqrt() {
                    continue;
                }
                rotated = true;

                // Jacobi rotation that orthogonalizes columns p and q
                let two = F::one() + F::one();
                let tau = (aqq - app) / (two * apq);
                let t = if tau >= F::zero() {
                    F::one() / (tau + (F::one() + tau * tau).sqrt())
                } else {
                    -F::one() / (-tau + (F::one() + tau * tau).sqrt())
                };
                let c = F::one() / (F::one() + t * t).sqrt();
                let s = c * t;
                for i in 0..m {
                    let bp = b[p][i];
                    let bq = b[q][i];
                    b[p][i] = c * bp - s * bq;
                    b[q][i] = s * bp + c * bq;
                }
                for i in 0..n {
                    let vp = v[i][p];
                    let vq = v[i][q];
                    v[i][p] = c * vp - s * vq;
                    v[i][q] = s * vp + c * vq;
                }
            }
        }
        if !rotated {
            break;
        }
    }

    let sigmas: Vec<F> = b.iter().map(|col| norm(col)).collect();
    let sigma_max = sigmas.iter().fold(F::zero(), |acc, &s| acc.max(s));
    if sigma_max == F::zero() {
        return Some(vec![F::zero(); n]);
    }
    let cutoff = sigma_max * F::from(1e-10).unwrap_or_else(F::epsilon);

    // x = sum over kept singular triplets of v_k * (u_k . y) / sigma_k
    let mut x = vec![F::zero(); n];
    for k in 0..n {
        if sigmas[k] <= cutoff {
            continue;
        }
        let uy = dot(&b[k], y) / sigmas[k];
        let coeff = uy / sigmas[k];
        for i in 0..n {
            x[i] = x[i] + v[i][k] * coeff;
        }
    }

    Some(x)
}

/// Solve the symmetric positive-definite system `A * x = b` with conjugate
/// gradients, starting from the origin.
pub fn conjugate_gradient<F: Float>(a: &[Vec<F>], b: &[F], tol: F, max_iter: usize) -> Vec<F> {
    let n = b.len();
    let mut x = vec![F::zero(); n];
    let mut r = b.to_vec();
    let mut p = r.clone();
    let mut rr = dot(&r, &r);

    for _ in 0..max_iter {
        if rr.sqrt() <= tol {
            break;
        }
        let ap = matvec(a, &p);
        let pap = dot(&p, &ap);
        if pap <= F::zero() {
            break; // Negative curvature: A not positive definite
        }
        let alpha = rr / pap;
        for i in 0..n {
            x[i] = x[i] + alpha * p[i];
            r[i] = r[i] - alpha * ap[i];
        }
        let rr_new = dot(&r, &r);
        let beta = rr_new / rr;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
        rr = rr_new;
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lu_solve_2x2() {
        // [2 1] [x0]   [5]
        // [1 3] [x1] = [7]
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![5.0, 7.0];
        let x = lu_solve(&a, &b).unwrap();
        assert!((x[0] - 1.6).abs() < 1e-12);
        assert!((x[1] - 1.8).abs() < 1e-12);
    }

    #[test]
    fn lu_solve_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let b = vec![3.0, 6.0];
        assert!(lu_solve(&a, &b).is_none());
    }

    #[test]
    fn lu_solve_needs_pivoting() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let b = vec![3.0, 7.0];
        let x = lu_solve(&a, &b).unwrap();
        assert!((x[0] - 7.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn cholesky_spd() {
        let a = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        // L * L^T must reproduce A
        assert!((l[0][0] * l[0][0] - 4.0f64).abs() < 1e-12);
        assert!((l[1][0] * l[0][0] - 2.0).abs() < 1e-12);
        assert!((l[1][0] * l[1][0] + l[1][1] * l[1][1] - 3.0).abs() < 1e-12);

        let x = cholesky_solve(&l, &[10.0, 8.0]);
        // Check A * x = b
        let ax = matvec(&a, &x);
        assert!((ax[0] - 10.0).abs() < 1e-10);
        assert!((ax[1] - 8.0).abs() < 1e-10);
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(cholesky(&a).is_none());
    }

    #[test]
    fn qr_least_squares_overdetermined() {
        // Fit a line through (0,1), (1,3), (2,5): exact fit y = 1 + 2t
        let j = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]];
        let y = vec![1.0, 3.0, 5.0];
        let x = qr_least_squares(&j, &y).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10, "intercept = {}", x[0]);
        assert!((x[1] - 2.0).abs() < 1e-10, "slope = {}", x[1]);
    }

    #[test]
    fn qr_rank_deficient_returns_none() {
        let j = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        let y = vec![1.0, 2.0, 3.0];
        assert!(qr_least_squares(&j, &y).is_none());
    }

    #[test]
    fn svd_matches_qr_on_full_rank() {
        let j = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]];
        let y = vec![1.0, 3.0, 5.0];
        let x_qr = qr_least_squares(&j, &y).unwrap();
        let x_svd = svd_least_squares(&j, &y).unwrap();
        for i in 0..2 {
            assert!(
                (x_qr[i] - x_svd[i]).abs() < 1e-8,
                "component {}: qr={}, svd={}",
                i,
                x_qr[i],
                x_svd[i]
            );
        }
    }

    #[test]
    fn cg_solves_spd_system() {
        let a = vec![vec![4.0, 1.0], vec![1.0, 3.0]];
        let b = vec![1.0, 2.0];
        let x = conjugate_gradient(&a, &b, 1e-12, 100);
        let ax = matvec(&a, &x);
        assert!((ax[0] - 1.0).abs() < 1e-8);
        assert!((ax[1] - 2.0).abs() < 1e-8);
    }

    #[test]
    fn norms() {
        let v = vec![3.0, -4.0];
        assert!((norm(&v) - 5.0f64).abs() < 1e-12);
        assert!((max_norm(&v) - 4.0f64).abs() < 1e-12);
        assert!((distance(&[1.0, 1.0], &[4.0, 5.0]) - 5.0f64).abs() < 1e-12);
    }
}
