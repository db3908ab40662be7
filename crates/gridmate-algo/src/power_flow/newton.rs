//! Newton-Raphson power flow in polar coordinates.
//!
//! Unknowns are the angles of all non-slack nodes followed by the voltage
//! magnitudes of PQ nodes. The Jacobian is dense and factored with faer's
//! partial-pivoting LU on every iteration.

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use gridmate_core::{GridError, GridResult};
use num_complex::Complex64;
use tracing::{debug, trace};

use super::model::{NetworkModel, NodeKind};
use super::Solution;

/// Dense admittance matrix split into conductance and susceptance.
struct Admittance {
    n: usize,
    g: Vec<f64>,
    b: Vec<f64>,
}

impl Admittance {
    fn new(y_bus: &[Complex64], n: usize) -> Self {
        Self {
            n,
            g: y_bus.iter().map(|y| y.re).collect(),
            b: y_bus.iter().map(|y| y.im).collect(),
        }
    }

    fn at(&self, i: usize, j: usize) -> (f64, f64) {
        (self.g[i * self.n + j], self.b[i * self.n + j])
    }
}

pub fn solve(model: &NetworkModel, max_iteration: usize, tolerance_mva: f64) -> GridResult<Solution> {
    let n = model.len();
    let y_bus = model.y_bus();
    let y = Admittance::new(&y_bus, n);

    let mut v_mag = model.v_set.clone();
    let mut v_ang = model.theta_init.clone();

    let p_nodes: Vec<usize> = (0..n).filter(|&i| model.kind[i] != NodeKind::Slack).collect();
    let q_nodes: Vec<usize> = (0..n).filter(|&i| model.kind[i] == NodeKind::Pq).collect();
    let n_p = p_nodes.len();
    let n_vars = n_p + q_nodes.len();

    let p_spec: Vec<f64> = model.s_spec.iter().map(|s| s.re).collect();
    let q_spec: Vec<f64> = model.s_spec.iter().map(|s| s.im).collect();

    let mut iterations = 0;
    loop {
        let (p_calc, q_calc) = compute_power(&y, &v_mag, &v_ang);

        let mut mismatch = vec![0.0; n_vars];
        let mut max_mismatch: f64 = 0.0;
        for (k, &i) in p_nodes.iter().enumerate() {
            mismatch[k] = p_spec[i] - p_calc[i];
            max_mismatch = max_mismatch.max(mismatch[k].abs());
        }
        for (k, &i) in q_nodes.iter().enumerate() {
            mismatch[n_p + k] = q_spec[i] - q_calc[i];
            max_mismatch = max_mismatch.max(mismatch[n_p + k].abs());
        }
        let max_mismatch_mva = max_mismatch * model.sn_mva;
        trace!(iteration = iterations, max_mismatch_mva, "newton-raphson step");

        if !max_mismatch_mva.is_finite() {
            return Err(GridError::solver("newton-raphson diverged (non-finite mismatch)"));
        }
        if max_mismatch_mva < tolerance_mva {
            debug!(iterations, max_mismatch_mva, "newton-raphson converged");
            return Ok(Solution::new(&v_mag, &v_ang, true, iterations, max_mismatch_mva));
        }
        if iterations >= max_iteration {
            debug!(iterations, max_mismatch_mva, "newton-raphson hit the iteration limit");
            return Ok(Solution::new(&v_mag, &v_ang, false, iterations, max_mismatch_mva));
        }

        let jacobian = build_jacobian(&y, &v_mag, &v_ang, &p_calc, &q_calc, &p_nodes, &q_nodes);
        let delta = solve_linear_system(&jacobian, &mismatch)?;

        for (k, &i) in p_nodes.iter().enumerate() {
            v_ang[i] += delta[k];
        }
        for (k, &i) in q_nodes.iter().enumerate() {
            v_mag[i] += delta[n_p + k];
        }
        iterations += 1;
    }
}

/// P and Q injections for the current voltage state.
fn compute_power(y: &Admittance, v_mag: &[f64], v_ang: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = v_mag.len();
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            let (g_ij, b_ij) = y.at(i, j);
            if g_ij == 0.0 && b_ij == 0.0 {
                continue;
            }
            let theta_ij = v_ang[i] - v_ang[j];
            let (sin, cos) = theta_ij.sin_cos();
            p[i] += v_mag[i] * v_mag[j] * (g_ij * cos + b_ij * sin);
            q[i] += v_mag[i] * v_mag[j] * (g_ij * sin - b_ij * cos);
        }
    }
    (p, q)
}

/// Row-major dense Jacobian `[dP/dθ dP/dV; dQ/dθ dQ/dV]`.
fn build_jacobian(
    y: &Admittance,
    v_mag: &[f64],
    v_ang: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
    p_nodes: &[usize],
    q_nodes: &[usize],
) -> Mat<f64> {
    let n_p = p_nodes.len();
    let n_vars = n_p + q_nodes.len();
    let mut jac = Mat::<f64>::zeros(n_vars, n_vars);

    let partials = |i: usize, j: usize| -> [f64; 4] {
        let (g_ij, b_ij) = y.at(i, j);
        if i == j {
            let v = v_mag[i];
            [
                -q_calc[i] - b_ij * v * v,
                p_calc[i] / v + g_ij * v,
                p_calc[i] - g_ij * v * v,
                q_calc[i] / v - b_ij * v,
            ]
        } else {
            let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
            let k1 = g_ij * sin - b_ij * cos;
            let k2 = g_ij * cos + b_ij * sin;
            [
                v_mag[i] * v_mag[j] * k1,
                v_mag[i] * k2,
                -v_mag[i] * v_mag[j] * k2,
                v_mag[i] * k1,
            ]
        }
    };

    for (row, &i) in p_nodes.iter().enumerate() {
        for (col, &j) in p_nodes.iter().enumerate() {
            jac.write(row, col, partials(i, j)[0]);
        }
        for (col, &j) in q_nodes.iter().enumerate() {
            jac.write(row, n_p + col, partials(i, j)[1]);
        }
    }
    for (row, &i) in q_nodes.iter().enumerate() {
        for (col, &j) in p_nodes.iter().enumerate() {
            jac.write(n_p + row, col, partials(i, j)[2]);
        }
        for (col, &j) in q_nodes.iter().enumerate() {
            jac.write(n_p + row, n_p + col, partials(i, j)[3]);
        }
    }
    jac
}

/// Solves `A x = b` with faer's partial-pivoting LU.
fn solve_linear_system(a: &Mat<f64>, b: &[f64]) -> GridResult<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut rhs = Mat::<f64>::zeros(n, 1);
    for (i, &value) in b.iter().enumerate() {
        rhs.write(i, 0, value);
    }
    let lu = a.partial_piv_lu();
    let solution = lu.solve(&rhs);
    let x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();

    // A singular Jacobian shows up as NaN/Inf in the solution
    if x.iter().any(|v| !v.is_finite()) {
        return Err(GridError::solver("singular jacobian matrix"));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_solve_matches_known_solution() {
        let mut a = Mat::<f64>::zeros(3, 3);
        let rows = [[4.0, -2.0, 1.0], [-2.0, 4.0, -2.0], [1.0, -2.0, 4.0]];
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                a.write(i, j, v);
            }
        }
        let x = solve_linear_system(&a, &[11.0, -16.0, 17.0]).unwrap();
        for (got, want) in x.iter().zip([1.0, -2.0, 3.0]) {
            assert!((got - want).abs() < 1e-10, "{got} vs {want}");
        }
    }

    #[test]
    fn test_singular_matrix_is_solver_error() {
        let mut a = Mat::<f64>::zeros(2, 2);
        a.write(0, 0, 1.0);
        a.write(0, 1, 2.0);
        a.write(1, 0, 2.0);
        a.write(1, 1, 4.0);
        let err = solve_linear_system(&a, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, GridError::Solver(_)));
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        // Two nodes joined by one branch, slack at node 0
        let y_series = Complex64::new(2.0, -8.0);
        let y_bus = vec![y_series, -y_series, -y_series, y_series];
        let y = Admittance::new(&y_bus, 2);
        let v_mag = [1.0, 0.97];
        let v_ang = [0.0, -0.05];
        let (p, q) = compute_power(&y, &v_mag, &v_ang);
        let jac = build_jacobian(&y, &v_mag, &v_ang, &p, &q, &[1], &[1]);

        let h = 1e-7;
        let (p_t, q_t) = compute_power(&y, &v_mag, &[0.0, -0.05 + h]);
        let (p_v, q_v) = compute_power(&y, &[1.0, 0.97 + h], &v_ang);
        let numeric = [
            (p_t[1] - p[1]) / h,
            (p_v[1] - p[1]) / h,
            (q_t[1] - q[1]) / h,
            (q_v[1] - q[1]) / h,
        ];
        let analytic = [jac.read(0, 0), jac.read(0, 1), jac.read(1, 0), jac.read(1, 1)];
        for (a, n) in analytic.iter().zip(numeric) {
            assert!((a - n).abs() < 1e-4, "{a} vs {n}");
        }
    }
}
