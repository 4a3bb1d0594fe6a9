use super::{InfluenceParameters, SurfaceTensionProfile};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::phase_equilibria::PhaseEquilibrium;
use crate::state::{Contributions, State};
use crate::{SolverOptions, Verbosity};
use ndarray::{Array1, Array2, Axis};
use num_dual::linalg::{norm, LU};
use std::f64::consts::PI;

const MAX_ITER_SGT: usize = 50;
const TOL_SGT: f64 = 1e-8;
const DEFAULT_LENGTH: f64 = 20.0;
const LENGTH_FACTOR: f64 = 1.5;
const MAX_LENGTH_STEPS: usize = 10;
const END_SLOPE_TOL: f64 = 1e-3;

/// Gauss-Lobatto collocation grid on $[0,1]$ with barycentric
/// differentiation matrices.
struct ColocGrid {
    nodes: Array1<f64>,
    weights: Array1<f64>,
    d1: Array2<f64>,
    d2: Array2<f64>,
}

impl ColocGrid {
    fn new(n: usize) -> Self {
        let (nodes, weights) = lobatto_nodes(n);
        let d1 = differentiation_matrix(&nodes);
        let d2 = d1.dot(&d1);
        Self {
            nodes,
            weights,
            d1,
            d2,
        }
    }
}

/// Gauss-Lobatto-Legendre nodes and quadrature weights on $[0,1]$.
///
/// The interior nodes are the roots of $P'_{n-1}$, found by Newton
/// iteration on the Legendre recurrence from a Chebyshev initial guess.
fn lobatto_nodes(n: usize) -> (Array1<f64>, Array1<f64>) {
    let m = (n - 1) as f64;
    let mut x = Array1::from_shape_fn(n, |k| (PI * k as f64 / m).cos());
    let mut p_last = Array1::zeros(n);
    for _ in 0..100 {
        let mut dx_max: f64 = 0.0;
        for i in 0..n {
            let xi = x[i];
            let mut p0 = 1.0;
            let mut p1 = xi;
            for k in 2..n {
                let k = k as f64;
                let pk = ((2.0 * k - 1.0) * xi * p1 - (k - 1.0) * p0) / k;
                p0 = p1;
                p1 = pk;
            }
            let dx = (xi * p1 - p0) / (n as f64 * p1);
            x[i] = xi - dx;
            p_last[i] = p1;
            dx_max = dx_max.max(dx.abs());
        }
        if dx_max < f64::EPSILON {
            break;
        }
    }
    // endpoints are exact, map from descending [-1,1] to ascending [0,1]
    let nodes = x.mapv(|x| 0.5 * (1.0 - x));
    let weights = p_last.mapv(|p| 1.0 / (m * (m + 1.0) * p * p));
    (nodes, weights)
}

/// Barycentric first-derivative matrix for the given nodes.
fn differentiation_matrix(nodes: &Array1<f64>) -> Array2<f64> {
    let n = nodes.len();
    let mut lambda = Array1::<f64>::ones(n);
    for i in 0..n {
        for j in 0..n {
            if i != j {
                lambda[i] /= nodes[i] - nodes[j];
            }
        }
    }
    let lambda_max = lambda.fold(0.0f64, |acc, &l| acc.max(l.abs()));
    lambda /= lambda_max;

    let mut d = Array2::zeros((n, n));
    for i in 0..n {
        let mut row_sum = 0.0;
        for j in 0..n {
            if i != j {
                d[[i, j]] = lambda[j] / lambda[i] / (nodes[i] - nodes[j]);
                row_sum += d[[i, j]];
            }
        }
        d[[i, i]] = -row_sum;
    }
    d
}

/// Orthogonal collocation solver for the square gradient boundary value
/// problem of mixtures.
///
/// The density profiles solve
/// $\sum_jc_{ij}\rho_j''(z)=\mu_i(\rho(z))-\mu_i^\mathrm{eq}$ on $[0,L]$
/// with the coexisting bulk densities as Dirichlet boundary conditions.
/// The grid, the differentiation matrices and the influence matrix are kept
/// in the solver and reused between solves; the influence matrix is only
/// rebuilt when the temperature changes.
pub struct SgtSolver {
    grid: ColocGrid,
    c: Array2<f64>,
    temperature: f64,
}

impl SgtSolver {
    pub fn new(components: usize, n_grid: usize) -> Self {
        Self {
            grid: ColocGrid::new(n_grid.max(5)),
            c: Array2::zeros((components, components)),
            temperature: f64::NAN,
        }
    }

    /// Solve the boundary value problem and evaluate the surface tension.
    ///
    /// An optional initial profile (e.g. from a previous solve at a nearby
    /// state) replaces the linear interpolation between the bulk densities.
    pub fn solve<E: Residual>(
        &mut self,
        vle: &PhaseEquilibrium<E>,
        influence: &InfluenceParameters,
        initial: Option<&SurfaceTensionProfile>,
        options: SolverOptions,
    ) -> EosResult<SurfaceTensionProfile> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_SGT, TOL_SGT);
        let eos = &vle.vapor().eos;
        let nc = eos.components();
        let n = self.grid.nodes.len();
        let t = vle.vapor().temperature;

        if t != self.temperature {
            influence.matrix_into(t, &mut self.c);
            self.temperature = t;
        }

        // liquid bulk at z = 0, vapor bulk at z = L
        let rho_l = &vle.liquid().partial_density;
        let rho_v = &vle.vapor().partial_density;
        let mu_eq = vle.liquid().chemical_potential(Contributions::Total);

        let (mut rho, mut length) = match initial {
            Some(profile) => {
                if profile.density.shape() != [nc, n] {
                    return Err(EosError::Error(
                        "initial profile does not match the collocation grid".into(),
                    ));
                }
                (
                    profile.density.clone(),
                    profile.z[n - 1] - profile.z[0],
                )
            }
            None => {
                let rho = Array2::from_shape_fn((nc, n), |(i, k)| {
                    rho_l[i] + (rho_v[i] - rho_l[i]) * self.grid.nodes[k]
                });
                (rho, DEFAULT_LENGTH)
            }
        };

        log_iter!(verbosity, " iter |    residual    |  domain length");
        log_iter!(verbosity, "{:-<39}", "");

        let mut iterations = 0;
        let mut slope = f64::INFINITY;
        for _ in 0..MAX_LENGTH_STEPS {
            self.newton(
                eos, t, &mut rho, &mu_eq, length, max_iter, tol, verbosity, &mut iterations,
            )?;

            // expand the domain until the profile is flat at both ends
            slope = self.end_slope(&rho);
            if slope < END_SLOPE_TOL {
                break;
            }
            length *= LENGTH_FACTOR;
            log_iter!(verbosity, "       |                | {:15.8}", length);
        }
        if slope >= END_SLOPE_TOL {
            return Err(EosError::not_converged_res("SGT domain size", slope));
        }
        log_result!(
            verbosity,
            "SGT collocation: calculation converged in {} step(s)\n",
            iterations
        );

        // surface tension from the Lobatto quadrature
        let drho = rho.dot(&self.grid.d1.t());
        let mut surface_tension = 0.0;
        for k in 0..n {
            let mut s = 0.0;
            for i in 0..nc {
                for j in 0..nc {
                    s += self.c[[i, j]] * drho[[i, k]] * drho[[j, k]];
                }
            }
            surface_tension += self.grid.weights[k] * s;
        }
        surface_tension /= length;

        // equimolar surface and interfacial width from the total density
        let z = self.grid.nodes.mapv(|s| s * length);
        let rho_t = rho.sum_axis(Axis(0));
        let rho_r = (&rho_t - rho_t[0]) / (rho_t[n - 1] - rho_t[0]);
        let ze = trapezoid_nonuniform(&rho_r, &z);
        let width = trapezoid_nonuniform(&(&rho_r * &z), &z);
        let width = (24.0 * (width - 0.5 * ze.powi(2))).max(0.0).sqrt();

        Ok(SurfaceTensionProfile {
            z: z - ze,
            density: rho,
            surface_tension,
            interfacial_width: width,
            iterations,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn newton<E: Residual>(
        &self,
        eos: &std::sync::Arc<E>,
        temperature: f64,
        rho: &mut Array2<f64>,
        mu_eq: &Array1<f64>,
        length: f64,
        max_iter: usize,
        tol: f64,
        verbosity: Verbosity,
        iterations: &mut usize,
    ) -> EosResult<()> {
        let nc = rho.shape()[0];
        let n = rho.shape()[1];
        let dof = (n - 2) * nc;
        let mut res = f64::INFINITY;

        for _ in 0..max_iter {
            let mut jacobian = Array2::zeros((dof, dof));
            let f = self.residual(eos, temperature, rho, mu_eq, length, Some(&mut jacobian))?;
            res = norm(&f);
            log_iter!(verbosity, " {:4} | {:14.8e} | {:15.8}", iterations, res, length);
            if res < tol {
                return Ok(());
            }
            *iterations += 1;

            let lu = match LU::new(jacobian) {
                Ok(lu) => lu,
                Err(_) => return Err(EosError::not_converged_res("SGT collocation", res)),
            };
            let dx = lu.solve(&f);

            // damp the step to keep all densities positive
            let mut alpha = 1.0;
            for _ in 0..60 {
                let positive = (1..n - 1).all(|k| {
                    (0..nc).all(|i| rho[[i, k]] - alpha * dx[(k - 1) * nc + i] > 0.0)
                });
                if positive {
                    break;
                }
                alpha *= 0.5;
            }

            // halve the step while the residual grows
            let rho_old = rho.clone();
            for _ in 0..5 {
                for k in 1..n - 1 {
                    for i in 0..nc {
                        rho[[i, k]] = rho_old[[i, k]] - alpha * dx[(k - 1) * nc + i];
                    }
                }
                let f_new = self.residual(eos, temperature, rho, mu_eq, length, None)?;
                if norm(&f_new) < res || alpha < 0.1 {
                    break;
                }
                alpha *= 0.5;
            }
        }
        Err(EosError::not_converged_res("SGT collocation", res))
    }

    /// Residual of the discretized boundary value problem at the interior
    /// nodes and, optionally, its dense Jacobian.
    fn residual<E: Residual>(
        &self,
        eos: &std::sync::Arc<E>,
        temperature: f64,
        rho: &Array2<f64>,
        mu_eq: &Array1<f64>,
        length: f64,
        jacobian: Option<&mut Array2<f64>>,
    ) -> EosResult<Array1<f64>> {
        let nc = rho.shape()[0];
        let n = rho.shape()[1];
        let l2 = length * length;

        // curvature term: sum_j c_ij rho_j''
        let rho_dd = rho.dot(&self.grid.d2.t());
        let curvature = self.c.dot(&rho_dd);

        let mut f = Array1::zeros((n - 2) * nc);
        let mut jacobian = jacobian;
        for k in 1..n - 1 {
            let state = State::new_nvt(eos, temperature, 1.0, &rho.column(k).to_owned())?;
            let mu = state.chemical_potential(Contributions::Total);
            for i in 0..nc {
                f[(k - 1) * nc + i] = curvature[[i, k]] / l2 - (mu[i] - mu_eq[i]);
            }
            if let Some(jacobian) = jacobian.as_deref_mut() {
                let dmu = state.dmu_drho();
                for i in 0..nc {
                    let row = (k - 1) * nc + i;
                    for m in 1..n - 1 {
                        for j in 0..nc {
                            jacobian[[row, (m - 1) * nc + j]] =
                                self.grid.d2[[k, m]] * self.c[[i, j]] / l2;
                        }
                    }
                    for j in 0..nc {
                        jacobian[[row, (k - 1) * nc + j]] -= dmu[[i, j]];
                    }
                }
            }
        }
        Ok(f)
    }

    /// Largest density slope at the domain boundaries relative to the total
    /// density difference across the interface.
    fn end_slope(&self, rho: &Array2<f64>) -> f64 {
        let nc = rho.shape()[0];
        let n = rho.shape()[1];
        let mut res: f64 = 0.0;
        for i in 0..nc {
            let scale = (rho[[i, n - 1]] - rho[[i, 0]]).abs().max(f64::EPSILON);
            for end in [0, n - 1] {
                let slope: f64 = (0..n).map(|m| self.grid.d1[[end, m]] * rho[[i, m]]).sum();
                res = res.max(slope.abs() / scale);
            }
        }
        res
    }
}

fn trapezoid_nonuniform(f: &Array1<f64>, z: &Array1<f64>) -> f64 {
    (1..f.len())
        .map(|k| 0.5 * (f[k] + f[k - 1]) * (z[k] - z[k - 1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lobatto_weights_sum_to_one() {
        for n in [5, 8, 16] {
            let (nodes, weights) = lobatto_nodes(n);
            assert_relative_eq!(weights.sum(), 1.0, max_relative = 1e-12);
            assert_relative_eq!(nodes[0], 0.0, epsilon = 1e-14);
            assert_relative_eq!(nodes[n - 1], 1.0, epsilon = 1e-14);
            assert!(nodes.windows(2).into_iter().all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn lobatto_quadrature_is_exact_for_polynomials() {
        // n-point Gauss-Lobatto integrates degree 2n-3 exactly
        let (nodes, weights) = lobatto_nodes(6);
        let integral: f64 = nodes
            .iter()
            .zip(weights.iter())
            .map(|(&s, &w)| w * s.powi(9))
            .sum();
        assert_relative_eq!(integral, 0.1, max_relative = 1e-12);
    }

    #[test]
    fn differentiation_matrix_is_exact_for_polynomials() {
        let (nodes, _) = lobatto_nodes(8);
        let d = differentiation_matrix(&nodes);
        let f = nodes.mapv(|s| s.powi(4) - 2.0 * s.powi(2) + s);
        let df = d.dot(&f);
        let d2f = d.dot(&df);
        for (k, &s) in nodes.iter().enumerate() {
            assert_relative_eq!(
                df[k],
                4.0 * s.powi(3) - 4.0 * s + 1.0,
                epsilon = 1e-9
            );
            assert_relative_eq!(d2f[k], 12.0 * s.powi(2) - 4.0, epsilon = 1e-7);
        }
    }
}
