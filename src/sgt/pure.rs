use super::{InfluenceParameters, SurfaceTensionProfile};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::phase_equilibria::PhaseEquilibrium;
use crate::state::{Contributions, State};
use ndarray::{Array1, Array2};

/// Surface tension of a pure fluid from square gradient theory.
///
/// For a single component the boundary value problem has a first integral
/// and the tension reduces to the quadrature
/// $\gamma=\int_{\rho_v}^{\rho_l}\sqrt{2c(T)\Delta\omega(\rho)}\,\mathrm{d}\rho$
/// with the excess grand potential density
/// $\Delta\omega=a_0(\rho)-\rho\mu^\mathrm{eq}+p^\mathrm{eq}$. No boundary
/// value problem is solved.
pub fn surface_tension_pure<E: Residual>(
    vle: &PhaseEquilibrium<E>,
    influence: &InfluenceParameters,
    n_grid: usize,
) -> EosResult<SurfaceTensionProfile> {
    let eos = &vle.vapor().eos;
    if eos.components() != 1 {
        return Err(EosError::IncompatibleComponents(eos.components(), 1));
    }
    if n_grid < 4 {
        return Err(EosError::Error(
            "surface tension quadrature requires at least 4 grid points".into(),
        ));
    }
    let t = vle.vapor().temperature;
    let c = influence.component(0, t);

    // density grid strictly between the bulk densities
    let rho_v = vle.vapor().density;
    let rho_l = vle.liquid().density;
    let delta_rho = (rho_l - rho_v) / (n_grid + 1) as f64;
    let rho = Array1::linspace(rho_v + delta_rho, rho_l - delta_rho, n_grid);

    // excess grand potential density, non-negative between coexisting bulks
    let mu = vle.liquid().chemical_potential(Contributions::Total)[0];
    let p = vle.vapor().pressure(Contributions::Total);
    let mut delta_omega = Array1::zeros(n_grid);
    for (k, &r) in rho.iter().enumerate() {
        let state = State::new_pure(eos, t, r)?;
        let a0 = state.helmholtz_energy(Contributions::Total) / state.volume;
        delta_omega[k] = (a0 - r * mu + p).max(0.0);
    }
    let gamma_int = delta_omega.mapv(|w| (2.0 * c * w).sqrt());

    // z-profile by cumulative integration of dz/drho; points where the
    // excess grand potential vanishes (possible at loose equilibrium
    // tolerances) carry no slope information and are skipped
    let z_int = Array1::from_shape_fn(n_grid, |k| {
        if delta_omega[k] > 0.0 {
            gamma_int[k] / (2.0 * delta_omega[k])
        } else {
            0.0
        }
    });
    let mut z = Array1::zeros(n_grid);
    for k in 1..n_grid {
        z[k] = z[k - 1] + 0.5 * (z_int[k - 1] + z_int[k]) * delta_rho;
    }

    // equimolar surface and interfacial width
    let rho_r = (&rho - rho[0]) / (rho[n_grid - 1] - rho[0]);
    let ze = trapezoid(&(&rho_r * &z_int), delta_rho);
    let width = trapezoid(&(&rho_r * &z * &z_int), delta_rho);
    let width = (24.0 * (width - 0.5 * ze.powi(2))).max(0.0).sqrt();
    z -= ze;

    // end-corrected trapezoid weights
    let mut weights = Array1::ones(n_grid);
    weights[0] = 7.0 / 6.0;
    weights[1] = 23.0 / 24.0;
    weights[n_grid - 2] = 23.0 / 24.0;
    weights[n_grid - 1] = 7.0 / 6.0;
    let surface_tension = gamma_int.dot(&weights) * delta_rho;

    let mut density = Array2::zeros((1, n_grid));
    density.row_mut(0).assign(&rho);
    Ok(SurfaceTensionProfile {
        z,
        density,
        surface_tension,
        interfacial_width: width,
        iterations: 0,
    })
}

fn trapezoid(f: &Array1<f64>, dx: f64) -> f64 {
    (f.sum() - 0.5 * (f[0] + f[f.len() - 1])) * dx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_is_exact_for_linear_functions() {
        let dx = 0.25;
        let f = Array1::from_shape_fn(5, |i| 2.0 + 3.0 * i as f64 * dx);
        // integral of 2 + 3x from 0 to 1
        assert!((trapezoid(&f, dx) - 3.5).abs() < 1e-14);
    }
}
