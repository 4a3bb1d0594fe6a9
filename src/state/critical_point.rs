use super::properties::ideal_gas_helmholtz_energy;
use super::{State, StateHD};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::SolverOptions;
use ndarray::{arr1, arr2, Array1, Array2};
use num_dual::linalg::{norm, smallest_ev, LU};
use num_dual::{Dual3, Dual64, DualNum, HyperDual};
use num_traits::{One, Zero};
use std::sync::Arc;

const MAX_ITER_CRIT_POINT: usize = 50;
const TOL_CRIT_POINT: f64 = 1e-8;

/// # Critical points
impl<E: Residual> State<E> {
    /// Calculate the pure component critical point of all components.
    pub fn critical_point_pure(
        eos: &Arc<E>,
        initial_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Vec<Self>> {
        (0..eos.components())
            .map(|i| {
                Self::critical_point(
                    &Arc::new(eos.subset(&[i])),
                    None,
                    initial_temperature,
                    options,
                )
            })
            .collect()
    }

    /// Calculate the critical point of a system for given moles.
    pub fn critical_point(
        eos: &Arc<E>,
        moles: Option<&Array1<f64>>,
        initial_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let moles = eos.validate_moles(moles)?;
        let trial_temperatures = [300.0, 700.0, 500.0];
        if let Some(t) = initial_temperature {
            return Self::critical_point_hkm(eos, &moles, t, options);
        }
        for &t in trial_temperatures.iter() {
            let s = Self::critical_point_hkm(eos, &moles, t, options);
            if s.is_ok() {
                return s;
            }
        }
        Err(EosError::not_converged("Critical point"))
    }

    fn critical_point_hkm(
        eos: &Arc<E>,
        moles: &Array1<f64>,
        initial_temperature: f64,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_CRIT_POINT, TOL_CRIT_POINT);

        let mut t = initial_temperature;
        let max_density = eos.max_density(Some(moles))?;
        let mut rho = 0.3 * max_density;

        log_iter!(
            verbosity,
            " iter |    residual    |   temperature   |       density        "
        );
        log_iter!(verbosity, "{:-<64}", "");
        log_iter!(verbosity, " {:4} |                | {:13.8} | {:12.8}", 0, t, rho);

        let mut res_norm = f64::INFINITY;
        for i in 1..=max_iter {
            // calculate residuals and derivatives w.r.t. temperature and density
            let res_t = critical_point_objective(
                eos,
                Dual64::from(t).derivative(),
                Dual64::from(rho),
                moles,
            )?;
            let res_r = critical_point_objective(
                eos,
                Dual64::from(t),
                Dual64::from(rho).derivative(),
                moles,
            )?;
            let res = res_t.mapv(|r| r.re);
            res_norm = norm(&res);

            // calculate Newton step
            let h = arr2(&[
                [res_t[0].eps, res_r[0].eps],
                [res_t[1].eps, res_r[1].eps],
            ]);
            let mut delta = LU::new(h)?.solve(&res);

            // reduce step if necessary
            if delta[0].abs() > 0.25 * t {
                delta *= 0.25 * t / delta[0].abs()
            }
            if delta[1].abs() > 0.03 * max_density {
                delta *= 0.03 * max_density / delta[1].abs()
            }

            // apply step
            t -= delta[0];
            rho -= delta[1];
            rho = f64::max(rho, 1e-4 * max_density);

            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:13.8} | {:12.8}",
                i,
                res_norm,
                t,
                rho
            );

            // check convergence
            if res_norm < tol {
                log_result!(
                    verbosity,
                    "Critical point calculation converged in {} step(s)\n",
                    i
                );
                return State::new_nvt(eos, t, moles.sum() / rho, moles);
            }
        }
        Err(EosError::not_converged_res("Critical point", res_norm))
    }
}

fn critical_point_objective<E: Residual>(
    eos: &Arc<E>,
    temperature: Dual64,
    density: Dual64,
    moles: &Array1<f64>,
) -> EosResult<Array1<Dual64>> {
    // calculate second partial derivatives w.r.t. moles
    let t = HyperDual::from_re(temperature);
    let v = HyperDual::from_re(density.recip() * moles.sum());
    let qij = Array2::from_shape_fn((eos.components(), eos.components()), |(i, j)| {
        let mut m = moles.mapv(HyperDual::from);
        m[i].eps1 = Dual64::one();
        m[j].eps2 = Dual64::one();
        let state = StateHD::new(t, v, m);
        (eos.residual_helmholtz_energy(&state) + ideal_gas_helmholtz_energy(&state)).eps1eps2
            * (moles[i] * moles[j]).sqrt()
    });

    // calculate smallest eigenvalue and corresponding eigenvector of q
    let (eval, evec) = smallest_ev(qij);

    // evaluate third partial derivative w.r.t. s
    let moles_hd = Array1::from_shape_fn(eos.components(), |i| {
        Dual3::new(
            Dual64::from(moles[i]),
            evec[i] * moles[i].sqrt(),
            Dual64::zero(),
            Dual64::zero(),
        )
    });
    let state_s = StateHD::new(
        Dual3::from_re(temperature),
        Dual3::from_re(density.recip() * moles.sum()),
        moles_hd,
    );
    let res =
        eos.residual_helmholtz_energy(&state_s) + ideal_gas_helmholtz_energy(&state_s);
    Ok(arr1(&[eval, res.v3]))
}
