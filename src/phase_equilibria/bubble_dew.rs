use super::{PhaseEquilibrium, TPSpec};
use crate::density_iteration::pressure_spinodal;
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{
    Contributions,
    DensityInitialization::{InitialDensity, Liquid, Vapor},
    State,
};
use crate::{SolverOptions, Verbosity};
use ndarray::*;
use num_dual::linalg::{norm, LU};
use std::sync::Arc;

const MAX_ITER_INNER: usize = 5;
const TOL_INNER: f64 = 1e-9;
const MAX_ITER_OUTER: usize = 400;
const TOL_OUTER: f64 = 1e-10;

const MAX_TSTEP: f64 = 20.0;
const MAX_LNPSTEP: f64 = 0.1;
const NEWTON_TOL: f64 = 1e-3;

/// # Bubble and dew point calculations
impl<E: Residual> PhaseEquilibrium<E> {
    /// Calculate a phase equilibrium for a given temperature
    /// or pressure and composition of the liquid phase.
    pub fn bubble_point(
        eos: &Arc<E>,
        temperature_or_pressure: TPSpec,
        liquid_molefracs: &Array1<f64>,
        tp_init: Option<f64>,
        vapor_molefracs: Option<&Array1<f64>>,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        Self::bubble_dew_point(
            eos,
            temperature_or_pressure,
            tp_init,
            liquid_molefracs,
            vapor_molefracs,
            true,
            options,
        )
    }

    /// Calculate a phase equilibrium for a given temperature
    /// or pressure and composition of the vapor phase.
    pub fn dew_point(
        eos: &Arc<E>,
        temperature_or_pressure: TPSpec,
        vapor_molefracs: &Array1<f64>,
        tp_init: Option<f64>,
        liquid_molefracs: Option<&Array1<f64>>,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        Self::bubble_dew_point(
            eos,
            temperature_or_pressure,
            tp_init,
            vapor_molefracs,
            liquid_molefracs,
            false,
            options,
        )
    }

    fn bubble_dew_point(
        eos: &Arc<E>,
        tp_spec: TPSpec,
        tp_init: Option<f64>,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        match tp_spec {
            TPSpec::Temperature(temperature) => {
                // First use given initial pressure if applicable
                if let Some(p) = tp_init {
                    return Self::iterate_bubble_dew(
                        eos,
                        tp_spec,
                        temperature,
                        p,
                        molefracs_spec,
                        molefracs_init,
                        bubble,
                        options,
                    );
                }

                // Next try to initialize with an ideal gas assumption
                let vle =
                    Self::starting_pressure_ideal_gas(eos, temperature, molefracs_spec, bubble)
                        .and_then(|(p, x)| {
                            Self::iterate_bubble_dew(
                                eos,
                                tp_spec,
                                temperature,
                                p,
                                molefracs_spec,
                                molefracs_init.or(Some(&x)),
                                bubble,
                                options,
                            )
                        });

                // Finally use the spinodal to initialize the calculation
                vle.or_else(|_| {
                    Self::iterate_bubble_dew(
                        eos,
                        tp_spec,
                        temperature,
                        Self::starting_pressure_spinodal(eos, temperature, molefracs_spec)?,
                        molefracs_spec,
                        molefracs_init,
                        bubble,
                        options,
                    )
                })
            }
            TPSpec::Pressure(pressure) => {
                let temperature = tp_init.ok_or_else(|| {
                    EosError::Error(String::from(
                        "an initial temperature is required for bubble/dew points at given pressure",
                    ))
                })?;
                Self::iterate_bubble_dew(
                    eos,
                    tp_spec,
                    temperature,
                    pressure,
                    molefracs_spec,
                    molefracs_init,
                    bubble,
                    options,
                )
            }
        }
    }

    fn iterate_bubble_dew(
        eos: &Arc<E>,
        tp_spec: TPSpec,
        temperature: f64,
        pressure: f64,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        let [state1, state2] = if bubble {
            starting_x2_bubble(eos, temperature, pressure, molefracs_spec, molefracs_init)
        } else {
            starting_x2_dew(eos, temperature, pressure, molefracs_spec, molefracs_init)
        }?;
        bubble_dew(tp_spec, temperature, pressure, state1, state2, bubble, options)
    }

    fn starting_pressure_ideal_gas(
        eos: &Arc<E>,
        temperature: f64,
        molefracs_spec: &Array1<f64>,
        bubble: bool,
    ) -> EosResult<(f64, Array1<f64>)> {
        if bubble {
            Self::starting_pressure_ideal_gas_bubble(eos, temperature, molefracs_spec)
        } else {
            Self::starting_pressure_ideal_gas_dew(eos, temperature, molefracs_spec)
        }
    }

    pub(super) fn starting_pressure_ideal_gas_bubble(
        eos: &Arc<E>,
        temperature: f64,
        liquid_molefracs: &Array1<f64>,
    ) -> EosResult<(f64, Array1<f64>)> {
        let density = 0.75 * eos.max_density(Some(liquid_molefracs))?;
        let liquid = State::new_nvt(
            eos,
            temperature,
            liquid_molefracs.sum() / density,
            liquid_molefracs,
        )?;
        let v_l = liquid.partial_molar_volume();
        let p_l = liquid.pressure(Contributions::Total);
        let mu_l = liquid.residual_chemical_potential();
        let p_i = liquid_molefracs
            * temperature
            * density
            * ((mu_l - p_l * v_l) / temperature).mapv(f64::exp);
        let p = p_i.sum();
        let y = p_i / p;
        Ok((p, y))
    }

    fn starting_pressure_ideal_gas_dew(
        eos: &Arc<E>,
        temperature: f64,
        vapor_molefracs: &Array1<f64>,
    ) -> EosResult<(f64, Array1<f64>)> {
        let mut p: Option<f64> = None;

        let mut x = vapor_molefracs.clone();
        for _ in 0..5 {
            let density = 0.75 * eos.max_density(Some(&x))?;
            let liquid = State::new_nvt(eos, temperature, x.sum() / density, &x)?;
            let v_l = liquid.partial_molar_volume();
            let p_l = liquid.pressure(Contributions::Total);
            let mu_l = liquid.residual_chemical_potential();
            let k = vapor_molefracs / ((mu_l - p_l * v_l) / temperature).mapv(f64::exp);
            let p_new = temperature * density / k.sum();
            x = &k / k.sum();
            if let Some(p_old) = p {
                if ((p_new - p_old) / p_old).abs() < 1e-5 {
                    p = Some(p_new);
                    break;
                }
            }
            p = Some(p_new);
        }
        Ok((p.unwrap_or(f64::NAN), x))
    }

    pub(super) fn starting_pressure_spinodal(
        eos: &Arc<E>,
        temperature: f64,
        molefracs: &Array1<f64>,
    ) -> EosResult<f64> {
        let max_density = eos.max_density(Some(molefracs))?;
        let (p_v, _) = pressure_spinodal(eos, temperature, 1e-3 * max_density, molefracs)?;
        let (p_l, _) = pressure_spinodal(eos, temperature, 0.8 * max_density, molefracs)?;
        Ok(0.5 * (p_l.max(0.0) + p_v))
    }
}

fn starting_x2_bubble<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    liquid_molefracs: &Array1<f64>,
    vapor_molefracs: Option<&Array1<f64>>,
) -> EosResult<[State<E>; 2]> {
    let liquid_state = State::new_npt(eos, temperature, pressure, liquid_molefracs, Liquid)?;
    let xv = match vapor_molefracs {
        Some(xv) => xv.clone(),
        None => liquid_state.ln_phi().mapv(f64::exp) * liquid_molefracs,
    };
    let vapor_state = State::new_npt(eos, temperature, pressure, &xv, Vapor)?;
    Ok([liquid_state, vapor_state])
}

fn starting_x2_dew<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    vapor_molefracs: &Array1<f64>,
    liquid_molefracs: Option<&Array1<f64>>,
) -> EosResult<[State<E>; 2]> {
    let vapor_state = State::new_npt(eos, temperature, pressure, vapor_molefracs, Vapor)?;
    let xl = match liquid_molefracs {
        Some(xl) => xl.clone(),
        None => {
            let xl = vapor_state.ln_phi().mapv(f64::exp) * vapor_molefracs;
            let liquid_state = State::new_npt(eos, temperature, pressure, &xl, Liquid)?;
            (vapor_state.ln_phi() - liquid_state.ln_phi()).mapv(f64::exp) * vapor_molefracs
        }
    };
    let liquid_state = State::new_npt(eos, temperature, pressure, &xl, Liquid)?;
    Ok([vapor_state, liquid_state])
}

fn bubble_dew<E: Residual>(
    tp_spec: TPSpec,
    mut temperature: f64,
    mut pressure: f64,
    mut state1: State<E>,
    mut state2: State<E>,
    bubble: bool,
    options: (SolverOptions, SolverOptions),
) -> EosResult<PhaseEquilibrium<E>> {
    let (options_inner, options_outer) = options;

    // initialize variables
    let mut err_out = 1.0;
    let mut k_out = 0;

    if PhaseEquilibrium::is_trivial_solution(&state1, &state2) {
        log_iter!(options_outer.verbosity, "Trivial solution encountered!");
        return Err(EosError::TrivialSolution);
    }

    log_iter!(
        options_outer.verbosity,
        "res outer loop | res inner loop | {:^16} | molefracs second phase",
        match tp_spec {
            TPSpec::Temperature(_) => "pressure",
            TPSpec::Pressure(_) => "temperature",
        }
    );
    log_iter!(options_outer.verbosity, "{:-<85}", "");
    log_iter!(
        options_outer.verbosity,
        "{:14} | {:14} | {:12.8} | {:.8}",
        "",
        "",
        match tp_spec {
            TPSpec::Temperature(_) => pressure,
            TPSpec::Pressure(_) => temperature,
        },
        state2.molefracs
    );

    // Outer loop for finding x2
    for ko in 0..options_outer.max_iter.unwrap_or(MAX_ITER_OUTER) {
        // Iso-Fugacity equation
        err_out = if err_out > NEWTON_TOL {
            // Inner loop for finding T or p
            for _ in 0..options_inner.max_iter.unwrap_or(MAX_ITER_INNER) {
                if adjust_t_p(
                    tp_spec,
                    &mut temperature,
                    &mut pressure,
                    &mut state1,
                    &mut state2,
                    options_inner.verbosity,
                )? < options_inner.tol.unwrap_or(TOL_INNER)
                {
                    break;
                }
            }
            adjust_x2(&state1, &mut state2, options_outer.verbosity)
        } else {
            newton_step(
                tp_spec,
                &mut temperature,
                &mut pressure,
                &mut state1,
                &mut state2,
                options_outer.verbosity,
            )
        }?;

        if PhaseEquilibrium::is_trivial_solution(&state1, &state2) {
            log_iter!(options_outer.verbosity, "Trivial solution encountered!");
            return Err(EosError::TrivialSolution);
        }

        if err_out < options_outer.tol.unwrap_or(TOL_OUTER) {
            k_out = ko + 1;
            break;
        }
    }

    if err_out < options_outer.tol.unwrap_or(TOL_OUTER) {
        log_result!(
            options_outer.verbosity,
            "Bubble/dew point: calculation converged in {} step(s)\n",
            k_out
        );
        if bubble {
            Ok(PhaseEquilibrium([state2, state1]))
        } else {
            Ok(PhaseEquilibrium([state1, state2]))
        }
    } else {
        Err(EosError::not_converged_res("bubble-dew-iteration", err_out))
    }
}

fn adjust_t_p<E: Residual>(
    tp_spec: TPSpec,
    temperature: &mut f64,
    pressure: &mut f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    // calculate K = phi_1/phi_2 = x_2/x_1
    let ln_phi_1 = state1.ln_phi();
    let ln_phi_2 = state2.ln_phi();
    let k = (&ln_phi_1 - &ln_phi_2).mapv(f64::exp);

    // calculate residual
    let f = (&state1.molefracs * &k).sum() - 1.0;

    match tp_spec {
        TPSpec::Temperature(_) => {
            // Derivative w.r.t. ln(pressure)
            let ln_phi_1_dp = state1.dln_phi_dp();
            let ln_phi_2_dp = state2.dln_phi_dp();
            let df = ((ln_phi_1_dp - ln_phi_2_dp) * *pressure * &state1.molefracs * &k).sum();
            let lnpstep = (-f / df).clamp(-MAX_LNPSTEP, MAX_LNPSTEP);
            *pressure *= lnpstep.exp();
        }
        TPSpec::Pressure(_) => {
            // Derivative w.r.t. temperature
            let ln_phi_1_dt = state1.dln_phi_dt();
            let ln_phi_2_dt = state2.dln_phi_dt();
            let df = ((ln_phi_1_dt - ln_phi_2_dt) * &state1.molefracs * &k).sum();
            let tstep = (-f / df).clamp(-MAX_TSTEP, MAX_TSTEP);
            *temperature += tstep;
        }
    }

    // update states with new temperature/pressure
    adjust_states(*temperature, *pressure, state1, state2, None)?;

    log_iter!(
        verbosity,
        "{:14} | {:<14.8e} | {:12.8} | {:.8}",
        "",
        f.abs(),
        match tp_spec {
            TPSpec::Temperature(_) => *pressure,
            TPSpec::Pressure(_) => *temperature,
        },
        state2.molefracs
    );

    Ok(f.abs())
}

fn newton_step<E: Residual>(
    tp_spec: TPSpec,
    temperature: &mut f64,
    pressure: &mut f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    let dmu_drho_1 = state1.dmu_drho().dot(&state1.molefracs);
    let dmu_drho_2 = state2.dmu_drho();
    let dp_drho_1 = (state1.dp_dni(Contributions::Total) * state1.volume).dot(&state1.molefracs);
    let dp_drho_2 = state2.dp_dni(Contributions::Total) * state2.volume;
    let mu_1_res = state1.residual_chemical_potential();
    let mu_2_res = state2.residual_chemical_potential();
    let p_1 = state1.pressure(Contributions::Total);
    let p_2 = state2.pressure(Contributions::Total);

    let delta_dmu_ig_dt = (&state1.partial_density / &state2.partial_density).mapv(f64::ln);
    let delta_mu_ig = state1.temperature * &delta_dmu_ig_dt;

    let (error, dx) = match tp_spec {
        TPSpec::Temperature(_) => {
            // residual of the isofugacity and mechanical equilibrium conditions
            let res = concatenate![Axis(0), mu_1_res - mu_2_res + delta_mu_ig, arr1(&[p_1 - p_2])];
            let error = norm(&res);

            let jacobian = concatenate![
                Axis(1),
                concatenate![Axis(0), -dmu_drho_2, -dp_drho_2.insert_axis(Axis(0))],
                concatenate![
                    Axis(0),
                    dmu_drho_1.insert_axis(Axis(1)),
                    arr2(&[[dp_drho_1]])
                ]
            ];
            (error, LU::new(jacobian)?.solve(&res))
        }
        TPSpec::Pressure(p) => {
            let dmu_res_dt_1 = state1.dmu_res_dt();
            let dmu_res_dt_2 = state2.dmu_res_dt();
            let dp_dt_1 = state1.dp_dt(Contributions::Total);
            let dp_dt_2 = state2.dp_dt(Contributions::Total);

            let res = concatenate![
                Axis(0),
                mu_1_res - mu_2_res + delta_mu_ig,
                arr1(&[p_1 - p]),
                arr1(&[p_2 - p])
            ];
            let error = norm(&res);

            let jacobian = concatenate![
                Axis(1),
                concatenate![
                    Axis(0),
                    -dmu_drho_2,
                    Array2::zeros((1, res.len() - 2)),
                    dp_drho_2.insert_axis(Axis(0))
                ],
                concatenate![
                    Axis(0),
                    dmu_drho_1.insert_axis(Axis(1)),
                    arr2(&[[dp_drho_1], [0.0]])
                ],
                concatenate![
                    Axis(0),
                    (dmu_res_dt_1 - dmu_res_dt_2 + delta_dmu_ig_dt).insert_axis(Axis(1)),
                    arr2(&[[dp_dt_1], [dp_dt_2]])
                ]
            ];
            (error, LU::new(jacobian)?.solve(&res))
        }
    };

    // apply Newton step
    let n = state2.eos.components();
    let rho_1 = state1.density - dx[n];
    let rho_2 = &state2.partial_density - &dx.slice(s![0..n]);
    let t = match tp_spec {
        TPSpec::Temperature(t) => t,
        TPSpec::Pressure(_) => state1.temperature - dx[n + 1],
    };

    // update states
    *state1 = State::new_nvt(&state1.eos, t, 1.0 / rho_1, &state1.molefracs)?;
    *state2 = State::new_nvt(&state2.eos, t, 1.0, &rho_2.to_owned())?;
    *pressure = state1.pressure(Contributions::Total);
    *temperature = t;
    log_iter!(
        verbosity,
        "{:<14.8e} | {:14} | {:12.8} | {:.8} NEWTON",
        error,
        "",
        match tp_spec {
            TPSpec::Temperature(_) => *pressure,
            TPSpec::Pressure(_) => *temperature,
        },
        state2.molefracs
    );
    Ok(error)
}

fn adjust_states<E: Residual>(
    temperature: f64,
    pressure: f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    moles_state2: Option<&Array1<f64>>,
) -> EosResult<()> {
    *state1 = State::new_npt(
        &state1.eos,
        temperature,
        pressure,
        &state1.moles,
        InitialDensity(state1.density),
    )?;
    *state2 = State::new_npt(
        &state2.eos,
        temperature,
        pressure,
        moles_state2.unwrap_or(&state2.moles),
        InitialDensity(state2.density),
    )?;
    Ok(())
}

fn adjust_x2<E: Residual>(
    state1: &State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    let x1 = &state1.molefracs;
    let ln_phi_1 = state1.ln_phi();
    let ln_phi_2 = state2.ln_phi();
    let k = (ln_phi_1 - ln_phi_2).mapv(f64::exp);
    let err_out = (&k * x1 / &state2.molefracs - 1.0).mapv(f64::abs).sum();
    let x2 = (x1 * &k) / (&k * x1).sum();
    log_iter!(verbosity, "{:<14.8e} | {:14} | {:16} |", err_out, "", "");
    *state2 = State::new_npt(
        &state2.eos,
        state2.temperature,
        state2.pressure(Contributions::Total),
        &x2,
        InitialDensity(state2.density),
    )?;
    Ok(err_out)
}
