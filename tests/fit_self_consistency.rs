//! A parameter fit against synthetic data generated from known parameters
//! has to recover those parameters.
use approx::assert_relative_eq;
use ndarray::{arr1, Array1};
use sgt_rs::estimator::{DataSet, EquilibriumLiquidDensity, Estimator, Loss, VaporPressure};
use sgt_rs::saftvrmie::{PureRecord, SaftVRMie, SaftVRMieParameters, SaftVRMieRecord};
use sgt_rs::{PhaseEquilibrium, SolverOptions};
use std::sync::Arc;

fn methane(sigma: f64, epsilon_k: f64) -> Arc<SaftVRMie> {
    let record = PureRecord::new(
        "methane",
        16.031,
        SaftVRMieRecord::new_simple(1.0, sigma, epsilon_k, 12.65, 6.0),
    );
    Arc::new(SaftVRMie::new(Arc::new(
        SaftVRMieParameters::new_pure(record).unwrap(),
    )))
}

#[test]
fn fit_recovers_known_parameters() {
    let sigma = 3.7412;
    let epsilon_k = 153.36;
    let eos = methane(sigma, epsilon_k);

    // synthetic saturation data from the true parameters
    let temperature = arr1(&[120.0, 140.0, 160.0]);
    let mut pressure = Array1::zeros(3);
    let mut rho_liq = Array1::zeros(3);
    for (i, &t) in temperature.iter().enumerate() {
        let vle = PhaseEquilibrium::pure(
            &eos,
            sgt_rs::TPSpec::Temperature(t),
            None,
            SolverOptions::default(),
        )
        .unwrap();
        pressure[i] = vle.vapor().pressure(sgt_rs::Contributions::Total);
        rho_liq[i] = vle.liquid().mass_density();
    }

    let datasets: Vec<Arc<dyn DataSet<SaftVRMie>>> = vec![
        Arc::new(VaporPressure::new(pressure, temperature.clone(), true).unwrap()),
        Arc::new(EquilibriumLiquidDensity::new(rho_liq, temperature, None).unwrap()),
    ];
    let estimator = Estimator::new(datasets, vec![1.0, 1.0], vec![Loss::Linear, Loss::Linear]);

    let build_eos = |x: &Array1<f64>| Ok(methane(x[0], x[1]));
    let initial = arr1(&[3.9, 160.0]);
    let result = sgt_rs::estimator::fit(
        &estimator,
        build_eos,
        &initial,
        SolverOptions::default(),
    )
    .unwrap();

    assert_relative_eq!(result.parameters[0], sigma, max_relative = 1e-3);
    assert_relative_eq!(result.parameters[1], epsilon_k, max_relative = 1e-3);
    assert!(result.cost < 1e-8);
}

#[test]
fn perfect_parameters_have_zero_relative_difference() {
    let eos = methane(3.7412, 153.36);
    let temperature = arr1(&[120.0, 150.0]);
    let mut rho_liq = Array1::zeros(2);
    for (i, &t) in temperature.iter().enumerate() {
        let vle = PhaseEquilibrium::pure(
            &eos,
            sgt_rs::TPSpec::Temperature(t),
            None,
            SolverOptions::default(),
        )
        .unwrap();
        rho_liq[i] = vle.liquid().mass_density();
    }
    let data = EquilibriumLiquidDensity::new(rho_liq, temperature, None).unwrap();
    let mard = DataSet::<SaftVRMie>::mean_absolute_relative_difference(&data, &eos);
    assert!(mard.unwrap() < 1e-10);
}
