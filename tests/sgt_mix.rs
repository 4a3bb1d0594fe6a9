//! Surface tension of mixtures from the orthogonal collocation solver.
use approx::assert_relative_eq;
use ndarray::arr1;
use sgt_rs::saftvrmie::parameters::test_utils::test_parameters;
use sgt_rs::saftvrmie::{SaftVRMie, SaftVRMieParameters};
use sgt_rs::sgt::{surface_tension, surface_tension_pure, InfluenceParameters, SgtSolver};
use sgt_rs::{PhaseEquilibrium, SolverOptions, TPSpec};
use std::sync::Arc;

fn methane_ethane() -> Arc<SaftVRMie> {
    let mut p = test_parameters();
    let methane = p.remove("methane").unwrap().pure_records[0].clone();
    let ethane = p.remove("ethane").unwrap().pure_records[0].clone();
    Arc::new(SaftVRMie::new(Arc::new(
        SaftVRMieParameters::new_binary(vec![methane, ethane], None).unwrap(),
    )))
}

fn bubble_point(eos: &Arc<SaftVRMie>, t: f64, x: &[f64; 2]) -> PhaseEquilibrium<SaftVRMie> {
    PhaseEquilibrium::bubble_point(
        eos,
        TPSpec::Temperature(t),
        &arr1(x),
        None,
        None,
        (SolverOptions::default(), SolverOptions::default()),
    )
    .unwrap()
}

#[test]
fn grid_convergence() {
    let eos = methane_ethane();
    let influence = InfluenceParameters::new(&eos.parameters);
    let vle = bubble_point(&eos, 160.0, &[0.3, 0.7]);

    let mut coarse = SgtSolver::new(2, 24);
    let mut fine = SgtSolver::new(2, 32);
    let gamma_coarse = coarse
        .solve(&vle, &influence, None, SolverOptions::default())
        .unwrap()
        .surface_tension;
    let gamma_fine = fine
        .solve(&vle, &influence, None, SolverOptions::default())
        .unwrap()
        .surface_tension;
    assert_relative_eq!(gamma_coarse, gamma_fine, max_relative = 5e-3);
}

#[test]
fn fixed_point() {
    let eos = methane_ethane();
    let influence = InfluenceParameters::new(&eos.parameters);
    let vle = bubble_point(&eos, 160.0, &[0.3, 0.7]);

    let mut solver = SgtSolver::new(2, 24);
    let profile = solver
        .solve(&vle, &influence, None, SolverOptions::default())
        .unwrap();
    assert!(profile.surface_tension > 0.0);

    // a converged profile is a fixed point of the solver
    let again = solver
        .solve(&vle, &influence, Some(&profile), SolverOptions::default())
        .unwrap();
    assert!(again.iterations <= 1);
    assert_relative_eq!(
        again.surface_tension,
        profile.surface_tension,
        max_relative = 1e-8
    );
}

#[test]
fn identical_components_reduce_to_the_pure_fluid() {
    let mut p = test_parameters();
    let methane = p.remove("methane").unwrap();
    let record = methane.pure_records[0].clone();
    let pure = Arc::new(SaftVRMie::new(Arc::new(methane)));
    let binary = Arc::new(SaftVRMie::new(Arc::new(
        SaftVRMieParameters::new_binary(vec![record.clone(), record], None).unwrap(),
    )));

    let t = 120.0;
    let vle_pure =
        PhaseEquilibrium::pure(&pure, TPSpec::Temperature(t), None, SolverOptions::default())
            .unwrap();
    let gamma_pure = surface_tension_pure(
        &vle_pure,
        &InfluenceParameters::new(&pure.parameters),
        100,
    )
    .unwrap()
    .surface_tension;

    let vle = bubble_point(&binary, t, &[0.5, 0.5]);
    let gamma = surface_tension(
        &vle,
        &InfluenceParameters::new(&binary.parameters),
        32,
        SolverOptions::default(),
    )
    .unwrap()
    .surface_tension;

    assert_relative_eq!(gamma, gamma_pure, max_relative = 2e-2);
}
