//! A binary mixture without binary interaction parameters has to reproduce
//! the pure component phase equilibria in the limits x → 0 and x → 1.
use approx::assert_relative_eq;
use ndarray::arr1;
use sgt_rs::saftvrmie::parameters::test_utils::test_parameters;
use sgt_rs::saftvrmie::{SaftVRMie, SaftVRMieParameters};
use sgt_rs::{Contributions, PhaseEquilibrium, SolverOptions, TPSpec};
use std::sync::Arc;

fn methane_ethane() -> Arc<SaftVRMie> {
    let mut p = test_parameters();
    let methane = p.remove("methane").unwrap().pure_records[0].clone();
    let ethane = p.remove("ethane").unwrap().pure_records[0].clone();
    Arc::new(SaftVRMie::new(Arc::new(
        SaftVRMieParameters::new_binary(vec![methane, ethane], None).unwrap(),
    )))
}

#[test]
fn bubble_point_approaches_pure_vapor_pressure() {
    let eos = methane_ethane();
    let t = 150.0;
    let x = arr1(&[1.0 - 1e-6, 1e-6]);
    let vle = PhaseEquilibrium::bubble_point(
        &eos,
        TPSpec::Temperature(t),
        &x,
        None,
        None,
        (SolverOptions::default(), SolverOptions::default()),
    )
    .unwrap();

    let p_pure = PhaseEquilibrium::vapor_pressure(&eos, t)[0].unwrap();
    assert_relative_eq!(
        vle.vapor().pressure(Contributions::Total),
        p_pure,
        max_relative = 1e-4
    );
}

#[test]
fn dew_point_approaches_pure_vapor_pressure() {
    let eos = methane_ethane();
    let t = 240.0;
    let y = arr1(&[1e-6, 1.0 - 1e-6]);
    let vle = PhaseEquilibrium::dew_point(
        &eos,
        TPSpec::Temperature(t),
        &y,
        None,
        None,
        (SolverOptions::default(), SolverOptions::default()),
    )
    .unwrap();

    let p_pure = PhaseEquilibrium::vapor_pressure(&eos, t)[1].unwrap();
    assert_relative_eq!(
        vle.vapor().pressure(Contributions::Total),
        p_pure,
        max_relative = 1e-4
    );
}

#[test]
fn tp_flash_splits_a_binary_feed() {
    let eos = methane_ethane();
    let t = 160.0;
    let p_methane = PhaseEquilibrium::vapor_pressure(&eos, t)[0].unwrap();
    let p_ethane = PhaseEquilibrium::vapor_pressure(&eos, t)[1].unwrap();

    // a pressure between the dew and bubble pressure of the feed
    let p = (p_methane * p_ethane).sqrt();
    let feed = arr1(&[0.5, 0.5]);
    let vle =
        PhaseEquilibrium::tp_flash(&eos, t, p, &feed, None, SolverOptions::default()).unwrap();

    // material balance and equilibrium conditions
    let beta = vle.vapor().total_moles / feed.sum();
    for i in 0..2 {
        assert_relative_eq!(
            vle.vapor().moles[i] + vle.liquid().moles[i],
            feed[i],
            max_relative = 1e-8
        );
        let k = (vle.liquid().ln_phi()[i] - vle.vapor().ln_phi()[i]).exp();
        assert_relative_eq!(
            vle.vapor().molefracs[i],
            k * vle.liquid().molefracs[i],
            max_relative = 1e-6
        );
    }
    assert!(beta > 0.0 && beta < 1.0);
    // the light component enriches in the vapor
    assert!(vle.vapor().molefracs[0] > vle.liquid().molefracs[0]);
}
