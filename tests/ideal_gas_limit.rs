//! In the zero density limit all residual properties have to vanish.
use approx::assert_relative_eq;
use ndarray::arr1;
use sgt_rs::saftvrmie::parameters::test_utils::test_parameters;
use sgt_rs::saftvrmie::{SaftVRMie, SaftVRMieParameters};
use sgt_rs::{Contributions, State};
use std::sync::Arc;

#[test]
fn residual_properties_vanish_for_pure_fluids() {
    for (_, p) in test_parameters() {
        let eos = Arc::new(SaftVRMie::new(Arc::new(p)));
        let density = 1e-12;
        let state = State::new_nvt(&eos, 300.0, 1.0 / density, &arr1(&[1.0])).unwrap();
        assert!(state.residual_helmholtz_energy().abs() < 1e-9);
        assert_relative_eq!(
            state.compressibility(Contributions::Total),
            1.0,
            max_relative = 1e-9
        );
    }
}

#[test]
fn fugacity_coefficients_vanish_for_mixtures() {
    let mut p = test_parameters();
    let methane = p.remove("methane").unwrap().pure_records[0].clone();
    let hexane = p.remove("hexane").unwrap().pure_records[0].clone();
    let eos = Arc::new(SaftVRMie::new(Arc::new(
        SaftVRMieParameters::new_binary(vec![methane, hexane], None).unwrap(),
    )));

    let moles = arr1(&[0.4, 0.6]);
    let volume = moles.sum() / 1e-12;
    let state = State::new_nvt(&eos, 350.0, volume, &moles).unwrap();
    for ln_phi in state.ln_phi() {
        assert!(ln_phi.abs() < 1e-9);
    }
    assert_relative_eq!(
        state.pressure(Contributions::Total),
        state.density * state.temperature,
        max_relative = 1e-9
    );
}
