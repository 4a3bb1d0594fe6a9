//! Pure component phase equilibria compared to critical and saturation
//! data from the literature.
use approx::assert_relative_eq;
use sgt_rs::saftvrmie::SaftVRMie;
use sgt_rs::{Contributions, PhaseEquilibrium, SolverOptions, State, TPSpec, KB};
use std::collections::HashMap;
use std::sync::Arc;

/// 1 MPa in K/Å³
const MPA: f64 = 1e6 * 1e-30 / KB;

/// Critical data reported in Lafitte et al. (2013):
/// (temperature / K, pressure / MPa, mass density / kg m⁻³)
fn critical_data() -> HashMap<&'static str, (f64, f64, f64)> {
    let mut data = HashMap::new();
    data.insert("methane", (195.30, 5.15, 154.45));
    data.insert("ethane", (311.38, 5.49, 205.84));
    data.insert("propane", (376.20, 4.77, 219.98));
    data.insert("hexane", (515.29, 3.44, 241.16));
    data.insert("decane", (626.37, 2.31, 219.85));
    data.insert("carbon dioxide", (307.00, 7.86, 472.15));
    data.insert("toluene", (600.25, 4.73, 301.21));
    data
}

#[test]
fn critical_properties_pure() {
    let mut parameters = sgt_rs::saftvrmie::parameters::test_utils::test_parameters();
    for (name, (tc, pc, rhoc)) in critical_data() {
        let p = parameters.remove(name).unwrap();
        let eos = Arc::new(SaftVRMie::new(Arc::new(p)));
        let cp = State::critical_point(&eos, None, Some(500.0), SolverOptions::default()).unwrap();
        assert_relative_eq!(cp.temperature, tc, max_relative = 2e-3);
        assert_relative_eq!(
            cp.pressure(Contributions::Total),
            pc * MPA,
            max_relative = 5e-3
        );
        assert_relative_eq!(cp.mass_density(), rhoc, max_relative = 1e-2);
    }
}

/// Saturation data at the normal boiling point:
/// (temperature / K, saturated liquid mass density / kg m⁻³)
fn boiling_point_data() -> HashMap<&'static str, (f64, f64)> {
    let mut data = HashMap::new();
    data.insert("methane", (111.67, 422.4));
    data.insert("ethane", (184.55, 544.0));
    data.insert("propane", (231.06, 580.9));
    data
}

#[test]
fn saturation_at_normal_boiling_point() {
    let mut parameters = sgt_rs::saftvrmie::parameters::test_utils::test_parameters();
    let options = SolverOptions::new().max_iter(50);
    for (name, (t, rho_liq)) in boiling_point_data() {
        let p = parameters.remove(name).unwrap();
        let eos = Arc::new(SaftVRMie::new(Arc::new(p)));
        let vle = PhaseEquilibrium::pure(&eos, TPSpec::Temperature(t), None, options).unwrap();

        // mechanical and chemical equilibrium
        assert_relative_eq!(
            vle.vapor().pressure(Contributions::Total),
            vle.liquid().pressure(Contributions::Total),
            max_relative = 1e-8
        );

        // the vapor pressure at the normal boiling point is 1 atm
        assert_relative_eq!(
            vle.vapor().pressure(Contributions::Total),
            0.101325 * MPA,
            max_relative = 5e-2
        );
        assert_relative_eq!(vle.liquid().mass_density(), rho_liq, max_relative = 1e-2);
    }
}

#[test]
fn boiling_temperature_inverts_vapor_pressure() {
    let mut parameters = sgt_rs::saftvrmie::parameters::test_utils::test_parameters();
    let eos = Arc::new(SaftVRMie::new(Arc::new(
        parameters.remove("propane").unwrap(),
    )));
    let t = 280.0;
    let p = PhaseEquilibrium::vapor_pressure(&eos, t)[0].unwrap();
    let t_boil = PhaseEquilibrium::boiling_temperature(&eos, p)[0].unwrap();
    assert_relative_eq!(t_boil, t, max_relative = 1e-8);
}
