//! SAFT-VR Mie equation of state for chain molecules interacting through
//! Mie potentials of variable repulsive and attractive range.
use crate::equation_of_state::{Components, Residual};
use crate::state::StateHD;
use ndarray::{Array1, ScalarOperand};
use num_dual::DualNum;
use std::f64::consts::FRAC_PI_6;
use std::sync::Arc;

mod dispersion;
pub mod parameters;
use dispersion::{a_disp, a_disp_chain, MieProperties};
pub use parameters::{
    PureRecord, SaftVRMieBinaryRecord, SaftVRMieParameters, SaftVRMieRecord,
};

/// Customization options for the SAFT-VR Mie equation of state.
#[derive(Copy, Clone)]
pub struct SaftVRMieOptions {
    /// Maximum packing fraction used to initialize liquid density iterations
    pub max_eta: f64,
}

impl Default for SaftVRMieOptions {
    fn default() -> Self {
        Self { max_eta: 0.5 }
    }
}

/// SAFT-VR Mie equation of state.
pub struct SaftVRMie {
    pub parameters: Arc<SaftVRMieParameters>,
    options: SaftVRMieOptions,
    chain: bool,
}

impl SaftVRMie {
    pub fn new(parameters: Arc<SaftVRMieParameters>) -> Self {
        Self::with_options(parameters, SaftVRMieOptions::default())
    }

    pub fn with_options(parameters: Arc<SaftVRMieParameters>, options: SaftVRMieOptions) -> Self {
        let chain = parameters.m.iter().any(|&m| m > 1.0);
        Self {
            parameters,
            options,
            chain,
        }
    }
}

impl Components for SaftVRMie {
    fn components(&self) -> usize {
        self.parameters.m.len()
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        Self::with_options(
            Arc::new(self.parameters.subset(component_list)),
            self.options,
        )
    }
}

impl Residual for SaftVRMie {
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        self.options.max_eta * moles.sum()
            / (FRAC_PI_6 * &self.parameters.m * self.parameters.sigma.mapv(|v| v.powi(3)) * moles)
                .sum()
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy + ScalarOperand>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)> {
        let mut a = Vec::with_capacity(2);

        let diameter = self.parameters.hs_diameter(state.temperature);
        a.push((
            "Hard Sphere".to_string(),
            a_hard_sphere(&self.parameters, state, &diameter),
        ));

        let properties = MieProperties::new(&self.parameters, state, &diameter);
        if self.chain {
            a.push((
                "Dispersion + Chain".to_string(),
                a_disp_chain(&self.parameters, &properties, state),
            ));
        } else {
            a.push((
                "Dispersion".to_string(),
                a_disp(&self.parameters, &properties, state),
            ));
        }
        a
    }

    fn molar_weight(&self) -> Array1<f64> {
        self.parameters.molarweight.clone()
    }
}

/// Hard-sphere reference term of the segments (Boublik, Mansoori et al.).
///
/// $$\frac{\beta A}{V}=\frac{6}{\pi}\left(\frac{3\zeta_1\zeta_2}{1-\zeta_3}+\frac{\zeta_2^3}{\zeta_3\left(1-\zeta_3\right)^2}+\left(\frac{\zeta_2^3}{\zeta_3^2}-\zeta_0\right)\ln\left(1-\zeta_3\right)\right)$$
/// with the packing fractions
/// $$\zeta_k=\frac{\pi}{6}\sum_i m_i\rho_i d_i^k,~~~~~~~~k=0\ldots 3.$$
fn a_hard_sphere<D: DualNum<f64> + Copy>(
    parameters: &SaftVRMieParameters,
    state: &StateHD<D>,
    diameter: &Array1<D>,
) -> D {
    let mut zeta = [D::zero(); 4];
    for i in 0..diameter.len() {
        for (k, z) in zeta.iter_mut().enumerate() {
            *z += state.molefracs[i] * diameter[i].powi(k as i32) * (parameters.m[i] * FRAC_PI_6);
        }
    }
    // the ratio stays finite in the zero density limit
    let zeta_23 = zeta[2] / zeta[3];
    let density = state.partial_density.sum();
    zeta.iter_mut().for_each(|z| *z *= density);
    let frac_1mz3 = -(zeta[3] - 1.0).recip();
    (zeta[1] * zeta[2] * frac_1mz3 * 3.0
        + zeta[2].powi(2) * frac_1mz3.powi(2) * zeta_23
        + (zeta[2] * zeta_23.powi(2) - zeta[0]) * (zeta[3] * (-1.0)).ln_1p())
        / FRAC_PI_6
        * state.volume
}

#[cfg(test)]
mod test {
    use super::parameters::test_utils::test_parameters;
    use super::*;
    use crate::state::{Contributions, State};
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn ideal_gas_limit() {
        let params = test_parameters().remove("propane").unwrap();
        let eos = Arc::new(SaftVRMie::new(Arc::new(params)));
        let density = 1e-12;
        let state = State::new_nvt(&eos, 300.0, 1.0 / density, &arr1(&[1.0])).unwrap();
        assert_relative_eq!(
            state.compressibility(Contributions::Total),
            1.0,
            max_relative = 1e-9
        );
        assert!(state.residual_helmholtz_energy().abs() < 1e-9);
    }

    #[test]
    fn subset_matches_pure() {
        let mut ps = test_parameters();
        let methane = ps.remove("methane").unwrap().pure_records[0].clone();
        let hexane = ps.remove("hexane").unwrap().pure_records[0].clone();
        let mix = Arc::new(SaftVRMie::new(Arc::new(
            SaftVRMieParameters::new_binary(vec![methane.clone(), hexane], None).unwrap(),
        )));
        let pure = Arc::new(mix.subset(&[0]));

        let state = State::new_nvt(&pure, 200.0, 100.0, &arr1(&[1.0])).unwrap();
        let reference = Arc::new(SaftVRMie::new(Arc::new(
            SaftVRMieParameters::new_pure(methane).unwrap(),
        )));
        let state_ref = State::new_nvt(&reference, 200.0, 100.0, &arr1(&[1.0])).unwrap();
        assert_relative_eq!(
            state.pressure(Contributions::Total),
            state_ref.pressure(Contributions::Total),
            max_relative = 1e-12
        );
    }

    #[test]
    fn mixture_pure_limit() {
        // a binary mixture evaluated at x = (1, 0) matches the pure component
        let mut ps = test_parameters();
        let methane = ps.remove("methane").unwrap().pure_records[0].clone();
        let decane = ps.remove("decane").unwrap().pure_records[0].clone();
        let mix = Arc::new(SaftVRMie::new(Arc::new(
            SaftVRMieParameters::new_binary(vec![methane.clone(), decane], None).unwrap(),
        )));
        let pure = Arc::new(SaftVRMie::new(Arc::new(
            SaftVRMieParameters::new_pure(methane).unwrap(),
        )));

        let state_mix = State::new_nvt(&mix, 250.0, 200.0, &arr1(&[1.0, 0.0])).unwrap();
        let state_pure = State::new_nvt(&pure, 250.0, 200.0, &arr1(&[1.0])).unwrap();
        assert_relative_eq!(
            state_mix.pressure(Contributions::Total),
            state_pure.pressure(Contributions::Total),
            max_relative = 1e-10
        );
    }
}
