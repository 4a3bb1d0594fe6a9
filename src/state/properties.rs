use super::{Contributions, Derivative::*, PartialDerivative, State, StateHD};
use crate::equation_of_state::Residual;
use crate::errors::EosResult;
use crate::NAV;
use ndarray::{arr1, Array1, Array2};
use num_dual::DualNum;
use std::sync::Arc;

/// Reduced ideal gas Helmholtz energy $\beta A^\mathrm{ig}$ with a thermal
/// de Broglie wavelength of unity.
///
/// The wavelength only contributes terms linear in the mole numbers and
/// independent of the volume. It therefore drops out of all properties
/// evaluated in this crate (pressures, fugacity coefficient ratios,
/// criticality conditions and grand potential differences).
pub(crate) fn ideal_gas_helmholtz_energy<D: DualNum<f64> + Copy>(state: &StateHD<D>) -> D {
    state
        .moles
        .iter()
        .zip(state.partial_density.iter())
        .fold(D::zero(), |acc, (&n, &rho)| {
            acc + n * (rho.ln() - 1.0)
        })
}

/// # State properties
impl<E: Residual> State<E> {
    pub(super) fn get_or_compute_derivative_residual(&self, derivative: PartialDerivative) -> f64 {
        let mut cache = self.cache.lock().unwrap();

        match derivative {
            PartialDerivative::Zeroth => {
                let new_state = self.derive0();
                let computation = || {
                    self.eos.residual_helmholtz_energy(&new_state) * new_state.temperature
                };
                cache.get_or_insert_with_f64(computation)
            }
            PartialDerivative::First(v) => {
                let new_state = self.derive1(v);
                let computation = || {
                    self.eos.residual_helmholtz_energy(&new_state) * new_state.temperature
                };
                cache.get_or_insert_with_d64(v, computation)
            }
            PartialDerivative::SecondMixed(v1, v2) => {
                let new_state = self.derive2_mixed(v1, v2);
                let computation = || {
                    self.eos.residual_helmholtz_energy(&new_state) * new_state.temperature
                };
                cache.get_or_insert_with_hd64(v1, v2, computation)
            }
            PartialDerivative::Third(v) => {
                let new_state = self.derive3(v);
                let computation = || {
                    self.eos.residual_helmholtz_energy(&new_state) * new_state.temperature
                };
                cache.get_or_insert_with_d3_64(v, computation)
            }
        }
    }

    fn contributions(ideal_gas: f64, residual: f64, contributions: Contributions) -> f64 {
        match contributions {
            Contributions::IdealGas => ideal_gas,
            Contributions::Total => ideal_gas + residual,
            Contributions::Residual => residual,
        }
    }

    /// Helmholtz energy $A$ in Kelvin.
    pub fn helmholtz_energy(&self, contributions: Contributions) -> f64 {
        let ideal_gas = self.temperature * ideal_gas_helmholtz_energy(&self.derive0());
        let residual = self.get_or_compute_derivative_residual(PartialDerivative::Zeroth);
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Residual Helmholtz energy $A^\mathrm{res}$ in Kelvin.
    pub fn residual_helmholtz_energy(&self) -> f64 {
        self.get_or_compute_derivative_residual(PartialDerivative::Zeroth)
    }

    /// Residual molar Helmholtz energy $a^\mathrm{res}$ in Kelvin.
    pub fn residual_molar_helmholtz_energy(&self) -> f64 {
        self.residual_helmholtz_energy() / self.total_moles
    }

    /// Residual entropy: $S^\mathrm{res}=-\left(\frac{\partial A^\mathrm{res}}{\partial T}\right)_{V,N_i}$
    pub fn residual_entropy(&self) -> f64 {
        -self.get_or_compute_derivative_residual(PartialDerivative::First(DT))
    }

    /// Residual molar entropy $s^\mathrm{res}$.
    pub fn residual_molar_entropy(&self) -> f64 {
        self.residual_entropy() / self.total_moles
    }

    /// Residual enthalpy: $H^\mathrm{res}=A^\mathrm{res}+TS^\mathrm{res}+p^\mathrm{res}V$
    pub fn residual_enthalpy(&self) -> f64 {
        self.temperature * self.residual_entropy()
            + self.residual_helmholtz_energy()
            + self.pressure(Contributions::Residual) * self.volume
    }

    /// Pressure: $p=-\left(\frac{\partial A}{\partial V}\right)_{T,N_i}$
    pub fn pressure(&self, contributions: Contributions) -> f64 {
        let ideal_gas = self.density * self.temperature;
        let residual = -self.get_or_compute_derivative_residual(PartialDerivative::First(DV));
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Chemical potential: $\mu_i=\left(\frac{\partial A}{\partial N_i}\right)_{T,V,N_j}$
    pub fn chemical_potential(&self, contributions: Contributions) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| {
            let ideal_gas = self.temperature * self.partial_density[i].ln();
            let residual =
                self.get_or_compute_derivative_residual(PartialDerivative::First(DN(i)));
            Self::contributions(ideal_gas, residual, contributions)
        })
    }

    /// Compressibility factor: $Z=\frac{pV}{NT}$
    pub fn compressibility(&self, contributions: Contributions) -> f64 {
        self.pressure(contributions) / (self.density * self.temperature)
    }

    // pressure derivatives

    /// Partial derivative of pressure w.r.t. volume: $\left(\frac{\partial p}{\partial V}\right)_{T,N_i}$
    pub fn dp_dv(&self, contributions: Contributions) -> f64 {
        let ideal_gas = -self.density * self.temperature / self.volume;
        let residual =
            -self.get_or_compute_derivative_residual(PartialDerivative::SecondMixed(DV, DV));
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Partial derivative of pressure w.r.t. density: $\left(\frac{\partial p}{\partial \rho}\right)_{T,N_i}$
    pub fn dp_drho(&self, contributions: Contributions) -> f64 {
        -self.volume / self.density * self.dp_dv(contributions)
    }

    /// Partial derivative of pressure w.r.t. temperature: $\left(\frac{\partial p}{\partial T}\right)_{V,N_i}$
    pub fn dp_dt(&self, contributions: Contributions) -> f64 {
        let ideal_gas = self.density;
        let residual =
            -self.get_or_compute_derivative_residual(PartialDerivative::SecondMixed(DV, DT));
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Partial derivative of pressure w.r.t. moles: $\left(\frac{\partial p}{\partial N_i}\right)_{T,V,N_j}$
    pub fn dp_dni(&self, contributions: Contributions) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| {
            let ideal_gas = self.temperature / self.volume;
            let residual = -self
                .get_or_compute_derivative_residual(PartialDerivative::SecondMixed(DV, DN(i)));
            Self::contributions(ideal_gas, residual, contributions)
        })
    }

    /// Second partial derivative of pressure w.r.t. volume: $\left(\frac{\partial^2 p}{\partial V^2}\right)_{T,N_j}$
    pub fn d2p_dv2(&self, contributions: Contributions) -> f64 {
        let ideal_gas = 2.0 * self.density * self.temperature / (self.volume * self.volume);
        let residual = -self.get_or_compute_derivative_residual(PartialDerivative::Third(DV));
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Second partial derivative of pressure w.r.t. density: $\left(\frac{\partial^2 p}{\partial \rho^2}\right)_{T,N_j}$
    pub fn d2p_drho2(&self, contributions: Contributions) -> f64 {
        self.volume / (self.density * self.density)
            * (self.volume * self.d2p_dv2(contributions) + 2.0 * self.dp_dv(contributions))
    }

    // This function is designed specifically for use in density iterations
    pub(crate) fn p_dpdrho(&self) -> (f64, f64) {
        let dp_dv = self.dp_dv(Contributions::Total);
        (
            self.pressure(Contributions::Total),
            -self.volume * dp_dv / self.density,
        )
    }

    // This function is designed specifically for use in spinodal iterations
    pub(crate) fn d2pdrho2(&self) -> (f64, f64, f64) {
        let d2p_dv2 = self.d2p_dv2(Contributions::Total);
        let dp_dv = self.dp_dv(Contributions::Total);
        (
            self.pressure(Contributions::Total),
            -self.volume * dp_dv / self.density,
            self.volume / (self.density * self.density) * (2.0 * dp_dv + self.volume * d2p_dv2),
        )
    }

    /// Residual chemical potential: $\mu_i^\mathrm{res}=\left(\frac{\partial A^\mathrm{res}}{\partial N_i}\right)_{T,V,N_j}$
    pub fn residual_chemical_potential(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| {
            self.get_or_compute_derivative_residual(PartialDerivative::First(DN(i)))
        })
    }

    /// Partial derivative of the residual chemical potential w.r.t. temperature:
    /// $\left(\frac{\partial\mu_i^\mathrm{res}}{\partial T}\right)_{V,N_j}$
    pub fn dmu_res_dt(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| {
            self.get_or_compute_derivative_residual(PartialDerivative::SecondMixed(DT, DN(i)))
        })
    }

    /// Partial molar volume: $\bar v_i=-\frac{\partial p/\partial N_i}{\partial p/\partial V}$
    pub fn partial_molar_volume(&self) -> Array1<f64> {
        -self.dp_dni(Contributions::Total) / self.dp_dv(Contributions::Total)
    }

    /// Partial derivative of the residual chemical potential w.r.t. moles:
    /// $\left(\frac{\partial\mu_i^\mathrm{res}}{\partial N_j}\right)_{T,V,N_k}$
    pub fn dmu_res_dni(&self) -> Array2<f64> {
        let n = self.eos.components();
        Array2::from_shape_fn((n, n), |(i, j)| {
            self.get_or_compute_derivative_residual(PartialDerivative::SecondMixed(DN(i), DN(j)))
        })
    }

    /// Partial derivative of the chemical potential w.r.t. partial densities at
    /// constant temperature: $\left(\frac{\partial\mu_i}{\partial \rho_j}\right)_{T}$
    ///
    /// Evaluated per volume, i.e. for a state with $V=1$ this is the Hessian
    /// of the Helmholtz energy density.
    pub fn dmu_drho(&self) -> Array2<f64> {
        let n = self.eos.components();
        let mut dmu = self.dmu_res_dni() * self.volume;
        for i in 0..n {
            dmu[[i, i]] += self.temperature / self.partial_density[i];
        }
        dmu
    }

    /// Logarithm of the fugacity coefficient: $\ln\varphi_i=\beta\mu_i^\mathrm{res}\left(T,p,\lbrace N_i\rbrace\right)$
    pub fn ln_phi(&self) -> Array1<f64> {
        let z = self.compressibility(Contributions::Total);
        Array1::from_shape_fn(self.eos.components(), |i| {
            self.get_or_compute_derivative_residual(PartialDerivative::First(DN(i)))
                / self.temperature
        }) - z.ln()
    }

    /// Logarithm of the fugacity coefficient of all components treated as
    /// pure substance at mixture temperature and pressure.
    pub fn ln_phi_pure_liquid(&self) -> EosResult<Array1<f64>> {
        let pressure = self.pressure(Contributions::Total);
        (0..self.eos.components())
            .map(|i| {
                let eos = Arc::new(self.eos.subset(&[i]));
                let state = Self::new_npt(
                    &eos,
                    self.temperature,
                    pressure,
                    &arr1(&[1.0]),
                    crate::DensityInitialization::Liquid,
                )?;
                Ok(state.ln_phi()[0])
            })
            .collect()
    }

    /// Partial derivative of the logarithm of the fugacity coefficient w.r.t. pressure:
    /// $\left(\frac{\partial\ln\varphi_i}{\partial p}\right)_{T,N_i}$
    pub fn dln_phi_dp(&self) -> Array1<f64> {
        self.partial_molar_volume() / self.temperature
            - 1.0 / self.pressure(Contributions::Total)
    }

    /// Partial derivative of the logarithm of the fugacity coefficient w.r.t. temperature:
    /// $\left(\frac{\partial\ln\varphi_i}{\partial T}\right)_{p,N_i}$
    pub fn dln_phi_dt(&self) -> Array1<f64> {
        let t = self.temperature;
        let mu_res = self.residual_chemical_potential();
        let vi = self.partial_molar_volume();
        let dp_dt = self.dp_dt(Contributions::Total);
        (self.dmu_res_dt() - mu_res / t - vi * dp_dt) / t + 1.0 / t
    }

    /// Partial derivative of the logarithm of the fugacity coefficient w.r.t. moles:
    /// $\left(\frac{\partial\ln\varphi_i}{\partial N_j}\right)_{T,p,N_k}$
    pub fn dln_phi_dnj(&self) -> Array2<f64> {
        let n = self.eos.components();
        let dmu_dni = self.dmu_res_dni();
        let dp_dni = self.dp_dni(Contributions::Total);
        let dp_dv = self.dp_dv(Contributions::Total);
        let dp_dn_2 = Array2::from_shape_fn((n, n), |(i, j)| dp_dni[i] * dp_dni[j]);
        (dmu_dni + dp_dn_2 / dp_dv) / self.temperature + 1.0 / self.total_moles
    }

    /// Residual Gibbs energy: $G^\mathrm{res}(T,p,\mathbf{n})=A^\mathrm{res}+pV-NT-NT \ln Z$
    pub fn residual_gibbs_energy(&self) -> f64 {
        self.pressure(Contributions::Residual) * self.volume + self.residual_helmholtz_energy()
            - self.total_moles
                * self.temperature
                * self.compressibility(Contributions::Total).ln()
    }

    /// Molar Gibbs energy $g=\frac{A+pV}{N}$ in Kelvin.
    pub fn molar_gibbs_energy(&self, contributions: Contributions) -> f64 {
        (self.helmholtz_energy(contributions) + self.pressure(contributions) * self.volume)
            / self.total_moles
    }

    /// Mass density in kg/m³.
    pub fn mass_density(&self) -> f64 {
        let molar_weight = (&self.molefracs * &self.eos.molar_weight()).sum();
        self.density * molar_weight / NAV * 1e27
    }
}
