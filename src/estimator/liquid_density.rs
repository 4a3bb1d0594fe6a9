use super::{DataSet, EstimatorError, Phase};
use crate::equation_of_state::Residual;
use crate::phase_equilibria::{PhaseEquilibrium, TPSpec};
use crate::state::State;
use crate::SolverOptions;
use ndarray::{arr1, Array1};
use std::collections::HashMap;
use std::sync::Arc;

/// Liquid mass density data as function of pressure and temperature.
#[derive(Clone)]
pub struct LiquidDensity {
    /// mass density
    pub target: Array1<f64>,
    /// temperature
    temperature: Array1<f64>,
    /// pressure
    pressure: Array1<f64>,
    /// phase used to initialize the density iteration
    phase: Phase,
}

impl LiquidDensity {
    /// A new data set for liquid densities with pressures and temperatures as input.
    ///
    /// The density iteration is initialized with the given [Phase], so the
    /// data set can also be used for (metastable) vapor densities.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        pressure: Array1<f64>,
        phase: Option<Phase>,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() || target.len() != pressure.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            target,
            temperature,
            pressure,
            phase: phase.unwrap_or(Phase::Liquid),
        })
    }

    /// Returns temperature of data points.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }

    /// Returns pressure of data points.
    pub fn pressure(&self) -> Array1<f64> {
        self.pressure.clone()
    }
}

impl<E: Residual> DataSet<E> for LiquidDensity {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "liquid density"
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature", "pressure"]
    }

    fn predict(&self, eos: &Arc<E>) -> Result<Array1<f64>, EstimatorError> {
        let moles = arr1(&[1.0]);
        Ok(self
            .temperature
            .iter()
            .zip(self.pressure.iter())
            .map(|(&t, &p)| {
                let state = State::new_npt(eos, t, p, &moles, self.phase.into());
                if let Ok(s) = state {
                    s.mass_density()
                } else {
                    f64::NAN
                }
            })
            .collect())
    }

    fn get_input(&self) -> HashMap<String, Array1<f64>> {
        let mut m = HashMap::with_capacity(2);
        m.insert("temperature".to_owned(), self.temperature());
        m.insert("pressure".to_owned(), self.pressure());
        m
    }
}

/// Saturated liquid density data as function of temperature.
#[derive(Clone)]
pub struct EquilibriumLiquidDensity {
    pub target: Array1<f64>,
    temperature: Array1<f64>,
    solver_options: SolverOptions,
}

impl EquilibriumLiquidDensity {
    /// A new data set for saturated liquid densities with temperatures as input.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        vle_options: Option<SolverOptions>,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            target,
            temperature,
            solver_options: vle_options.unwrap_or_default(),
        })
    }

    /// Returns temperature of data points.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }
}

impl<E: Residual> DataSet<E> for EquilibriumLiquidDensity {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "equilibrium liquid density"
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature"]
    }

    fn predict(&self, eos: &Arc<E>) -> Result<Array1<f64>, EstimatorError> {
        Ok(self
            .temperature
            .iter()
            .map(|&t| {
                if let Ok(vle) = PhaseEquilibrium::pure(
                    eos,
                    TPSpec::Temperature(t),
                    None,
                    self.solver_options,
                ) {
                    vle.liquid().mass_density()
                } else {
                    f64::NAN
                }
            })
            .collect())
    }

    fn get_input(&self) -> HashMap<String, Array1<f64>> {
        let mut m = HashMap::with_capacity(1);
        m.insert("temperature".to_owned(), self.temperature());
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saftvrmie::parameters::test_utils::test_parameters;
    use crate::saftvrmie::SaftVRMie;
    use approx::assert_relative_eq;

    #[test]
    fn phase_selects_the_density_root() {
        let mut p = test_parameters();
        let eos = Arc::new(SaftVRMie::new(Arc::new(p.remove("methane").unwrap())));

        // below the vapor pressure both a stable vapor and a metastable
        // liquid root exist
        let t = 110.0;
        let pressure = 0.5 * PhaseEquilibrium::vapor_pressure(&eos, t).remove(0).unwrap();
        let temperature = arr1(&[t]);
        let target = arr1(&[1.0]);

        let liquid = LiquidDensity::new(
            target.clone(),
            temperature.clone(),
            arr1(&[pressure]),
            None,
        )
        .unwrap();
        let vapor = LiquidDensity::new(
            target,
            temperature,
            arr1(&[pressure]),
            Some(Phase::Vapor),
        )
        .unwrap();

        let rho_l = DataSet::<SaftVRMie>::predict(&liquid, &eos).unwrap()[0];
        let rho_v = DataSet::<SaftVRMie>::predict(&vapor, &eos).unwrap()[0];
        assert!(rho_v < 0.1 * rho_l);

        let moles = arr1(&[1.0]);
        let state = State::new_npt(&eos, t, pressure, &moles, Phase::Liquid.into()).unwrap();
        assert_relative_eq!(rho_l, state.mass_density(), max_relative = 1e-12);
    }
}
