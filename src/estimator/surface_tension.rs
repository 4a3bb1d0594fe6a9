use super::{DataSet, EstimatorError};
use crate::phase_equilibria::{PhaseEquilibrium, TPSpec};
use crate::saftvrmie::SaftVRMie;
use crate::sgt::{surface_tension_pure, InfluenceParameters};
use crate::SolverOptions;
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::Arc;

/// Store experimental surface tension data of pure fluids.
///
/// The forward model is square gradient theory with influence parameters
/// taken from the equation of state parameters, so this data set is specific
/// to SAFT-VR Mie.
#[derive(Clone)]
pub struct SurfaceTension {
    pub target: Array1<f64>,
    temperature: Array1<f64>,
    n_grid: usize,
    solver_options: SolverOptions,
}

impl SurfaceTension {
    /// Create a new data set for surface tension with temperatures as input.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        n_grid: usize,
        solver_options: Option<SolverOptions>,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            target,
            temperature,
            n_grid,
            solver_options: solver_options.unwrap_or_default(),
        })
    }

    /// Return temperature.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }
}

impl DataSet<SaftVRMie> for SurfaceTension {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "surface tension"
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature"]
    }

    fn predict(&self, eos: &Arc<SaftVRMie>) -> Result<Array1<f64>, EstimatorError> {
        let influence = InfluenceParameters::new(&eos.parameters);
        Ok(self
            .temperature
            .iter()
            .map(|&t| {
                PhaseEquilibrium::pure(eos, TPSpec::Temperature(t), None, self.solver_options)
                    .and_then(|vle| surface_tension_pure(&vle, &influence, self.n_grid))
                    .map(|profile| profile.surface_tension)
                    .unwrap_or(f64::NAN)
            })
            .collect())
    }

    fn get_input(&self) -> HashMap<String, Array1<f64>> {
        let mut m = HashMap::with_capacity(1);
        m.insert("temperature".to_owned(), self.temperature());
        m
    }
}
