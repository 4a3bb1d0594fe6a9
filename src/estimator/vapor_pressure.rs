use super::{DataSet, EstimatorError};
use crate::equation_of_state::Residual;
use crate::phase_equilibria::{PhaseEquilibrium, TPSpec};
use crate::state::{Contributions, State};
use crate::SolverOptions;
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::Arc;

/// Store experimental vapor pressure data.
#[derive(Clone)]
pub struct VaporPressure {
    pub target: Array1<f64>,
    temperature: Array1<f64>,
    max_temperature: f64,
    datapoints: usize,
    extrapolate: bool,
}

impl VaporPressure {
    /// Create a new data set for vapor pressure.
    ///
    /// If the equation of state fails to compute the vapor pressure
    /// (e.g. when it underestimates the critical point) the vapor
    /// pressure can be estimated.
    /// If `extrapolate` is `true`, the vapor pressure is estimated by
    /// calculating the slope of ln(p) over 1/T.
    /// If `extrapolate` is `false`, it is set to `NAN`.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        extrapolate: bool,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        let datapoints = target.len();
        let max_temperature = temperature.fold(0.0f64, |a, &b| a.max(b));
        Ok(Self {
            target,
            temperature,
            max_temperature,
            datapoints,
            extrapolate,
        })
    }

    /// Return temperature.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }
}

impl<E: Residual> DataSet<E> for VaporPressure {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "vapor pressure"
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature"]
    }

    fn predict(&self, eos: &Arc<E>) -> Result<Array1<f64>, EstimatorError> {
        let critical_point = State::critical_point(
            eos,
            None,
            Some(self.max_temperature),
            SolverOptions::default(),
        )?;
        let tc = critical_point.temperature;
        let pc = critical_point.pressure(Contributions::Total);

        // slope of ln(p) over 1/T between 0.9 Tc and Tc
        let t0 = 0.9 * tc;
        let p0 = PhaseEquilibrium::pure(
            eos,
            TPSpec::Temperature(t0),
            None,
            SolverOptions::default(),
        )?
        .vapor()
        .pressure(Contributions::Total);
        let b = (pc / p0).ln() / (1.0 / tc - 1.0 / t0);
        let a = pc.ln() - b / tc;

        let mut prediction = Array1::zeros(self.datapoints);
        for i in 0..self.datapoints {
            let t = self.temperature[i];
            if let Some(pvap) = PhaseEquilibrium::vapor_pressure(eos, t)[0] {
                prediction[i] = pvap;
            } else if self.extrapolate {
                prediction[i] = (a + b / t).exp();
            } else {
                prediction[i] = f64::NAN;
            }
        }
        Ok(prediction)
    }

    fn get_input(&self) -> HashMap<String, Array1<f64>> {
        let mut m = HashMap::with_capacity(1);
        m.insert("temperature".to_owned(), self.temperature());
        m
    }
}
