//! Vapor-liquid equilibria of pure fluids and mixtures.
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, DensityInitialization, State};
use ndarray::Array1;
use std::fmt;
use std::sync::Arc;

mod bubble_dew;
mod stability_analysis;
mod tp_flash;
mod vle_pure;

/// Specification of either a temperature or a pressure for phase
/// equilibrium calculations.
#[derive(Clone, Copy, Debug)]
pub enum TPSpec {
    /// Temperature in Kelvin
    Temperature(f64),
    /// Pressure in K Angstrom^-3
    Pressure(f64),
}

impl fmt::Display for TPSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature(t) => write!(f, "T = {t} K"),
            Self::Pressure(p) => write!(f, "p = {p} K/Å³"),
        }
    }
}

/// A thermodynamic two phase equilibrium state.
///
/// The first state is the vapor phase, the second the liquid phase.
#[derive(Debug)]
pub struct PhaseEquilibrium<E>([State<E>; 2]);

impl<E> Clone for PhaseEquilibrium<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E: Residual> fmt::Display for PhaseEquilibrium<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            writeln!(f, "phase {}: {}", i, s)?;
        }
        Ok(())
    }
}

impl<E: Residual> PhaseEquilibrium<E> {
    pub fn vapor(&self) -> &State<E> {
        &self.0[0]
    }

    pub fn liquid(&self) -> &State<E> {
        &self.0[1]
    }

    pub(crate) fn from_states(state1: State<E>, state2: State<E>) -> Self {
        let (vapor, liquid) = if state1.density < state2.density {
            (state1, state2)
        } else {
            (state2, state1)
        };
        Self([vapor, liquid])
    }

    /// Creates a new PhaseEquilibrium that contains two states at the
    /// specified temperature, pressure and moles.
    ///
    /// The constructor can be used in custom phase equilibrium solvers or,
    /// e.g., to generate initial guesses for an actual VLE solver.
    /// In general, the two states generated are NOT in an equilibrium.
    pub fn new_npt(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        vapor_moles: &Array1<f64>,
        liquid_moles: &Array1<f64>,
    ) -> EosResult<Self> {
        let liquid = State::new_npt(
            eos,
            temperature,
            pressure,
            liquid_moles,
            DensityInitialization::Liquid,
        )?;
        let vapor = State::new_npt(
            eos,
            temperature,
            pressure,
            vapor_moles,
            DensityInitialization::Vapor,
        )?;
        Ok(Self([vapor, liquid]))
    }

    pub(crate) fn vapor_phase_fraction(&self) -> f64 {
        self.vapor().total_moles / (self.vapor().total_moles + self.liquid().total_moles)
    }

    pub(crate) fn update_pressure(mut self, temperature: f64, pressure: f64) -> EosResult<Self> {
        for s in self.0.iter_mut() {
            *s = State::new_npt(
                &s.eos,
                temperature,
                pressure,
                &s.moles,
                DensityInitialization::InitialDensity(s.density),
            )?;
        }
        Ok(self)
    }

    pub(crate) fn update_moles(
        &mut self,
        pressure: f64,
        moles: [&Array1<f64>; 2],
    ) -> EosResult<()> {
        for (i, s) in self.0.iter_mut().enumerate() {
            *s = State::new_npt(
                &s.eos,
                s.temperature,
                pressure,
                moles[i],
                DensityInitialization::InitialDensity(s.density),
            )?;
        }
        Ok(())
    }

    pub(crate) fn total_gibbs_energy(&self) -> f64 {
        self.0.iter().fold(0.0, |acc, s| {
            acc + s.helmholtz_energy(Contributions::Total)
                + s.pressure(Contributions::Total) * s.volume
        })
    }
}

const TRIVIAL_REL_DEVIATION: f64 = 1e-5;

/// # Utility functions
impl<E: Residual> PhaseEquilibrium<E> {
    pub(crate) fn check_trivial_solution(self) -> EosResult<Self> {
        if Self::is_trivial_solution(self.vapor(), self.liquid()) {
            Err(EosError::TrivialSolution)
        } else {
            Ok(self)
        }
    }

    /// Check if the two states form a trivial solution
    pub fn is_trivial_solution(state1: &State<E>, state2: &State<E>) -> bool {
        state1
            .partial_density
            .iter()
            .zip(state2.partial_density.iter())
            .fold(0.0, |acc: f64, (&rho1, &rho2)| {
                (rho2 / rho1 - 1.0).abs().max(acc)
            })
            < TRIVIAL_REL_DEVIATION
    }
}
