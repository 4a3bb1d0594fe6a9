use crate::errors::{EosError, EosResult};
use crate::state::StateHD;
use ndarray::{Array1, ScalarOperand};
use num_dual::DualNum;
use std::sync::Arc;

/// A general equation of state.
pub trait Components {
    /// Return the number of components of the model.
    fn components(&self) -> usize;

    /// Return a model consisting of the components
    /// contained in component_list.
    fn subset(&self, component_list: &[usize]) -> Self;
}

/// A residual Helmholtz energy model.
pub trait Residual: Components + Send + Sync {
    /// Return the maximum density in Angstrom^-3.
    ///
    /// This value is used as an estimate for a liquid phase for phase
    /// equilibria and other iterations. It is not explicitly meant to
    /// be a mathematical limit for the density (if those exist in the
    /// equation of state anyways).
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64;

    /// Evaluate the reduced Helmholtz energy of each individual contribution
    /// and return them together with a string representation of the contribution.
    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy + ScalarOperand>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)>;

    /// Evaluate the residual reduced Helmholtz energy $\beta A^\mathrm{res}$.
    fn residual_helmholtz_energy<D: DualNum<f64> + Copy + ScalarOperand>(
        &self,
        state: &StateHD<D>,
    ) -> D {
        self.residual_helmholtz_energy_contributions(state)
            .iter()
            .fold(D::zero(), |acc, (_, a)| acc + *a)
    }

    /// Molar weight of all components in g/mol.
    fn molar_weight(&self) -> Array1<f64>;

    /// Check if the provided optional mole number is consistent with the
    /// equation of state.
    ///
    /// In general, the number of elements in `moles` needs to match the number
    /// of components of the equation of state. For a pure component, however,
    /// no moles need to be provided. In that case, it is set to unity.
    fn validate_moles(&self, moles: Option<&Array1<f64>>) -> EosResult<Array1<f64>> {
        let l = moles.map_or(1, |m| m.len());
        if self.components() == l {
            match moles {
                Some(m) => Ok(m.to_owned()),
                None => Ok(Array1::ones(1)),
            }
        } else {
            Err(EosError::IncompatibleComponents(self.components(), l))
        }
    }

    /// Calculate the maximum density in Angstrom^-3.
    ///
    /// This value is used as an estimate for a liquid phase for phase
    /// equilibria and other iterations. It is not explicitly meant to
    /// be a mathematical limit for the density (if those exist in the
    /// equation of state anyways).
    fn max_density(&self, moles: Option<&Array1<f64>>) -> EosResult<f64> {
        let m = self.validate_moles(moles)?;
        Ok(self.compute_max_density(&m))
    }
}

impl<E: Components> Components for Arc<E> {
    fn components(&self) -> usize {
        E::components(self)
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        Arc::new(E::subset(self, component_list))
    }
}

impl<E: Residual> Residual for Arc<E> {
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        E::compute_max_density(self, moles)
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy + ScalarOperand>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)> {
        E::residual_helmholtz_energy_contributions(self, state)
    }

    fn molar_weight(&self) -> Array1<f64> {
        E::molar_weight(self)
    }
}
