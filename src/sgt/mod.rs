//! Interfacial properties from square gradient theory.
//!
//! The excess Helmholtz energy of a planar interface is approximated by the
//! local Helmholtz energy density plus a square gradient correction with the
//! influence parameters $c_{ij}$. For pure fluids the resulting boundary
//! value problem has a closed-form solution, for mixtures it is solved by
//! orthogonal collocation.
use crate::equation_of_state::Residual;
use crate::errors::EosResult;
use crate::phase_equilibria::PhaseEquilibrium;
use crate::SolverOptions;
use ndarray::{Array1, Array2};

mod coloc;
mod influence;
mod pure;

pub use coloc::SgtSolver;
pub use influence::InfluenceParameters;
pub use pure::surface_tension_pure;

/// Density profile across a planar interface together with the surface
/// tension evaluated from it.
pub struct SurfaceTensionProfile {
    /// Position in Å, shifted so that the equimolar surface lies at $z=0$.
    pub z: Array1<f64>,
    /// Partial densities at every grid point in Å⁻³ (component x node).
    pub density: Array2<f64>,
    /// Surface tension in K Å⁻².
    pub surface_tension: f64,
    /// Interfacial width in Å.
    pub interfacial_width: f64,
    /// Newton iterations spent in the boundary value problem. Zero for the
    /// closed-form pure-component path.
    pub iterations: usize,
}

/// Surface tension of a phase equilibrium.
///
/// Dispatches to the closed-form quadrature for pure fluids and to the
/// collocation solver for mixtures.
pub fn surface_tension<E: Residual>(
    vle: &PhaseEquilibrium<E>,
    influence: &InfluenceParameters,
    n_grid: usize,
    options: SolverOptions,
) -> EosResult<SurfaceTensionProfile> {
    if vle.vapor().eos.components() == 1 {
        pure::surface_tension_pure(vle, influence, n_grid)
    } else {
        let mut solver = SgtSolver::new(vle.vapor().eos.components(), n_grid);
        solver.solve(vle, influence, None, options)
    }
}
