//! Utilities for fitting equation of state parameters to experimental data.
use crate::errors::EosError;
use crate::state::DensityInitialization;
use thiserror::Error;

mod dataset;
pub use dataset::DataSet;
mod estimator;
pub use estimator::Estimator;
mod loss;
pub use loss::Loss;
mod fit;
pub use fit::{fit, FitResult};

// Properties
mod vapor_pressure;
pub use vapor_pressure::VaporPressure;
mod liquid_density;
pub use liquid_density::{EquilibriumLiquidDensity, LiquidDensity};
mod surface_tension;
pub use surface_tension::SurfaceTension;

/// Different phases of experimental data points.
#[derive(Clone, Copy)]
pub enum Phase {
    Vapor,
    Liquid,
}

impl From<Phase> for DensityInitialization {
    fn from(value: Phase) -> Self {
        match value {
            Phase::Liquid => DensityInitialization::Liquid,
            Phase::Vapor => DensityInitialization::Vapor,
        }
    }
}

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("Input has not the same amount of data as the target.")]
    IncompatibleInput,
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    EosError(#[from] EosError),
}
