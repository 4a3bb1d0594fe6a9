use num_dual::linalg::LinAlgError;
use thiserror::Error;

/// Error type for improperly defined states and convergence problems.
#[derive(Error, Debug)]
pub enum EosError {
    #[error("{0}")]
    Error(String),
    #[error("`{solver}` did not converge within the maximum number of iterations. Last residual: {residual:?}")]
    NotConverged { solver: String, residual: Option<f64> },
    #[error("`{0}` encountered illegal values during the iteration.")]
    IterationFailed(String),
    #[error("Iteration resulted in trivial solution.")]
    TrivialSolution,
    #[error("Equation of state is initialized for {0} components while the input specifies {1} components.")]
    IncompatibleComponents(usize, usize),
    #[error("Invalid state in {0}: {1} = {2}.")]
    InvalidState(String, String, f64),
    #[error("Undetermined state: {0}.")]
    UndeterminedState(String),
    #[error("System is supercritical.")]
    SuperCritical,
    #[error("No phase split according to stability analysis.")]
    NoPhaseSplit,
    #[error(transparent)]
    ParameterError(#[from] ParameterError),
    #[error(transparent)]
    LinAlgError(#[from] LinAlgError),
}

impl EosError {
    /// Convergence failure without a recorded residual.
    pub fn not_converged(solver: &str) -> Self {
        Self::NotConverged {
            solver: solver.to_owned(),
            residual: None,
        }
    }

    /// Convergence failure carrying the last residual for diagnostics.
    pub fn not_converged_res(solver: &str, residual: f64) -> Self {
        Self::NotConverged {
            solver: solver.to_owned(),
            residual: Some(residual),
        }
    }
}

/// Error type for malformed parameter sets.
#[derive(Error, Debug)]
pub enum ParameterError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error("{0}")]
    IncompatibleParameters(String),
    #[error("component {0} not found in parameter file")]
    ComponentsNotFound(String),
}

/// Convenience type for `Result<T, EosError>`.
pub type EosResult<T> = Result<T, EosError>;
