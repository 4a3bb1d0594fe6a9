//! Derivative-free minimization of the estimator cost over a parameter
//! vector.
use super::{Estimator, EstimatorError};
use crate::equation_of_state::Residual;
use crate::errors::EosResult;
use crate::SolverOptions;
use ndarray::Array1;
use std::sync::Arc;

const MAX_ITER_FIT: usize = 500;
const TOL_FIT: f64 = 1e-10;
/// Objective value assigned to parameter vectors for which the model cannot
/// be constructed or evaluated.
const PENALTY_COST: f64 = 1e10;

/// Result of a parameter fit.
pub struct FitResult {
    /// Parameter vector with the lowest cost encountered.
    pub parameters: Array1<f64>,
    /// Sum of squared cost function entries at the solution.
    pub cost: f64,
    /// Number of simplex iterations.
    pub iterations: usize,
}

/// Fit model parameters to the data sets of an [Estimator] using the
/// Nelder-Mead simplex algorithm.
///
/// `build_eos` constructs the equation of state from a trial parameter
/// vector. Trial vectors for which the construction or the evaluation of
/// the cost function fails are assigned a high penalty value, so the
/// simplex moves away from them instead of aborting the fit. The result is
/// a local minimum, no global optimality is claimed.
pub fn fit<E: Residual, F>(
    estimator: &Estimator<E>,
    build_eos: F,
    initial: &Array1<f64>,
    options: SolverOptions,
) -> Result<FitResult, EstimatorError>
where
    F: Fn(&Array1<f64>) -> EosResult<Arc<E>>,
{
    let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_FIT, TOL_FIT);
    let n = initial.len();

    let objective = |x: &Array1<f64>| -> f64 {
        let Ok(eos) = build_eos(x) else {
            return PENALTY_COST;
        };
        match estimator.cost(&eos) {
            Ok(cost) => cost.mapv(|c| c * c).sum(),
            Err(_) => PENALTY_COST,
        }
    };

    // initial simplex: the starting point plus one perturbed point per
    // parameter
    let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((initial.clone(), objective(initial)));
    for i in 0..n {
        let mut x = initial.clone();
        if x[i] != 0.0 {
            x[i] *= 1.05;
        } else {
            x[i] = 2.5e-4;
        }
        let f = objective(&x);
        simplex.push((x, f));
    }

    log_iter!(verbosity, " iter |      cost      |  parameters");
    log_iter!(verbosity, "{:-<40}", "");

    let mut iterations = 0;
    for _ in 0..max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let f_best = simplex[0].1;
        let f_worst = simplex[n].1;
        log_iter!(
            verbosity,
            " {:4} | {:14.8e} | {:.8}",
            iterations,
            f_best,
            simplex[0].0
        );
        if (f_worst - f_best).abs() < tol * (1.0 + f_best.abs()) {
            break;
        }
        iterations += 1;

        // centroid of all points but the worst
        let mut centroid = Array1::zeros(n);
        for (x, _) in simplex[..n].iter() {
            centroid += x;
        }
        centroid /= n as f64;

        // reflection
        let reflected = &centroid * 2.0 - &simplex[n].0;
        let f_reflected = objective(&reflected);
        if f_reflected < f_best {
            // expansion
            let expanded = &centroid + &((&reflected - &centroid) * 2.0);
            let f_expanded = objective(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
            continue;
        }

        // contraction towards the better of the worst point and its
        // reflection
        let contracted = if f_reflected < simplex[n].1 {
            &centroid + &((&reflected - &centroid) * 0.5)
        } else {
            &centroid + &((&simplex[n].0 - &centroid) * 0.5)
        };
        let f_contracted = objective(&contracted);
        if f_contracted < simplex[n].1.min(f_reflected) {
            simplex[n] = (contracted, f_contracted);
            continue;
        }

        // shrink towards the best point
        let best = simplex[0].0.clone();
        for (x, f) in simplex[1..].iter_mut() {
            *x = &best + &((&*x - &best) * 0.5);
            *f = objective(x);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (parameters, cost) = simplex.swap_remove(0);
    log_result!(
        verbosity,
        "Nelder-Mead: cost {:.8e} after {} iteration(s)\n",
        cost,
        iterations
    );
    Ok(FitResult {
        parameters,
        cost,
        iterations,
    })
}
