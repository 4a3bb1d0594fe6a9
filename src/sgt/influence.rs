use crate::errors::{EosResult, ParameterError};
use crate::saftvrmie::SaftVRMieParameters;
use ndarray::{Array1, Array2};

/// Influence parameters for square gradient theory.
///
/// Each component carries a polynomial $c_i(T)=\sum_k c_{i,k}T^k$ in units of
/// K Å⁵. Cross parameters follow from the mixing rule
/// $c_{ij}=(1-\beta_{ij})\sqrt{c_ic_j}$.
pub struct InfluenceParameters {
    coefficients: Vec<Array1<f64>>,
    beta_ij: Array2<f64>,
}

impl InfluenceParameters {
    /// Build influence parameters from a SAFT-VR Mie parameter set.
    ///
    /// Components without a tabulated influence parameter fall back to the
    /// corresponding states correlation.
    pub fn new(parameters: &SaftVRMieParameters) -> Self {
        let n = parameters.m.len();
        let coefficients = (0..n)
            .map(|i| match &parameters.pure_records[i].model_record.cii {
                Some(cii) => Array1::from_vec(cii.clone()),
                None => Array1::from_vec(vec![Self::cii_correlation(parameters, i)]),
            })
            .collect();
        Self {
            coefficients,
            beta_ij: Array2::zeros((n, n)),
        }
    }

    /// Set the binary correction parameters $\beta_{ij}$.
    ///
    /// The matrix has to be symmetric with zero diagonal.
    pub fn with_binary(mut self, beta_ij: Array2<f64>) -> EosResult<Self> {
        let n = self.coefficients.len();
        if beta_ij.shape() != [n, n] {
            return Err(ParameterError::IncompatibleParameters(format!(
                "expected a {n}x{n} beta matrix, got {:?}",
                beta_ij.shape()
            ))
            .into());
        }
        for i in 0..n {
            if beta_ij[[i, i]] != 0.0 {
                return Err(ParameterError::IncompatibleParameters(
                    "binary influence corrections must have zero diagonal".into(),
                )
                .into());
            }
            for j in 0..i {
                if beta_ij[[i, j]] != beta_ij[[j, i]] {
                    return Err(ParameterError::IncompatibleParameters(format!(
                        "binary influence correction between components {j} and {i} is not symmetric"
                    ))
                    .into());
                }
            }
        }
        self.beta_ij = beta_ij;
        Ok(self)
    }

    /// Corresponding states correlation for the influence parameter of
    /// coarse-grained Mie fluids in K Å⁵.
    pub fn cii_correlation(parameters: &SaftVRMieParameters, component: usize) -> f64 {
        let m = parameters.m[component];
        let sigma = parameters.sigma[component];
        let epsilon_k = parameters.epsilon_k[component];
        let alpha = parameters.alpha_ij[[component, component]];
        let cii = m
            * (0.12008072630855947 + 2.2197907527439655 * alpha)
            * (epsilon_k * sigma.powi(5)).sqrt();
        cii.powi(2)
    }

    /// Influence parameter of a single component at the given temperature.
    pub fn component(&self, i: usize, temperature: f64) -> f64 {
        self.coefficients[i]
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * temperature + c)
    }

    /// Fill a caller-owned matrix with the cross influence parameters at the
    /// given temperature. Does not allocate.
    pub fn matrix_into(&self, temperature: f64, c: &mut Array2<f64>) {
        let n = self.coefficients.len();
        for i in 0..n {
            c[[i, i]] = self.component(i, temperature);
        }
        for i in 0..n {
            for j in 0..i {
                let cij = (1.0 - self.beta_ij[[i, j]]) * (c[[i, i]] * c[[j, j]]).sqrt();
                c[[i, j]] = cij;
                c[[j, i]] = cij;
            }
        }
    }

    /// Cross influence parameter matrix at the given temperature.
    pub fn matrix(&self, temperature: f64) -> Array2<f64> {
        let n = self.coefficients.len();
        let mut c = Array2::zeros((n, n));
        self.matrix_into(temperature, &mut c);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saftvrmie::parameters::test_utils::test_parameters;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn correlation_matches_closed_form() {
        let p = test_parameters();
        let hexane = &p["hexane"];
        let m = hexane.m[0];
        let alpha = hexane.alpha_ij[[0, 0]];
        let cii = InfluenceParameters::cii_correlation(hexane, 0);
        let expected = (m * (0.12008072630855947 + 2.2197907527439655 * alpha)).powi(2)
            * hexane.epsilon_k[0]
            * hexane.sigma[0].powi(5);
        assert_relative_eq!(cii, expected, max_relative = 1e-14);
        assert!(cii > 0.0);
    }

    #[test]
    fn polynomial_in_temperature() {
        let p = test_parameters();
        let mut influence = InfluenceParameters::new(&p["methane"]);
        influence.coefficients[0] = Array1::from_vec(vec![100.0, 2.0, 0.03]);
        let t = 150.0;
        assert_relative_eq!(
            influence.component(0, t),
            100.0 + 2.0 * t + 0.03 * t * t,
            max_relative = 1e-14
        );
    }

    fn binary_parameters() -> SaftVRMieParameters {
        let p = test_parameters();
        SaftVRMieParameters::new_binary(
            vec![
                p["methane"].pure_records[0].clone(),
                p["ethane"].pure_records[0].clone(),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn mixing_rule() -> EosResult<()> {
        let binary = binary_parameters();
        let beta = 0.05;
        let influence = InfluenceParameters::new(&binary)
            .with_binary(arr2(&[[0.0, beta], [beta, 0.0]]))?;
        let c = influence.matrix(200.0);
        assert_relative_eq!(
            c[[0, 1]],
            (1.0 - beta) * (c[[0, 0]] * c[[1, 1]]).sqrt(),
            max_relative = 1e-14
        );
        assert_relative_eq!(c[[0, 1]], c[[1, 0]], max_relative = 1e-14);
        Ok(())
    }

    #[test]
    fn asymmetric_binary_is_rejected() {
        let binary = binary_parameters();
        let res = InfluenceParameters::new(&binary)
            .with_binary(arr2(&[[0.0, 0.05], [0.02, 0.0]]));
        assert!(res.is_err());
    }
}
