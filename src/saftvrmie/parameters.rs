use crate::errors::ParameterError;
use ndarray::{Array, Array1, Array2};
use num_dual::DualNum;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 10-point Gauss-Legendre quadrature [position, weight]
const GLQ10: [[f64; 2]; 10] = [
    [-0.1488743389816312, 0.2955242247147529],
    [0.1488743389816312, 0.2955242247147529],
    [-0.4333953941292472, 0.2692667193099963],
    [0.4333953941292472, 0.2692667193099963],
    [-0.6794095682990244, 0.219086362515982],
    [0.6794095682990244, 0.219086362515982],
    [-0.8650633666889845, 0.1494513491505806],
    [0.8650633666889845, 0.1494513491505806],
    [-0.9739065285171717, 0.0666713443086881],
    [0.9739065285171717, 0.0666713443086881],
];

/// SAFT-VR Mie pure-component parameters.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct SaftVRMieRecord {
    /// Segment number
    pub m: f64,
    /// Segment diameter in units of Angstrom
    pub sigma: f64,
    /// Energetic parameter in units of Kelvin
    pub epsilon_k: f64,
    /// Repulsive Mie exponent
    pub lr: f64,
    /// Attractive Mie exponent
    pub la: f64,
    /// Influence parameter for square gradient theory in K Angstrom^5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cii: Option<Vec<f64>>,
}

impl SaftVRMieRecord {
    pub fn new(m: f64, sigma: f64, epsilon_k: f64, lr: f64, la: f64, cii: Option<Vec<f64>>) -> Self {
        Self {
            m,
            sigma,
            epsilon_k,
            lr,
            la,
            cii,
        }
    }

    /// A record without an influence parameter.
    pub fn new_simple(m: f64, sigma: f64, epsilon_k: f64, lr: f64, la: f64) -> Self {
        Self::new(m, sigma, epsilon_k, lr, la, None)
    }
}

impl std::fmt::Display for SaftVRMieRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SaftVRMieRecord(m={}", self.m)?;
        write!(f, ", sigma={}", self.sigma)?;
        write!(f, ", epsilon_k={}", self.epsilon_k)?;
        write!(f, ", lr={}", self.lr)?;
        write!(f, ", la={}", self.la)?;
        if let Some(cii) = &self.cii {
            write!(f, ", cii={:?}", cii)?;
        }
        write!(f, ")")
    }
}

/// SAFT-VR Mie binary interaction parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Default)]
pub struct SaftVRMieBinaryRecord {
    /// Binary dispersion energy interaction parameter
    #[serde(default)]
    pub k_ij: f64,
    /// Binary interaction parameter for the repulsive exponent
    #[serde(default)]
    pub gamma_ij: f64,
}

impl From<f64> for SaftVRMieBinaryRecord {
    fn from(k_ij: f64) -> Self {
        Self {
            k_ij,
            gamma_ij: f64::default(),
        }
    }
}

/// A pure component record together with its identifier and molar weight.
#[derive(Serialize, Deserialize, Clone)]
pub struct PureRecord {
    /// Component name used for lookups in parameter files
    pub name: String,
    /// Molar weight in g/mol
    pub molarweight: f64,
    #[serde(flatten)]
    pub model_record: SaftVRMieRecord,
}

impl PureRecord {
    pub fn new(name: &str, molarweight: f64, model_record: SaftVRMieRecord) -> Self {
        Self {
            name: name.to_owned(),
            molarweight,
            model_record,
        }
    }
}

/// Parameter set required for the SAFT-VR Mie equation of state.
pub struct SaftVRMieParameters {
    pub molarweight: Array1<f64>,
    pub m: Array1<f64>,
    pub sigma: Array1<f64>,
    pub epsilon_k: Array1<f64>,
    pub lr: Array1<f64>,
    pub la: Array1<f64>,
    pub sigma_ij: Array2<f64>,
    pub epsilon_k_ij: Array2<f64>,
    pub lr_ij: Array2<f64>,
    pub la_ij: Array2<f64>,
    pub c_ij: Array2<f64>,
    pub alpha_ij: Array2<f64>,
    pub pure_records: Vec<PureRecord>,
    pub binary_records: Option<Array2<SaftVRMieBinaryRecord>>,
}

impl SaftVRMieParameters {
    /// Creates parameters from records for pure substances and possibly binary parameters.
    pub fn from_records(
        pure_records: Vec<PureRecord>,
        binary_records: Option<Array2<SaftVRMieBinaryRecord>>,
    ) -> Result<Self, ParameterError> {
        let n = pure_records.len();

        if let Some(br) = &binary_records {
            if br.shape() != [n, n] {
                return Err(ParameterError::IncompatibleParameters(format!(
                    "binary interaction matrix has shape {:?} for {} components",
                    br.shape(),
                    n
                )));
            }
            for i in 0..n {
                for j in 0..n {
                    if (br[[i, j]].k_ij - br[[j, i]].k_ij).abs() > f64::EPSILON
                        || (br[[i, j]].gamma_ij - br[[j, i]].gamma_ij).abs() > f64::EPSILON
                    {
                        return Err(ParameterError::IncompatibleParameters(String::from(
                            "binary interaction matrix is not symmetric",
                        )));
                    }
                }
            }
        }

        let mut molarweight = Array::zeros(n);
        let mut m = Array::zeros(n);
        let mut sigma = Array::zeros(n);
        let mut epsilon_k = Array::zeros(n);
        let mut lr = Array::zeros(n);
        let mut la = Array::zeros(n);

        for (i, record) in pure_records.iter().enumerate() {
            let r = &record.model_record;
            m[i] = r.m;
            sigma[i] = r.sigma;
            epsilon_k[i] = r.epsilon_k;
            lr[i] = r.lr;
            la[i] = r.la;
            molarweight[i] = record.molarweight;
        }

        let mut sigma_ij = Array::zeros((n, n));
        let mut epsilon_k_ij = Array::zeros((n, n));
        let mut lr_ij = Array::zeros((n, n));
        let mut la_ij = Array::zeros((n, n));
        let mut c_ij = Array::zeros((n, n));
        let mut alpha_ij = Array::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                let (k_ij, gamma_ij) = binary_records
                    .as_ref()
                    .map_or((0.0, 0.0), |br| (br[[i, j]].k_ij, br[[i, j]].gamma_ij));
                sigma_ij[[i, j]] = 0.5 * (sigma[i] + sigma[j]);
                epsilon_k_ij[[i, j]] = (1.0 - k_ij)
                    * (sigma[i].powi(3) * sigma[j].powi(3)).sqrt()
                    / sigma_ij[[i, j]].powi(3)
                    * (epsilon_k[i] * epsilon_k[j]).sqrt();
                lr_ij[[i, j]] = (1.0 - gamma_ij) * ((lr[i] - 3.0) * (lr[j] - 3.0)).sqrt() + 3.0;
                la_ij[[i, j]] = ((la[i] - 3.0) * (la[j] - 3.0)).sqrt() + 3.0;
                c_ij[[i, j]] = lr_ij[[i, j]] / (lr_ij[[i, j]] - la_ij[[i, j]])
                    * (lr_ij[[i, j]] / la_ij[[i, j]])
                        .powf(la_ij[[i, j]] / (lr_ij[[i, j]] - la_ij[[i, j]]));
                alpha_ij[[i, j]] =
                    c_ij[[i, j]] * ((la_ij[[i, j]] - 3.0).recip() - (lr_ij[[i, j]] - 3.0).recip())
            }
        }

        Ok(Self {
            molarweight,
            m,
            sigma,
            epsilon_k,
            lr,
            la,
            sigma_ij,
            epsilon_k_ij,
            lr_ij,
            la_ij,
            c_ij,
            alpha_ij,
            pure_records,
            binary_records,
        })
    }

    /// Creates parameters for a pure component from a pure record.
    pub fn new_pure(pure_record: PureRecord) -> Result<Self, ParameterError> {
        Self::from_records(vec![pure_record], None)
    }

    /// Creates parameters for a binary system from pure records and an optional
    /// binary interaction parameter.
    pub fn new_binary(
        pure_records: Vec<PureRecord>,
        binary_record: Option<SaftVRMieBinaryRecord>,
    ) -> Result<Self, ParameterError> {
        let binary_records = binary_record.map(|br| {
            Array2::from_shape_fn([2, 2], |(i, j)| {
                if i == j {
                    SaftVRMieBinaryRecord::default()
                } else {
                    br
                }
            })
        });
        Self::from_records(pure_records, binary_records)
    }

    /// Creates parameters from a json parameter file by searching
    /// for the given substance names.
    pub fn from_json<P: AsRef<Path>>(
        components: Vec<&str>,
        file: P,
        binary_record: Option<SaftVRMieBinaryRecord>,
    ) -> Result<Self, ParameterError> {
        let reader = BufReader::new(File::open(file)?);
        let records: Vec<PureRecord> = serde_json::from_reader(reader)?;
        let pure_records = components
            .iter()
            .map(|&name| {
                records
                    .iter()
                    .find(|r| r.name == name)
                    .cloned()
                    .ok_or_else(|| ParameterError::ComponentsNotFound(name.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match (pure_records.len(), binary_record) {
            (2, Some(br)) => Self::new_binary(pure_records, Some(br)),
            (_, None) => Self::from_records(pure_records, None),
            _ => Err(ParameterError::IncompatibleParameters(String::from(
                "binary interaction parameters require exactly two components",
            ))),
        }
    }

    /// Return parameters for the subset of components in `component_list`.
    pub fn subset(&self, component_list: &[usize]) -> Self {
        let pure_records = component_list
            .iter()
            .map(|&i| self.pure_records[i].clone())
            .collect();
        let binary_records = self.binary_records.as_ref().map(|br| {
            Array2::from_shape_fn(
                [component_list.len(); 2],
                |(i, j)| br[[component_list[i], component_list[j]]],
            )
        });
        // the full records were validated on construction
        Self::from_records(pure_records, binary_records)
            .unwrap_or_else(|_| unreachable!("subset of valid parameters"))
    }
}

impl SaftVRMieParameters {
    /// Temperature dependent hard-sphere diameter $d_{ij}$ of the pair `(i,j)`.
    ///
    /// Integration of the Mie Boltzmann factor with a 10-point Gauss-Legendre
    /// quadrature between the lower integration limit and sigma.
    #[inline]
    pub fn hs_diameter_ij<D: DualNum<f64> + Copy>(
        &self,
        i: usize,
        j: usize,
        inverse_temperature: D,
    ) -> D {
        let lr = self.lr_ij[[i, j]];
        let la = self.la_ij[[i, j]];
        let c_eps_t = inverse_temperature * self.c_ij[[i, j]] * self.epsilon_k_ij[[i, j]];

        // perform integration in reduced distances, then multiply sigma
        let r0 = lower_integral_limit(la, lr, c_eps_t);
        let width = (-r0 + 1.0) * 0.5;
        GLQ10.iter().fold(r0, |d, &[x, w]| {
            let r = width * x + width + r0;
            let u = beta_u_mie(r, la, lr, 1.0, c_eps_t);
            let f_u = -(-u).exp_m1();
            d + width * f_u * w
        }) * self.sigma_ij[[i, j]]
    }

    /// The temperature dependent hard-sphere diameters of every component.
    pub fn hs_diameter<D: DualNum<f64> + Copy>(&self, temperature: D) -> Array1<D> {
        let t_inv = temperature.recip();
        Array1::from_shape_fn(self.m.len(), |i| self.hs_diameter_ij(i, i, t_inv))
    }
}

/// Find the lower limit for the integration of the temperature dependent diameter.
///
/// Method of Aasen et al. with the starting value proposed in Clapeyron.jl.
fn lower_integral_limit<D: DualNum<f64> + Copy>(la: f64, lr: f64, c_eps_t: D) -> D {
    // initial value from repulsive contribution
    let k = (-c_eps_t.recip() * f64::EPSILON.ln()).ln();
    let mut r = (-k / lr).exp();
    // Halley's method
    for _ in 1..5 {
        let [u, u_du, du_d2u] = mie_potential_halley(r, la, lr, c_eps_t);
        let dr = u_du / (-u_du / du_d2u * 0.5 + 1.0);
        if u.re() < 0.0 {
            return r;
        }
        r -= dr;
    }
    r
}

/// Calculate the fractions f / df and df / d2f used for Halley's method.
///
/// f is the function to find the root of.
/// Here, f = -beta u_mie(r) - ln(EPS)
#[inline]
fn mie_potential_halley<D: DualNum<f64> + Copy>(r: D, la: f64, lr: f64, c_eps_t: D) -> [D; 3] {
    let ri = r.recip();
    let plr = ri.powf(lr);
    let pla = ri.powf(la);
    let u = plr - pla;
    let dplr = plr * (-lr) * ri;
    let dpla = pla * (-la) * ri;
    let du_dr = dplr - dpla;
    let d2u_dr2 = (dplr * (-lr - 1.0) - dpla * (-la - 1.0)) * ri;

    let f = -c_eps_t * u - f64::EPSILON.ln();
    let df = -c_eps_t * du_dr;
    let d2f = -c_eps_t * d2u_dr2;
    [f, f / df, df / d2f]
}

/// Dimensionless Mie potential (divided by kT)
#[inline]
fn beta_u_mie<D: DualNum<f64> + Copy>(r: D, la: f64, lr: f64, sigma: f64, c_eps_t: D) -> D {
    let ri = r.recip() * sigma;
    (ri.powf(lr) - ri.powf(la)) * c_eps_t
}

/// Utilities for running tests
#[doc(hidden)]
pub mod test_utils {
    use super::*;
    use std::collections::HashMap;

    /// Parameters from Lafitte et al. (2013)
    pub fn test_parameters() -> HashMap<&'static str, SaftVRMieParameters> {
        let mut parameters = HashMap::new();
        let mut insert = |name: &'static str, molarweight, record| {
            parameters.insert(
                name,
                SaftVRMieParameters::new_pure(PureRecord::new(name, molarweight, record)).unwrap(),
            );
        };

        insert(
            "methane",
            16.031,
            SaftVRMieRecord::new_simple(1.0, 3.7412, 153.36, 12.65, 6.0),
        );
        insert(
            "ethane",
            30.047,
            SaftVRMieRecord::new_simple(1.4373, 3.7257, 206.12, 12.4, 6.0),
        );
        insert(
            "propane",
            44.063,
            SaftVRMieRecord::new_simple(1.6845, 3.9056, 239.89, 13.006, 6.0),
        );
        insert(
            "n-butane",
            58.078,
            SaftVRMieRecord::new_simple(1.8514, 4.0887, 273.64, 13.65, 6.0),
        );
        insert(
            "pentane",
            72.094,
            SaftVRMieRecord::new_simple(1.9606, 4.2928, 321.94, 15.847, 6.0),
        );
        insert(
            "hexane",
            86.11,
            SaftVRMieRecord::new_simple(2.1097, 4.423, 354.38, 17.203, 6.0),
        );
        insert(
            "heptane",
            100.125,
            SaftVRMieRecord::new_simple(2.3949, 4.4282, 358.51, 17.092, 6.0),
        );
        insert(
            "octane",
            114.141,
            SaftVRMieRecord::new_simple(2.6253, 4.4696, 369.18, 17.378, 6.0),
        );
        insert(
            "nonane",
            128.157,
            SaftVRMieRecord::new_simple(2.8099, 4.5334, 387.55, 18.324, 6.0),
        );
        insert(
            "decane",
            142.172,
            SaftVRMieRecord::new_simple(2.9976, 4.589, 400.79, 18.885, 6.0),
        );
        insert(
            "dodecane",
            170.203,
            SaftVRMieRecord::new_simple(3.2519, 4.7484, 437.72, 20.862, 6.0),
        );
        insert(
            "pentadecane",
            212.25,
            SaftVRMieRecord::new_simple(3.9325, 4.7738, 444.51, 20.822, 6.0),
        );
        insert(
            "eicosane",
            282.329,
            SaftVRMieRecord::new_simple(4.8794, 4.8788, 475.76, 22.926, 6.0),
        );
        insert(
            "tetrafluoromethane",
            87.994,
            SaftVRMieRecord::new_simple(1.0, 4.3372, 232.62, 42.553, 5.1906),
        );
        insert(
            "hexafluoroethane",
            137.99,
            SaftVRMieRecord::new_simple(1.8529, 3.9336, 211.46, 19.192, 5.7506),
        );
        insert(
            "perfluoropropane",
            187.987,
            SaftVRMieRecord::new_simple(1.9401, 4.2983, 263.26, 22.627, 5.7506),
        );
        insert(
            "perfluorobutane",
            237.984,
            SaftVRMieRecord::new_simple(2.1983, 4.4495, 290.49, 24.761, 5.7506),
        );
        insert(
            "perfluoropentane",
            287.981,
            SaftVRMieRecord::new_simple(2.3783, 4.6132, 328.56, 29.75, 5.7506),
        );
        insert(
            "perfluorohexane",
            337.978,
            SaftVRMieRecord::new_simple(2.5202, 4.7885, 349.3, 30.741, 5.7506),
        );
        insert(
            "fluorine",
            37.997,
            SaftVRMieRecord::new_simple(1.3211, 2.9554, 96.268, 11.606, 6.0),
        );
        insert(
            "carbon dioxide",
            43.99,
            SaftVRMieRecord::new_simple(1.5, 3.1916, 231.88, 27.557, 5.1646),
        );
        insert(
            "benzene",
            78.047,
            SaftVRMieRecord::new_simple(1.9163, 4.0549, 372.59, 14.798, 6.0),
        );
        insert(
            "toluene",
            92.063,
            SaftVRMieRecord::new_simple(1.9977, 4.2777, 409.73, 16.334, 6.0),
        );

        parameters
    }
}

#[cfg(test)]
mod test {
    use super::test_utils::test_parameters;
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::Dual2;

    #[test]
    fn test_mie_potential() {
        let la = 6.0;
        let lr = 12.0;
        let c_eps_t = Dual2::from_re(4.0);
        let r = 0.9;
        let rd = Dual2::from_re(r).derivative();
        let u = beta_u_mie(rd, la, lr, 1.0, c_eps_t);
        let [_, u_du, du_d2u] = mie_potential_halley(r, la, lr, 4.0);
        assert_relative_eq!((-u.re - f64::EPSILON.ln()) / -u.v1, u_du);
        assert_relative_eq!(u.v1 / u.v2, du_d2u);
    }

    #[test]
    fn hs_diameter_ethane() {
        let temperature = 50.0;
        let ethane = test_parameters().remove("ethane").unwrap();
        let d_hs = ethane.hs_diameter(temperature);
        assert_relative_eq!(
            3.694019351651498,
            d_hs[0],
            max_relative = 1e-9,
            epsilon = 1e-9
        )
    }

    #[test]
    fn test_zero_integrant() {
        let temperature = 50.0;
        let ethane = test_parameters().remove("ethane").unwrap();
        let la = ethane.la[0];
        let lr = ethane.lr[0];
        let c_eps_t = ethane.c_ij[[0, 0]] * ethane.epsilon_k[0] / temperature;
        let r0 = lower_integral_limit(la, lr, c_eps_t);
        assert_relative_eq!(
            (-beta_u_mie(r0, la, lr, 1.0, c_eps_t)).exp(),
            f64::EPSILON,
            max_relative = 1e-15,
            epsilon = 1e-15
        )
    }

    #[test]
    fn combining_rules_binary() {
        let mut ps = test_parameters();
        let methane = ps.remove("methane").unwrap().pure_records[0].clone();
        let decane = ps.remove("decane").unwrap().pure_records[0].clone();
        let p = SaftVRMieParameters::new_binary(
            vec![methane, decane],
            Some(SaftVRMieBinaryRecord {
                k_ij: 0.01,
                gamma_ij: 0.0,
            }),
        )
        .unwrap();
        assert_relative_eq!(p.sigma_ij[[0, 1]], 0.5 * (3.7412 + 4.589));
        assert_relative_eq!(p.sigma_ij[[0, 1]], p.sigma_ij[[1, 0]]);
        assert_relative_eq!(
            p.la_ij[[0, 1]],
            ((6.0 - 3.0) * (6.0 - 3.0)).sqrt() + 3.0
        );
        assert!(p.epsilon_k_ij[[0, 1]] < (153.36f64 * 400.79).sqrt());
    }
}
