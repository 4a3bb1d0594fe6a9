use ndarray::ArrayViewMut1;

/// Robust loss functions applied to the scaled residuals of a
/// [DataSet](super::DataSet).
#[derive(Clone, Debug, Copy)]
pub enum Loss {
    Linear,
    SoftL1(f64),
    Huber(f64),
    Cauchy(f64),
    Arctan(f64),
}

impl Loss {
    pub fn softl1(scaling_factor: f64) -> Self {
        Self::SoftL1(scaling_factor)
    }
    pub fn huber(scaling_factor: f64) -> Self {
        Self::Huber(scaling_factor)
    }
    pub fn cauchy(scaling_factor: f64) -> Self {
        Self::Cauchy(scaling_factor)
    }
    pub fn arctan(scaling_factor: f64) -> Self {
        Self::Arctan(scaling_factor)
    }

    pub fn apply(&self, res: &mut ArrayViewMut1<f64>) {
        match self {
            Self::Linear => (),
            Self::SoftL1(s) => {
                let s2 = s * s;
                res.mapv_inplace(|ri| (s2 * (2.0 * ((ri * ri / s2 + 1.0).sqrt() - 1.0))).sqrt())
            }
            Self::Huber(s) => {
                let s2 = s * s;
                res.mapv_inplace(|ri| {
                    if ri * ri <= s2 {
                        ri
                    } else {
                        (s2 * (2.0 * (ri / s).abs() - 1.0)).sqrt()
                    }
                })
            }
            Self::Cauchy(s) => {
                let s2 = s * s;
                res.mapv_inplace(|ri| (s2 * (1.0 + ri * ri / s2).ln()).sqrt())
            }
            Self::Arctan(s) => {
                let s2 = s * s;
                res.mapv_inplace(|ri| (s2 * (ri * ri / s2).atan()).sqrt())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn losses_agree_for_small_residuals() {
        // all losses are approximately linear well below the scaling factor
        let res = arr1(&[1e-6, -1e-6]);
        for loss in [
            Loss::Linear,
            Loss::softl1(1.0),
            Loss::huber(1.0),
            Loss::cauchy(1.0),
            Loss::arctan(1.0),
        ] {
            let mut r = res.clone();
            loss.apply(&mut r.view_mut());
            assert!((r[0].abs() - 1e-6).abs() < 1e-9);
        }
    }

    #[test]
    fn huber_is_identity_in_the_quadratic_region() {
        let mut r = arr1(&[0.5, -0.5]);
        Loss::huber(1.0).apply(&mut r.view_mut());
        assert_eq!(r, arr1(&[0.5, -0.5]));
    }

    #[test]
    fn robust_losses_damp_outliers() {
        let mut r = arr1(&[100.0]);
        Loss::cauchy(1.0).apply(&mut r.view_mut());
        assert!(r[0] < 100.0);
    }
}
