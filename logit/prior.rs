//! Prior log-densities over the logistic coefficient vector.
//!
//! Index mapping is fixed: position 0 is the intercept, every later position
//! is a slope. The normal/exponential prior puts a wide normal on the
//! intercept and an exponential on each slope, so any negative slope lies
//! outside the support.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Exp, Normal};
use thiserror::Error;

/// Hyperparameters of the normal intercept / exponential slope prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorHyperparameters {
    pub intercept_mean: f64,
    pub intercept_sd: f64,
    pub exp_rate: f64,
}

impl Default for PriorHyperparameters {
    fn default() -> Self {
        Self {
            intercept_mean: 0.0,
            intercept_sd: 10.0,
            exp_rate: 1.0,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PriorError {
    #[error("Intercept prior standard deviation must be finite and positive, got {0}.")]
    InvalidInterceptSd(f64),
    #[error("Intercept prior mean must be finite, got {0}.")]
    InvalidInterceptMean(f64),
    #[error("Exponential prior rate must be finite and positive, got {0}.")]
    InvalidRate(f64),
}

/// A log-density over coefficient vectors, up to an additive constant.
pub trait LogPrior: Sync {
    fn ln_density(&self, beta: ArrayView1<f64>) -> f64;

    /// Whether `beta` lies where the density is positive.
    fn in_support(&self, beta: ArrayView1<f64>) -> bool {
        self.ln_density(beta) > f64::NEG_INFINITY
    }

    /// Moves `beta` to the nearest point of the support, where that is meaningful.
    fn project_to_support(&self, beta: &mut ndarray::Array1<f64>) {
        let _ = beta;
    }
}

/// The improper uniform prior; contributes nothing to the posterior.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatPrior;

impl LogPrior for FlatPrior {
    fn ln_density(&self, _beta: ArrayView1<f64>) -> f64 {
        0.0
    }
}

/// `N(mean, sd)` on the intercept, `Exp(rate)` on every slope.
#[derive(Debug, Clone, Copy)]
pub struct NormalExponentialPrior {
    intercept: Normal,
    slope: Exp,
}

impl PriorHyperparameters {
    pub fn validate(&self) -> Result<(), PriorError> {
        if !self.intercept_mean.is_finite() {
            return Err(PriorError::InvalidInterceptMean(self.intercept_mean));
        }
        if !(self.intercept_sd.is_finite() && self.intercept_sd > 0.0) {
            return Err(PriorError::InvalidInterceptSd(self.intercept_sd));
        }
        if !(self.exp_rate.is_finite() && self.exp_rate > 0.0) {
            return Err(PriorError::InvalidRate(self.exp_rate));
        }
        Ok(())
    }
}

impl NormalExponentialPrior {
    pub fn new(hyper: PriorHyperparameters) -> Result<Self, PriorError> {
        hyper.validate()?;
        let intercept = Normal::new(hyper.intercept_mean, hyper.intercept_sd)
            .map_err(|_| PriorError::InvalidInterceptSd(hyper.intercept_sd))?;
        let slope = Exp::new(hyper.exp_rate).map_err(|_| PriorError::InvalidRate(hyper.exp_rate))?;
        Ok(Self { intercept, slope })
    }
}

impl LogPrior for NormalExponentialPrior {
    fn ln_density(&self, beta: ArrayView1<f64>) -> f64 {
        let Some(&intercept) = beta.first() else {
            return f64::NEG_INFINITY;
        };
        // `!(b >= 0.0)` also catches NaN.
        if intercept.is_nan() || beta.iter().skip(1).any(|&b| !(b >= 0.0)) {
            return f64::NEG_INFINITY;
        }
        self.intercept.ln_pdf(intercept)
            + beta.iter().skip(1).map(|&b| self.slope.ln_pdf(b)).sum::<f64>()
    }

    fn project_to_support(&self, beta: &mut ndarray::Array1<f64>) {
        for b in beta.iter_mut().skip(1) {
            if !(*b >= 0.0) {
                *b = 0.0;
            }
        }
    }
}

/// Joint log-density of `beta` under the normal/exponential prior.
///
/// Returns `-inf` if any slope (positions `1..`) is negative, or if the
/// hyperparameters are invalid. Validates and builds the distributions on
/// every call; build a [`NormalExponentialPrior`] once for repeated evaluation.
pub fn log_prior_density(beta: ArrayView1<f64>, hyper: &PriorHyperparameters) -> f64 {
    match NormalExponentialPrior::new(*hyper) {
        Ok(prior) => prior.ln_density(beta),
        Err(_) => f64::NEG_INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, array, s};

    const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

    #[test]
    fn test_negative_slope_at_each_position_is_outside_support() {
        let hyper = PriorHyperparameters::default();
        for idx in 1..5 {
            let mut beta = Array1::from_elem(5, 0.1);
            beta[idx] = -1e-9;
            assert_eq!(
                log_prior_density(beta.view(), &hyper),
                f64::NEG_INFINITY,
                "position {idx} should be constrained"
            );
        }
    }

    #[test]
    fn test_negative_intercept_is_allowed() {
        let hyper = PriorHyperparameters::default();
        let beta = array![-8.0, 0.03, 0.08, 0.9, 0.0];
        assert!(log_prior_density(beta.view(), &hyper).is_finite());
    }

    #[test]
    fn test_zero_slopes_give_closed_form_value() {
        let hyper = PriorHyperparameters {
            intercept_mean: 0.0,
            intercept_sd: 10.0,
            exp_rate: 2.0,
        };
        let beta = array![0.0, 0.0, 0.0, 0.0, 0.0];
        let expected = -(10.0_f64).ln() - LN_SQRT_2PI + 4.0 * (2.0_f64).ln();
        let value = log_prior_density(beta.view(), &hyper);
        assert!(value.is_finite());
        assert_abs_diff_eq!(value, expected, epsilon = 1e-10);
    }

    #[test]
    fn test_density_matches_hand_computation() {
        let hyper = PriorHyperparameters {
            intercept_mean: -5.0,
            intercept_sd: 2.0,
            exp_rate: 0.5,
        };
        let beta = array![-3.0, 1.0, 2.0, 0.5, 0.25];
        let z = (-3.0 - -5.0) / 2.0;
        let normal = -(2.0_f64).ln() - LN_SQRT_2PI - 0.5 * z * z;
        let slopes: f64 = [1.0, 2.0, 0.5, 0.25]
            .iter()
            .map(|b| (0.5_f64).ln() - 0.5 * b)
            .sum();
        assert_abs_diff_eq!(
            log_prior_density(beta.view(), &hyper),
            normal + slopes,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_strided_view_matches_contiguous() {
        let prior = NormalExponentialPrior::new(PriorHyperparameters::default()).unwrap();
        let wide = array![[0.5, 9.0], [0.1, 9.0], [0.2, 9.0], [0.3, 9.0], [0.4, 9.0]];
        let column = wide.slice(s![.., 0]);
        let contiguous = column.to_owned();
        assert_abs_diff_eq!(
            prior.ln_density(column),
            prior.ln_density(contiguous.view()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_nan_is_outside_support() {
        let hyper = PriorHyperparameters::default();
        let beta = array![0.0, f64::NAN, 0.0, 0.0, 0.0];
        assert_eq!(log_prior_density(beta.view(), &hyper), f64::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_hyperparameters() {
        let bad_sd = PriorHyperparameters {
            intercept_sd: 0.0,
            ..PriorHyperparameters::default()
        };
        assert_eq!(
            NormalExponentialPrior::new(bad_sd).unwrap_err(),
            PriorError::InvalidInterceptSd(0.0)
        );
        let bad_rate = PriorHyperparameters {
            exp_rate: -1.0,
            ..PriorHyperparameters::default()
        };
        assert_eq!(
            NormalExponentialPrior::new(bad_rate).unwrap_err(),
            PriorError::InvalidRate(-1.0)
        );
        let beta = array![0.0, 0.0];
        assert_eq!(log_prior_density(beta.view(), &bad_rate), f64::NEG_INFINITY);
    }

    #[test]
    fn test_projection_clears_negative_slopes_only() {
        let prior = NormalExponentialPrior::new(PriorHyperparameters::default()).unwrap();
        let mut beta = array![-6.0, 0.03, -0.01, 0.8, -0.002];
        assert!(!prior.in_support(beta.view()));
        prior.project_to_support(&mut beta);
        assert_eq!(beta.to_vec(), vec![-6.0, 0.03, 0.0, 0.8, 0.0]);
        assert!(prior.in_support(beta.view()));
    }

    #[test]
    fn test_flat_prior_is_zero_everywhere() {
        let beta = array![100.0, -3.0, 0.0];
        assert_eq!(FlatPrior.ln_density(beta.view()), 0.0);
        assert!(FlatPrior.in_support(beta.view()));
    }
}
