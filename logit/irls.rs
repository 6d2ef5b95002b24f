//! Maximum-likelihood logistic regression by iteratively reweighted least squares.
//!
//! Each iteration linearises the Bernoulli log-likelihood at the current
//! linear predictor and solves the weighted normal equations
//! `(XᵀWX) β = XᵀWz`. When a full step raises the deviance the step is
//! halved, up to [`MAX_STEP_HALVINGS`] times, before the fit is declared
//! unstable.

use crate::logit::model::{CoefficientVector, ModelError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use ndarray_linalg::{Inverse, Solve};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use thiserror::Error;

const MIN_WEIGHT: f64 = 1e-10;
const PROB_EPS: f64 = 1e-10;
const MAX_STEP_HALVINGS: usize = 30;

/// The status of IRLS convergence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrlsStatus {
    /// Relative deviance change fell below tolerance.
    Converged,
    /// Reached maximum iterations without converging.
    MaxIterationsReached,
    /// Step halving could not reduce the deviance, likely due to perfect separation.
    Unstable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrlsConfig {
    pub max_iterations: usize,
    /// Convergence threshold on `|dev - dev_old| / (|dev| + 0.1)`.
    pub tolerance: f64,
}

impl Default for IrlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
        }
    }
}

/// Per-coefficient inference from the observed information at the MLE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTest {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
}

/// Result of a maximum-likelihood fit.
#[derive(Debug, Clone)]
pub struct MleFit {
    pub coefficients: CoefficientVector,
    pub tests: Vec<CoefficientTest>,
    /// `(XᵀWX)⁻¹` at convergence; the asymptotic covariance of the estimate.
    pub covariance: Array2<f64>,
    pub deviance: f64,
    pub null_deviance: f64,
    pub aic: f64,
    pub iterations: usize,
    pub status: IrlsStatus,
}

#[derive(Error, Debug)]
pub enum IrlsError {
    #[error("Design matrix has {rows} rows but the response has {len} entries.")]
    DimensionMismatch { rows: usize, len: usize },
    #[error("Response values must be 0 or 1; found {0}.")]
    NonBinaryResponse(f64),
    #[error("Need more observations ({rows}) than coefficients ({cols}).")]
    TooFewObservations { rows: usize, cols: usize },
    #[error("A linear system solve failed. XᵀWX may be singular. Error: {0}")]
    LinearSystemSolveFailed(ndarray_linalg::error::LinalgError),
    #[error("Coefficient naming failed: {0}")]
    Model(#[from] ModelError),
}

/// Fitted probabilities, IRLS weights and working response at `eta`.
pub fn update_glm_vectors(
    y: ArrayView1<f64>,
    eta: &Array1<f64>,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    // Clamp eta to prevent overflow in exp
    let eta_clamped = eta.mapv(|e| e.clamp(-700.0, 700.0));
    let mut mu = eta_clamped.mapv(|e| 1.0 / (1.0 + (-e).exp()));
    mu.mapv_inplace(|v| v.clamp(PROB_EPS, 1.0 - PROB_EPS));
    let weights = (&mu * (1.0 - &mu)).mapv(|v| v.max(MIN_WEIGHT));
    let residual = &y - &mu;
    let z = &eta_clamped + &(&residual / &weights);
    (mu, weights, z)
}

/// Binomial deviance, `-2 × log-likelihood` for 0/1 responses.
pub fn calculate_deviance(y: ArrayView1<f64>, mu: &Array1<f64>) -> f64 {
    let total = Zip::from(y).and(mu).fold(0.0, |acc, &yi, &mui| {
        let mui_c = mui.clamp(PROB_EPS, 1.0 - PROB_EPS);
        acc + if yi > 0.5 { -mui_c.ln() } else { -(1.0 - mui_c).ln() }
    });
    2.0 * total
}

/// Bernoulli log-likelihood of `beta`, computed stably from the linear predictor.
pub fn log_likelihood(x: ArrayView2<f64>, y: ArrayView1<f64>, beta: ArrayView1<f64>) -> f64 {
    let eta = x.dot(&beta);
    Zip::from(&eta).and(y).fold(0.0, |acc, &e, &yi| {
        // log(1 + exp(e)) without overflow
        let softplus = if e > 0.0 { e + (-e).exp().ln_1p() } else { e.exp().ln_1p() };
        acc + yi * e - softplus
    })
}

/// `XᵀWX` for a diagonal weight vector.
pub fn weighted_gram(x: ArrayView2<f64>, weights: &Array1<f64>) -> Array2<f64> {
    let wx = &x * &weights.view().insert_axis(Axis(1));
    x.t().dot(&wx)
}

fn validate_inputs(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), IrlsError> {
    if x.nrows() != y.len() {
        return Err(IrlsError::DimensionMismatch {
            rows: x.nrows(),
            len: y.len(),
        });
    }
    if x.nrows() <= x.ncols() {
        return Err(IrlsError::TooFewObservations {
            rows: x.nrows(),
            cols: x.ncols(),
        });
    }
    if let Some(&bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(IrlsError::NonBinaryResponse(bad));
    }
    Ok(())
}

/// `P(|Z| ≥ |z|)` for a standard normal `Z`.
fn two_sided_normal_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Fits `P(y = 1) = σ(Xβ)` by maximum likelihood. `x` must include the
/// intercept column; `names` labels its columns.
pub fn fit_logistic_mle(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    names: Vec<String>,
    config: &IrlsConfig,
) -> Result<MleFit, IrlsError> {
    validate_inputs(x, y)?;
    let n = x.nrows();
    let p = x.ncols();

    log::info!("Starting IRLS on {} observations, {} coefficients", n, p);

    let mut beta = Array1::<f64>::zeros(p);
    let (mu_start, mut weights, mut z) = update_glm_vectors(y, &x.dot(&beta));
    let mut deviance = calculate_deviance(y, &mu_start);
    let mut status = IrlsStatus::MaxIterationsReached;
    let mut iterations = 0;

    for iter in 1..=config.max_iterations {
        iterations = iter;
        let xtwx = weighted_gram(x, &weights);
        let xtwz = x.t().dot(&(&weights * &z));
        let beta_full = xtwx
            .solve(&xtwz)
            .map_err(IrlsError::LinearSystemSolveFailed)?;

        // Step halving toward the previous estimate while the deviance rises.
        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..=MAX_STEP_HALVINGS {
            let candidate = &beta + &((&beta_full - &beta) * step);
            let eta_candidate = x.dot(&candidate);
            let (mu_candidate, _, _) = update_glm_vectors(y, &eta_candidate);
            let dev_candidate = calculate_deviance(y, &mu_candidate);
            if dev_candidate.is_finite() && dev_candidate <= deviance * (1.0 + 1e-12) {
                accepted = Some((candidate, eta_candidate, dev_candidate));
                break;
            }
            step *= 0.5;
        }

        let Some((beta_new, eta_new, dev_new)) = accepted else {
            log::warn!("IRLS step halving failed at iteration {iter}; stopping");
            status = IrlsStatus::Unstable;
            break;
        };

        let change = (dev_new - deviance).abs() / (dev_new.abs() + 0.1);
        log::debug!(
            "IRLS iteration {iter}: deviance {:.6} (change {:.3e}, step {step})",
            dev_new,
            change
        );

        beta = beta_new;
        deviance = dev_new;
        (_, weights, z) = update_glm_vectors(y, &eta_new);

        if change < config.tolerance {
            status = IrlsStatus::Converged;
            break;
        }
    }

    if status != IrlsStatus::Converged {
        log::warn!("IRLS finished without converging ({:?})", status);
    }

    let covariance = weighted_gram(x, &weights)
        .inv()
        .map_err(IrlsError::LinearSystemSolveFailed)?;

    let coefficients = CoefficientVector::new(names, beta)?;
    let tests = coefficients
        .names
        .iter()
        .zip(coefficients.values.iter())
        .enumerate()
        .map(|(j, (name, &estimate))| {
            let std_error = covariance[[j, j]].max(0.0).sqrt();
            let z_value = estimate / std_error;
            let p_value = two_sided_normal_p(z_value);
            CoefficientTest {
                name: name.clone(),
                estimate,
                std_error,
                z_value,
                p_value,
            }
        })
        .collect();

    let null_deviance = {
        let ybar = y.mean().unwrap_or(0.5);
        calculate_deviance(y, &Array1::from_elem(n, ybar))
    };
    let aic = deviance + 2.0 * p as f64;

    log::info!(
        "IRLS finished after {iterations} iterations: deviance {:.4}, null deviance {:.4}",
        deviance,
        null_deviance
    );

    Ok(MleFit {
        coefficients,
        tests,
        covariance,
        deviance,
        null_deviance,
        aic,
        iterations,
        status,
    })
}
