//! Random-walk Metropolis sampling of the logistic posterior.
//!
//! # Design
//!
//! The sampler only sees a [`PosteriorTarget`]: something that reports its
//! dimension and evaluates an unnormalised log-posterior. The accept/reject
//! step is mini-mcmc's Metropolis-Hastings chain; this module supplies the
//! target adapter and a multivariate normal proposal scaled by the asymptotic
//! covariance of the maximum-likelihood estimate:
//!
//! - Proposal: β* = β + tune · L z, with z ~ N(0, I) and L Lᵀ = (XᵀWX)⁻¹
//! - Acceptance: min(1, exp(log p(β*) − log p(β)))
//!
//! A current state outside the prior support has log-density −∞, so any
//! finite candidate is accepted and the chain walks into the support.
//!
//! # Retention
//!
//! `iterations` counts every iteration including burn-in. Iteration `i`
//! (0-based) is kept when `i ≥ burn_in` and `(i − burn_in + 1)` is a
//! multiple of `thin`, which yields `⌊(iterations − burn_in) / thin⌋` draws.

use crate::logit::irls::log_likelihood;
use crate::logit::prior::LogPrior;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use mini_mcmc::core::{HasChains, MarkovChain};
use mini_mcmc::distributions::{Proposal, Target};
use mini_mcmc::metropolis_hastings::MetropolisHastings;
use ndarray_linalg::{Cholesky, UPLO};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Anything the sampler can draw from.
pub trait PosteriorTarget: Sync {
    fn dim(&self) -> usize;

    /// Unnormalised log-posterior; `-inf` outside the support.
    fn log_posterior(&self, beta: ArrayView1<f64>) -> f64;
}

/// A Markov chain Monte Carlo method producing a [`PosteriorSample`].
pub trait Sampler {
    fn sample<T: PosteriorTarget>(
        &self,
        target: &T,
        start: ArrayView1<f64>,
        names: Vec<String>,
        config: &SamplerConfig,
    ) -> Result<PosteriorSample, SamplerError>;
}

/// Bernoulli-logit likelihood combined with a prior.
pub struct LogisticPosterior<'a, P: LogPrior> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    prior: P,
}

impl<'a, P: LogPrior> LogisticPosterior<'a, P> {
    pub fn new(
        x: ArrayView2<'a, f64>,
        y: ArrayView1<'a, f64>,
        prior: P,
    ) -> Result<Self, SamplerError> {
        if x.nrows() != y.len() {
            return Err(SamplerError::DimensionMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }
        Ok(Self { x, y, prior })
    }
}

impl<P: LogPrior> PosteriorTarget for LogisticPosterior<'_, P> {
    fn dim(&self) -> usize {
        self.x.ncols()
    }

    fn log_posterior(&self, beta: ArrayView1<f64>) -> f64 {
        let log_prior = self.prior.ln_density(beta);
        // Skip the likelihood outside the support.
        if log_prior == f64::NEG_INFINITY {
            return log_prior;
        }
        log_likelihood(self.x, self.y, beta) + log_prior
    }
}

/// Configuration for Metropolis sampling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Initial iterations discarded before any draw is kept.
    pub burn_in: usize,
    /// Total iterations, burn-in included.
    pub iterations: usize,
    /// Keep every `thin`-th post-burn-in iteration.
    pub thin: usize,
    /// Scale applied to the Cholesky factor of the proposal covariance.
    pub tune: f64,
    pub seed: u64,
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            burn_in: 1_000,
            iterations: 11_000,
            thin: 1,
            tune: 1.1,
            seed: 1234,
            show_progress: false,
        }
    }
}

impl SamplerConfig {
    pub fn retained_draws(&self) -> usize {
        if self.thin == 0 {
            return 0;
        }
        self.iterations.saturating_sub(self.burn_in) / self.thin
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.thin == 0 {
            return Err(SamplerError::ZeroThin);
        }
        if self.iterations <= self.burn_in {
            return Err(SamplerError::IterationsNotAfterBurnIn {
                iterations: self.iterations,
                burn_in: self.burn_in,
            });
        }
        if !(self.tune.is_finite() && self.tune > 0.0) {
            return Err(SamplerError::InvalidTune(self.tune));
        }
        if self.retained_draws() == 0 {
            return Err(SamplerError::NoRetainedDraws {
                iterations: self.iterations,
                burn_in: self.burn_in,
                thin: self.thin,
            });
        }
        Ok(())
    }

    fn keeps(&self, iteration: usize) -> bool {
        iteration >= self.burn_in && (iteration - self.burn_in + 1) % self.thin == 0
    }
}

/// Retained posterior draws, one row per kept iteration.
#[derive(Clone, Debug)]
pub struct PosteriorSample {
    pub names: Vec<String>,
    pub draws: Array2<f64>,
    /// Share of all iterations (burn-in included) whose proposal was accepted.
    pub acceptance_rate: f64,
}

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Thinning interval must be at least 1.")]
    ZeroThin,
    #[error("Total iterations ({iterations}) must exceed burn-in ({burn_in}).")]
    IterationsNotAfterBurnIn { iterations: usize, burn_in: usize },
    #[error("Proposal tuning must be finite and positive, got {0}.")]
    InvalidTune(f64),
    #[error(
        "Iterations {iterations}, burn-in {burn_in} and thinning {thin} leave no draws to keep."
    )]
    NoRetainedDraws {
        iterations: usize,
        burn_in: usize,
        thin: usize,
    },
    #[error("Dimension mismatch: expected {expected}, found {found}.")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Proposal covariance is not positive definite: {0}")]
    ProposalFactorization(ndarray_linalg::error::LinalgError),
    #[error("Failed to write posterior draws: {0}")]
    Csv(#[from] csv::Error),
}

impl PosteriorSample {
    pub fn n_draws(&self) -> usize {
        self.draws.nrows()
    }

    pub fn dim(&self) -> usize {
        self.draws.ncols()
    }

    /// Per-coefficient arithmetic mean of the retained draws.
    pub fn mean(&self) -> Array1<f64> {
        self.draws
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::from_elem(self.dim(), f64::NAN))
    }

    pub fn column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.draws.column(j)
    }

    /// Writes the draws as CSV, one column per coefficient.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SamplerError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.names)?;
        for row in self.draws.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Exposes a [`PosteriorTarget`] to mini-mcmc.
struct LogDensity<'t, T>(&'t T);

impl<T> Clone for LogDensity<'_, T> {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

impl<T: PosteriorTarget> Target<f64, f64> for LogDensity<'_, T> {
    fn unnorm_logp(&self, theta: &[f64]) -> f64 {
        self.0.log_posterior(ArrayView1::from(theta))
    }
}

/// Gaussian step `tune · L z` around the current state.
#[derive(Clone, Debug)]
pub struct CholeskyProposal {
    chol: Arc<Array2<f64>>,
    tune: f64,
    rng: StdRng,
}

impl CholeskyProposal {
    pub fn new(chol: Arc<Array2<f64>>, tune: f64, seed: u64) -> Self {
        Self {
            chol,
            tune,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Proposal<f64, f64> for CholeskyProposal {
    fn sample(&mut self, current: &[f64]) -> Vec<f64> {
        let z: Array1<f64> = (0..self.chol.nrows())
            .map(|_| self.rng.sample(StandardNormal))
            .collect();
        let step = self.chol.dot(&z);
        current
            .iter()
            .zip(step.iter())
            .map(|(b, s)| b + self.tune * s)
            .collect()
    }

    // Symmetric: the forward and backward terms cancel in the Hastings ratio.
    fn logp(&self, _from: &[f64], _to: &[f64]) -> f64 {
        0.0
    }

    fn set_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

/// Gaussian random-walk Metropolis with a fixed proposal covariance.
#[derive(Clone, Debug)]
pub struct RandomWalkMetropolis {
    /// L with L Lᵀ equal to the proposal covariance before tuning.
    proposal_chol: Arc<Array2<f64>>,
}

impl RandomWalkMetropolis {
    /// Factorises `covariance`, usually `(XᵀWX)⁻¹` at the MLE.
    pub fn from_covariance(covariance: ArrayView2<f64>) -> Result<Self, SamplerError> {
        if covariance.nrows() != covariance.ncols() {
            return Err(SamplerError::DimensionMismatch {
                expected: covariance.nrows(),
                found: covariance.ncols(),
            });
        }
        let proposal_chol = covariance
            .cholesky(UPLO::Lower)
            .map_err(SamplerError::ProposalFactorization)?;
        Ok(Self {
            proposal_chol: Arc::new(proposal_chol),
        })
    }

    pub fn dim(&self) -> usize {
        self.proposal_chol.nrows()
    }

    pub fn proposal(&self, config: &SamplerConfig) -> CholeskyProposal {
        CholeskyProposal::new(Arc::clone(&self.proposal_chol), config.tune, config.seed)
    }
}

fn progress_bar(config: &SamplerConfig) -> ProgressBar {
    if !config.show_progress {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(config.iterations as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{elapsed_precise}] {bar:40} {pos}/{len} ({eta})")
    {
        bar.set_style(style);
    }
    bar.set_message("Metropolis");
    bar
}

impl Sampler for RandomWalkMetropolis {
    fn sample<T: PosteriorTarget>(
        &self,
        target: &T,
        start: ArrayView1<f64>,
        names: Vec<String>,
        config: &SamplerConfig,
    ) -> Result<PosteriorSample, SamplerError> {
        config.validate()?;
        let dim = target.dim();
        for found in [self.dim(), start.len(), names.len()] {
            if found != dim {
                return Err(SamplerError::DimensionMismatch {
                    expected: dim,
                    found,
                });
            }
        }

        let start_logp = target.log_posterior(start);
        if !start_logp.is_finite() {
            log::warn!(
                "Starting point has log-posterior {start_logp}; the chain must move into the support during burn-in"
            );
        }

        let mut mh = MetropolisHastings::new(
            LogDensity(target),
            self.proposal(config),
            vec![start.to_vec()],
        )
        .seed(config.seed);
        let chain = &mut mh.chains_mut()[0];

        let n_keep = config.retained_draws();
        let mut draws = Array2::<f64>::zeros((n_keep, dim));
        let mut kept = 0;
        let mut accepted = 0usize;
        let mut previous = start.to_vec();
        let progress = progress_bar(config);

        log::info!(
            "Running Metropolis: {} iterations, burn-in {}, thin {}, tune {} -> {} draws",
            config.iterations,
            config.burn_in,
            config.thin,
            config.tune,
            n_keep
        );

        for iteration in 0..config.iterations {
            let state = chain.step();
            if *state != previous {
                accepted += 1;
                previous.clone_from(state);
            }

            if config.keeps(iteration) {
                draws
                    .row_mut(kept)
                    .assign(&ArrayView1::from(previous.as_slice()));
                kept += 1;
            }
            if iteration % 256 == 0 {
                progress.set_position(iteration as u64);
            }
        }
        progress.finish_and_clear();
        debug_assert_eq!(kept, n_keep);

        let acceptance_rate = accepted as f64 / config.iterations as f64;
        log::info!("Metropolis acceptance rate: {:.3}", acceptance_rate);
        if !(0.1..=0.7).contains(&acceptance_rate) {
            log::warn!(
                "Acceptance rate {:.3} is outside [0.1, 0.7]; consider adjusting tune",
                acceptance_rate
            );
        }

        Ok(PosteriorSample {
            names,
            draws,
            acceptance_rate,
        })
    }
}
