//! Bayesian fitting: maximum-likelihood start, proposal scaled from the
//! observed information, then random-walk Metropolis under the chosen prior.

use crate::logit::irls::{IrlsConfig, IrlsError, IrlsStatus, MleFit, fit_logistic_mle};
use crate::logit::model::FitMethod;
use crate::logit::prior::{
    FlatPrior, LogPrior, NormalExponentialPrior, PriorError, PriorHyperparameters,
};
use crate::logit::sampler::{
    LogisticPosterior, PosteriorSample, RandomWalkMetropolis, Sampler, SamplerConfig, SamplerError,
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prior placed on the coefficient vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriorChoice {
    Flat,
    NormalExponential(PriorHyperparameters),
}

impl PriorChoice {
    pub fn method(&self) -> FitMethod {
        match self {
            Self::Flat => FitMethod::BayesianFlatPrior,
            Self::NormalExponential(_) => FitMethod::BayesianNormalExponentialPrior,
        }
    }
}

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("The maximum-likelihood start failed: {0}")]
    Irls(#[from] IrlsError),
    #[error("Sampling failed: {0}")]
    Sampler(#[from] SamplerError),
    #[error("Invalid prior: {0}")]
    Prior(#[from] PriorError),
}

/// Output of [`fit_bayesian`].
#[derive(Debug, Clone)]
pub struct BayesianFit {
    pub method: FitMethod,
    pub sample: PosteriorSample,
    /// The chain's first state.
    pub start: Array1<f64>,
    pub mle: MleFit,
}

pub fn fit_bayesian<'a>(
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    names: Vec<String>,
    prior: &PriorChoice,
    sampler_config: &SamplerConfig,
    irls_config: &IrlsConfig,
) -> Result<BayesianFit, EstimationError> {
    log::info!("Fitting {}", prior.method().describe());
    let mle = fit_logistic_mle(x, y, names.clone(), irls_config)?;
    if mle.status != IrlsStatus::Converged {
        log::warn!(
            "IRLS stopped with status {:?}; the sampler will start from its last iterate",
            mle.status
        );
    }

    let (sample, start) = match prior {
        PriorChoice::Flat => sample_from(x, y, names, FlatPrior, &mle, sampler_config)?,
        PriorChoice::NormalExponential(hyper) => {
            let prior = NormalExponentialPrior::new(*hyper)?;
            sample_from(x, y, names, prior, &mle, sampler_config)?
        }
    };

    Ok(BayesianFit {
        method: prior.method(),
        sample,
        start,
        mle,
    })
}

/// Runs the chain under `prior`, starting from the MLE moved onto the prior's support.
pub fn sample_from<'a, P: LogPrior>(
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    names: Vec<String>,
    prior: P,
    mle: &MleFit,
    config: &SamplerConfig,
) -> Result<(PosteriorSample, Array1<f64>), EstimationError> {
    let mut start = mle.coefficients.values.clone();
    prior.project_to_support(&mut start);
    if start != mle.coefficients.values {
        log::warn!(
            "The maximum-likelihood estimate lies outside the prior support; starting from {:?}",
            start.to_vec()
        );
    }

    let sampler = RandomWalkMetropolis::from_covariance(mle.covariance.view())?;
    let target = LogisticPosterior::new(x, y, prior)?;
    let sample = sampler.sample(&target, start.view(), names, config)?;
    Ok((sample, start))
}
