//! Analysis configuration, loaded from TOML with a default for every field.

use crate::logit::data::Field;
use crate::logit::evaluate::EvaluationConfig;
use crate::logit::features::{DEFAULT_CORRELATION_THRESHOLD, FeatureSet};
use crate::logit::irls::IrlsConfig;
use crate::logit::prior::{PriorError, PriorHyperparameters};
use crate::logit::sampler::{SamplerConfig, SamplerError};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("'{0}' is the response and cannot be used as a {1}.")]
    OutcomeMisused(Field, &'static str),
    #[error("At least one predictor must be selected.")]
    NoPredictors,
    #[error("Correlation threshold must lie in (0, 1], got {0}.")]
    InvalidCorrelationThreshold(f64),
    #[error("Split fraction must lie strictly between 0 and 1, got {0}.")]
    InvalidSplitFraction(f64),
    #[error("IRLS needs at least one iteration and a positive tolerance.")]
    InvalidIrls,
    #[error("Invalid prior: {0}")]
    Prior(#[from] PriorError),
    #[error("Invalid sampler settings: {0}")]
    Sampler(#[from] SamplerError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: Option<String>,
    /// Fields where a zero marks a missing measurement.
    pub zero_sentinel_fields: Vec<Field>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            zero_sentinel_fields: Field::ZERO_SENTINELS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub predictors: Vec<Field>,
    pub correlation_threshold: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            predictors: FeatureSet::default().fields().to_vec(),
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of each outcome class placed in the training set.
    pub fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            fraction: 0.7,
            seed: 2024,
        }
    }
}

/// Sampler settings for both Bayesian runs. The custom-prior run mixes
/// worse, so it may use its own thinning interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesConfig {
    #[serde(flatten)]
    pub sampler: SamplerConfig,
    pub custom_prior_thin: Option<usize>,
}

impl Default for BayesConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            custom_prior_thin: Some(10),
        }
    }
}

impl BayesConfig {
    pub fn flat_prior_run(&self) -> SamplerConfig {
        self.sampler
    }

    pub fn custom_prior_run(&self) -> SamplerConfig {
        SamplerConfig {
            thin: self.custom_prior_thin.unwrap_or(self.sampler.thin),
            ..self.sampler
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub prior: PriorHyperparameters,
    pub sampler: BayesConfig,
    pub irls: IrlsConfig,
    pub evaluation: EvaluationConfig,
}

impl AnalysisConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        log::info!("Loaded analysis configuration from '{path}'");
        Ok(config)
    }

    pub fn feature_set(&self) -> FeatureSet {
        FeatureSet::new(self.features.predictors.iter().copied())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.zero_sentinel_fields.contains(&Field::Outcome) {
            return Err(ConfigError::OutcomeMisused(Field::Outcome, "zero-sentinel field"));
        }
        if self.features.predictors.contains(&Field::Outcome) {
            return Err(ConfigError::OutcomeMisused(Field::Outcome, "predictor"));
        }
        if self.features.predictors.is_empty() {
            return Err(ConfigError::NoPredictors);
        }
        let threshold = self.features.correlation_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidCorrelationThreshold(threshold));
        }
        if !(self.split.fraction > 0.0 && self.split.fraction < 1.0) {
            return Err(ConfigError::InvalidSplitFraction(self.split.fraction));
        }
        if self.irls.max_iterations == 0 || !(self.irls.tolerance > 0.0) {
            return Err(ConfigError::InvalidIrls);
        }
        self.prior.validate()?;
        self.sampler.flat_prior_run().validate()?;
        self.sampler.custom_prior_run().validate()?;
        Ok(())
    }
}
