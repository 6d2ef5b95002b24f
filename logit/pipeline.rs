//! The case study as a sequence of stages:
//! load → clean → explore → split → {MLE, Bayesian} → evaluate.

use crate::logit::config::{AnalysisConfig, ConfigError};
use crate::logit::data::{CleaningReport, DataError, Dataset, Field, FieldSummary, load_records};
use crate::logit::diagnostics::{PosteriorSummary, summarize};
use crate::logit::estimate::{BayesianFit, EstimationError, PriorChoice, fit_bayesian};
use crate::logit::evaluate::{EvaluationError, EvaluationSummary, evaluate, posterior_mean};
use crate::logit::features::{
    CollinearPair, CorrelationMatrix, FeatureSet, collinear_pairs, correlation_matrix,
};
use crate::logit::irls::{IrlsError, MleFit, fit_logistic_mle};
use crate::logit::model::{CoefficientVector, FitMethod, FittedModel, ModelError};
use crate::logit::report::CaseStudyReport;
use crate::logit::sampler::SamplerConfig;
use crate::logit::split::{Split, SplitError, stratified_split};
use thiserror::Error;

/// Every failure the case study can stop on.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Split error: {0}")]
    Split(#[from] SplitError),
    #[error("Maximum-likelihood fit failed: {0}")]
    Irls(#[from] IrlsError),
    #[error("Bayesian fit failed: {0}")]
    Estimation(#[from] EstimationError),
    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("No data file given; pass a path or set `data.path` in the configuration.")]
    MissingDataPath,
    #[error("No rows remain after removing zero sentinels.")]
    NothingLeftAfterCleaning,
}

/// Output of the cleaning and exploration stages.
#[derive(Debug, Clone)]
pub struct Exploration {
    pub cleaning: CleaningReport,
    pub summary: Vec<FieldSummary>,
    pub positive_rate: f64,
    pub correlations: CorrelationMatrix,
    pub collinear: Vec<CollinearPair>,
}

/// A cleaned dataset, its selected predictors and the train/test partition.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub exploration: Exploration,
    pub features: FeatureSet,
    pub split: Split,
    pub train: Dataset,
    pub test: Dataset,
}

impl PreparedData {
    pub fn coefficient_names(&self) -> Vec<String> {
        CoefficientVector::names_for(&self.features.names())
    }
}

#[derive(Debug, Clone)]
pub struct MleOutcome {
    pub fit: MleFit,
    pub model: FittedModel,
}

#[derive(Debug, Clone)]
pub struct BayesianOutcome {
    pub fit: BayesianFit,
    pub sampler: SamplerConfig,
    pub diagnostics: PosteriorSummary,
    pub model: FittedModel,
}

/// Resolves the data path: an explicit argument wins over the configuration.
pub fn resolve_data_path<'a>(
    explicit: Option<&'a str>,
    config: &'a AnalysisConfig,
) -> Result<&'a str, AnalysisError> {
    explicit
        .or(config.data.path.as_deref())
        .ok_or(AnalysisError::MissingDataPath)
}

/// Cleans `data`, explores the measurement columns, and splits it.
pub fn prepare(mut data: Dataset, config: &AnalysisConfig) -> Result<PreparedData, AnalysisError> {
    config.validate()?;

    let cleaning = data.remove_zero_sentinels(&config.data.zero_sentinel_fields);
    if data.is_empty() {
        return Err(AnalysisError::NothingLeftAfterCleaning);
    }
    let correlations = correlation_matrix(&data, &Field::MEASUREMENTS);
    let collinear = collinear_pairs(&correlations, config.features.correlation_threshold);
    for pair in &collinear {
        log::info!(
            "Collinear pair: {} / {} (r = {:.3})",
            pair.first,
            pair.second,
            pair.correlation
        );
    }
    let exploration = Exploration {
        cleaning,
        summary: data.summary(),
        positive_rate: data.positive_rate(),
        correlations,
        collinear,
    };

    let features = config.feature_set();
    log::info!(
        "Predictors: {}; dropped: {:?}",
        features.names().join(", "),
        features.dropped()
    );

    let split = stratified_split(&data, config.split.fraction, config.split.seed)?;
    let (train, test) = split.apply(&data);
    Ok(PreparedData {
        exploration,
        features,
        split,
        train,
        test,
    })
}

pub fn load_and_prepare(path: &str, config: &AnalysisConfig) -> Result<PreparedData, AnalysisError> {
    let data = load_records(path)?;
    prepare(data, config)
}

fn evaluate_on_test(
    coefficients: &CoefficientVector,
    prepared: &PreparedData,
    config: &AnalysisConfig,
) -> Result<EvaluationSummary, AnalysisError> {
    let (x_test, _) = prepared.features.design_matrix(&prepared.test);
    let actual = prepared.test.outcomes();
    Ok(evaluate(coefficients, x_test.view(), &actual, &config.evaluation)?)
}

pub fn run_mle(prepared: &PreparedData, config: &AnalysisConfig) -> Result<MleOutcome, AnalysisError> {
    let (x, y) = prepared.features.design_matrix(&prepared.train);
    let fit = fit_logistic_mle(x.view(), y.view(), prepared.coefficient_names(), &config.irls)?;
    let evaluation = evaluate_on_test(&fit.coefficients, prepared, config)?;
    let model = FittedModel {
        method: FitMethod::MaximumLikelihood,
        features: prepared.features.names(),
        coefficients: fit.coefficients.clone(),
        evaluation: Some(evaluation),
    };
    Ok(MleOutcome { fit, model })
}

pub fn run_bayesian(
    prepared: &PreparedData,
    prior: &PriorChoice,
    sampler: &SamplerConfig,
    config: &AnalysisConfig,
) -> Result<BayesianOutcome, AnalysisError> {
    let (x, y) = prepared.features.design_matrix(&prepared.train);
    let fit = fit_bayesian(
        x.view(),
        y.view(),
        prepared.coefficient_names(),
        prior,
        sampler,
        &config.irls,
    )?;
    let diagnostics = summarize(&fit.sample);
    if diagnostics.needs_more_thinning() {
        log::warn!(
            "Lag-1 autocorrelation reaches {:.3} with thin = {}; consider a larger thinning interval",
            diagnostics.max_lag1_autocorrelation(),
            sampler.thin
        );
    }
    let coefficients = posterior_mean(&fit.sample)?;
    let evaluation = evaluate_on_test(&coefficients, prepared, config)?;
    let model = FittedModel {
        method: fit.method,
        features: prepared.features.names(),
        coefficients,
        evaluation: Some(evaluation),
    };
    Ok(BayesianOutcome {
        fit,
        sampler: *sampler,
        diagnostics,
        model,
    })
}

/// Runs every stage on an in-memory dataset.
pub fn run_case_study_on(
    data: Dataset,
    config: &AnalysisConfig,
) -> Result<CaseStudyReport, AnalysisError> {
    let prepared = prepare(data, config)?;

    log::info!("--- Frequentist fit ---");
    let mle = run_mle(&prepared, config)?;

    log::info!("--- Bayesian fit, flat prior ---");
    let flat = run_bayesian(
        &prepared,
        &PriorChoice::Flat,
        &config.sampler.flat_prior_run(),
        config,
    )?;

    log::info!("--- Bayesian fit, normal/exponential prior ---");
    let custom = run_bayesian(
        &prepared,
        &PriorChoice::NormalExponential(config.prior),
        &config.sampler.custom_prior_run(),
        config,
    )?;

    Ok(CaseStudyReport {
        prepared,
        mle,
        flat,
        custom,
    })
}

pub fn run_case_study(
    path: Option<&str>,
    config: &AnalysisConfig,
) -> Result<CaseStudyReport, AnalysisError> {
    let path = resolve_data_path(path, config)?;
    let data = load_records(path)?;
    run_case_study_on(data, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logit::test_fixtures::SyntheticDataBuilder;

    fn fast_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.sampler.sampler.burn_in = 300;
        config.sampler.sampler.iterations = 2_300;
        config.sampler.custom_prior_thin = Some(4);
        config
    }

    #[test]
    fn test_prepare_cleans_and_splits() {
        let data = SyntheticDataBuilder::new(500).with_zero_sentinels(0.05).build();
        let prepared = prepare(data, &fast_config()).unwrap();
        let cleaning = &prepared.exploration.cleaning;
        assert!(cleaning.rows_removed() > 0);
        assert_eq!(
            prepared.train.len() + prepared.test.len(),
            cleaning.rows_after
        );
        for record in prepared.train.records().iter().chain(prepared.test.records()) {
            for field in Field::ZERO_SENTINELS {
                assert_ne!(record.value(field), 0.0);
            }
        }
        assert_eq!(prepared.coefficient_names().len(), 5);
        assert_eq!(prepared.exploration.correlations.fields.len(), 8);
    }

    #[test]
    fn test_everything_removed_is_an_error() {
        let data = SyntheticDataBuilder::new(50).with_zero_sentinels(1.0).build();
        assert!(matches!(
            prepare(data, &fast_config()),
            Err(AnalysisError::NothingLeftAfterCleaning)
        ));
    }

    #[test]
    fn test_missing_path_is_reported() {
        let config = AnalysisConfig::default();
        assert!(matches!(
            resolve_data_path(None, &config),
            Err(AnalysisError::MissingDataPath)
        ));
        assert_eq!(resolve_data_path(Some("a.csv"), &config).unwrap(), "a.csv");
    }

    #[test]
    fn test_case_study_fits_all_three_models() {
        let data = SyntheticDataBuilder::new(700).build();
        let config = fast_config();
        let report = run_case_study_on(data, &config).unwrap();

        assert_eq!(report.mle.model.method, FitMethod::MaximumLikelihood);
        assert_eq!(report.flat.model.method, FitMethod::BayesianFlatPrior);
        assert_eq!(
            report.custom.model.method,
            FitMethod::BayesianNormalExponentialPrior
        );
        assert_eq!(report.flat.fit.sample.n_draws(), 2_000);
        assert_eq!(report.custom.fit.sample.n_draws(), 500);

        for model in [&report.mle.model, &report.flat.model, &report.custom.model] {
            let evaluation = model.evaluation.as_ref().unwrap();
            assert_eq!(evaluation.matrix.total(), report.prepared.test.len());
            assert!(evaluation.accuracy > 0.6, "{:?}", model.method);
        }
        assert!(
            report.custom.model.coefficients.values.iter().skip(1).all(|&b| b >= 0.0)
        );
    }
}
