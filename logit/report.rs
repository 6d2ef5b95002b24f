//! Plain-text rendering of every stage of the case study.

use crate::logit::diagnostics::credible_interval;
use crate::logit::evaluate::EvaluationSummary;
use crate::logit::irls::MleFit;
use crate::logit::model::FittedModel;
use crate::logit::pipeline::{BayesianOutcome, Exploration, MleOutcome, PreparedData};
use itertools::Itertools;
use std::fmt;

/// Posterior mass inside the intervals printed for each Bayesian fit.
pub const CREDIBLE_LEVEL: f64 = 0.95;

pub struct CaseStudyReport {
    pub prepared: PreparedData,
    pub mle: MleOutcome,
    pub flat: BayesianOutcome,
    pub custom: BayesianOutcome,
}

impl CaseStudyReport {
    pub fn models(&self) -> [&FittedModel; 3] {
        [&self.flat.model, &self.custom.model, &self.mle.model]
    }
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "=".repeat(title.chars().count()))
}

impl fmt::Display for Exploration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.cleaning;
        writeln!(
            f,
            "Removed {} of {} rows with zero sentinels; {} remain.",
            c.rows_removed(),
            c.rows_before,
            c.rows_after
        )?;
        if !c.zeros_per_field.is_empty() {
            writeln!(
                f,
                "Zeros per field: {}",
                c.zeros_per_field
                    .iter()
                    .map(|(field, n)| format!("{field} {n}"))
                    .join(", ")
            )?;
        }
        writeln!(f, "Positive outcome rate: {:.3}", self.positive_rate)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<26} {:>6} {:>10} {:>10} {:>9} {:>9} {:>9}",
            "Field", "n", "Mean", "SD", "Min", "Median", "Max"
        )?;
        for s in &self.summary {
            writeln!(
                f,
                "{:<26} {:>6} {:>10.3} {:>10.3} {:>9.3} {:>9.3} {:>9.3}",
                s.field.name(),
                s.count,
                s.mean,
                s.sd,
                s.min,
                s.median,
                s.max
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Correlation matrix:")?;
        let short = |name: &str| name.chars().take(8).collect::<String>();
        writeln!(
            f,
            "{:<26} {}",
            "",
            self.correlations
                .fields
                .iter()
                .map(|field| format!("{:>8}", short(field.name())))
                .join(" ")
        )?;
        for (i, field) in self.correlations.fields.iter().enumerate() {
            writeln!(
                f,
                "{:<26} {}",
                field.name(),
                self.correlations
                    .values
                    .row(i)
                    .iter()
                    .map(|r| format!("{r:>8.3}"))
                    .join(" ")
            )?;
        }
        if self.collinear.is_empty() {
            writeln!(f, "No collinear pairs at the configured threshold.")
        } else {
            writeln!(f, "Collinear pairs:")?;
            for pair in &self.collinear {
                writeln!(
                    f,
                    "  {} / {}: r = {:.3}",
                    pair.first, pair.second, pair.correlation
                )?;
            }
            Ok(())
        }
    }
}

/// R-style coefficient table for a maximum-likelihood fit.
pub struct MleTable<'a>(pub &'a MleFit);

impl fmt::Display for MleTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fit = self.0;
        writeln!(
            f,
            "{:<26} {:>12} {:>12} {:>9} {:>12}",
            "", "Estimate", "Std. Error", "z value", "Pr(>|z|)"
        )?;
        for t in &fit.tests {
            writeln!(
                f,
                "{:<26} {:>12.6} {:>12.6} {:>9.3} {:>12.3e} {}",
                t.name,
                t.estimate,
                t.std_error,
                t.z_value,
                t.p_value,
                significance_stars(t.p_value)
            )?;
        }
        writeln!(
            f,
            "Null deviance: {:.2}  Residual deviance: {:.2}  AIC: {:.2}",
            fit.null_deviance, fit.deviance, fit.aic
        )?;
        writeln!(
            f,
            "IRLS iterations: {} ({:?})",
            fit.iterations, fit.status
        )
    }
}

pub fn significance_stars(p: f64) -> &'static str {
    match p {
        p if p < 0.001 => "***",
        p if p < 0.01 => "**",
        p if p < 0.05 => "*",
        p if p < 0.1 => ".",
        _ => "",
    }
}

impl fmt::Display for BayesianOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "burn-in {}, iterations {}, thin {}, tune {}, seed {}",
            self.sampler.burn_in,
            self.sampler.iterations,
            self.sampler.thin,
            self.sampler.tune,
            self.sampler.seed
        )?;
        write!(f, "{}", self.diagnostics)?;
        writeln!(f, "{:.0}% credible intervals:", CREDIBLE_LEVEL * 100.0)?;
        let sample = &self.fit.sample;
        for (j, name) in sample.names.iter().enumerate() {
            let (lo, hi) = credible_interval(sample.column(j), CREDIBLE_LEVEL);
            writeln!(f, "  {name:<24} [{lo:.5}, {hi:.5}]")?;
        }
        if let Some(evaluation) = &self.model.evaluation {
            writeln!(f)?;
            write!(f, "{evaluation}")?;
        }
        Ok(())
    }
}

fn comparison_row(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    evaluation: Option<&EvaluationSummary>,
) -> fmt::Result {
    match evaluation {
        Some(e) => writeln!(
            f,
            "{:<36} {:>9.4} {:>12.4} {:>12.4} {:>8.4}",
            label, e.accuracy, e.sensitivity, e.specificity, e.kappa
        ),
        None => writeln!(f, "{label:<36} (not evaluated)"),
    }
}

impl fmt::Display for CaseStudyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        heading(f, "Data cleaning and exploration")?;
        write!(f, "{}", self.prepared.exploration)?;

        heading(f, "Model specification")?;
        writeln!(
            f,
            "Outcome ~ {}",
            self.prepared.features.names().join(" + ")
        )?;
        writeln!(
            f,
            "Dropped: {}",
            self.prepared.features.dropped().iter().join(", ")
        )?;
        writeln!(
            f,
            "Training rows: {}, test rows: {}",
            self.prepared.train.len(),
            self.prepared.test.len()
        )?;

        heading(f, "Bayesian logistic regression, flat prior")?;
        write!(f, "{}", self.flat)?;

        heading(f, "Bayesian logistic regression, normal/exponential prior")?;
        write!(f, "{}", self.custom)?;

        heading(f, "Maximum-likelihood logistic regression")?;
        write!(f, "{}", MleTable(&self.mle.fit))?;
        if let Some(evaluation) = &self.mle.model.evaluation {
            writeln!(f)?;
            write!(f, "{evaluation}")?;
        }

        heading(f, "Comparison on the test set")?;
        writeln!(
            f,
            "{:<36} {:>9} {:>12} {:>12} {:>8}",
            "Model", "Accuracy", "Sensitivity", "Specificity", "Kappa"
        )?;
        for model in self.models() {
            comparison_row(f, model.method.describe(), model.evaluation.as_ref())?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<26} {}",
            "Coefficient",
            self.models()
                .iter()
                .map(|m| format!("{:>14}", short_method(m)))
                .join(" ")
        )?;
        for (j, name) in self.mle.model.coefficients.names.iter().enumerate() {
            writeln!(
                f,
                "{:<26} {}",
                name,
                self.models()
                    .iter()
                    .map(|m| format!("{:>14.6}", m.coefficients.values[j]))
                    .join(" ")
            )?;
        }
        Ok(())
    }
}

fn short_method(model: &FittedModel) -> &'static str {
    use crate::logit::model::FitMethod::*;
    match model.method {
        MaximumLikelihood => "MLE",
        BayesianFlatPrior => "Flat prior",
        BayesianNormalExponentialPrior => "Custom prior",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logit::config::AnalysisConfig;
    use crate::logit::pipeline::run_case_study_on;
    use crate::logit::test_fixtures::SyntheticDataBuilder;

    #[test]
    fn test_significance_stars() {
        assert_eq!(significance_stars(1e-5), "***");
        assert_eq!(significance_stars(0.005), "**");
        assert_eq!(significance_stars(0.03), "*");
        assert_eq!(significance_stars(0.07), ".");
        assert_eq!(significance_stars(0.5), "");
    }

    #[test]
    fn test_report_renders_every_section() {
        let mut config = AnalysisConfig::default();
        config.sampler.sampler.burn_in = 200;
        config.sampler.sampler.iterations = 1_200;
        config.sampler.custom_prior_thin = Some(2);
        let data = SyntheticDataBuilder::new(400).with_zero_sentinels(0.02).build();
        let report = run_case_study_on(data, &config).unwrap();
        let text = report.to_string();

        for section in [
            "Data cleaning and exploration",
            "Outcome ~ Glucose + BMI + DiabetesPedigreeFunction + BloodPressure",
            "Dropped: Pregnancies, SkinThickness, Insulin, Age",
            "flat prior",
            "normal/exponential prior",
            "Pr(>|z|)",
            "Comparison on the test set",
            "(Intercept)",
            "Sensitivity",
            "95% credible intervals:",
        ] {
            assert!(text.contains(section), "missing '{section}'");
        }
    }
}
