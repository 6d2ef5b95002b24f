//! Point-estimate classification and confusion-matrix statistics.

use crate::logit::model::{CoefficientVector, ModelError};
use crate::logit::sampler::PosteriorSample;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Confidence level of the exact accuracy interval.
pub const ACCURACY_INTERVAL_LEVEL: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Label treated as "positive" for sensitivity and specificity.
    pub positive_label: u8,
    /// A row is predicted `1` when its probability is strictly above this.
    pub threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            positive_label: 0,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Predicted and actual label sequences differ in length ({predicted} vs {actual}).")]
    LengthMismatch { predicted: usize, actual: usize },
    #[error("Cannot evaluate an empty set of predictions.")]
    Empty,
    #[error("Label {0} is not binary; labels must be 0 or 1.")]
    InvalidLabel(u8),
    #[error("Classification threshold must lie in [0, 1], got {0}.")]
    InvalidThreshold(f64),
    #[error("Interval level must lie strictly between 0 and 1, got {0}.")]
    InvalidLevel(f64),
    #[error("Failed to build the beta distribution for the accuracy interval: {0}")]
    Interval(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Reduces retained draws to the per-coefficient arithmetic mean.
pub fn posterior_mean(sample: &PosteriorSample) -> Result<CoefficientVector, ModelError> {
    CoefficientVector::new(sample.names.clone(), sample.mean())
}

/// `1` when `prob > threshold`, else `0`; a probability exactly at the threshold maps to `0`.
pub fn classify(probabilities: &Array1<f64>, threshold: f64) -> Vec<u8> {
    probabilities
        .iter()
        .map(|&p| u8::from(p > threshold))
        .collect()
}

/// A 2×2 table of counts indexed `[predicted][actual]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        f64::NAN
    } else {
        num as f64 / den as f64
    }
}

impl ConfusionMatrix {
    pub fn from_labels(predicted: &[u8], actual: &[u8]) -> Result<Self, EvaluationError> {
        if predicted.len() != actual.len() {
            return Err(EvaluationError::LengthMismatch {
                predicted: predicted.len(),
                actual: actual.len(),
            });
        }
        if predicted.is_empty() {
            return Err(EvaluationError::Empty);
        }
        let mut counts = [[0usize; 2]; 2];
        for (&p, &a) in predicted.iter().zip(actual) {
            if p > 1 {
                return Err(EvaluationError::InvalidLabel(p));
            }
            if a > 1 {
                return Err(EvaluationError::InvalidLabel(a));
            }
            counts[p as usize][a as usize] += 1;
        }
        Ok(Self { counts })
    }

    pub fn count(&self, predicted: u8, actual: u8) -> usize {
        self.counts[predicted as usize][actual as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn actual_total(&self, label: usize) -> usize {
        self.counts[0][label] + self.counts[1][label]
    }

    fn predicted_total(&self, label: usize) -> usize {
        self.counts[label][0] + self.counts[label][1]
    }

    pub fn correct(&self) -> usize {
        self.counts[0][0] + self.counts[1][1]
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Share of the most frequent actual class.
    pub fn no_information_rate(&self) -> f64 {
        ratio(self.actual_total(0).max(self.actual_total(1)), self.total())
    }

    /// Cohen's kappa.
    pub fn kappa(&self) -> f64 {
        let n = self.total() as f64;
        let observed = self.accuracy();
        let expected: f64 = (0..2)
            .map(|k| self.predicted_total(k) as f64 * self.actual_total(k) as f64 / (n * n))
            .sum();
        if expected >= 1.0 {
            return f64::NAN;
        }
        (observed - expected) / (1.0 - expected)
    }

    /// Recall of `positive`: correctly predicted positives over actual positives.
    pub fn sensitivity(&self, positive: u8) -> f64 {
        let p = (positive & 1) as usize;
        ratio(self.counts[p][p], self.actual_total(p))
    }

    pub fn specificity(&self, positive: u8) -> f64 {
        let q = 1 - (positive & 1) as usize;
        ratio(self.counts[q][q], self.actual_total(q))
    }

    pub fn positive_predictive_value(&self, positive: u8) -> f64 {
        let p = (positive & 1) as usize;
        ratio(self.counts[p][p], self.predicted_total(p))
    }

    pub fn negative_predictive_value(&self, positive: u8) -> f64 {
        let q = 1 - (positive & 1) as usize;
        ratio(self.counts[q][q], self.predicted_total(q))
    }

    pub fn balanced_accuracy(&self, positive: u8) -> f64 {
        (self.sensitivity(positive) + self.specificity(positive)) / 2.0
    }

    /// Exact (Clopper–Pearson) interval for the accuracy.
    pub fn accuracy_interval(&self, level: f64) -> Result<(f64, f64), EvaluationError> {
        if !(level > 0.0 && level < 1.0) {
            return Err(EvaluationError::InvalidLevel(level));
        }
        let n = self.total();
        let x = self.correct();
        let alpha = 1.0 - level;
        let lower = if x == 0 {
            0.0
        } else {
            Beta::new(x as f64, (n - x + 1) as f64)
                .map_err(|e| EvaluationError::Interval(e.to_string()))?
                .inverse_cdf(alpha / 2.0)
        };
        let upper = if x == n {
            1.0
        } else {
            Beta::new((x + 1) as f64, (n - x) as f64)
                .map_err(|e| EvaluationError::Interval(e.to_string()))?
                .inverse_cdf(1.0 - alpha / 2.0)
        };
        Ok((lower, upper))
    }
}

/// Everything reported for one evaluated coefficient vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub positive_label: u8,
    pub threshold: f64,
    pub matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub accuracy_lower: f64,
    pub accuracy_upper: f64,
    pub no_information_rate: f64,
    pub kappa: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub positive_predictive_value: f64,
    pub negative_predictive_value: f64,
    pub balanced_accuracy: f64,
}

impl EvaluationSummary {
    pub fn from_matrix(
        matrix: ConfusionMatrix,
        config: &EvaluationConfig,
    ) -> Result<Self, EvaluationError> {
        let positive = config.positive_label;
        let (accuracy_lower, accuracy_upper) = matrix.accuracy_interval(ACCURACY_INTERVAL_LEVEL)?;
        Ok(Self {
            positive_label: positive,
            threshold: config.threshold,
            matrix,
            accuracy: matrix.accuracy(),
            accuracy_lower,
            accuracy_upper,
            no_information_rate: matrix.no_information_rate(),
            kappa: matrix.kappa(),
            sensitivity: matrix.sensitivity(positive),
            specificity: matrix.specificity(positive),
            positive_predictive_value: matrix.positive_predictive_value(positive),
            negative_predictive_value: matrix.negative_predictive_value(positive),
            balanced_accuracy: matrix.balanced_accuracy(positive),
        })
    }
}

/// Applies `coefficients` to the rows of `x` and scores the thresholded labels against `actual`.
///
/// `x` must carry the leading intercept column; a width that does not match
/// the coefficient vector is reported as [`ModelError::MismatchedDesignWidth`].
pub fn evaluate(
    coefficients: &CoefficientVector,
    x: ArrayView2<f64>,
    actual: &[u8],
    config: &EvaluationConfig,
) -> Result<EvaluationSummary, EvaluationError> {
    if !(0.0..=1.0).contains(&config.threshold) {
        return Err(EvaluationError::InvalidThreshold(config.threshold));
    }
    if config.positive_label > 1 {
        return Err(EvaluationError::InvalidLabel(config.positive_label));
    }
    let probabilities = coefficients.predict_probabilities(x)?;
    let predicted = classify(&probabilities, config.threshold);
    let matrix = ConfusionMatrix::from_labels(&predicted, actual)?;
    let summary = EvaluationSummary::from_matrix(matrix, config)?;
    log::info!(
        "Evaluated {} rows: accuracy {:.4}, sensitivity {:.4}, specificity {:.4}",
        matrix.total(),
        summary.accuracy,
        summary.sensitivity,
        summary.specificity
    );
    Ok(summary)
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "            Reference")?;
        writeln!(f, "Prediction     0     1")?;
        for p in 0..2 {
            writeln!(
                f,
                "         {} {:>5} {:>5}",
                p, self.counts[p][0], self.counts[p][1]
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matrix)?;
        writeln!(
            f,
            "Accuracy : {:.4}  (95% CI {:.4}, {:.4})",
            self.accuracy, self.accuracy_lower, self.accuracy_upper
        )?;
        writeln!(f, "No Information Rate : {:.4}", self.no_information_rate)?;
        writeln!(f, "Kappa : {:.4}", self.kappa)?;
        writeln!(f, "Sensitivity : {:.4}", self.sensitivity)?;
        writeln!(f, "Specificity : {:.4}", self.specificity)?;
        writeln!(f, "Pos Pred Value : {:.4}", self.positive_predictive_value)?;
        writeln!(f, "Neg Pred Value : {:.4}", self.negative_predictive_value)?;
        writeln!(f, "Balanced Accuracy : {:.4}", self.balanced_accuracy)?;
        writeln!(f, "'Positive' Class : {}", self.positive_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logit::model::INTERCEPT_NAME;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn names() -> Vec<String> {
        CoefficientVector::names_for(&[
            "Glucose".to_string(),
            "BMI".to_string(),
            "DiabetesPedigreeFunction".to_string(),
            "BloodPressure".to_string(),
        ])
    }

    fn test_rows() -> Array2<f64> {
        array![
            [1.0, 148.0, 33.6, 0.627, 72.0],
            [1.0, 85.0, 26.6, 0.351, 66.0],
            [1.0, 183.0, 23.3, 0.672, 64.0],
            [1.0, 89.0, 28.1, 0.167, 66.0],
        ]
    }

    fn coefficients_with_intercept(intercept: f64) -> CoefficientVector {
        let mut values = Array1::zeros(5);
        values[0] = intercept;
        CoefficientVector::new(names(), values).unwrap()
    }

    #[test]
    fn test_zero_coefficients_give_half_and_label_zero() {
        let coeffs = coefficients_with_intercept(0.0);
        let probs = coeffs.predict_probabilities(test_rows().view()).unwrap();
        for p in probs.iter() {
            assert_abs_diff_eq!(*p, 0.5, epsilon = 1e-15);
        }
        assert_eq!(classify(&probs, DEFAULT_THRESHOLD), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_large_intercepts_saturate_predictions() {
        let x = test_rows();
        let high = coefficients_with_intercept(50.0);
        let low = coefficients_with_intercept(-50.0);
        let p_high = high.predict_probabilities(x.view()).unwrap();
        let p_low = low.predict_probabilities(x.view()).unwrap();
        assert_eq!(classify(&p_high, DEFAULT_THRESHOLD), vec![1; 4]);
        assert_eq!(classify(&p_low, DEFAULT_THRESHOLD), vec![0; 4]);
    }

    #[test]
    fn test_confusion_matrix_statistics() {
        // 30 true 0s, 10 false 0s, 5 false 1s, 20 true 1s.
        let mut predicted = Vec::new();
        let mut actual = Vec::new();
        for (p, a, n) in [(0u8, 0u8, 30), (0, 1, 10), (1, 0, 5), (1, 1, 20)] {
            predicted.extend(std::iter::repeat_n(p, n));
            actual.extend(std::iter::repeat_n(a, n));
        }
        let m = ConfusionMatrix::from_labels(&predicted, &actual).unwrap();
        assert_eq!(m.count(0, 0), 30);
        assert_eq!(m.count(1, 0), 5);
        assert_eq!(m.total(), 65);
        assert_abs_diff_eq!(m.accuracy(), 50.0 / 65.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.no_information_rate(), 35.0 / 65.0, epsilon = 1e-12);

        // Label 0 as the positive class.
        assert_abs_diff_eq!(m.sensitivity(0), 30.0 / 35.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.specificity(0), 20.0 / 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.positive_predictive_value(0), 30.0 / 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.negative_predictive_value(0), 20.0 / 25.0, epsilon = 1e-12);

        // Swapping the positive class swaps sensitivity and specificity.
        assert_abs_diff_eq!(m.sensitivity(1), m.specificity(0), epsilon = 1e-12);
        assert_abs_diff_eq!(m.specificity(1), m.sensitivity(0), epsilon = 1e-12);

        let pe = (40.0 * 35.0 + 25.0 * 30.0) / (65.0 * 65.0);
        let expected_kappa = (50.0 / 65.0 - pe) / (1.0 - pe);
        assert_abs_diff_eq!(m.kappa(), expected_kappa, epsilon = 1e-12);
    }

    #[test]
    fn test_accuracy_interval_brackets_accuracy() {
        let m = ConfusionMatrix {
            counts: [[120, 27], [23, 47]],
        };
        let (lo, hi) = m.accuracy_interval(0.95).unwrap();
        assert!(lo < m.accuracy() && m.accuracy() < hi);
        assert!(lo > 0.69 && hi < 0.85, "interval ({lo}, {hi})");

        let perfect = ConfusionMatrix {
            counts: [[10, 0], [0, 10]],
        };
        let (lo, hi) = perfect.accuracy_interval(0.95).unwrap();
        assert_eq!(hi, 1.0);
        // Exact lower bound for 20/20 is (0.025)^(1/20).
        assert_abs_diff_eq!(lo, 0.025_f64.powf(1.0 / 20.0), epsilon = 1e-4);
        assert!(matches!(
            perfect.accuracy_interval(1.0),
            Err(EvaluationError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_label_validation() {
        assert!(matches!(
            ConfusionMatrix::from_labels(&[0, 1], &[0]),
            Err(EvaluationError::LengthMismatch { .. })
        ));
        assert!(matches!(
            ConfusionMatrix::from_labels(&[], &[]),
            Err(EvaluationError::Empty)
        ));
        assert!(matches!(
            ConfusionMatrix::from_labels(&[0, 2], &[0, 1]),
            Err(EvaluationError::InvalidLabel(2))
        ));
    }

    #[test]
    fn test_evaluate_rejects_wrong_width() {
        let coeffs = coefficients_with_intercept(0.0);
        let narrow = Array2::<f64>::ones((3, 3));
        let result = evaluate(&coeffs, narrow.view(), &[0, 1, 0], &EvaluationConfig::default());
        assert!(matches!(
            result,
            Err(EvaluationError::Model(ModelError::MismatchedDesignWidth {
                found: 3,
                expected: 5
            }))
        ));
    }

    #[test]
    fn test_evaluate_end_to_end() {
        let coeffs = CoefficientVector::new(
            names(),
            array![-8.0, 0.035, 0.09, 0.9, -0.005],
        )
        .unwrap();
        let summary =
            evaluate(&coeffs, test_rows().view(), &[1, 0, 1, 0], &EvaluationConfig::default())
                .unwrap();
        assert_eq!(summary.matrix.total(), 4);
        assert_abs_diff_eq!(summary.accuracy, 1.0, epsilon = 1e-12);
        assert_eq!(summary.positive_label, 0);
        let text = summary.to_string();
        assert!(text.contains("Accuracy : 1.0000"));
        assert!(text.contains("'Positive' Class : 0"));
    }

    #[test]
    fn test_posterior_mean_of_draws() {
        let sample = PosteriorSample {
            names: vec![INTERCEPT_NAME.to_string(), "Glucose".to_string()],
            draws: array![[1.0, 0.1], [3.0, 0.3]],
            acceptance_rate: 0.3,
        };
        let mean = posterior_mean(&sample).unwrap();
        assert_abs_diff_eq!(mean.intercept(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.get("Glucose").unwrap(), 0.2, epsilon = 1e-12);
    }
}
