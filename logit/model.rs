use crate::logit::evaluate::EvaluationSummary;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the public, human-readable format of a fitted model
// when serialized to a TOML file.

/// Name used for the leading column of every design matrix.
pub const INTERCEPT_NAME: &str = "(Intercept)";

/// Inputs to the logistic link are clamped to this range before `exp`.
const ETA_CLAMP: f64 = 700.0;

/// The procedure that produced a coefficient vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Iteratively reweighted least squares, no prior.
    MaximumLikelihood,
    /// Random-walk Metropolis under the improper flat prior.
    BayesianFlatPrior,
    /// Random-walk Metropolis under the normal intercept / exponential slope prior.
    BayesianNormalExponentialPrior,
}

impl FitMethod {
    pub fn describe(self) -> &'static str {
        match self {
            Self::MaximumLikelihood => "maximum likelihood (IRLS)",
            Self::BayesianFlatPrior => "Bayesian, flat prior",
            Self::BayesianNormalExponentialPrior => "Bayesian, normal/exponential prior",
        }
    }
}

/// An ordered, named coefficient vector. Index 0 is always the intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientVector {
    pub names: Vec<String>,
    pub values: Array1<f64>,
}

/// The top-level, self-contained fitted model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub method: FitMethod,
    /// Predictor columns in design-matrix order, excluding the intercept.
    pub features: Vec<String>,
    pub coefficients: CoefficientVector,
    #[serde(default)]
    pub evaluation: Option<EvaluationSummary>,
}

/// Custom error type for coefficient handling and model persistence.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Coefficient vector has {values} values but {names} names.")]
    MismatchedNames { names: usize, values: usize },
    #[error("The first coefficient must be named '{INTERCEPT_NAME}', found '{0}'.")]
    MissingIntercept(String),
    #[error(
        "Design matrix has {found} columns, but the coefficient vector has {expected} entries."
    )]
    MismatchedDesignWidth { found: usize, expected: usize },
}

/// Logistic function, with the input clamped so `exp` cannot overflow.
pub fn sigmoid(eta: f64) -> f64 {
    let eta = eta.clamp(-ETA_CLAMP, ETA_CLAMP);
    1.0 / (1.0 + (-eta).exp())
}

impl CoefficientVector {
    pub fn new(names: Vec<String>, values: Array1<f64>) -> Result<Self, ModelError> {
        if names.len() != values.len() {
            return Err(ModelError::MismatchedNames {
                names: names.len(),
                values: values.len(),
            });
        }
        match names.first() {
            Some(first) if first == INTERCEPT_NAME => {}
            Some(first) => return Err(ModelError::MissingIntercept(first.clone())),
            None => return Err(ModelError::MissingIntercept(String::new())),
        }
        Ok(Self { names, values })
    }

    /// Builds the coefficient names for a design matrix over `features`.
    pub fn names_for(features: &[String]) -> Vec<String> {
        std::iter::once(INTERCEPT_NAME.to_string())
            .chain(features.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn intercept(&self) -> f64 {
        self.values[0]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Computes `intercept + Σ β_j x_j` for each row. `x` must carry the
    /// leading column of ones.
    pub fn linear_predictor(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.values.len() {
            return Err(ModelError::MismatchedDesignWidth {
                found: x.ncols(),
                expected: self.values.len(),
            });
        }
        Ok(x.dot(&self.values))
    }

    /// Probabilities of `Outcome = 1` through the logistic link.
    pub fn predict_probabilities(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.linear_predictor(x)?.mapv(sigmoid))
    }
}

impl FittedModel {
    /// Saves the fitted model to a file in a human-readable TOML format.
    pub fn save(&self, path: &str) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a fitted model from a TOML file.
    pub fn load(path: &str) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model = toml::from_str(&toml_string)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use tempfile::NamedTempFile;

    fn two_feature_coefficients(values: Array1<f64>) -> CoefficientVector {
        let names = CoefficientVector::names_for(&["Glucose".to_string(), "BMI".to_string()]);
        CoefficientVector::new(names, values).unwrap()
    }

    #[test]
    fn test_sigmoid_is_symmetric_and_bounded() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(sigmoid(2.0) + sigmoid(-2.0), 1.0, epsilon = 1e-12);
        assert!(sigmoid(1e6).is_finite());
        assert!(sigmoid(-1e6) >= 0.0);
    }

    #[test]
    fn test_names_must_match_values() {
        let err = CoefficientVector::new(
            vec![INTERCEPT_NAME.to_string()],
            array![0.0, 1.0],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::MismatchedNames {
                names: 1,
                values: 2
            }
        ));
    }

    #[test]
    fn test_first_name_must_be_intercept() {
        let err = CoefficientVector::new(
            vec!["Glucose".to_string(), INTERCEPT_NAME.to_string()],
            array![0.0, 1.0],
        )
        .unwrap_err();
        match err {
            ModelError::MissingIntercept(name) => assert_eq!(name, "Glucose"),
            other => panic!("Expected MissingIntercept, got {:?}", other),
        }
    }

    #[test]
    fn test_linear_predictor_uses_intercept_column() {
        let coeffs = two_feature_coefficients(array![-1.0, 0.5, 2.0]);
        let x = array![[1.0, 2.0, 0.0], [1.0, 0.0, 1.0]];
        let eta = coeffs.linear_predictor(x.view()).unwrap();
        assert_abs_diff_eq!(eta[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eta[1], 1.0, epsilon = 1e-12);
        assert_eq!(coeffs.get("BMI"), Some(2.0));
        assert_eq!(coeffs.get("Insulin"), None);
    }

    #[test]
    fn test_design_width_mismatch_is_rejected() {
        let coeffs = two_feature_coefficients(array![0.0, 0.0, 0.0]);
        let x = array![[1.0, 2.0]];
        match coeffs.predict_probabilities(x.view()) {
            Err(ModelError::MismatchedDesignWidth { found, expected }) => {
                assert_eq!(found, 2);
                assert_eq!(expected, 3);
            }
            other => panic!("Expected MismatchedDesignWidth, got {:?}", other),
        }
    }

    #[test]
    fn test_fitted_model_toml_round_trip() {
        let model = FittedModel {
            method: FitMethod::MaximumLikelihood,
            features: vec!["Glucose".to_string(), "BMI".to_string()],
            coefficients: two_feature_coefficients(array![-8.5, 0.035, 0.09]),
            evaluation: None,
        };
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        model.save(path).unwrap();
        let loaded = FittedModel::load(path).unwrap();
        assert_eq!(loaded.method, FitMethod::MaximumLikelihood);
        assert_eq!(loaded.features, model.features);
        assert_eq!(loaded.coefficients, model.coefficients);
    }
}
