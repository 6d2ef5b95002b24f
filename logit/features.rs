//! Predictor selection and the correlation screen that motivates it.
//!
//! `SkinThickness` is strongly correlated with `BMI` and `Insulin` with
//! `Glucose` on the cleaned data, so the default feature set keeps only one
//! column of each pair. The selection itself is fixed; [`collinear_pairs`]
//! exists so the report can show the evidence.

use crate::logit::data::{Dataset, Field};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Pairs with |r| at or above this value are flagged as collinear.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.58;

/// Ordered predictor columns of the logistic model, intercept excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    fields: Vec<Field>,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            fields: vec![
                Field::Glucose,
                Field::Bmi,
                Field::DiabetesPedigreeFunction,
                Field::BloodPressure,
            ],
        }
    }
}

/// Two columns whose absolute Pearson correlation reached the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CollinearPair {
    pub first: Field,
    pub second: Field,
    pub correlation: f64,
}

/// Symmetric Pearson correlation matrix over a list of columns.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub fields: Vec<Field>,
    pub values: Array2<f64>,
}

impl FeatureSet {
    /// Builds a feature set; `Outcome` can never be a predictor and duplicates are dropped.
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut unique: Vec<Field> = Vec::new();
        for field in fields {
            if field != Field::Outcome && !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Measurement columns left out of the model.
    pub fn dropped(&self) -> Vec<Field> {
        Field::MEASUREMENTS
            .iter()
            .copied()
            .filter(|f| !self.fields.contains(f))
            .collect()
    }

    /// Design matrix with a leading column of ones, and the 0/1 response.
    pub fn design_matrix(&self, data: &Dataset) -> (Array2<f64>, Array1<f64>) {
        let n = data.len();
        let p = self.fields.len() + 1;
        let mut x = Array2::<f64>::ones((n, p));
        for (i, record) in data.records().iter().enumerate() {
            for (j, &field) in self.fields.iter().enumerate() {
                x[[i, j + 1]] = record.value(field);
            }
        }
        let y = data.records().iter().map(|r| f64::from(r.outcome)).collect();
        (x, y)
    }
}

/// Pearson correlation of two equally long slices. Zero when either is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 { 0.0 } else { cov / denom }
}

pub fn correlation_matrix(data: &Dataset, fields: &[Field]) -> CorrelationMatrix {
    let columns: Vec<Vec<f64>> = fields.iter().map(|&f| data.column(f)).collect();
    let k = fields.len();
    let mut values = Array2::<f64>::eye(k);
    for i in 0..k {
        for j in (i + 1)..k {
            let r = pearson(&columns[i], &columns[j]);
            values[[i, j]] = r;
            values[[j, i]] = r;
        }
    }
    CorrelationMatrix {
        fields: fields.to_vec(),
        values,
    }
}

/// Off-diagonal pairs with |r| ≥ `threshold`, strongest first.
pub fn collinear_pairs(matrix: &CorrelationMatrix, threshold: f64) -> Vec<CollinearPair> {
    let k = matrix.fields.len();
    let mut pairs = Vec::new();
    for i in 0..k {
        for j in (i + 1)..k {
            let r = matrix.values[[i, j]];
            if r.abs() >= threshold {
                pairs.push(CollinearPair {
                    first: matrix.fields[i],
                    second: matrix.fields[j],
                    correlation: r,
                });
            }
        }
    }
    pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
    pairs
}
