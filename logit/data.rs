//! # Data Loading and Cleaning Module
//!
//! This module is the exclusive entry point for the diabetes dataset. It reads
//! the comma-separated file, validates it against the fixed nine-column schema,
//! and turns it into an ordered list of [`Record`]s.
//!
//! - Strict Schema: Column names are not configurable. The header must carry
//!   `Pregnancies`, `Glucose`, `BloodPressure`, `SkinThickness`, `Insulin`,
//!   `BMI`, `DiabetesPedigreeFunction`, `Age` and `Outcome`.
//! - Zero Sentinels: several measurement columns record a missing value as `0`.
//!   [`Dataset::remove_zero_sentinels`] drops those rows; it is the only way a
//!   dataset loses records.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// The nine columns of the input file, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Pregnancies,
    Glucose,
    BloodPressure,
    SkinThickness,
    Insulin,
    #[serde(rename = "BMI")]
    Bmi,
    DiabetesPedigreeFunction,
    Age,
    Outcome,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Pregnancies,
        Field::Glucose,
        Field::BloodPressure,
        Field::SkinThickness,
        Field::Insulin,
        Field::Bmi,
        Field::DiabetesPedigreeFunction,
        Field::Age,
        Field::Outcome,
    ];

    /// The eight measurement columns, i.e. everything except `Outcome`.
    pub const MEASUREMENTS: [Field; 8] = [
        Field::Pregnancies,
        Field::Glucose,
        Field::BloodPressure,
        Field::SkinThickness,
        Field::Insulin,
        Field::Bmi,
        Field::DiabetesPedigreeFunction,
        Field::Age,
    ];

    /// Columns where a zero means "not measured".
    pub const ZERO_SENTINELS: [Field; 5] = [
        Field::Bmi,
        Field::Glucose,
        Field::BloodPressure,
        Field::SkinThickness,
        Field::Insulin,
    ];

    /// The exact header name used in the input file.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pregnancies => "Pregnancies",
            Self::Glucose => "Glucose",
            Self::BloodPressure => "BloodPressure",
            Self::SkinThickness => "SkinThickness",
            Self::Insulin => "Insulin",
            Self::Bmi => "BMI",
            Self::DiabetesPedigreeFunction => "DiabetesPedigreeFunction",
            Self::Age => "Age",
            Self::Outcome => "Outcome",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, DataError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| DataError::UnknownField(name.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One patient observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub pregnancies: f64,
    /// Plasma glucose, mg/dL.
    pub glucose: f64,
    /// Diastolic blood pressure, mmHg.
    pub blood_pressure: f64,
    /// Triceps skin fold thickness, mm.
    pub skin_thickness: f64,
    /// Two-hour serum insulin, µU/mL.
    pub insulin: f64,
    /// Body mass index, kg/m².
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    /// Age in years.
    pub age: f64,
    /// Binary label, 0 or 1.
    pub outcome: u8,
}

impl Record {
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Pregnancies => self.pregnancies,
            Field::Glucose => self.glucose,
            Field::BloodPressure => self.blood_pressure,
            Field::SkinThickness => self.skin_thickness,
            Field::Insulin => self.insulin,
            Field::Bmi => self.bmi,
            Field::DiabetesPedigreeFunction => self.diabetes_pedigree_function,
            Field::Age => self.age,
            Field::Outcome => f64::from(self.outcome),
        }
    }
}

/// Ordered sequence of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

/// What [`Dataset::remove_zero_sentinels`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    /// Number of zeros found per field before any row was removed.
    pub zeros_per_field: Vec<(Field, usize)>,
}

impl CleaningReport {
    pub fn rows_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// Descriptive statistics for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSummary {
    pub field: Field,
    pub count: usize,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error("'{0}' is not a column of the diabetes dataset.")]
    UnknownField(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Row {row} has Outcome = {value}; only 0 and 1 are valid labels.")]
    InvalidOutcome { row: usize, value: f64 },
    #[error(
        "Input file contains only {found} data rows, but at least {required} are required."
    )]
    InsufficientRows { found: usize, required: usize },
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, field: Field) -> Vec<f64> {
        self.records.iter().map(|r| r.value(field)).collect()
    }

    pub fn outcomes(&self) -> Vec<u8> {
        self.records.iter().map(|r| r.outcome).collect()
    }

    /// Share of records with `Outcome = 1`.
    pub fn positive_rate(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let positives = self.records.iter().filter(|r| r.outcome == 1).count();
        positives as f64 / self.records.len() as f64
    }

    /// Copies the records at `indices`, in the order given.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// Drops every record holding a zero in any of `fields`.
    pub fn remove_zero_sentinels(&mut self, fields: &[Field]) -> CleaningReport {
        let rows_before = self.records.len();
        let zeros_per_field = fields
            .iter()
            .map(|&field| {
                let zeros = self.records.iter().filter(|r| r.value(field) == 0.0).count();
                (field, zeros)
            })
            .collect();

        self.records
            .retain(|r| fields.iter().all(|&field| r.value(field) != 0.0));

        let report = CleaningReport {
            rows_before,
            rows_after: self.records.len(),
            zeros_per_field,
        };
        log::info!(
            "Removed {} of {} rows with zero sentinels",
            report.rows_removed(),
            rows_before
        );
        report
    }

    /// Count, mean, sample standard deviation, min, median and max of every column.
    pub fn summary(&self) -> Vec<FieldSummary> {
        Field::ALL
            .iter()
            .map(|&field| summarize_column(field, self.column(field)))
            .collect()
    }
}

fn summarize_column(field: Field, values: Vec<f64>) -> FieldSummary {
    let count = values.len();
    if count == 0 {
        return FieldSummary {
            field,
            count,
            mean: f64::NAN,
            sd: f64::NAN,
            min: f64::NAN,
            median: f64::NAN,
            max: f64::NAN,
        };
    }
    let sd = if count > 1 { values.iter().std_dev() } else { 0.0 };
    FieldSummary {
        field,
        count,
        mean: values.iter().mean(),
        sd,
        min: Statistics::min(values.iter()),
        max: Statistics::max(values.iter()),
        median: Data::new(values).median(),
    }
}

/// Loads and validates the diabetes dataset from a comma-separated file.
pub fn load_records(path: &str) -> Result<Dataset, DataError> {
    internal::load_records(path)
}

/// Internal module for data loading logic.
mod internal {
    use super::*;

    pub(super) const MINIMUM_ROWS: usize = 10;

    fn extract_numeric_column(df: &DataFrame, field: Field) -> Result<Vec<f64>, DataError> {
        let column_name = field.name();
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        // A failed string-to-float cast surfaces as nulls rather than an error.
        if casted.null_count() > 0 {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }

    pub(super) fn load_records(path: &str) -> Result<Dataset, DataError> {
        log::info!("Loading data from '{path}'");

        let df = CsvReader::new(File::open(Path::new(path))?)
            .with_options(CsvReadOptions::default().with_has_header(true))
            .finish()?;

        if df.height() < MINIMUM_ROWS {
            return Err(DataError::InsufficientRows {
                found: df.height(),
                required: MINIMUM_ROWS,
            });
        }

        let columns_set: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        for field in Field::ALL {
            if !columns_set.contains(field.name()) {
                return Err(DataError::ColumnNotFound(field.name().to_string()));
            }
        }

        let mut columns = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            columns.push(extract_numeric_column(&df, field)?);
        }

        let n = df.height();
        let mut records = Vec::with_capacity(n);
        for row in 0..n {
            let outcome_value = columns[8][row];
            let outcome = if outcome_value == 0.0 {
                0
            } else if outcome_value == 1.0 {
                1
            } else {
                return Err(DataError::InvalidOutcome {
                    row: row + 1,
                    value: outcome_value,
                });
            };
            records.push(Record {
                pregnancies: columns[0][row],
                glucose: columns[1][row],
                blood_pressure: columns[2][row],
                skin_thickness: columns[3][row],
                insulin: columns[4][row],
                bmi: columns[5][row],
                diabetes_pedigree_function: columns[6][row],
                age: columns[7][row],
                outcome,
            });
        }

        log::info!("Loaded {} records with all {} columns", n, Field::ALL.len());
        Ok(Dataset::new(records))
    }
}
