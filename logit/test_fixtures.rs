//! Synthetic diabetes-like records for tests and benches.
//!
//! Measurements are drawn from plausible clinical ranges and the outcome
//! follows a logistic model in Glucose, BMI, DiabetesPedigreeFunction and
//! BloodPressure, so fits on this data have known, positive slopes.

use crate::logit::data::{Dataset, Field, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::io;
use std::path::Path;

/// Per-unit log-odds effects used to generate outcomes, in the default feature order.
pub const TRUE_SLOPES: [(Field, f64); 4] = [
    (Field::Glucose, 0.035),
    (Field::Bmi, 0.09),
    (Field::DiabetesPedigreeFunction, 0.9),
    (Field::BloodPressure, 0.002),
];

/// Builder for synthetic [`Dataset`]s with a controlled prevalence.
pub struct SyntheticDataBuilder {
    n_samples: usize,
    prevalence: f64,
    signal_strength: f64,
    zero_fraction: f64,
    seed: u64,
}

impl SyntheticDataBuilder {
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            prevalence: 0.33,
            signal_strength: 1.0,
            zero_fraction: 0.0,
            seed: 42,
        }
    }

    /// Share of rows labelled `1`.
    pub fn with_prevalence(mut self, p: f64) -> Self {
        self.prevalence = p.clamp(0.01, 0.99);
        self
    }

    /// Multiplier on [`TRUE_SLOPES`]; `0.0` gives outcomes unrelated to the features.
    pub fn with_signal_strength(mut self, s: f64) -> Self {
        self.signal_strength = s;
        self
    }

    /// Probability that each zero-sentinel measurement of a row is recorded as `0`.
    pub fn with_zero_sentinels(mut self, fraction: f64) -> Self {
        self.zero_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    pub fn build(self) -> Dataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = self.n_samples;

        let mut records: Vec<Record> = (0..n)
            .map(|_| {
                let mut normal = |mean: f64, sd: f64, min: f64| -> f64 {
                    let z: f64 = rng.sample(StandardNormal);
                    (mean + sd * z).max(min)
                };
                let glucose = normal(121.0, 30.0, 45.0).round();
                let bmi = (normal(32.4, 6.9, 18.0) * 10.0).round() / 10.0;
                let blood_pressure = normal(72.4, 12.4, 30.0).round();
                let skin_thickness = (0.9 * bmi - 0.5 + normal(0.0, 7.0, 0.0)).max(7.0).round();
                let insulin = (1.2 * glucose + normal(10.0, 90.0, 0.0)).max(14.0).round();
                let age = normal(33.0, 11.0, 21.0).round();
                let pregnancies = normal(3.8, 3.3, 0.0).round();
                let dpf_z: f64 = rng.sample(StandardNormal);
                let diabetes_pedigree_function =
                    ((-0.95 + 0.6 * dpf_z).exp() * 1000.0).round().max(78.0) / 1000.0;
                Record {
                    pregnancies,
                    glucose,
                    blood_pressure,
                    skin_thickness,
                    insulin,
                    bmi,
                    diabetes_pedigree_function,
                    age,
                    outcome: 0,
                }
            })
            .collect();

        // Logistic liability; the top `prevalence` share becomes the positive class.
        let liability: Vec<f64> = records
            .iter()
            .map(|r| {
                let u: f64 = rng.r#gen::<f64>().clamp(1e-12, 1.0 - 1e-12);
                let noise = (u / (1.0 - u)).ln();
                let signal: f64 = TRUE_SLOPES
                    .iter()
                    .map(|&(field, beta)| beta * r.value(field))
                    .sum();
                self.signal_strength * signal + noise
            })
            .collect();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| liability[b].total_cmp(&liability[a]));
        let n_cases = (n as f64 * self.prevalence).round() as usize;
        for &idx in order.iter().take(n_cases) {
            records[idx].outcome = 1;
        }

        if self.zero_fraction > 0.0 {
            for record in &mut records {
                for field in Field::ZERO_SENTINELS {
                    if rng.r#gen::<f64>() < self.zero_fraction {
                        set_field(record, field, 0.0);
                    }
                }
            }
        }

        Dataset::new(records)
    }
}

fn set_field(record: &mut Record, field: Field, value: f64) {
    match field {
        Field::Pregnancies => record.pregnancies = value,
        Field::Glucose => record.glucose = value,
        Field::BloodPressure => record.blood_pressure = value,
        Field::SkinThickness => record.skin_thickness = value,
        Field::Insulin => record.insulin = value,
        Field::Bmi => record.bmi = value,
        Field::DiabetesPedigreeFunction => record.diabetes_pedigree_function = value,
        Field::Age => record.age = value,
        Field::Outcome => record.outcome = u8::from(value != 0.0),
    }
}

/// Writes `data` as a headed CSV in the column layout the loader expects.
pub fn write_csv<P: AsRef<Path>>(data: &Dataset, path: P) -> io::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(Field::ALL.iter().map(|f| f.name()))?;
    for record in data.records() {
        writer.write_record(Field::ALL.iter().map(|&f| record.value(f).to_string()))?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_hits_prevalence_and_is_seeded() {
        let a = SyntheticDataBuilder::new(500).with_prevalence(0.3).build();
        let b = SyntheticDataBuilder::new(500).with_prevalence(0.3).build();
        let c = SyntheticDataBuilder::new(500).with_prevalence(0.3).seed(7).build();
        assert_eq!(a.len(), 500);
        assert!((a.positive_rate() - 0.3).abs() < 1e-9);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_measurements_are_positive_without_sentinels() {
        let data = SyntheticDataBuilder::new(300).build();
        for record in data.records() {
            for field in Field::ZERO_SENTINELS {
                assert!(record.value(field) > 0.0, "{field} was {}", record.value(field));
            }
        }
    }

    #[test]
    fn test_zero_sentinels_are_injected() {
        let data = SyntheticDataBuilder::new(300).with_zero_sentinels(0.2).build();
        let zeros = data
            .records()
            .iter()
            .filter(|r| Field::ZERO_SENTINELS.iter().any(|&f| r.value(f) == 0.0))
            .count();
        assert!(zeros > 100);
    }
}
