use crate::logit::data::Dataset;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

/// Row indices of a train/test partition, each in original dataset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Split fraction must lie strictly between 0 and 1, got {0}.")]
    InvalidFraction(f64),
    #[error("Cannot split an empty dataset.")]
    EmptyDataset,
    #[error("The split left the {0} set empty; use more rows or a different fraction.")]
    EmptyPartition(&'static str),
}

impl Split {
    pub fn apply(&self, data: &Dataset) -> (Dataset, Dataset) {
        (data.subset(&self.train), data.subset(&self.test))
    }
}

/// Stratified random partition on `Outcome`.
///
/// Within each class the row indices are shuffled by a `StdRng` seeded with
/// `seed`, and the first `ceil(fraction × class_size)` go to the training
/// set. The classes are visited in label order, so a fixed seed reproduces
/// the partition exactly.
pub fn stratified_split(data: &Dataset, fraction: f64, seed: u64) -> Result<Split, SplitError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(SplitError::InvalidFraction(fraction));
    }
    if data.is_empty() {
        return Err(SplitError::EmptyDataset);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity((data.len() as f64 * fraction).ceil() as usize);
    let mut test = Vec::new();

    for label in [0u8, 1u8] {
        let mut class_rows: Vec<usize> = data
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.outcome == label)
            .map(|(i, _)| i)
            .collect();
        if class_rows.is_empty() {
            continue;
        }
        class_rows.shuffle(&mut rng);
        let n_train = (class_rows.len() as f64 * fraction).ceil() as usize;
        train.extend_from_slice(&class_rows[..n_train]);
        test.extend_from_slice(&class_rows[n_train..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    if train.is_empty() {
        return Err(SplitError::EmptyPartition("training"));
    }
    if test.is_empty() {
        return Err(SplitError::EmptyPartition("test"));
    }

    log::info!(
        "Stratified split (fraction {:.2}, seed {}): {} train / {} test rows",
        fraction,
        seed,
        train.len(),
        test.len()
    );
    Ok(Split { train, test })
}
