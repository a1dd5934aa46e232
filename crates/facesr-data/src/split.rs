//! Train / test / validation split of a shuffled listing.

use std::path::PathBuf;

use facesr_core::{Error, Result};

/// Three disjoint views of the dataset listing
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: Vec<PathBuf>,
    pub test: Vec<PathBuf>,
    pub validation: Vec<PathBuf>,
}

impl DatasetSplit {
    /// Split a listing.
    ///
    /// `train` takes the first `floor(total * split_ratio)` paths, the last
    /// `validation_size` paths are the validation set and the test set is
    /// whatever lies between (possibly empty).
    ///
    /// With `validation_size == 0` the validation set is empty and the test
    /// set runs to the end of the listing.
    pub fn new(paths: Vec<PathBuf>, split_ratio: f64, validation_size: usize) -> Result<Self> {
        if !(split_ratio > 0.0 && split_ratio <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "split ratio must be in (0, 1], got {}",
                split_ratio
            )));
        }

        let total = paths.len();
        if validation_size > total {
            return Err(Error::InsufficientData {
                required: validation_size,
                available: total,
            });
        }

        let split_index = (total as f64 * split_ratio).floor() as usize;
        let validation_start = total - validation_size;

        if split_index == 0 {
            return Err(Error::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let train = paths[..split_index].to_vec();
        let test = if split_index < validation_start {
            paths[split_index..validation_start].to_vec()
        } else {
            Vec::new()
        };
        let validation = paths[validation_start..].to_vec();

        tracing::info!(
            train = train.len(),
            test = test.len(),
            validation = validation.len(),
            "Split dataset"
        );

        Ok(Self {
            train,
            test,
            validation,
        })
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.test.len() + self.validation.len()
    }
}
