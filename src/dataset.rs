use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::custom_dataset::load_image_folder;
use crate::mnist_dataset::load_mnist;
use crate::prepare::{prepare_dataset, PrepareError, PreparedDataset};
use crate::run::HParams;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Dataset file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("Count mismatch: {images} images vs {labels} labels")]
    CountMismatch { images: usize, labels: usize },
    #[error("Unknown class label {0:?}")]
    UnknownLabel(String),
    #[error("Failed to decode {}: {1}", .0.display())]
    Image(PathBuf, image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Prepare(#[from] PrepareError),
}

/// Shape metadata a dataset source reports alongside its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetInfo {
    /// (height, width, channels)
    pub image_shape: (usize, usize, usize),
    pub num_classes: usize,
}

impl DatasetInfo {
    pub fn n_inputs(&self) -> usize {
        let (h, w, c) = self.image_shape;
        h * w * c
    }
}

/// Loads `hparams.dataset`, fills in `n_inputs` / `n_targets` and returns the
/// prepared train batches and test examples.
///
/// `"mnist"` reads the ubyte files under `data/`; anything else is treated as
/// an image-folder dataset root.
pub fn load_data_and_constants(hparams: &mut HParams) -> Result<PreparedDataset, SourceError> {
    let (raw, info) = match hparams.dataset.as_str() {
        "mnist" => load_mnist("data/")?,
        dir => load_image_folder(dir, hparams.image_size, hparams.image_size)?,
    };

    hparams.n_inputs = info.n_inputs();
    hparams.n_targets = info.num_classes;
    info!(
        n_inputs = hparams.n_inputs,
        n_targets = hparams.n_targets,
        "dataset constants"
    );

    Ok(prepare_dataset(
        raw,
        hparams.batch_size,
        hparams.n_inputs,
        hparams.n_targets,
    )?)
}
