use mnist::MnistBuilder;
use std::path::Path;
use tracing::info;

use crate::dataset::{DatasetInfo, SourceError};
use crate::prepare::{RawDataset, RawRecord};

const ROWS: usize = 28;
const COLS: usize = 28;
const NUM_CLASSES: usize = 10;
const TRAIN_LEN: u32 = 60_000;
const TEST_LEN: u32 = 10_000;

const FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

/// Loads the MNIST ubyte files found in `base_path` into raw records.
pub fn load_mnist(base_path: &str) -> Result<(RawDataset, DatasetInfo), SourceError> {
    for name in FILES {
        let path = Path::new(base_path).join(name);
        if !path.exists() {
            return Err(SourceError::MissingFile(path));
        }
    }

    let mnist = MnistBuilder::new()
        .base_path(base_path)
        .training_set_length(TRAIN_LEN)
        .test_set_length(TEST_LEN)
        .finalize();

    let train = split_records(mnist.trn_img, &mnist.trn_lbl)?;
    let test = split_records(mnist.tst_img, &mnist.tst_lbl)?;
    info!(train = train.len(), test = test.len(), "loaded MNIST");

    Ok((
        RawDataset { train, test },
        DatasetInfo {
            image_shape: (ROWS, COLS, 1),
            num_classes: NUM_CLASSES,
        },
    ))
}

/// Cuts a flat `n * 784` pixel buffer into one record per label.
pub fn split_records(images: Vec<u8>, labels: &[u8]) -> Result<Vec<RawRecord>, SourceError> {
    let pixels = ROWS * COLS;
    if images.len() != labels.len() * pixels {
        return Err(SourceError::CountMismatch {
            images: images.len() / pixels,
            labels: labels.len(),
        });
    }

    images
        .chunks_exact(pixels)
        .zip(labels)
        .map(|(img, &label)| {
            RawRecord::from_pixels(img.to_vec(), (ROWS, COLS, 1), label as i64)
                .map_err(SourceError::from)
        })
        .collect()
}
