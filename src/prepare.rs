use ndarray::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while turning raw records into examples and batches.
#[derive(Error, Debug, PartialEq)]
pub enum PrepareError {
    #[error("Shape mismatch: expected {expected} elements, got {got}")]
    Shape { expected: usize, got: usize },
    #[error("Label {label} out of range for {num_classes} classes")]
    LabelRange { label: i64, num_classes: usize },
    #[error("Train split of length {len} is not a multiple of batch size {batch_size}")]
    BatchBounds { len: usize, batch_size: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, PrepareError>;

/// One record as produced by a dataset source: an image of any shape and an
/// integer class label.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub image: ArrayD<u8>,
    pub label: i64,
}

impl RawRecord {
    pub fn new(image: ArrayD<u8>, label: i64) -> RawRecord {
        RawRecord { image, label }
    }

    /// Builds a record from a flat pixel buffer and its (h, w, c) shape.
    pub fn from_pixels(pixels: Vec<u8>, shape: (usize, usize, usize), label: i64) -> Result<Self> {
        let expected = shape.0 * shape.1 * shape.2;
        let got = pixels.len();
        let image = Array3::from_shape_vec(shape, pixels)
            .map_err(|_| PrepareError::Shape { expected, got })?;
        Ok(RawRecord::new(image.into_dyn(), label))
    }
}

/// Raw train and test splits, consumed by [`prepare`].
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub train: Vec<RawRecord>,
    pub test: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input: Array1<f32>, // (n_inputs)
    pub label: Array1<f32>, // (num_classes), one-hot
}

impl Example {
    /// Index of the hot entry in the label vector.
    pub fn class_index(&self) -> Option<usize> {
        self.label.iter().position(|&v| v == 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub examples: Vec<Example>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Stacks the batch into `(inputs, labels)` matrices of shape
    /// `(batch, n_inputs)` and `(batch, num_classes)`.
    pub fn to_arrays(&self) -> (Array2<f32>, Array2<f32>) {
        let n_inputs = self.examples.first().map_or(0, |e| e.input.len());
        let num_classes = self.examples.first().map_or(0, |e| e.label.len());

        let mut inputs = Array2::zeros((self.len(), n_inputs));
        let mut labels = Array2::zeros((self.len(), num_classes));
        for (i, example) in self.examples.iter().enumerate() {
            inputs.row_mut(i).assign(&example.input);
            labels.row_mut(i).assign(&example.label);
        }
        (inputs, labels)
    }
}

/// What to do with the trailing records of the train split when its length is
/// not a multiple of the batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Emit a final, shorter batch.
    #[default]
    KeepShort,
    /// Discard the trailing records.
    DropShort,
    /// Fail with [`PrepareError::BatchBounds`].
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDataset {
    pub train: Vec<Batch>,
    pub test: Vec<Example>,
}

impl PreparedDataset {
    pub fn num_train_examples(&self) -> usize {
        self.train.iter().map(Batch::len).sum()
    }
}

/// One-hot encodes `label` into a flat vector of length `num_classes`.
pub fn one_hot(label: i64, num_classes: usize) -> Result<Array1<f32>> {
    if label < 0 || label as u64 >= num_classes as u64 {
        return Err(PrepareError::LabelRange { label, num_classes });
    }
    let mut encoded = Array1::zeros(num_classes);
    encoded[label as usize] = 1.0;
    Ok(encoded)
}

/// Flattens an image of any shape into `n_inputs` f32 values, row-major.
/// Pixel values are cast, not rescaled.
pub fn flatten_image(image: &ArrayD<u8>, n_inputs: usize) -> Result<Array1<f32>> {
    if image.len() != n_inputs {
        return Err(PrepareError::Shape {
            expected: n_inputs,
            got: image.len(),
        });
    }
    Ok(image.iter().map(|&p| p as f32).collect())
}

/// Builds one example from a raw record.
pub fn encode_record(record: &RawRecord, n_inputs: usize, num_classes: usize) -> Result<Example> {
    Ok(Example {
        input: flatten_image(&record.image, n_inputs)?,
        label: one_hot(record.label, num_classes)?,
    })
}

/// Prepares a dataset with the default [`BatchPolicy`] (keep a short final batch).
pub fn prepare(
    raw_train: &[RawRecord],
    raw_test: &[RawRecord],
    batch_size: usize,
    n_inputs: usize,
    num_classes: usize,
) -> Result<PreparedDataset> {
    prepare_with_policy(
        raw_train,
        raw_test,
        batch_size,
        n_inputs,
        num_classes,
        BatchPolicy::default(),
    )
}

pub fn prepare_with_policy(
    raw_train: &[RawRecord],
    raw_test: &[RawRecord],
    batch_size: usize,
    n_inputs: usize,
    num_classes: usize,
    policy: BatchPolicy,
) -> Result<PreparedDataset> {
    for (name, value) in [
        ("batch_size", batch_size),
        ("n_inputs", n_inputs),
        ("num_classes", num_classes),
    ] {
        if value == 0 {
            return Err(PrepareError::InvalidArgument(format!("{name} must be >= 1")));
        }
    }

    let remainder = raw_train.len() % batch_size;
    if remainder != 0 {
        debug!(
            len = raw_train.len(),
            batch_size,
            ?policy,
            "train split does not divide evenly into batches"
        );
        if policy == BatchPolicy::Strict {
            return Err(PrepareError::BatchBounds {
                len: raw_train.len(),
                batch_size,
            });
        }
    }

    let mut train = Vec::with_capacity(raw_train.len().div_ceil(batch_size));
    for chunk in raw_train.chunks(batch_size) {
        if chunk.len() < batch_size && policy == BatchPolicy::DropShort {
            break;
        }
        let examples = chunk
            .iter()
            .map(|r| encode_record(r, n_inputs, num_classes))
            .collect::<Result<Vec<_>>>()?;
        train.push(Batch { examples });
    }

    let test = raw_test
        .iter()
        .map(|r| encode_record(r, n_inputs, num_classes))
        .collect::<Result<Vec<_>>>()?;

    info!(
        train_batches = train.len(),
        test_examples = test.len(),
        batch_size,
        "prepared dataset"
    );

    Ok(PreparedDataset { train, test })
}

/// Consumes the raw splits and returns their prepared replacement.
pub fn prepare_dataset(
    raw: RawDataset,
    batch_size: usize,
    n_inputs: usize,
    num_classes: usize,
) -> Result<PreparedDataset> {
    prepare(&raw.train, &raw.test, batch_size, n_inputs, num_classes)
}
