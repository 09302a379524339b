use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dataset::{DatasetInfo, SourceError};
use crate::prepare::{RawDataset, RawRecord};

/// `metadata.json` layout: class name ("1", "2", ...) to image paths
/// relative to the dataset root, for each split.
#[derive(Deserialize)]
struct MetadataSchema {
    train: BTreeMap<String, Vec<String>>,
    test: BTreeMap<String, Vec<String>>,
}

fn load_metadata(root_data_dir: &Path) -> Result<MetadataSchema, SourceError> {
    let path = root_data_dir.join("metadata.json");
    if !path.exists() {
        return Err(SourceError::MissingFile(path));
    }
    let json_str = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json_str)?)
}

/// Class names are 1-based integers; labels are 0-based.
fn parse_label(name: &str) -> Result<i64, SourceError> {
    match name.trim().parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(SourceError::UnknownLabel(name.to_string())),
    }
}

fn samples(root: &Path, split: &BTreeMap<String, Vec<String>>) -> Result<Vec<(PathBuf, i64)>, SourceError> {
    let mut out = Vec::new();
    for (label_str, paths) in split {
        let label = parse_label(label_str)?;
        out.extend(paths.iter().map(|p| (root.join(p), label)));
    }
    Ok(out)
}

/// Loads a greyscale image resized to `target_h x target_w`, as `(h, w, 1)` pixels.
pub fn process_image(path: &Path, target_h: u32, target_w: u32) -> Result<Vec<u8>, SourceError> {
    let img = image::open(path).map_err(|e| SourceError::Image(path.to_path_buf(), e))?;
    let resized = img
        .grayscale()
        .resize_exact(target_w, target_h, FilterType::Triangle);
    Ok(resized.to_luma8().into_raw())
}

/// Loads an image-folder dataset described by `<data_dir>/metadata.json`.
///
/// Records keep the order of the metadata file, with classes sorted by name.
pub fn load_image_folder(
    data_dir: &str,
    target_h: u32,
    target_w: u32,
) -> Result<(RawDataset, DatasetInfo), SourceError> {
    let root = Path::new(data_dir);
    let metadata = load_metadata(root)?;

    let train_samples = samples(root, &metadata.train)?;
    let test_samples = samples(root, &metadata.test)?;
    let num_classes = train_samples
        .iter()
        .chain(&test_samples)
        .map(|(_, label)| *label as usize + 1)
        .max()
        .unwrap_or(0);

    let shape = (target_h as usize, target_w as usize, 1);
    let pb = ProgressBar::new((train_samples.len() + test_samples.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let load = |split: Vec<(PathBuf, i64)>| -> Result<Vec<RawRecord>, SourceError> {
        split
            .into_iter()
            .map(|(path, label)| -> Result<RawRecord, SourceError> {
                let pixels = process_image(&path, target_h, target_w)?;
                pb.inc(1);
                Ok(RawRecord::from_pixels(pixels, shape, label)?)
            })
            .collect()
    };
    let train = load(train_samples)?;
    let test = load(test_samples)?;
    pb.finish_and_clear();

    info!(
        train = train.len(),
        test = test.len(),
        num_classes,
        "loaded image folder {}",
        root.display()
    );

    Ok((
        RawDataset { train, test },
        DatasetInfo {
            image_shape: shape,
            num_classes,
        },
    ))
}
