use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::dataset::load_data_and_constants;
use crate::logger::{SummarySink, TbLogger};
use crate::metagraph::{metagraph_summary, Component, MetagraphRenderer};
use crate::prepare::PreparedDataset;
use crate::run::{next_run_prefix, HParams};

/// Logs split sizes, the test label distribution and the pixel distribution
/// of the first train batch.
pub fn log_dataset_summary<S: SummarySink>(
    dataset: &PreparedDataset,
    logger: &mut TbLogger<S>,
    step: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    logger.log_scalar("data/train_batches", dataset.train.len() as f32, step)?;
    logger.log_scalar("data/train_examples", dataset.num_train_examples() as f32, step)?;
    logger.log_scalar("data/test_examples", dataset.test.len() as f32, step)?;

    let test_labels: Vec<f64> = dataset
        .test
        .iter()
        .filter_map(|e| e.class_index())
        .map(|c| c as f64)
        .collect();
    if !test_labels.is_empty() {
        let num_classes = dataset.test[0].label.len();
        logger.log_histogram("data/test_labels", &test_labels, step, num_classes)?;
    }

    if let Some(batch) = dataset.train.first() {
        let (inputs, _) = batch.to_arrays();
        let pixels: Vec<f32> = inputs.iter().copied().collect();
        if !pixels.is_empty() {
            logger.log_histogram_default("data/first_batch_pixels", &pixels, step)?;
        }
    }
    Ok(())
}

/// Loads and prepares `hparams.dataset`, then writes the resolved hparams and
/// a dataset summary into a fresh run directory. Returns that directory.
pub fn prepare_run(hparams: &mut HParams) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dataset = load_data_and_constants(hparams)?;
    println!("[TRAIN] batches: {}", dataset.train.len());
    println!("[TEST] len: {}\n", dataset.test.len());

    let run_dir = hparams.log_dir.join(next_run_prefix());
    fs::create_dir_all(&run_dir)?; // in case the folder does not exist
    hparams.to_file(run_dir.join("hparams.json"))?;

    let mut logger = TbLogger::create(&run_dir)?;
    log_dataset_summary(&dataset, &mut logger, 0)?;
    logger.close()?;

    info!(run_dir = %run_dir.display(), "dataset summary written");
    Ok(run_dir)
}

/// Renders the components in `components_path` (a JSON array) and logs the
/// snapshot under a fresh run prefix.
pub fn metagraph_run(
    components_path: &Path,
    hparams: &HParams,
    renderer: &MetagraphRenderer,
    step: i64,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(components_path)?;
    let components: Vec<Component> = serde_json::from_str(&json)?;

    let run_prefix = next_run_prefix();
    let mut logger = TbLogger::create(hparams.log_dir.join(&run_prefix))?;
    let png_path = metagraph_summary(&components, renderer, &mut logger, &run_prefix, step, hparams)?;
    logger.close()?;

    info!(path = %png_path.display(), "metagraph written");
    Ok(png_path)
}
