use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hyper-parameters shared by the data pipeline and the run logger.
///
/// `n_inputs` and `n_targets` are discovered from the dataset by
/// [`crate::dataset::load_data_and_constants`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HParams {
    /// `"mnist"` or a directory holding a `metadata.json` image dataset.
    pub dataset: String,
    pub batch_size: usize,
    pub log_dir: PathBuf,
    /// Side length images from a folder dataset are resized to.
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub n_inputs: usize,
    #[serde(default)]
    pub n_targets: usize,
}

fn default_image_size() -> u32 {
    64
}

impl Default for HParams {
    fn default() -> Self {
        HParams {
            dataset: "mnist".to_string(),
            batch_size: 128,
            log_dir: PathBuf::from("runs"),
            image_size: default_image_size(),
            n_inputs: 0,
            n_targets: 0,
        }
    }
}

impl HParams {
    pub fn to_file(&self, filepath: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(filepath.as_ref())?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(filepath.as_ref())?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let hparams: HParams = serde_json::from_str(&contents)?;
        Ok(hparams)
    }
}

/// Random nonce in `[0, 1_000_000_000]`.
pub fn next_nonce() -> u64 {
    rand::thread_rng().gen_range(0..=1_000_000_000)
}

/// Run directory prefix: the current unix time in whole seconds.
pub fn next_run_prefix() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_stays_in_range() {
        for _ in 0..1000 {
            assert!(next_nonce() <= 1_000_000_000);
        }
    }

    #[test]
    fn run_prefix_is_unix_seconds() {
        let prefix: u64 = next_run_prefix().parse().unwrap();
        assert!(prefix > 1_600_000_000);
    }

    #[test]
    fn hparams_missing_constants_default_to_zero() {
        let hp: HParams =
            serde_json::from_str(r#"{"dataset":"mnist","batch_size":32,"log_dir":"logs"}"#).unwrap();
        assert_eq!(hp.batch_size, 32);
        assert_eq!(hp.image_size, 64);
        assert_eq!((hp.n_inputs, hp.n_targets), (0, 0));
    }

    #[test]
    fn hparams_round_trip_through_a_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run été").join("hparams.json");
        std::fs::create_dir_all(path.parent().unwrap())?;
        let hp = HParams {
            dataset: "data/faces".to_string(),
            batch_size: 16,
            log_dir: dir.path().to_path_buf(),
            image_size: 32,
            n_inputs: 1024,
            n_targets: 7,
        };
        hp.to_file(&path)?;
        assert_eq!(HParams::from_file(&path)?, hp);
        Ok(())
    }
}
