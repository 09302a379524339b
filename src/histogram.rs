use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    #[error("Cannot build a histogram from an empty sample")]
    Empty,
    #[error("Histogram needs at least one bucket")]
    ZeroBins,
    #[error("Sample value {value} at index {index} is not finite")]
    NonFinite { index: usize, value: f64 },
}

/// Default bucket count used by [`crate::logger::TbLogger::log_histogram`].
pub const DEFAULT_BINS: usize = 1000;

/// Summary of a sample of values, in the layout TensorBoard's histogram
/// record uses: `bucket_limit[i]` is the upper edge of `bucket[i]`, and the
/// lower edge of the first bucket is left implicit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub num: u64,
    pub sum: f64,
    pub sum_squares: f64,
    pub bucket_limit: Vec<f64>,
    pub bucket: Vec<u64>,
}

impl Histogram {
    /// Equal-width histogram over `[min, max]` with `bins` buckets.
    ///
    /// Fails on an empty sample, on `bins == 0` and on NaN or infinite
    /// values. When every value is equal the range is widened to
    /// `[v - 0.5, v + 0.5]`. The last bucket is closed on the right so the
    /// maximum is always counted.
    pub fn from_values(values: &[f64], bins: usize) -> Result<Histogram, HistogramError> {
        if values.is_empty() {
            return Err(HistogramError::Empty);
        }
        if bins == 0 {
            return Err(HistogramError::ZeroBins);
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(HistogramError::NonFinite { index, value });
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum = values.iter().sum();
        let sum_squares = values.iter().map(|v| v * v).sum();

        let (lo, hi) = if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let width = (hi - lo) / bins as f64;

        let mut bucket = vec![0u64; bins];
        for &v in values {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            bucket[idx] += 1;
        }

        // upper edges only: edges[1..=bins]
        let bucket_limit = (1..=bins)
            .map(|i| if i == bins { hi } else { lo + width * i as f64 })
            .collect();

        Ok(Histogram {
            min,
            max,
            num: values.len() as u64,
            sum,
            sum_squares,
            bucket_limit,
            bucket,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_cover_every_value() {
        let values: Vec<f64> = (0..97).map(|i| (i as f64 * 0.37).sin()).collect();
        let hist = Histogram::from_values(&values, 10).unwrap();
        assert_eq!(hist.bucket.iter().sum::<u64>(), 97);
        assert_eq!(hist.num, 97);
        assert_eq!(hist.bucket.len(), 10);
        assert_eq!(hist.bucket_limit.len(), 10);
        assert_eq!(*hist.bucket_limit.last().unwrap(), hist.max);
    }

    #[test]
    fn records_true_extremes_and_moments() {
        let hist = Histogram::from_values(&[3.0, -1.0, 2.0], 4).unwrap();
        assert_eq!(hist.min, -1.0);
        assert_eq!(hist.max, 3.0);
        assert_eq!(hist.sum, 4.0);
        assert_eq!(hist.sum_squares, 14.0);
        assert_eq!(hist.bucket_limit, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(hist.bucket, vec![1, 0, 0, 2]);
    }

    #[test]
    fn constant_sample_uses_unit_range() {
        let hist = Histogram::from_values(&[2.0; 5], 2).unwrap();
        assert_eq!(hist.bucket_limit, vec![2.0, 2.5]);
        assert_eq!(hist.bucket, vec![0, 5]);
    }

    #[test]
    fn empty_sample_or_zero_bins_fail() {
        assert_eq!(Histogram::from_values(&[], 10), Err(HistogramError::Empty));
        assert_eq!(
            Histogram::from_values(&[1.0], 0),
            Err(HistogramError::ZeroBins)
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let nan = Histogram::from_values(&[1.0, f64::NAN, 3.0], 2).unwrap_err();
        assert!(matches!(nan, HistogramError::NonFinite { index: 1, value } if value.is_nan()));
        assert_eq!(
            Histogram::from_values(&[1.0, f64::INFINITY, 3.0], 2),
            Err(HistogramError::NonFinite {
                index: 1,
                value: f64::INFINITY
            })
        );
        assert_eq!(
            Histogram::from_values(&[f64::NEG_INFINITY], 2),
            Err(HistogramError::NonFinite {
                index: 0,
                value: f64::NEG_INFINITY
            })
        );
    }
}
