//! Run logger in the spirit of TensorBoard summaries.
//!
//! A [`TbLogger`] turns scalars, value samples and rendered images into
//! [`SummaryEvent`]s and appends them to a [`SummarySink`]. The default sink,
//! [`EventFileWriter`], writes one JSON record per line to an append-only
//! event file inside the run's log directory.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::histogram::{Histogram, HistogramError, DEFAULT_BINS};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Cannot build a histogram from an empty sample")]
    EmptyInput,
    #[error("Histogram needs at least one bucket")]
    ZeroBins,
    #[error("Sample value {value} at index {index} is not finite")]
    NonFinite { index: usize, value: f64 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoggerError>;

impl From<HistogramError> for LoggerError {
    fn from(e: HistogramError) -> Self {
        match e {
            HistogramError::Empty => LoggerError::EmptyInput,
            HistogramError::ZeroBins => LoggerError::ZeroBins,
            HistogramError::NonFinite { index, value } => LoggerError::NonFinite { index, value },
        }
    }
}

/// An encoded PNG and its pixel dimensions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlotImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryValue {
    Scalar { value: f32 },
    Histogram(Histogram),
    Image(PlotImage),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SummaryEvent {
    pub wall_time: f64,
    pub step: i64,
    pub tag: String,
    pub value: SummaryValue,
}

impl SummaryEvent {
    pub fn now(tag: &str, step: i64, value: SummaryValue) -> SummaryEvent {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        SummaryEvent {
            wall_time,
            step,
            tag: tag.to_string(),
            value,
        }
    }
}

/// Append-only, step-indexed store of summary events.
pub trait SummarySink {
    fn write(&mut self, event: &SummaryEvent) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Per-process writer counter, keeps file names unique within one second.
static WRITER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Writes events as JSON lines to
/// `<log_dir>/events.out.trainkit.<secs>.<pid>.<seq>`. Every writer owns its
/// file; two writers never share one.
pub struct EventFileWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventFileWriter {
    pub fn create(log_dir: impl AsRef<Path>) -> Result<EventFileWriter> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?; // in case the folder does not exist

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let seq = WRITER_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = log_dir.join(format!(
            "events.out.trainkit.{secs}.{}.{seq}",
            std::process::id()
        ));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        debug!(path = %path.display(), "opened event file");

        Ok(EventFileWriter {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummarySink for EventFileWriter {
    fn write(&mut self, event: &SummaryEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

impl Drop for EventFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(path = %self.path.display(), "failed to flush event file: {e}");
        }
    }
}

/// Keeps every event in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<SummaryEvent>,
    pub flushes: usize,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn events_for<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a SummaryEvent> {
        self.events.iter().filter(move |e| e.tag == tag)
    }
}

impl SummarySink for MemorySink {
    fn write(&mut self, event: &SummaryEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Logs scalars, histograms and images under a tag and a training step.
///
/// The sink is held for the lifetime of the logger. Call [`TbLogger::close`]
/// to flush and release it and observe any final write error.
pub struct TbLogger<S: SummarySink = EventFileWriter> {
    sink: S,
}

impl TbLogger<EventFileWriter> {
    /// Opens an event file in `log_dir`.
    pub fn create(log_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(TbLogger::with_sink(EventFileWriter::create(log_dir)?))
    }
}

impl<S: SummarySink> TbLogger<S> {
    pub fn with_sink(sink: S) -> Self {
        TbLogger { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Log a scalar variable. Several values for the same `(tag, step)` are all kept.
    pub fn log_scalar(&mut self, tag: &str, value: f32, step: i64) -> Result<()> {
        self.sink
            .write(&SummaryEvent::now(tag, step, SummaryValue::Scalar { value }))
    }

    /// Log the histogram of a sample of values, with `bins` equal-width buckets.
    /// Empty samples, `bins == 0` and non-finite values are rejected before
    /// anything is written.
    pub fn log_histogram<T>(&mut self, tag: &str, values: &[T], step: i64, bins: usize) -> Result<()>
    where
        T: Copy + Into<f64>,
    {
        let values: Vec<f64> = values.iter().map(|&v| v.into()).collect();
        let hist = Histogram::from_values(&values, bins)?;
        self.sink
            .write(&SummaryEvent::now(tag, step, SummaryValue::Histogram(hist)))?;
        self.sink.flush()
    }

    /// [`TbLogger::log_histogram`] with [`DEFAULT_BINS`] buckets.
    pub fn log_histogram_default<T>(&mut self, tag: &str, values: &[T], step: i64) -> Result<()>
    where
        T: Copy + Into<f64>,
    {
        self.log_histogram(tag, values, step, DEFAULT_BINS)
    }

    /// Log an already rendered image.
    pub fn log_image(&mut self, tag: &str, image: &PlotImage, step: i64) -> Result<()> {
        self.sink.write(&SummaryEvent::now(
            tag,
            step,
            SummaryValue::Image(image.clone()),
        ))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    /// Flushes and hands back the sink.
    pub fn into_sink(mut self) -> Result<S> {
        self.sink.flush()?;
        Ok(self.sink)
    }

    pub fn close(self) -> Result<()> {
        self.into_sink().map(drop)
    }
}
