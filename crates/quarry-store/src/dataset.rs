use std::collections::HashSet;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quarry_core::traits::DatasetSink;
use quarry_core::{AppError, FetchedRecord, MergeResult};
use tracing::{debug, warn};

use crate::fs::atomic_write;

/// File name of the dataset inside the data directory.
pub const DATASET_FILE_NAME: &str = "all_videos_data.csv";

/// Append-only dataset stored as one CSV file, deduplicated by video id.
///
/// The whole file is rewritten through [`atomic_write`] on every merge that
/// adds records, so readers never see a half-written row.
///
/// # Examples
///
/// ```no_run
/// use quarry_core::traits::DatasetSink;
/// use quarry_store::CsvDataset;
///
/// # fn example() -> Result<(), quarry_core::AppError> {
/// let dataset = CsvDataset::open("youtube_data/all_videos_data.csv")?;
/// println!("{} records so far", dataset.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CsvDataset {
    path: PathBuf,
    records: Vec<FetchedRecord>,
    identities: HashSet<String>,
}

impl CsvDataset {
    /// Opens the dataset at `path`, loading existing rows. A missing file is
    /// an empty dataset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PersistenceError` if the file cannot be read or a
    /// row does not match the dataset columns.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let mut dataset = Self {
            path,
            records: Vec::new(),
            identities: HashSet::new(),
        };

        let file = match File::open(&dataset.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(dataset),
            Err(e) => return Err(dataset.error("read", e)),
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut collapsed = 0usize;
        for result in reader.deserialize::<FetchedRecord>() {
            let record = result.map_err(|e| dataset.error("parse", e))?;
            if dataset.identities.insert(record.identity.clone()) {
                dataset.records.push(record);
            } else {
                collapsed += 1;
            }
        }
        if collapsed > 0 {
            warn!(
                path = %dataset.path.display(),
                collapsed,
                "Dataset contained repeated video ids; kept the first occurrence"
            );
        }
        debug!(path = %dataset.path.display(), records = dataset.records.len(), "Dataset loaded");
        Ok(dataset)
    }

    /// Opens `<data_dir>/all_videos_data.csv`.
    pub fn open_in(data_dir: &Path) -> Result<Self, AppError> {
        Self::open(data_dir.join(DATASET_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only snapshot of the records, in insertion order.
    pub fn records(&self) -> &[FetchedRecord] {
        &self.records
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    fn error(&self, action: &str, e: impl std::fmt::Display) -> AppError {
        AppError::PersistenceError(format!(
            "failed to {action} dataset {}: {e}",
            self.path.display()
        ))
    }

    fn encode(&self, records: &[&FetchedRecord]) -> Result<Vec<u8>, AppError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| self.error("encode", e))?;
        }
        writer
            .into_inner()
            .map_err(|e| self.error("encode", e.error()))
    }
}

impl DatasetSink for CsvDataset {
    fn merge(&mut self, records: &[FetchedRecord]) -> Result<MergeResult, AppError> {
        let mut result = MergeResult::default();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut fresh = Vec::new();
        for record in records {
            if self.contains(&record.identity) || !seen.insert(&record.identity) {
                result.duplicates += 1;
            } else {
                fresh.push(record);
            }
        }
        result.added = fresh.len();
        if fresh.is_empty() {
            return Ok(result);
        }

        let all: Vec<&FetchedRecord> = self.records.iter().chain(fresh.iter().copied()).collect();
        let bytes = self.encode(&all)?;
        atomic_write(&self.path, &bytes).map_err(|e| self.error("write", e))?;

        for record in fresh {
            self.identities.insert(record.identity.clone());
            self.records.push(record.clone());
        }
        Ok(result)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
