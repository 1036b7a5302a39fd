//! Quarry Store - File-backed term source, checkpoint store and dataset.
//!
//! - [`CsvTermSource`] reads the ordered `keyword,group` term list
//! - [`JsonCheckpointStore`] keeps completed terms and quota usage in one JSON document
//! - [`CsvDataset`] accumulates harvested records, deduplicated by video id
//!
//! Both writable files are replaced atomically on every change.

pub mod checkpoint;
pub mod dataset;
pub mod fs;
pub mod terms;

pub use checkpoint::JsonCheckpointStore;
pub use dataset::{CsvDataset, DATASET_FILE_NAME};
pub use terms::{parse_terms, CsvTermSource};
