//! Quarry Core - Domain types, quota accounting and the resumable harvest loop.
//!
//! The harvest engine ingests records for a list of query terms from a
//! quota-metered external API. Progress is checkpointed after every term so a
//! run can be interrupted at any point and resumed later without spending
//! quota twice or duplicating records.
//!
//! - [`quota`] - the [`QuotaLedger`] gate for every spend
//! - [`fetch`] - search-then-details round trip for one term
//! - [`harvest`] - the [`HarvestService`] state machine
//! - [`traits`] - seams for the API client, term source and stores
//! - [`progress`] - progress events and reporters

pub mod config;
pub mod duration;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod models;
pub mod progress;
pub mod quota;
pub mod traits;

pub use config::{HarvestConfig, HttpConfig, QuotaConfig, MAX_PAGE_SIZE};
pub use error::{AppError, FetchError};
pub use fetch::{FetchOutcome, RecordFetcher};
pub use harvest::{HarvestReport, HarvestService, HarvestState, StopReason};
pub use models::{
    Checkpoint, CheckpointEntry, FetchedRecord, MergeResult, QuotaUsage, RawItem, Term,
};
pub use quota::QuotaLedger;
