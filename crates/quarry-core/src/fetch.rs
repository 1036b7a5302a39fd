//! Per-term search-then-details round trip.
//!
//! [`RecordFetcher`] turns one [`Term`] into canonical [`FetchedRecord`]s:
//!
//! 1. search for up to `max_results` identities (the caller has already
//!    authorized the search cost)
//! 2. authorize the details cost for the whole identity batch
//! 3. fetch details in chunks of at most [`MAX_PAGE_SIZE`] identities
//! 4. normalize every raw item, skipping the ones that fail to parse
//!
//! Transport and API failures surface as [`FetchError`]. Quota already spent
//! on a failed term is not refunded.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MAX_PAGE_SIZE;
use crate::duration::{parse_iso8601_duration, DurationParseError};
use crate::quota::QuotaLedger;
use crate::traits::VideoApi;
use crate::{FetchError, FetchedRecord, HarvestConfig, QuotaConfig, RawItem, Term};

/// Result of a successful round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Details were fetched. `skipped` counts items that failed to normalize.
    Records {
        records: Vec<FetchedRecord>,
        skipped: usize,
    },
    /// The search returned no identities.
    Empty,
    /// The search succeeded but the ledger cannot cover the details call.
    DetailsUnaffordable { identities: usize, cost: u64 },
}

/// Why a single raw item could not be normalized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid duration: {0}")]
    Duration(#[from] DurationParseError),
    #[error("invalid published timestamp {0:?}")]
    Timestamp(String),
    #[error("invalid {field} value {value:?}")]
    Statistic { field: &'static str, value: String },
}

pub struct RecordFetcher<A: VideoApi> {
    api: A,
    max_results: u32,
    detail_cost_per_item: u64,
}

impl<A: VideoApi> RecordFetcher<A> {
    pub fn new(api: A, harvest: &HarvestConfig, quota: &QuotaConfig) -> Self {
        Self {
            api,
            max_results: harvest.max_results.clamp(1, MAX_PAGE_SIZE),
            detail_cost_per_item: quota.detail_cost_per_item,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_api(self) -> A {
        self.api
    }

    /// Fetches and normalizes the records for `term`.
    ///
    /// The search cost must have been authorized on `ledger` by the caller;
    /// the details cost is authorized here.
    pub async fn fetch(
        &self,
        term: &Term,
        ledger: &mut QuotaLedger,
    ) -> Result<FetchOutcome, FetchError> {
        let ids = self
            .api
            .search(&term.text, self.max_results)
            .await
            .map_err(|e| FetchError::new(&term.text, e))?;

        if ids.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        let cost = ids.len() as u64 * self.detail_cost_per_item;
        if !ledger.authorize(cost) {
            return Ok(FetchOutcome::DetailsUnaffordable {
                identities: ids.len(),
                cost,
            });
        }

        let mut raw_items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_PAGE_SIZE as usize) {
            let items = self
                .api
                .get_details(chunk)
                .await
                .map_err(|e| FetchError::new(&term.text, e))?;
            raw_items.extend(items);
        }
        debug!(
            term = %term.text,
            requested = ids.len(),
            returned = raw_items.len(),
            "Fetched details"
        );

        let mut records = Vec::with_capacity(raw_items.len());
        let mut skipped = 0;
        for item in raw_items {
            let id = item.id.clone();
            match normalize(term, item) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(term = %term.text, item = %id, error = %e, "Skipping item");
                    skipped += 1;
                }
            }
        }

        Ok(FetchOutcome::Records { records, skipped })
    }
}

fn normalize(term: &Term, item: RawItem) -> Result<FetchedRecord, NormalizeError> {
    let title = item.title.ok_or(NormalizeError::MissingField("title"))?;
    let published = item
        .published_at
        .ok_or(NormalizeError::MissingField("published_at"))?;
    let published_at = DateTime::parse_from_rfc3339(&published)
        .map_err(|_| NormalizeError::Timestamp(published.clone()))?
        .with_timezone(&Utc);
    let duration = item
        .duration
        .ok_or(NormalizeError::MissingField("duration"))?;

    Ok(FetchedRecord {
        term: term.text.clone(),
        group: term.group.clone(),
        identity: item.id,
        title,
        published_at,
        duration_seconds: parse_iso8601_duration(&duration)?,
        view_count: parse_statistic("view_count", item.view_count)?,
        like_count: parse_statistic("like_count", item.like_count)?,
        comment_count: parse_statistic("comment_count", item.comment_count)?,
    })
}

/// Missing statistics count as zero; present ones must be non-negative integers.
fn parse_statistic(field: &'static str, value: Option<String>) -> Result<u64, NormalizeError> {
    match value {
        None => Ok(0),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| NormalizeError::Statistic { field, value: v }),
    }
}
