//! Trait definitions for external dependencies.
//!
//! The harvest loop only talks to the outside world through these traits:
//!
//! - [`VideoApi`]: the metered search/details capability
//! - [`TermSource`]: where the ordered term list comes from
//! - [`CheckpointStore`]: durable record of completed terms
//! - [`DatasetSink`]: the deduplicating dataset accumulator
//!
//! Mock implementations of each are used to unit test the orchestrator
//! without network or disk access.
//!
//! # Example
//!
//! ```
//! use quarry_core::traits::VideoApi;
//! use quarry_core::{AppError, RawItem};
//!
//! async fn first_title<A: VideoApi>(api: &A, query: &str) -> Result<Option<String>, AppError> {
//!     let ids = api.search(query, 1).await?;
//!     let items = api.get_details(&ids).await?;
//!     Ok(items.into_iter().next().and_then(|item: RawItem| item.title))
//! }
//! ```

use std::future::Future;

use crate::{AppError, Checkpoint, FetchedRecord, MergeResult, QuotaUsage, RawItem, Term};

/// Client for the external search/details API.
///
/// Implementations only perform calls; quota accounting is done by the
/// caller before each call.
pub trait VideoApi: Send + Sync {
    /// Returns up to `max_results` identities for `query`, in the service's
    /// relevance order.
    fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Fetches raw payloads for a batch of identities.
    ///
    /// Unknown or removed identities are simply absent from the result.
    fn get_details(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<RawItem>, AppError>> + Send;
}

/// Ordered source of query terms, read once per run.
pub trait TermSource {
    /// Loads all terms in source order.
    ///
    /// # Errors
    ///
    /// - [`AppError::SourceUnavailable`] if the source cannot be read
    /// - [`AppError::MalformedInput`] if a required field is absent
    fn load(&self) -> Result<Vec<Term>, AppError>;
}

/// Durable, crash-safe record of completed terms.
///
/// Every mutating call must have reached durable storage before it returns.
pub trait CheckpointStore {
    /// Loads the persisted checkpoint. Missing state is an empty checkpoint.
    fn load(&mut self) -> Result<Checkpoint, AppError>;

    /// Whether `term` has a completion entry.
    fn is_done(&self, term: &str) -> bool;

    /// Appends a completion entry and flushes it.
    ///
    /// Recording an already completed term keeps the original entry.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] if the flush cannot be guaranteed.
    fn record_completion(&mut self, term: &str, record_count: u64) -> Result<(), AppError>;

    /// Persists the quota consumed so far in the current period.
    fn record_quota_usage(&mut self, usage: QuotaUsage) -> Result<(), AppError>;

    /// Current in-memory view of the checkpoint.
    fn checkpoint(&self) -> &Checkpoint;
}

/// Append-only, identity-deduplicated dataset.
pub trait DatasetSink {
    /// Merges `records`, keeping the first record seen for each identity.
    ///
    /// The merge is atomic with respect to a crash: readers observe either
    /// the previous dataset or the merged one.
    fn merge(&mut self, records: &[FetchedRecord]) -> Result<MergeResult, AppError>;

    /// Number of records currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
