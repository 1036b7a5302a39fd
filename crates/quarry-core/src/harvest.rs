//! Resumable, quota-aware harvest loop.
//!
//! [`HarvestService`] walks the term list in source order and, for every term
//! without a checkpoint entry, runs:
//!
//! ```text
//! SelectingTerm -> CheckingQuota -> Fetching -> Merging -> Checkpointing -> SelectingTerm
//! ```
//!
//! until either no pending term is left ([`StopReason::Exhausted`]) or the
//! quota ledger refuses a spend ([`StopReason::QuotaStopped`]). Both are
//! successful exits.
//!
//! # Crash safety
//!
//! The dataset merge always completes before the checkpoint entry is written.
//! A crash between the two leaves the term pending; the next run fetches it
//! again and the dataset's identity deduplication absorbs the replay.
//!
//! # Error isolation
//!
//! A [`FetchError`](crate::FetchError) only skips its term for this run. Errors
//! from the checkpoint store or the dataset are returned to the caller since
//! continuing would break the merge-then-checkpoint ordering.

use tracing::debug;

use crate::fetch::{FetchOutcome, RecordFetcher};
use crate::progress::{HarvestEvent, ProgressReporter, SilentReporter};
use crate::quota::QuotaLedger;
use crate::traits::{CheckpointStore, DatasetSink, VideoApi};
use crate::{AppError, FetchedRecord, HarvestConfig, QuotaConfig, Term};

/// States of the harvest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    Idle,
    SelectingTerm,
    CheckingQuota,
    Fetching,
    Merging,
    Checkpointing,
    Exhausted,
    QuotaStopped,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No unprocessed terms remain.
    Exhausted,
    /// The ledger refused a spend.
    QuotaStopped,
}

impl From<StopReason> for HarvestState {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Exhausted => HarvestState::Exhausted,
            StopReason::QuotaStopped => HarvestState::QuotaStopped,
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub stop_reason: StopReason,
    /// Terms checkpointed this run, including empty ones.
    pub terms_completed: usize,
    pub terms_empty: usize,
    pub terms_failed: usize,
    pub records_fetched: usize,
    /// Records new to the dataset; the run's harvest count.
    pub records_added: usize,
    pub duplicates: usize,
    pub items_skipped: usize,
    /// Quota spent during this run.
    pub quota_consumed: u64,
    pub quota_remaining: u64,
}

impl HarvestReport {
    pub fn new(stop_reason: StopReason) -> Self {
        Self {
            stop_reason,
            terms_completed: 0,
            terms_empty: 0,
            terms_failed: 0,
            records_fetched: 0,
            records_added: 0,
            duplicates: 0,
            items_skipped: 0,
            quota_consumed: 0,
            quota_remaining: 0,
        }
    }
}

/// Loop position. Each variant carries what the next transition needs.
enum Step {
    Idle,
    SelectingTerm { from: usize },
    CheckingQuota { index: usize },
    Fetching { index: usize },
    Merging {
        index: usize,
        records: Vec<FetchedRecord>,
        skipped: usize,
    },
    Checkpointing {
        index: usize,
        fetched: usize,
        skipped: usize,
        added: usize,
        duplicates: usize,
    },
    Done(StopReason),
}

impl Step {
    fn state(&self) -> HarvestState {
        match self {
            Step::Idle => HarvestState::Idle,
            Step::SelectingTerm { .. } => HarvestState::SelectingTerm,
            Step::CheckingQuota { .. } => HarvestState::CheckingQuota,
            Step::Fetching { .. } => HarvestState::Fetching,
            Step::Merging { .. } => HarvestState::Merging,
            Step::Checkpointing { .. } => HarvestState::Checkpointing,
            Step::Done(reason) => (*reason).into(),
        }
    }
}

/// Service driving the harvest of a term list.
///
/// # Type Parameters
///
/// * `A` - External API implementation (e.g., `YouTubeClient`)
/// * `C` - Checkpoint store (e.g., `JsonCheckpointStore`)
/// * `D` - Dataset accumulator (e.g., `CsvDataset`)
///
/// # Example
///
/// ```ignore
/// use quarry_core::harvest::HarvestService;
///
/// let mut service = HarvestService::new(client, checkpoints, dataset);
/// let report = service.run(&terms, &mut ledger).await?;
/// println!("Harvested {} records", report.records_added);
/// ```
pub struct HarvestService<A, C, D>
where
    A: VideoApi,
    C: CheckpointStore,
    D: DatasetSink,
{
    fetcher: RecordFetcher<A>,
    checkpoints: C,
    dataset: D,
    config: HarvestConfig,
    quota: QuotaConfig,
}

impl<A, C, D> HarvestService<A, C, D>
where
    A: VideoApi,
    C: CheckpointStore,
    D: DatasetSink,
{
    /// Creates a service with default configuration.
    pub fn new(api: A, checkpoints: C, dataset: D) -> Self {
        Self::with_config(
            api,
            checkpoints,
            dataset,
            HarvestConfig::default(),
            QuotaConfig::default(),
        )
    }

    /// Creates a service with custom harvest and quota configuration.
    pub fn with_config(
        api: A,
        checkpoints: C,
        dataset: D,
        config: HarvestConfig,
        quota: QuotaConfig,
    ) -> Self {
        Self {
            fetcher: RecordFetcher::new(api, &config, &quota),
            checkpoints,
            dataset,
            config,
            quota,
        }
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn into_parts(self) -> (A, C, D) {
        (self.fetcher.into_api(), self.checkpoints, self.dataset)
    }

    /// Runs the harvest loop over `terms`.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: a checkpoint or dataset write failed.
    /// Per-term fetch failures are reported and skipped.
    pub async fn run(
        &mut self,
        terms: &[Term],
        ledger: &mut QuotaLedger,
    ) -> Result<HarvestReport, AppError> {
        self.run_with_progress(terms, ledger, &SilentReporter).await
    }

    /// Same as [`run`](Self::run), but emits progress events through `reporter`.
    pub async fn run_with_progress<R: ProgressReporter>(
        &mut self,
        terms: &[Term],
        ledger: &mut QuotaLedger,
        reporter: &R,
    ) -> Result<HarvestReport, AppError> {
        let consumed_at_start = ledger.consumed();
        let mut report = HarvestReport::new(StopReason::Exhausted);
        let mut attempted = 0usize;

        reporter.report(HarvestEvent::RunStarted {
            total_terms: terms.len(),
            pending_terms: terms
                .iter()
                .filter(|t| !self.checkpoints.is_done(&t.text))
                .count(),
            quota_remaining: ledger.remaining(),
        });

        let mut step = Step::Idle;
        let stop_reason = loop {
            let from = step.state();
            step = match step {
                Step::Idle => Step::SelectingTerm { from: 0 },

                Step::SelectingTerm { from } => {
                    let next = terms
                        .iter()
                        .enumerate()
                        .skip(from)
                        .find(|(_, t)| !self.checkpoints.is_done(&t.text))
                        .map(|(i, _)| i);
                    match next {
                        Some(index) => {
                            if attempted > 0 && !self.config.pacing.is_zero() {
                                tokio::time::sleep(self.config.pacing).await;
                            }
                            attempted += 1;
                            let term = &terms[index];
                            reporter.report(HarvestEvent::TermStarted {
                                index,
                                total_terms: terms.len(),
                                term: &term.text,
                                group: &term.group,
                            });
                            Step::CheckingQuota { index }
                        }
                        None => Step::Done(StopReason::Exhausted),
                    }
                }

                Step::CheckingQuota { index } => {
                    let cost = self.quota.search_cost;
                    if ledger.authorize(cost) {
                        self.checkpoints.record_quota_usage(ledger.usage())?;
                        Step::Fetching { index }
                    } else {
                        reporter.report(HarvestEvent::QuotaDenied {
                            term: &terms[index].text,
                            cost,
                            remaining: ledger.remaining(),
                        });
                        Step::Done(StopReason::QuotaStopped)
                    }
                }

                Step::Fetching { index } => {
                    let term = &terms[index];
                    let before = ledger.consumed();
                    let result = self.fetcher.fetch(term, ledger).await;
                    if ledger.consumed() != before {
                        self.checkpoints.record_quota_usage(ledger.usage())?;
                    }

                    match result {
                        Ok(FetchOutcome::Records { records, skipped }) => Step::Merging {
                            index,
                            records,
                            skipped,
                        },
                        Ok(FetchOutcome::Empty) => Step::Merging {
                            index,
                            records: Vec::new(),
                            skipped: 0,
                        },
                        Ok(FetchOutcome::DetailsUnaffordable { cost, .. }) => {
                            reporter.report(HarvestEvent::QuotaDenied {
                                term: &term.text,
                                cost,
                                remaining: ledger.remaining(),
                            });
                            Step::Done(StopReason::QuotaStopped)
                        }
                        Err(e) => {
                            let error = e.source.to_string();
                            reporter.report(HarvestEvent::TermFailed {
                                term: &term.text,
                                error: &error,
                            });
                            report.terms_failed += 1;
                            Step::SelectingTerm { from: index + 1 }
                        }
                    }
                }

                Step::Merging {
                    index,
                    records,
                    skipped,
                } => {
                    let merged = self.dataset.merge(&records)?;
                    Step::Checkpointing {
                        index,
                        fetched: records.len(),
                        skipped,
                        added: merged.added,
                        duplicates: merged.duplicates,
                    }
                }

                Step::Checkpointing {
                    index,
                    fetched,
                    skipped,
                    added,
                    duplicates,
                } => {
                    let term = &terms[index];
                    self.checkpoints
                        .record_completion(&term.text, fetched as u64)?;

                    report.terms_completed += 1;
                    report.records_fetched += fetched;
                    report.records_added += added;
                    report.duplicates += duplicates;
                    report.items_skipped += skipped;

                    if fetched == 0 && skipped == 0 {
                        report.terms_empty += 1;
                        reporter.report(HarvestEvent::TermEmpty { term: &term.text });
                    } else {
                        reporter.report(HarvestEvent::TermCompleted {
                            term: &term.text,
                            fetched,
                            added,
                            duplicates,
                            skipped,
                        });
                    }
                    Step::SelectingTerm { from: index + 1 }
                }

                Step::Done(reason) => break reason,
            };
            debug!(from = ?from, to = ?step.state(), "Harvest transition");
        };

        report.stop_reason = stop_reason;
        report.quota_consumed = ledger.consumed() - consumed_at_start;
        report.quota_remaining = ledger.remaining();
        reporter.report(HarvestEvent::RunCompleted { report: &report });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Checkpoint, CheckpointEntry, MergeResult, QuotaUsage, RawItem};
    use chrono::{NaiveDate, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    // --- mocks -----------------------------------------------------------

    #[derive(Default)]
    struct MockApi {
        results: HashMap<String, Vec<String>>,
        failing: HashSet<String>,
        searches: Mutex<Vec<String>>,
    }

    impl MockApi {
        fn with_term(mut self, term: &str, count: usize) -> Self {
            let ids = (0..count).map(|i| format!("{term}-{i}")).collect();
            self.results.insert(term.to_string(), ids);
            self
        }

        fn with_ids(mut self, term: &str, ids: &[&str]) -> Self {
            self.results
                .insert(term.to_string(), ids.iter().map(|s| s.to_string()).collect());
            self
        }

        fn failing(mut self, term: &str) -> Self {
            self.failing.insert(term.to_string());
            self
        }

        fn searched(&self) -> Vec<String> {
            self.searches.lock().unwrap().clone()
        }
    }

    impl VideoApi for MockApi {
        async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, AppError> {
            self.searches.lock().unwrap().push(query.to_string());
            if self.failing.contains(query) {
                return Err(AppError::ApiError {
                    status: 503,
                    message: "backendError".into(),
                });
            }
            let mut ids = self.results.get(query).cloned().unwrap_or_default();
            ids.truncate(max_results as usize);
            Ok(ids)
        }

        async fn get_details(&self, ids: &[String]) -> Result<Vec<RawItem>, AppError> {
            Ok(ids
                .iter()
                .map(|id| RawItem {
                    id: id.clone(),
                    title: Some(format!("Title {id}")),
                    published_at: Some("2022-09-14T08:30:00Z".into()),
                    duration: Some("PT10M".into()),
                    view_count: Some("500".into()),
                    like_count: Some("25".into()),
                    comment_count: None,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct MemoryCheckpoints {
        checkpoint: Checkpoint,
        fail_completion_for: Option<String>,
        quota_writes: Vec<QuotaUsage>,
    }

    impl CheckpointStore for MemoryCheckpoints {
        fn load(&mut self) -> Result<Checkpoint, AppError> {
            Ok(self.checkpoint.clone())
        }

        fn is_done(&self, term: &str) -> bool {
            self.checkpoint.is_done(term)
        }

        fn record_completion(&mut self, term: &str, record_count: u64) -> Result<(), AppError> {
            if self.fail_completion_for.as_deref() == Some(term) {
                return Err(AppError::PersistenceError("simulated crash".into()));
            }
            self.checkpoint.record(CheckpointEntry {
                term: term.to_string(),
                processed_at: Utc::now(),
                record_count,
            });
            Ok(())
        }

        fn record_quota_usage(&mut self, usage: QuotaUsage) -> Result<(), AppError> {
            self.checkpoint.set_quota_usage(usage);
            self.quota_writes.push(usage);
            Ok(())
        }

        fn checkpoint(&self) -> &Checkpoint {
            &self.checkpoint
        }
    }

    #[derive(Default)]
    struct MemoryDataset {
        records: Vec<FetchedRecord>,
        merges: usize,
    }

    impl DatasetSink for MemoryDataset {
        fn merge(&mut self, records: &[FetchedRecord]) -> Result<MergeResult, AppError> {
            self.merges += 1;
            let mut result = MergeResult::default();
            for record in records {
                if self.records.iter().any(|r| r.identity == record.identity) {
                    result.duplicates += 1;
                } else {
                    self.records.push(record.clone());
                    result.added += 1;
                }
            }
            Ok(result)
        }

        fn len(&self) -> usize {
            self.records.len()
        }
    }

    // --- helpers ---------------------------------------------------------

    type Service = HarvestService<MockApi, MemoryCheckpoints, MemoryDataset>;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn service(api: MockApi, checkpoints: MemoryCheckpoints, dataset: MemoryDataset) -> Service {
        paced_service(api, checkpoints, dataset, Duration::ZERO)
    }

    fn paced_service(
        api: MockApi,
        checkpoints: MemoryCheckpoints,
        dataset: MemoryDataset,
        pacing: Duration,
    ) -> Service {
        HarvestService::with_config(
            api,
            checkpoints,
            dataset,
            HarvestConfig::default().with_pacing(pacing),
            QuotaConfig::default(),
        )
    }

    fn terms(texts: &[&str]) -> Vec<Term> {
        texts.iter().map(|t| Term::new(*t, "Modern")).collect()
    }

    // --- scenarios -------------------------------------------------------

    #[tokio::test]
    async fn test_empty_term_list_is_exhausted_immediately() {
        let mut svc = service(
            MockApi::default(),
            MemoryCheckpoints::default(),
            MemoryDataset::default(),
        );
        let mut ledger = QuotaLedger::new(10_000, today());

        let report = svc.run(&[], &mut ledger).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(ledger.consumed(), 0);
        assert_eq!(report.records_added, 0);
        assert_eq!(report.quota_consumed, 0);
        assert!(svc.dataset().is_empty());
        assert!(svc.checkpoints().checkpoint().is_empty());
    }

    #[tokio::test]
    async fn test_quota_stops_after_first_term() {
        let api = MockApi::default()
            .with_term("speed breeding", 50)
            .with_term("genome editing", 50);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(150, today());

        let report = svc
            .run(&terms(&["speed breeding", "genome editing"]), &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::QuotaStopped);
        assert_eq!(ledger.consumed(), 150);
        assert_eq!(report.quota_consumed, 150);
        assert_eq!(report.quota_remaining, 0);
        assert_eq!(report.terms_completed, 1);
        assert_eq!(report.records_added, 50);

        let checkpoint = svc.checkpoints().checkpoint();
        assert_eq!(checkpoint.len(), 1);
        assert!(checkpoint.is_done("speed breeding"));
        assert!(!checkpoint.is_done("genome editing"));
        assert_eq!(svc.into_parts().0.searched(), vec!["speed breeding"]);
    }

    #[tokio::test]
    async fn test_empty_search_is_checkpointed_and_never_retried() {
        let api = MockApi::default().with_term("mass selection", 3);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());
        let list = terms(&["obscure term", "mass selection"]);

        let report = svc.run(&list, &mut ledger).await.unwrap();
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.terms_empty, 1);
        assert_eq!(report.terms_completed, 2);
        let entry = svc.checkpoints().checkpoint().get("obscure term").unwrap();
        assert_eq!(entry.record_count, 0);

        // Second run: nothing pending, nothing searched, nothing spent.
        let (_, checkpoints, dataset) = svc.into_parts();
        let mut svc = service(MockApi::default(), checkpoints, dataset);
        let consumed = ledger.consumed();
        let report = svc.run(&list, &mut ledger).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.terms_completed, 0);
        assert_eq!(ledger.consumed(), consumed);
        assert!(svc.into_parts().0.searched().is_empty());
    }

    #[tokio::test]
    async fn test_crash_between_merge_and_checkpoint_replays_without_duplicates() {
        let api = MockApi::default()
            .with_term("landraces", 2)
            .with_term("heterosis", 4);
        let checkpoints = MemoryCheckpoints {
            fail_completion_for: Some("heterosis".into()),
            ..MemoryCheckpoints::default()
        };
        let mut svc = service(api, checkpoints, MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());
        let list = terms(&["landraces", "heterosis"]);

        // Run 1 dies after merging "heterosis" but before its checkpoint.
        let err = svc.run(&list, &mut ledger).await.unwrap_err();
        assert!(matches!(err, AppError::PersistenceError(_)));
        assert_eq!(svc.dataset().len(), 6);
        assert!(!svc.checkpoints().is_done("heterosis"));

        // Run 2 reprocesses only "heterosis".
        let (api, mut checkpoints, dataset) = svc.into_parts();
        checkpoints.fail_completion_for = None;
        let mut svc = service(api, checkpoints, dataset);
        let report = svc.run(&list, &mut ledger).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.terms_completed, 1);
        assert_eq!(report.records_added, 0);
        assert_eq!(report.duplicates, 4);
        assert!(svc.checkpoints().is_done("heterosis"));
        assert_eq!(svc.dataset().len(), 6);

        let dataset = &svc.dataset().records;
        let unique: HashSet<_> = dataset.iter().map(|r| &r.identity).collect();
        assert_eq!(unique.len(), dataset.len());
        assert_eq!(
            svc.into_parts().0.searched(),
            vec!["landraces", "heterosis", "heterosis"]
        );
    }

    // --- transitions -----------------------------------------------------

    #[tokio::test]
    async fn test_done_terms_are_never_refetched() {
        let mut checkpoints = MemoryCheckpoints::default();
        checkpoints.checkpoint.record(CheckpointEntry {
            term: "pure lines".into(),
            processed_at: Utc::now(),
            record_count: 12,
        });
        let api = MockApi::default()
            .with_term("pure lines", 12)
            .with_term("backcrossing", 1);
        let mut svc = service(api, checkpoints, MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());

        let report = svc
            .run(&terms(&["pure lines", "backcrossing"]), &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.terms_completed, 1);
        assert_eq!(ledger.consumed(), 101);
        assert_eq!(svc.into_parts().0.searched(), vec!["backcrossing"]);
    }

    #[tokio::test]
    async fn test_fetch_error_skips_term_without_checkpoint() {
        let api = MockApi::default()
            .failing("polyploidy")
            .with_term("mutation breeding", 2);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());

        let report = svc
            .run(&terms(&["polyploidy", "mutation breeding"]), &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.terms_failed, 1);
        assert_eq!(report.terms_completed, 1);
        assert!(!svc.checkpoints().is_done("polyploidy"));
        assert!(svc.checkpoints().is_done("mutation breeding"));
        // The failed search is still paid for.
        assert_eq!(ledger.consumed(), 100 + 100 + 2);
    }

    #[tokio::test]
    async fn test_unaffordable_details_stop_without_checkpoint() {
        let api = MockApi::default().with_term("doubled haploids", 50);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(140, today());

        let report = svc
            .run(&terms(&["doubled haploids"]), &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::QuotaStopped);
        assert_eq!(ledger.consumed(), 100);
        assert!(!svc.checkpoints().is_done("doubled haploids"));
        assert_eq!(svc.dataset().merges, 0);
    }

    #[tokio::test]
    async fn test_duplicates_across_terms_are_counted() {
        let api = MockApi::default()
            .with_ids("wheat breeding", &["v1", "v2", "v3"])
            .with_ids("wheat genetics", &["v2", "v3", "v4"]);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());

        let report = svc
            .run(&terms(&["wheat breeding", "wheat genetics"]), &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.records_fetched, 6);
        assert_eq!(report.records_added, 4);
        assert_eq!(report.duplicates, 2);
        // First write wins: v2 stays attributed to the first term.
        let v2 = svc
            .dataset()
            .records
            .iter()
            .find(|r| r.identity == "v2")
            .unwrap();
        assert_eq!(v2.term, "wheat breeding");
        // Checkpoint records what was fetched for the term, not what was new.
        let entry = svc.checkpoints().checkpoint().get("wheat genetics").unwrap();
        assert_eq!(entry.record_count, 3);
    }

    #[tokio::test]
    async fn test_quota_usage_is_written_through() {
        let api = MockApi::default().with_term("apomixis", 5);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());

        svc.run(&terms(&["apomixis"]), &mut ledger).await.unwrap();

        let writes = &svc.checkpoints().quota_writes;
        assert_eq!(
            writes.iter().map(|u| u.consumed).collect::<Vec<_>>(),
            vec![100, 105]
        );
        assert_eq!(
            svc.checkpoints().checkpoint().quota_usage(),
            Some(ledger.usage())
        );
    }

    #[tokio::test]
    async fn test_fresh_budget_still_accumulates_recorded_usage() {
        let stored = QuotaUsage {
            period: today(),
            consumed: 9_000,
        };
        let mut checkpoints = MemoryCheckpoints::default();
        checkpoints.checkpoint.set_quota_usage(stored);
        let api = MockApi::default().with_term("seed banks", 3);
        let mut svc = service(api, checkpoints, MemoryDataset::default());
        let mut ledger = QuotaLedger::fresh(10_000, Some(stored), today());

        let report = svc.run(&terms(&["seed banks"]), &mut ledger).await.unwrap();

        assert_eq!(report.quota_consumed, 103);
        assert_eq!(ledger.remaining(), 10_000 - 103);
        assert_eq!(
            svc.checkpoints().checkpoint().quota_usage(),
            Some(QuotaUsage {
                period: today(),
                consumed: 9_103,
            })
        );

        // A same-day run that carries usage over sees the full total.
        let resumed = QuotaLedger::resume(
            10_000,
            svc.checkpoints().checkpoint().quota_usage(),
            today(),
        );
        assert_eq!(resumed.remaining(), 10_000 - 9_103);
    }

    #[tokio::test]
    async fn test_duplicate_terms_in_source_are_processed_once() {
        let api = MockApi::default().with_term("clonal propagation", 2);
        let mut svc = service(api, MemoryCheckpoints::default(), MemoryDataset::default());
        let mut ledger = QuotaLedger::new(10_000, today());

        let report = svc
            .run(
                &terms(&["clonal propagation", "clonal propagation"]),
                &mut ledger,
            )
            .await
            .unwrap();

        assert_eq!(report.terms_completed, 1);
        assert_eq!(svc.into_parts().0.searched().len(), 1);
    }

    // --- pacing ----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_pacing_waits_between_terms_only() {
        let api = MockApi::default()
            .with_term("allele mining", 1)
            .with_term("gene pyramiding", 1)
            .with_term("bulk breeding", 1);
        let mut svc = paced_service(
            api,
            MemoryCheckpoints::default(),
            MemoryDataset::default(),
            Duration::from_secs(1),
        );
        let mut ledger = QuotaLedger::new(10_000, today());
        let list = terms(&["allele mining", "gene pyramiding", "bulk breeding"]);

        let started = tokio::time::Instant::now();
        let report = svc.run(&list, &mut ledger).await.unwrap();

        assert_eq!(report.terms_completed, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_skips_first_term_and_stops_with_quota() {
        let api = MockApi::default()
            .with_term("ideotype", 1)
            .with_term("wide crosses", 1)
            .with_term("synthetic varieties", 1);
        let mut svc = paced_service(
            api,
            MemoryCheckpoints::default(),
            MemoryDataset::default(),
            Duration::from_secs(1),
        );
        let list = terms(&["ideotype", "wide crosses", "synthetic varieties"]);

        // A single term never waits.
        let mut ledger = QuotaLedger::new(10_000, today());
        let started = tokio::time::Instant::now();
        svc.run(&list[..1], &mut ledger).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);

        // "ideotype" is done now: one wait before the denied term, none after the stop.
        let mut ledger = QuotaLedger::new(150, today());
        let started = tokio::time::Instant::now();
        let report = svc.run(&list, &mut ledger).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::QuotaStopped);
        assert_eq!(report.terms_completed, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(
            HarvestState::from(StopReason::Exhausted),
            HarvestState::Exhausted
        );
        assert_eq!(
            HarvestState::from(StopReason::QuotaStopped),
            HarvestState::QuotaStopped
        );
        assert_eq!(Step::Idle.state(), HarvestState::Idle);
        assert_eq!(
            Step::Done(StopReason::QuotaStopped).state(),
            HarvestState::QuotaStopped
        );
    }
}
