//! Progress reporting for harvest runs.
//!
//! This module provides a trait-based abstraction for reporting progress during
//! a run, so the orchestrator never writes log lines or UI output directly.

use crate::harvest::{HarvestReport, StopReason};

/// Events emitted during a harvest run.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    /// Run starting.
    RunStarted {
        /// Terms in the source.
        total_terms: usize,
        /// Terms without a checkpoint entry.
        pending_terms: usize,
        /// Quota left in the current period.
        quota_remaining: u64,
    },

    /// A pending term is about to be processed.
    TermStarted {
        /// Zero-based position of the term in the source.
        index: usize,
        total_terms: usize,
        term: &'a str,
        group: &'a str,
    },

    /// Term fetched, merged and checkpointed.
    TermCompleted {
        term: &'a str,
        /// Records normalized for the term.
        fetched: usize,
        /// Records new to the dataset.
        added: usize,
        duplicates: usize,
        /// Raw items that failed to normalize.
        skipped: usize,
    },

    /// Search returned nothing; the term is checkpointed with zero records.
    TermEmpty { term: &'a str },

    /// Term could not be fetched this run and stays pending.
    TermFailed { term: &'a str, error: &'a str },

    /// The ledger refused a spend; the run stops.
    QuotaDenied {
        term: &'a str,
        cost: u64,
        remaining: u64,
    },

    /// Run finished.
    RunCompleted { report: &'a HarvestReport },
}

/// Trait for reporting harvest progress.
///
/// The default implementation does nothing (silent mode), which is
/// appropriate for library usage where the caller doesn't need progress updates.
///
/// # Example
///
/// ```
/// use quarry_core::progress::{HarvestEvent, ProgressReporter};
///
/// struct MyReporter;
///
/// impl ProgressReporter for MyReporter {
///     fn report(&self, event: HarvestEvent<'_>) {
///         if let HarvestEvent::TermStarted { term, .. } = event {
///             println!("Harvesting: {}", term);
///         }
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// A no-op reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// A reporter that logs events using the `tracing` crate.
///
/// Emits one line per term and a totals line at the end of the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        use tracing::{info, warn};

        match event {
            HarvestEvent::RunStarted {
                total_terms,
                pending_terms,
                quota_remaining,
            } => {
                info!(
                    "Starting harvest: {} term(s), {} pending, {} quota unit(s) available",
                    total_terms, pending_terms, quota_remaining
                );
            }
            HarvestEvent::TermStarted {
                index,
                total_terms,
                term,
                group,
            } => {
                info!("[{}/{}] {} ({})", index + 1, total_terms, term, group);
            }
            HarvestEvent::TermCompleted {
                term,
                fetched,
                added,
                duplicates,
                skipped,
            } => {
                info!(
                    "✓ {}: {} record(s) ({} new, {} duplicate, {} skipped)",
                    term, fetched, added, duplicates, skipped
                );
            }
            HarvestEvent::TermEmpty { term } => {
                warn!("∅ {}: no results, marked as processed", term);
            }
            HarvestEvent::TermFailed { term, error } => {
                warn!("✗ {}: skipped for this run: {}", term, error);
            }
            HarvestEvent::QuotaDenied {
                term,
                cost,
                remaining,
            } => {
                warn!(
                    "Quota limit reached before '{}': needs {}, {} remaining",
                    term, cost, remaining
                );
            }
            HarvestEvent::RunCompleted { report } => {
                let reason = match report.stop_reason {
                    StopReason::Exhausted => "all terms processed",
                    StopReason::QuotaStopped => "quota exhausted",
                };
                info!(
                    "Harvest complete ({}): {} record(s) harvested, {} term(s) completed, \
                     {} empty, {} failed, {} quota unit(s) used, {} remaining",
                    reason,
                    report.records_added,
                    report.terms_completed,
                    report.terms_empty,
                    report.terms_failed,
                    report.quota_consumed,
                    report.quota_remaining
                );
            }
        }
    }
}
