//! Read-only summaries for the `status` and `stats` commands.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use quarry_core::{Checkpoint, FetchedRecord, QuotaLedger, Term};

/// Harvest progress derived from the term list and the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub total_terms: usize,
    pub processed_terms: usize,
    pub pending_terms: usize,
    pub empty_terms: usize,
    /// Records reported by completed terms.
    pub recorded_records: u64,
    /// Checkpoint entries for terms no longer in the term list.
    pub orphaned_entries: usize,
    pub quota_consumed_today: u64,
    pub quota_remaining_today: u64,
}

impl StatusSummary {
    pub fn compute(
        terms: &[Term],
        checkpoint: &Checkpoint,
        daily_limit: u64,
        today: NaiveDate,
    ) -> Self {
        let processed_terms = terms.iter().filter(|t| checkpoint.is_done(&t.text)).count();
        let orphaned_entries = checkpoint
            .entries()
            .filter(|e| !terms.iter().any(|t| t.text == e.term))
            .count();
        let ledger = QuotaLedger::resume(daily_limit, checkpoint.quota_usage(), today);

        Self {
            total_terms: terms.len(),
            processed_terms,
            pending_terms: terms.len() - processed_terms,
            empty_terms: checkpoint.entries().filter(|e| e.record_count == 0).count(),
            recorded_records: checkpoint.total_records(),
            orphaned_entries,
            quota_consumed_today: ledger.consumed(),
            quota_remaining_today: ledger.remaining(),
        }
    }

    /// Number of further terms today's remaining budget could at least search for.
    pub fn searches_left(&self, search_cost: u64) -> u64 {
        if search_cost == 0 {
            return u64::MAX;
        }
        self.quota_remaining_today / search_cost
    }
}

/// Per-group aggregate over the harvested dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub group: String,
    pub records: usize,
    pub terms: usize,
    pub total_views: u64,
    /// Mean engagement rate over records with at least one view.
    pub mean_engagement_rate: Option<f64>,
}

/// Aggregates `records` by group, sorted by group name.
pub fn group_stats(records: &[FetchedRecord]) -> Vec<GroupStats> {
    #[derive(Default)]
    struct Acc<'a> {
        records: usize,
        terms: std::collections::BTreeSet<&'a str>,
        views: u64,
        rate_sum: f64,
        rated: usize,
    }

    let mut groups: BTreeMap<&str, Acc<'_>> = BTreeMap::new();
    for record in records {
        let acc = groups.entry(record.group.as_str()).or_default();
        acc.records += 1;
        acc.terms.insert(record.term.as_str());
        acc.views += record.view_count;
        if let Some(rate) = record.engagement_rate() {
            acc.rate_sum += rate;
            acc.rated += 1;
        }
    }

    groups
        .into_iter()
        .map(|(group, acc)| GroupStats {
            group: group.to_string(),
            records: acc.records,
            terms: acc.terms.len(),
            total_views: acc.views,
            mean_engagement_rate: (acc.rated > 0).then(|| acc.rate_sum / acc.rated as f64),
        })
        .collect()
}
