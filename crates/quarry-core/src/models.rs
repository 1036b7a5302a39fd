//! Domain models shared by the harvester, its stores and its clients.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A query term and the group label it belongs to.
///
/// Terms are identified by their text; the group is carried through to every
/// record harvested for the term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Term {
    #[serde(rename = "keyword")]
    pub text: String,
    pub group: String,
}

impl Term {
    pub fn new(text: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            group: group.into(),
        }
    }
}

/// Raw item payload as returned by the details capability.
///
/// Statistics arrive as decimal strings and any of them may be missing
/// (hidden like counts, disabled comments).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub id: String,
    pub title: Option<String>,
    pub published_at: Option<String>,
    /// ISO-8601 duration such as `PT4M13S`.
    pub duration: Option<String>,
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

/// A normalized, immutable harvested record.
///
/// The serde names are the dataset column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRecord {
    #[serde(rename = "keyword")]
    pub term: String,
    #[serde(rename = "category")]
    pub group: String,
    #[serde(rename = "video_id")]
    pub identity: String,
    pub title: String,
    #[serde(rename = "published_date")]
    pub published_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
}

impl FetchedRecord {
    /// `(likes + comments) / views * 100`, or `None` for records without views.
    ///
    /// Derived on read and never persisted.
    pub fn engagement_rate(&self) -> Option<f64> {
        if self.view_count == 0 {
            return None;
        }
        let interactions = (self.like_count + self.comment_count) as f64;
        Some(interactions / self.view_count as f64 * 100.0)
    }
}

/// Completion marker for one fully processed term.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointEntry {
    pub term: String,
    pub processed_at: DateTime<Utc>,
    pub record_count: u64,
}

/// Quota consumed during one accounting period (a UTC day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub period: NaiveDate,
    pub consumed: u64,
}

/// The set of completed terms plus the quota usage snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    entries: BTreeMap<String, CheckpointEntry>,
    last_update: Option<DateTime<Utc>>,
    quota_usage: Option<QuotaUsage>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    pub fn get(&self, term: &str) -> Option<&CheckpointEntry> {
        self.entries.get(term)
    }

    /// Records a completion. Entries are write-once: returns `false` and
    /// keeps the existing entry when the term is already done.
    pub fn record(&mut self, entry: CheckpointEntry) -> bool {
        if self.entries.contains_key(&entry.term) {
            return false;
        }
        let processed_at = entry.processed_at;
        self.entries.insert(entry.term.clone(), entry);
        self.last_update = Some(
            self.last_update
                .map_or(processed_at, |last| last.max(processed_at)),
        );
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &CheckpointEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of `record_count` over all completed terms.
    pub fn total_records(&self) -> u64 {
        self.entries.values().map(|e| e.record_count).sum()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn set_last_update(&mut self, last_update: Option<DateTime<Utc>>) {
        self.last_update = last_update;
    }

    pub fn quota_usage(&self) -> Option<QuotaUsage> {
        self.quota_usage
    }

    pub fn set_quota_usage(&mut self, usage: QuotaUsage) {
        self.quota_usage = Some(usage);
    }
}

/// Outcome of merging a batch into the dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub added: usize,
    pub duplicates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(views: u64, likes: u64, comments: u64) -> FetchedRecord {
        FetchedRecord {
            term: "seed saving".into(),
            group: "Old".into(),
            identity: "abc123".into(),
            title: "Saving seeds".into(),
            published_at: Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap(),
            duration_seconds: 253.0,
            view_count: views,
            like_count: likes,
            comment_count: comments,
        }
    }

    fn entry(term: &str, count: u64, hour: u32) -> CheckpointEntry {
        CheckpointEntry {
            term: term.into(),
            processed_at: Utc.with_ymd_and_hms(2024, 3, 2, hour, 0, 0).unwrap(),
            record_count: count,
        }
    }

    #[test]
    fn test_engagement_rate() {
        let rate = record(1000, 50, 10).engagement_rate().unwrap();
        assert!((rate - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_engagement_rate_without_views() {
        assert_eq!(record(0, 5, 1).engagement_rate(), None);
    }

    #[test]
    fn test_checkpoint_entries_are_write_once() {
        let mut checkpoint = Checkpoint::new();
        assert!(checkpoint.record(entry("hybrid vigor", 50, 8)));
        assert!(!checkpoint.record(entry("hybrid vigor", 7, 9)));

        assert_eq!(checkpoint.len(), 1);
        assert_eq!(checkpoint.get("hybrid vigor").unwrap().record_count, 50);
    }

    #[test]
    fn test_checkpoint_tracks_totals_and_last_update() {
        let mut checkpoint = Checkpoint::new();
        assert!(checkpoint.is_empty());
        assert_eq!(checkpoint.last_update(), None);

        checkpoint.record(entry("a", 10, 9));
        checkpoint.record(entry("b", 0, 7));

        assert!(checkpoint.is_done("a"));
        assert!(checkpoint.is_done("b"));
        assert!(!checkpoint.is_done("c"));
        assert_eq!(checkpoint.total_records(), 10);
        assert_eq!(
            checkpoint.last_update(),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_record_serializes_with_dataset_column_names() {
        let value = serde_json::to_value(record(10, 1, 1)).unwrap();
        for column in [
            "keyword",
            "category",
            "video_id",
            "title",
            "published_date",
            "duration_seconds",
            "view_count",
            "like_count",
            "comment_count",
        ] {
            assert!(value.get(column).is_some(), "missing column {column}");
        }
    }
}
