use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quarry_core::traits::CheckpointStore;
use quarry_core::{AppError, Checkpoint, CheckpointEntry, QuotaUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::atomic_write;

/// On-disk layout of the checkpoint file.
///
/// ```json
/// {
///   "last_update": "2024-06-01T09:12:44.120000Z",
///   "processed_keywords": {
///     "seed banks": { "processed_date": "2024-06-01T09:12:44.120000Z", "videos_count": 50 }
///   },
///   "quota_usage": { "period": "2024-06-01", "consumed": 150 }
/// }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointDocument {
    #[serde(default, with = "timestamp::option")]
    last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    processed_keywords: BTreeMap<String, EntryDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota_usage: Option<QuotaUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryDocument {
    #[serde(with = "timestamp")]
    processed_date: DateTime<Utc>,
    videos_count: u64,
}

impl From<CheckpointDocument> for Checkpoint {
    fn from(doc: CheckpointDocument) -> Self {
        let mut checkpoint = Checkpoint::new();
        for (term, entry) in doc.processed_keywords {
            checkpoint.record(CheckpointEntry {
                term,
                processed_at: entry.processed_date,
                record_count: entry.videos_count,
            });
        }
        checkpoint.set_last_update(doc.last_update);
        if let Some(usage) = doc.quota_usage {
            checkpoint.set_quota_usage(usage);
        }
        checkpoint
    }
}

impl From<&Checkpoint> for CheckpointDocument {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            last_update: checkpoint.last_update(),
            processed_keywords: checkpoint
                .entries()
                .map(|e| {
                    (
                        e.term.clone(),
                        EntryDocument {
                            processed_date: e.processed_at,
                            videos_count: e.record_count,
                        },
                    )
                })
                .collect(),
            quota_usage: checkpoint.quota_usage(),
        }
    }
}

/// Checkpoint store backed by a single JSON document.
///
/// Every mutation rewrites the document atomically before returning, so a
/// crash loses at most the term that was in flight. The in-memory view is
/// only updated once the write succeeded.
///
/// # Examples
///
/// ```no_run
/// use quarry_core::traits::CheckpointStore;
/// use quarry_store::JsonCheckpointStore;
///
/// # fn example() -> Result<(), quarry_core::AppError> {
/// let mut store = JsonCheckpointStore::open("fetch_state.json")?;
/// if !store.is_done("seed banks") {
///     store.record_completion("seed banks", 50)?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonCheckpointStore {
    path: PathBuf,
    checkpoint: Checkpoint,
}

impl JsonCheckpointStore {
    /// Opens the store at `path`, loading any existing state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PersistenceError` if the file exists but cannot be
    /// read or parsed. A corrupt checkpoint is never silently replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let checkpoint = read_checkpoint(&path)?;
        Ok(Self { path, checkpoint })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&mut self, next: Checkpoint) -> Result<(), AppError> {
        let doc = CheckpointDocument::from(&next);
        let bytes = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.path, &bytes).map_err(|e| {
            AppError::PersistenceError(format!(
                "failed to write checkpoint {}: {e}",
                self.path.display()
            ))
        })?;
        self.checkpoint = next;
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&mut self) -> Result<Checkpoint, AppError> {
        self.checkpoint = read_checkpoint(&self.path)?;
        Ok(self.checkpoint.clone())
    }

    fn is_done(&self, term: &str) -> bool {
        self.checkpoint.is_done(term)
    }

    fn record_completion(&mut self, term: &str, record_count: u64) -> Result<(), AppError> {
        if self.checkpoint.is_done(term) {
            debug!(term, "Checkpoint entry already present");
            return Ok(());
        }
        let mut next = self.checkpoint.clone();
        next.record(CheckpointEntry {
            term: term.to_string(),
            processed_at: Utc::now(),
            record_count,
        });
        self.persist(next)
    }

    fn record_quota_usage(&mut self, usage: QuotaUsage) -> Result<(), AppError> {
        if self.checkpoint.quota_usage() == Some(usage) {
            return Ok(());
        }
        let mut next = self.checkpoint.clone();
        next.set_quota_usage(usage);
        self.persist(next)
    }

    fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }
}

fn read_checkpoint(path: &Path) -> Result<Checkpoint, AppError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Checkpoint::new()),
        Err(e) => {
            return Err(AppError::PersistenceError(format!(
                "failed to read checkpoint {}: {e}",
                path.display()
            )));
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Checkpoint::new());
    }

    let doc: CheckpointDocument = serde_json::from_slice(&bytes).map_err(|e| {
        AppError::PersistenceError(format!("corrupt checkpoint {}: {e}", path.display()))
    })?;
    Ok(doc.into())
}

/// ISO-8601 timestamps. Offsets are optional on input; naive values are UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| format!("invalid timestamp {raw:?}"))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
