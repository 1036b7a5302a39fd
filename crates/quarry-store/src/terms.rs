use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use quarry_core::traits::TermSource;
use quarry_core::{AppError, Term};

const REQUIRED_COLUMNS: [&str; 2] = ["keyword", "group"];

/// Term list stored as CSV with `keyword` and `group` columns.
///
/// Extra columns are ignored. Row order is the harvest order.
#[derive(Debug, Clone)]
pub struct CsvTermSource {
    path: PathBuf,
}

impl CsvTermSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TermSource for CsvTermSource {
    fn load(&self) -> Result<Vec<Term>, AppError> {
        let file = File::open(&self.path).map_err(|source| AppError::SourceUnavailable {
            path: self.path.clone(),
            source,
        })?;
        parse_terms(file)
    }
}

/// Parses a CSV term list from any reader.
pub fn parse_terms<R: Read>(reader: R) -> Result<Vec<Term>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::MalformedInput(format!("unreadable header: {e}")))?;
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(AppError::MalformedInput(format!(
                "missing required column '{column}'"
            )));
        }
    }

    let mut terms = Vec::new();
    for (row, result) in reader.deserialize::<Term>().enumerate() {
        // Line 1 is the header.
        let line = row + 2;
        let term = result.map_err(|e| AppError::MalformedInput(format!("line {line}: {e}")))?;
        if term.text.is_empty() {
            return Err(AppError::MalformedInput(format!("line {line}: empty keyword")));
        }
        if term.group.is_empty() {
            return Err(AppError::MalformedInput(format!("line {line}: empty group")));
        }
        terms.push(term);
    }
    Ok(terms)
}
