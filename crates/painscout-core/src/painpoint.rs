//! Painpoint store: append-only findings linked to the query that surfaced them.
//!
//! Rows are never rewritten; each new finding is appended under the store
//! lock. The referenced query id is recorded as given and not checked
//! against the query store.

use crate::DATE_FMT;
use crate::codec::{self, Row, row_from_values};
use crate::config::{Durability, StoreConfig};
use crate::error::{Result, StoreError};
use crate::ids;
use crate::lock::{LockPolicy, StoreLock};
use crate::safe_io;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Column order of the painpoint store.
pub const PAINPOINT_FIELDS: &[&str] = &[
    "painpoint_id",
    "query_id",
    "url",
    "quote",
    "author",
    "date_found",
];

/// A finding reported by a discovery process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPainpoint {
    pub query_id: u64,
    pub url: String,
    pub quote: String,
    pub author: Option<String>,
}

/// One stored painpoint, backed by its raw row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PainpointRecord {
    row: Row,
}

impl PainpointRecord {
    fn build(painpoint_id: u64, finding: &NewPainpoint, date_found: NaiveDate) -> Self {
        let row = row_from_values(
            PAINPOINT_FIELDS,
            [
                painpoint_id.to_string(),
                finding.query_id.to_string(),
                finding.url.clone(),
                finding.quote.clone(),
                finding.author.clone().unwrap_or_default(),
                date_found.format(DATE_FMT).to_string(),
            ],
        );
        Self { row }
    }

    pub fn from_row(row: Row) -> Self {
        Self { row }
    }

    pub fn as_row(&self) -> &Row {
        &self.row
    }

    fn cell(&self, column: &str) -> &str {
        self.row.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn painpoint_id(&self) -> Option<u64> {
        ids::parse_id(&self.row, "painpoint_id")
    }

    pub fn query_id(&self) -> Option<u64> {
        ids::parse_id(&self.row, "query_id")
    }

    pub fn url(&self) -> &str {
        self.cell("url")
    }

    pub fn quote(&self) -> &str {
        self.cell("quote")
    }

    /// Empty when the finding had no attributed author.
    pub fn author(&self) -> &str {
        self.cell("author")
    }

    pub fn date_found(&self) -> &str {
        self.cell("date_found")
    }
}

/// Handle on a painpoint store file. Holds no cached contents.
#[derive(Debug, Clone)]
pub struct PainpointStore {
    path: PathBuf,
    policy: LockPolicy,
    durability: Durability,
}

impl PainpointStore {
    pub fn new(path: impl Into<PathBuf>, config: &StoreConfig) -> Self {
        Self {
            path: path.into(),
            policy: config.lock_policy(),
            durability: config.durability(),
        }
    }

    /// Override the lock policy, e.g. to shrink the retry budget.
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_rows(&self) -> Result<Vec<Row>> {
        Ok(codec::decode(&self.path, PAINPOINT_FIELDS)?)
    }

    /// Record a finding with the next free painpoint id and today's date.
    pub fn add(&self, finding: &NewPainpoint) -> Result<PainpointRecord> {
        let _lock = StoreLock::acquire(&self.path, &self.policy)?;

        let rows = self.read_rows()?;
        let painpoint_id =
            ids::next_id(&rows, "painpoint_id").ok_or_else(|| StoreError::IdsExhausted {
                path: self.path.clone(),
                field: "painpoint_id",
            })?;
        let record = PainpointRecord::build(painpoint_id, finding, crate::today());
        safe_io::append_one(
            &self.path,
            record.as_row(),
            PAINPOINT_FIELDS,
            self.durability,
        )?;
        Ok(record)
    }

    /// Painpoints in file order, optionally only those for one query.
    pub fn list(&self, query_id: Option<u64>) -> Result<Vec<PainpointRecord>> {
        Ok(self
            .read_rows()?
            .into_iter()
            .map(PainpointRecord::from_row)
            .filter(|record| query_id.is_none_or(|id| record.query_id() == Some(id)))
            .collect())
    }

    /// Number of stored painpoints.
    pub fn count(&self) -> Result<usize> {
        Ok(self.read_rows()?.len())
    }
}
