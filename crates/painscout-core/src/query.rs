//! Query store: search expressions and their lifecycle.
//!
//! Queries are generated as the cartesian product of target sites and key
//! phrases, deduplicated on their exact text, and later marked as searched
//! with result counts. Every mutation runs under the store lock and rewrites
//! the file atomically; reads take no lock.

use crate::DATE_FMT;
use crate::codec::{self, Row, row_from_values};
use crate::config::{Durability, StoreConfig};
use crate::error::{Result, StoreError};
use crate::ids;
use crate::lock::{LockPolicy, StoreLock};
use crate::safe_io;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Column order of the query store.
pub const QUERY_FIELDS: &[&str] = &[
    "query_id",
    "product_niche",
    "site",
    "query",
    "date_created",
    "date_searched",
    "num_results_searched",
    "num_painpoints_found",
    "status",
];

// ============================================================================
// Status
// ============================================================================

/// Lifecycle label of a query. Labels other than the two known ones are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Pending,
    Searched,
    Other(String),
}

impl QueryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Searched => "searched",
            QueryStatus::Other(label) => label,
        }
    }
}

impl From<&str> for QueryStatus {
    fn from(label: &str) -> Self {
        match label {
            "pending" => QueryStatus::Pending,
            "searched" => QueryStatus::Searched,
            other => QueryStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Record
// ============================================================================

/// One query row.
///
/// Backed by the raw row so that values survive a rewrite exactly as they
/// were read, including hand-edited cells that do not parse. Accessors
/// interpret cells leniently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    row: Row,
}

impl QueryRecord {
    /// A freshly generated, not yet searched query.
    pub fn pending(
        query_id: u64,
        product_niche: &str,
        site: &str,
        query: &str,
        date_created: NaiveDate,
    ) -> Self {
        let row = row_from_values(
            QUERY_FIELDS,
            [
                query_id.to_string(),
                product_niche.to_string(),
                site.to_string(),
                query.to_string(),
                date_created.format(DATE_FMT).to_string(),
                String::new(),
                "0".to_string(),
                "0".to_string(),
                QueryStatus::Pending.to_string(),
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

    fn set(&mut self, column: &str, value: String) {
        self.row.insert(column.to_string(), value);
    }

    fn count(&self, column: &str) -> u64 {
        self.cell(column).trim().parse().unwrap_or(0)
    }

    /// Identifier, if the cell holds one.
    pub fn query_id(&self) -> Option<u64> {
        ids::parse_id(&self.row, "query_id")
    }

    /// Raw identifier cell, as stored.
    pub fn query_id_raw(&self) -> &str {
        self.cell("query_id")
    }

    pub fn product_niche(&self) -> &str {
        self.cell("product_niche")
    }

    pub fn site(&self) -> &str {
        self.cell("site")
    }

    pub fn query(&self) -> &str {
        self.cell("query")
    }

    pub fn date_created(&self) -> &str {
        self.cell("date_created")
    }

    /// `None` until the query has been searched.
    pub fn date_searched(&self) -> Option<&str> {
        Some(self.cell("date_searched")).filter(|d| !d.is_empty())
    }

    /// Result count; blank or malformed cells count as 0.
    pub fn num_results_searched(&self) -> u64 {
        self.count("num_results_searched")
    }

    /// Painpoint count; blank or malformed cells count as 0.
    pub fn num_painpoints_found(&self) -> u64 {
        self.count("num_painpoints_found")
    }

    pub fn status(&self) -> QueryStatus {
        QueryStatus::from(self.cell("status"))
    }
}

// ============================================================================
// Patch
// ============================================================================

/// Field-level update for one query. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPatch {
    pub date_searched: Option<NaiveDate>,
    pub num_results: Option<u64>,
    pub num_painpoints: Option<u64>,
    pub status: Option<QueryStatus>,
}

impl QueryPatch {
    pub fn is_empty(&self) -> bool {
        *self == QueryPatch::default()
    }
}

/// Apply the supplied fields of `patch` to `record`, leaving the rest as is.
pub fn apply_patch(mut record: QueryRecord, patch: &QueryPatch) -> QueryRecord {
    if let Some(date) = patch.date_searched {
        record.set("date_searched", date.format(DATE_FMT).to_string());
    }
    if let Some(n) = patch.num_results {
        record.set("num_results_searched", n.to_string());
    }
    if let Some(n) = patch.num_painpoints {
        record.set("num_painpoints_found", n.to_string());
    }
    if let Some(status) = &patch.status {
        record.set("status", status.to_string());
    }
    record
}

/// Result of [`QueryStore::mark_searched`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Updated(QueryRecord),
    /// No row carries the requested id; the file was not touched.
    NotFound,
}

// ============================================================================
// Generation
// ============================================================================

/// Input document for query generation.
///
/// ```json
/// {
///   "SITES": ["reddit.com/r/tools", "forum.example.com/"],
///   "KEY_PHRASES": ["broken part", "can't find"],
///   "SITE_MAP": { "reddit.com/r/tools": "hand tools" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateInput {
    #[serde(rename = "SITES", default)]
    pub sites: Vec<String>,
    #[serde(rename = "KEY_PHRASES", default)]
    pub key_phrases: Vec<String>,
    /// Site token to product niche. Sites without an entry use the
    /// normalised site token as their niche.
    #[serde(rename = "SITE_MAP", default)]
    pub site_map: HashMap<String, String>,
}

impl GenerateInput {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn niche_for(&self, site_token: &str) -> String {
        match self.site_map.get(site_token) {
            Some(niche) if !niche.is_empty() => niche.clone(),
            _ => normalize_site_for_niche(site_token),
        }
    }
}

/// Canonical search expression for a site and phrase.
pub fn canonical_query(site_token: &str, phrase: &str) -> String {
    format!("site:{site_token} \"{phrase}\"")
}

/// Fallback niche label: the site without a `site:` prefix, surrounding
/// whitespace, or trailing slashes.
pub fn normalize_site_for_niche(site: &str) -> String {
    let s = site.strip_prefix("site:").unwrap_or(site);
    s.trim().trim_end_matches('/').to_string()
}

/// Records added by one [`QueryStore::generate`] call, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub added: Vec<QueryRecord>,
}

// ============================================================================
// Store
// ============================================================================

/// Handle on a query store file. Holds no cached contents.
#[derive(Debug, Clone)]
pub struct QueryStore {
    path: PathBuf,
    policy: LockPolicy,
    durability: Durability,
}

impl QueryStore {
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

    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.path, &self.policy)
    }

    fn read_rows(&self) -> Result<Vec<Row>> {
        Ok(codec::decode(&self.path, QUERY_FIELDS)?)
    }

    /// Add one pending query per new site × phrase pair.
    ///
    /// Pairs whose query text already exists are skipped, never overwritten.
    /// The file is rewritten only when at least one query was added.
    pub fn generate(&self, input: &GenerateInput) -> Result<GenerateReport> {
        let _lock = self.lock()?;
        safe_io::ensure_exists(&self.path, QUERY_FIELDS, self.durability)?;

        let mut rows = self.read_rows()?;
        let mut existing: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.get("query").cloned())
            .collect();
        let mut next_id = ids::next_id(&rows, "query_id");
        let today = crate::today();

        let mut added = Vec::new();
        for site in &input.sites {
            let site_token = site.trim();
            for phrase in &input.key_phrases {
                let query_text = canonical_query(site_token, phrase);
                if existing.contains(&query_text) {
                    continue;
                }
                let query_id = next_id.ok_or_else(|| StoreError::IdsExhausted {
                    path: self.path.clone(),
                    field: "query_id",
                })?;
                let record = QueryRecord::pending(
                    query_id,
                    &input.niche_for(site_token),
                    site_token,
                    &query_text,
                    today,
                );
                rows.push(record.as_row().clone());
                existing.insert(query_text);
                added.push(record);
                next_id = query_id.checked_add(1);
            }
        }

        if !added.is_empty() {
            safe_io::replace_all(&self.path, &rows, QUERY_FIELDS, self.durability)?;
        }
        log::debug!("generated {} queries in {}", added.len(), self.path.display());
        Ok(GenerateReport { added })
    }

    /// Apply `patch` to the query whose id cell reads `query_id`.
    pub fn mark_searched(&self, query_id: u64, patch: &QueryPatch) -> Result<MarkOutcome> {
        let _lock = self.lock()?;
        safe_io::ensure_exists(&self.path, QUERY_FIELDS, self.durability)?;

        let mut rows = self.read_rows()?;
        let Some(index) = rows.iter().position(|row| id_matches(row, query_id)) else {
            log::debug!(
                "no query with id {} found in {}",
                query_id,
                self.path.display()
            );
            return Ok(MarkOutcome::NotFound);
        };

        let record = QueryRecord::from_row(std::mem::take(&mut rows[index]));
        let updated = apply_patch(record, patch);
        rows[index] = updated.as_row().clone();

        safe_io::replace_all(&self.path, &rows, QUERY_FIELDS, self.durability)?;
        Ok(MarkOutcome::Updated(updated))
    }

    /// Queries in file order, optionally filtered by exact status and capped.
    ///
    /// An empty status means no filter and a limit of 0 means no cap.
    pub fn list(&self, status: Option<&str>, limit: Option<usize>) -> Result<Vec<QueryRecord>> {
        let status = status.filter(|s| !s.is_empty());
        let limit = limit.filter(|&n| n > 0).unwrap_or(usize::MAX);
        let records = self
            .read_rows()?
            .into_iter()
            .map(QueryRecord::from_row)
            .filter(|record| status.is_none_or(|s| record.status().as_str() == s))
            .take(limit)
            .collect();
        Ok(records)
    }

    /// Look up one query by id, matched the same way as [`Self::mark_searched`].
    pub fn get(&self, query_id: u64) -> Result<Option<QueryRecord>> {
        Ok(self
            .read_rows()?
            .into_iter()
            .find(|row| id_matches(row, query_id))
            .map(QueryRecord::from_row))
    }
}

/// Textual match of the trimmed id cell, so `07` is not query 7.
fn id_matches(row: &Row, query_id: u64) -> bool {
    row.get("query_id")
        .is_some_and(|cell| cell.trim() == query_id.to_string())
}
