//! Aggregate report over both stores. Read-only, takes no locks.

use crate::error::Result;
use crate::painpoint::PainpointStore;
use crate::query::{QueryRecord, QueryStatus, QueryStore};
use std::cmp::Reverse;
use std::fmt;

/// How many queries the ranking keeps.
pub const TOP_QUERIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total_queries: usize,
    pub pending: usize,
    /// Every query not in `pending` status, whatever its label.
    pub searched: usize,
    pub total_painpoints: usize,
    /// Queries ranked by recorded painpoints, highest first; ties keep file order.
    pub top: Vec<QueryRecord>,
}

impl Summary {
    pub fn from_records(queries: Vec<QueryRecord>, total_painpoints: usize) -> Self {
        let total_queries = queries.len();
        let pending = queries
            .iter()
            .filter(|q| q.status() == QueryStatus::Pending)
            .count();

        let mut top = queries;
        top.sort_by_key(|q| Reverse(q.num_painpoints_found()));
        top.truncate(TOP_QUERIES);

        Self {
            total_queries,
            pending,
            searched: total_queries - pending,
            total_painpoints,
            top,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Queries: total={}, pending={}, searched={}",
            self.total_queries, self.pending, self.searched
        )?;
        writeln!(f, "Painpoints logged: {}", self.total_painpoints)?;
        writeln!(f)?;
        writeln!(f, "Top queries by recorded painpoints:")?;
        for q in &self.top {
            writeln!(
                f,
                "  id={} pp={} status={} {}",
                q.query_id_raw(),
                q.num_painpoints_found(),
                q.status(),
                q.query()
            )?;
        }
        Ok(())
    }
}

/// Summarise the current contents of both stores.
pub fn summarize(queries: &QueryStore, painpoints: &PainpointStore) -> Result<Summary> {
    let records = queries.list(None, None)?;
    Ok(Summary::from_records(records, painpoints.count()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::row_from_values;
    use crate::config::StoreConfig;
    use crate::query::QUERY_FIELDS;
    use std::fs;
    use tempfile::TempDir;

    fn record(id: u64, painpoints: &str, status: &str) -> QueryRecord {
        QueryRecord::from_row(row_from_values(
            QUERY_FIELDS,
            [
                id.to_string(),
                "niche".to_string(),
                "a.com".to_string(),
                format!("q{id}"),
                "2025-08-09".to_string(),
                String::new(),
                "0".to_string(),
                painpoints.to_string(),
                status.to_string(),
            ],
        ))
    }

    #[test]
    fn test_counts() {
        let summary = Summary::from_records(
            vec![
                record(1, "0", "pending"),
                record(2, "1", "searched"),
                record(3, "0", "blocked"),
            ],
            7,
        );
        assert_eq!(summary.total_queries, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.searched, 2);
        assert_eq!(summary.total_painpoints, 7);
    }

    #[test]
    fn test_ranking_is_stable_and_capped() {
        let mut records: Vec<QueryRecord> = (1..=12).map(|i| record(i, "1", "searched")).collect();
        records.push(record(13, "5", "searched"));
        records.push(record(14, "", "pending"));
        records.push(record(15, "oops", "pending"));

        let summary = Summary::from_records(records, 0);

        let ids: Vec<Option<u64>> = summary.top.iter().map(QueryRecord::query_id).collect();
        let expected: Vec<Option<u64>> = std::iter::once(13).chain(1..=9).map(Some).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_display_layout() {
        let summary = Summary::from_records(
            vec![record(1, "0", "pending"), record(2, "3", "searched")],
            3,
        );

        assert_eq!(
            summary.to_string(),
            "Queries: total=2, pending=1, searched=1\n\
             Painpoints logged: 3\n\
             \n\
             Top queries by recorded painpoints:\n  \
             id=2 pp=3 status=searched q2\n  \
             id=1 pp=0 status=pending q1\n"
        );
    }

    #[test]
    fn test_summarize_missing_stores() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::default();
        let queries = QueryStore::new(temp_dir.path().join("queries.csv"), &config);
        let painpoints = PainpointStore::new(temp_dir.path().join("painpoints.csv"), &config);

        let summary = summarize(&queries, &painpoints).unwrap();

        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.total_painpoints, 0);
        assert!(summary.top.is_empty());
        assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }
}
