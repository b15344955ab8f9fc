//! Integer identifier allocation by scanning existing rows.
//!
//! Allocation is only as safe as the lock held around the surrounding
//! read-compute-write cycle; this module does no coordination itself.

use crate::codec::Row;

/// Parse an identifier cell. Missing, blank, or non-numeric values yield `None`.
pub fn parse_id(row: &Row, id_field: &str) -> Option<u64> {
    row.get(id_field)?.trim().parse().ok()
}

/// One more than the largest parseable identifier in `id_field`; 1 when none.
///
/// `None` when the largest identifier is already `u64::MAX`.
pub fn next_id(rows: &[Row], id_field: &str) -> Option<u64> {
    rows.iter()
        .filter_map(|row| parse_id(row, id_field))
        .max()
        .unwrap_or(0)
        .checked_add(1)
}
