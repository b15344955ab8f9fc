//! Rendering of store contents to stdout.

use painscout_core::codec::{self, Row};
use painscout_core::{PAINPOINT_FIELDS, PainpointRecord, QUERY_FIELDS, QueryRecord};
use std::io::{self, BufWriter, Write};

/// Write queries as CSV (header included) to stdout.
pub fn print_queries(records: &[QueryRecord]) -> io::Result<()> {
    let rows: Vec<Row> = records.iter().map(|r| r.as_row().clone()).collect();
    print_rows(&rows, QUERY_FIELDS)
}

/// Write painpoints as CSV (header included) to stdout.
pub fn print_painpoints(records: &[PainpointRecord]) -> io::Result<()> {
    let rows: Vec<Row> = records.iter().map(|r| r.as_row().clone()).collect();
    print_rows(&rows, PAINPOINT_FIELDS)
}

fn print_rows(rows: &[Row], schema: &[&str]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    codec::write_rows(&mut out, rows, schema)?;
    out.flush()
}
