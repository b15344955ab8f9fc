//! Delimited flat-file codec.
//!
//! Files are comma-separated text with a header row. Fields containing a
//! comma, a double quote, or a line break are quoted, with embedded quotes
//! doubled. Rows are written with `\r\n`; `\n` and `\r\n` are both accepted
//! on read, and quoted fields may span lines.
//!
//! Each store has a fixed, ordered schema. Decoding maps values by header
//! name, so column order in the file does not matter; schema columns the
//! file lacks decode as empty strings and columns outside the schema are
//! dropped (and therefore lost on the next rewrite).

use indexmap::IndexMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

/// One record: column name to raw string value, in schema order.
pub type Row = IndexMap<String, String>;

const LINE_END: &str = "\r\n";

/// Decode every row of `path`. A missing file is an empty store.
pub fn decode(path: &Path, schema: &[&str]) -> io::Result<Vec<Row>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(parse(&text, schema))
}

/// Decode rows from already-loaded text.
pub fn parse(text: &str, schema: &[&str]) -> Vec<Row> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text).into_iter();
    let Some(header) = records.next() else {
        return Vec::new();
    };

    let positions: Vec<Option<usize>> = schema
        .iter()
        .map(|col| header.iter().position(|h| h == col))
        .collect();

    records
        .map(|values| {
            schema
                .iter()
                .zip(&positions)
                .map(|(col, pos)| {
                    let value = pos
                        .and_then(|i| values.get(i))
                        .cloned()
                        .unwrap_or_default();
                    (col.to_string(), value)
                })
                .collect()
        })
        .collect()
}

/// Split text into records of raw field values. Blank lines are skipped.
fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut field_started = false;
    let mut line_has_content = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    let mut end_record = |record: &mut Vec<String>, field: &mut String, has_content: bool| {
        record.push(std::mem::take(field));
        if has_content {
            records.push(std::mem::take(record));
        } else {
            record.clear();
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
                line_has_content = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
                line_has_content = true;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_record(&mut record, &mut field, line_has_content);
                field_started = false;
                line_has_content = false;
            }
            _ => {
                field.push(c);
                field_started = true;
                line_has_content = true;
            }
        }
    }

    if line_has_content {
        end_record(&mut record, &mut field, true);
    }
    records
}

fn needs_quoting(value: &str) -> bool {
    value.contains([',', '"', '\r', '\n'])
}

fn push_field(out: &mut String, value: &str) {
    if needs_quoting(value) {
        out.push('"');
        out.push_str(&value.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(value);
    }
}

fn encode_values<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::new();
    for (i, value) in values.enumerate() {
        if i > 0 {
            line.push(',');
        }
        push_field(&mut line, value);
    }
    line.push_str(LINE_END);
    line
}

/// The header line for `schema`, terminator included.
pub fn encode_header(schema: &[&str]) -> String {
    encode_values(schema.iter().copied())
}

/// One row in schema order, terminator included. Missing columns encode empty.
pub fn encode_row(row: &Row, schema: &[&str]) -> String {
    encode_values(
        schema
            .iter()
            .map(|col| row.get(*col).map(String::as_str).unwrap_or("")),
    )
}

/// Write a header followed by `rows`.
pub fn write_rows<W: Write>(writer: &mut W, rows: &[Row], schema: &[&str]) -> io::Result<()> {
    writer.write_all(encode_header(schema).as_bytes())?;
    for row in rows {
        writer.write_all(encode_row(row, schema).as_bytes())?;
    }
    Ok(())
}

/// Build a row from values given in schema order.
pub fn row_from_values<I, S>(schema: &[&str], values: I) -> Row
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    schema
        .iter()
        .map(|col| col.to_string())
        .zip(values.into_iter().map(Into::into))
        .collect()
}
