//! Safe file writes for store files.
//!
//! - [`replace_all()`] - rewrite a whole store atomically (temp file + rename)
//! - [`append_one()`] - add one row to the end of a store without rewriting it
//! - [`ensure_exists()`] - create a header-only store if none exists
//!
//! **Atomic rewrites**: the new content is written in full to a temporary
//! file in the target's directory, then renamed over the target. A reader
//! of the target sees the complete old file or the complete new file, never
//! a mix. A crash before the rename leaves the target untouched (and may
//! leave an orphaned `tmp_*` file behind, which readers never look at).
//!
//! **Appends**: the row is written with a single `write_all` on a file
//! opened in append mode. A crash mid-append can leave a partial trailing
//! row; that risk is accepted for the append-mostly painpoint store.
//!
//! Neither writer takes the store lock; callers hold it.

use crate::codec::{self, Row};
use crate::config::Durability;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Atomically replace the contents of `path` with a header and `rows`.
pub fn replace_all(
    path: &Path,
    rows: &[Row],
    schema: &[&str],
    durability: Durability,
) -> io::Result<()> {
    write_atomic(path, durability, |writer| codec::write_rows(writer, rows, schema))?;
    log::debug!("rewrote {} ({} rows)", path.display(), rows.len());
    Ok(())
}

/// Fill a temp file next to `path` with `fill`, then rename it over `path`.
fn write_atomic<F>(path: &Path, durability: Durability, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<&fs::File>) -> io::Result<()>,
{
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    // Dropping `tmp` on an early return removes the temporary file.
    let tmp = tempfile::Builder::new()
        .prefix("tmp_")
        .suffix(".csv")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        fill(&mut writer)?;
        writer.flush()?;
    }

    if durability.should_sync() {
        tmp.as_file().sync_all()?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Append one row to `path`, writing the header first if the file is empty.
pub fn append_one(
    path: &Path,
    row: &Row,
    schema: &[&str],
    durability: Durability,
) -> io::Result<()> {
    fs::create_dir_all(parent_dir(path))?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut chunk = String::new();
    if file.metadata()?.len() == 0 {
        chunk.push_str(&codec::encode_header(schema));
    }
    chunk.push_str(&codec::encode_row(row, schema));
    file.write_all(chunk.as_bytes())?;

    if durability.should_sync() {
        file.sync_all()?;
    }

    log::debug!("appended 1 row to {}", path.display());
    Ok(())
}

/// Create `path` containing only the header row, if it does not exist yet.
pub fn ensure_exists(path: &Path, schema: &[&str], durability: Durability) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    replace_all(path, &[], schema, durability)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
