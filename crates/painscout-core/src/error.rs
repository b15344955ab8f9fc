use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by store operations.
///
/// Contention and I/O failures stop the caller, as does running out of ids.
/// A missing record on update is reported through [`crate::MarkOutcome::NotFound`]
/// instead of an error.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("could not acquire lock {} after {attempts} attempts", lock_path.display())]
    Contention { lock_path: PathBuf, attempts: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid input document: {0}")]
    Input(#[from] serde_json::Error),
    #[error("config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("no {field} left to allocate in {}", path.display())]
    IdsExhausted { path: PathBuf, field: &'static str },
}

impl StoreError {
    /// True when the operation was aborted because another process held the lock.
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Contention { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
