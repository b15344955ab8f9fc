//! painscout-core: flat-file record stores shared by independent processes
//!
//! Two stores live side by side: a query store (search expressions with a
//! lifecycle) and a painpoint store (findings linked to a query). Several
//! uncoordinated processes may mutate them concurrently; safety comes only
//! from filesystem primitives:
//!
//! - a lock token per store file ([`lock`]), created with create-if-absent
//! - whole-file rewrites through temp-file + rename ([`safe_io::replace_all`])
//! - single-row appends for the append-mostly painpoint log ([`safe_io::append_one`])
//!
//! Nothing is cached between operations: every call re-reads the file.
//!
//! # Quick Start
//!
//! ```no_run
//! use painscout_core::{GenerateInput, QueryStore, StoreConfig};
//!
//! let config = StoreConfig::default();
//! let store = QueryStore::new("queries.csv", &config);
//! let input = GenerateInput {
//!     sites: vec!["reddit.com/r/tools".to_string()],
//!     key_phrases: vec!["broken part".to_string()],
//!     ..Default::default()
//! };
//! let report = store.generate(&input)?;
//! println!("Generated {} new queries", report.added.len());
//! # Ok::<(), painscout_core::StoreError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod lock;
pub mod painpoint;
pub mod query;
pub mod safe_io;
pub mod summary;

pub use config::{Durability, LockConfig, StorageConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use lock::{LockPolicy, LockStatus, StoreLock};
pub use painpoint::{NewPainpoint, PAINPOINT_FIELDS, PainpointRecord, PainpointStore};
pub use query::{
    GenerateInput, GenerateReport, MarkOutcome, QUERY_FIELDS, QueryPatch, QueryRecord,
    QueryStatus, QueryStore, apply_patch,
};
pub use summary::{Summary, summarize};

/// Date format used for every date column in both stores.
pub const DATE_FMT: &str = "%Y-%m-%d";

/// Today's date (UTC), the stamp used for creation and discovery dates.
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
