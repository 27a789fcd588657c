//! Feature preparation for flattened web-analytics session exports.
//!
//! Loads a train and a test table, strips constant columns, derives temporal
//! and id-mismatch features, encodes categoricals consistently across both
//! halves, and writes the processed tables plus a `ln(1 + revenue)` target.

pub mod config;
pub mod error;
pub mod load;
pub mod pipeline;
pub mod process;
pub mod table;
pub mod write;

pub use config::{ColumnNames, LocalClock, PrepConfig};
pub use error::PrepError;
pub use pipeline::{prepare, run, Prepared, RunSummary};
