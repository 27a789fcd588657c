use arrow::{
    array::{Array, Float64Array},
    compute::{cast_with_options, CastOptions},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::table;

/// Pull `column` out of the training table and return `(train_without_it, ln(1 + revenue))`.
///
/// Absent revenue counts as zero. Must run before pruning so the target stays
/// aligned with the training rows.
#[instrument(level = "debug", skip(train), fields(rows = train.num_rows()))]
pub fn extract_target(train: &RecordBatch, column: &str) -> Result<(RecordBatch, Float64Array)> {
    let raw = table::column(train, column, "train")?;
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };
    let revenue = cast_with_options(raw, &DataType::Float64, &strict)?;
    let revenue: &Float64Array = table::downcast(revenue.as_ref(), column)?;

    let target: Float64Array = revenue
        .iter()
        .map(|v| Some(v.unwrap_or(0.0).ln_1p()))
        .collect();

    let missing = revenue.null_count();
    debug!(missing, "filled absent revenue with zero");

    let remaining = table::drop_columns(train, &[column])?;
    Ok((remaining, target))
}
