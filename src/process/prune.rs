use arrow::record_batch::RecordBatch;
use tracing::{debug, info, instrument};

use crate::error::{PrepError, Result};
use crate::table;

/// Training columns holding more than one distinct non-null value, in training order.
pub fn kept_columns(train: &RecordBatch) -> Result<Vec<String>> {
    let schema = train.schema();
    let mut kept = Vec::with_capacity(schema.fields().len());
    for (i, field) in schema.fields().iter().enumerate() {
        let distinct = table::distinct_count_capped(train.column(i).as_ref(), 1)?;
        if distinct > 1 {
            kept.push(field.name().to_string());
        } else {
            debug!(column = %field.name(), distinct, "constant in train");
        }
    }
    Ok(kept)
}

/// Columns of `train` that `kept_columns` would remove.
pub fn dropped_columns(train: &RecordBatch, kept: &[String]) -> Vec<String> {
    table::column_names(train)
        .into_iter()
        .filter(|name| !kept.contains(name))
        .collect()
}

/// Both tables cut down to the kept columns, plus what was kept and dropped.
#[derive(Debug, Clone)]
pub struct Pruned {
    pub train: RecordBatch,
    pub test: RecordBatch,
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
}

/// Drop every column that is constant in `train` from both tables.
///
/// Only the training table decides; variance that exists only in `test` is
/// ignored. Both outputs carry exactly the kept columns in training order.
#[instrument(level = "info", skip_all, fields(train_cols = train.num_columns(), test_cols = test.num_columns()))]
pub fn prune_constant_columns(train: &RecordBatch, test: &RecordBatch) -> Result<Pruned> {
    let kept = kept_columns(train)?;
    let dropped = dropped_columns(train, &kept);
    info!(
        kept = kept.len(),
        dropped = dropped.len(),
        "pruned constant columns"
    );

    Ok(Pruned {
        train: project_by_name(train, &kept, "train")?,
        test: project_by_name(test, &kept, "test")?,
        kept,
        dropped,
    })
}

fn project_by_name(batch: &RecordBatch, names: &[String], table: &'static str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = names
        .iter()
        .map(|name| {
            schema.index_of(name).map_err(|_| {
                PrepError::SchemaMismatch(format!("column `{}` missing from {} table", name, table))
            })
        })
        .collect::<Result<Vec<usize>>>()?;
    batch.project(&indices).map_err(Into::into)
}
