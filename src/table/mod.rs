// src/table/mod.rs

//! Row Table helpers. A Row Table is a single Arrow `RecordBatch`; every
//! stage takes one by reference and returns a new one.

use arrow::{
    array::{Array, ArrayRef, Float32Array, Float64Array},
    datatypes::{DataType, Field, FieldRef, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
    util::display::array_value_to_string,
};
use std::{collections::HashSet, sync::Arc};

use crate::error::{PrepError, Result};

/// Look up `name`, reporting which table it was missing from.
pub fn column<'a>(batch: &'a RecordBatch, name: &str, table: &'static str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PrepError::missing(name, table))
}

pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

/// Rebuild a batch from fields + arrays, keeping the row count even when
/// no columns are left.
pub fn assemble(fields: Vec<FieldRef>, columns: Vec<ArrayRef>, num_rows: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
        .map_err(Into::into)
}

/// Typed view of an array that a cast has already normalised.
pub fn downcast<'a, T: Array + 'static>(array: &'a dyn Array, name: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        PrepError::SchemaMismatch(format!(
            "column `{}` has unexpected type {}",
            name,
            array.data_type()
        ))
    })
}

/// Remove the named columns; names not present are ignored.
pub fn drop_columns(batch: &RecordBatch, names: &[&str]) -> Result<RecordBatch> {
    let keep: Vec<usize> = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !names.contains(&f.name().as_str()))
        .map(|(i, _)| i)
        .collect();
    batch.project(&keep).map_err(Into::into)
}

/// Append columns at the end, in the given order.
pub fn append_columns(batch: &RecordBatch, extra: Vec<(Field, ArrayRef)>) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    for (field, array) in extra {
        if array.len() != batch.num_rows() {
            return Err(PrepError::SchemaMismatch(format!(
                "derived column `{}` has {} rows, table has {}",
                field.name(),
                array.len(),
                batch.num_rows()
            )));
        }
        fields.push(Arc::new(field));
        columns.push(array);
    }
    assemble(fields, columns, batch.num_rows())
}

/// Render one cell as a comparable key. Nulls (and float NaN) have no key;
/// `-0.0` shares the key of `0.0`.
pub fn value_key(array: &dyn Array, row: usize) -> Result<Option<String>> {
    if array.is_null(row) {
        return Ok(None);
    }
    let float = match array.data_type() {
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| a.value(row)),
        DataType::Float32 => array
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| f64::from(a.value(row))),
        _ => None,
    };
    match float {
        Some(v) if v.is_nan() => Ok(None),
        Some(v) if v == 0.0 => Ok(Some("0".to_string())),
        _ => Ok(Some(array_value_to_string(array, row)?)),
    }
}

/// Count distinct non-null values, stopping once `limit` is exceeded.
pub fn distinct_count_capped(array: &dyn Array, limit: usize) -> Result<usize> {
    let mut seen: HashSet<String> = HashSet::new();
    for row in 0..array.len() {
        if let Some(key) = value_key(array, row)? {
            seen.insert(key);
            if seen.len() > limit {
                break;
            }
        }
    }
    Ok(seen.len())
}
