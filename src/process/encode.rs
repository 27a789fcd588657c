use arrow::{
    array::{Array, ArrayRef, BooleanArray, Int64Array, LargeStringArray, StringArray},
    datatypes::{DataType, Field, FieldRef},
    record_batch::RecordBatch,
};
use std::{collections::HashMap, hash::Hash, sync::Arc};
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::table;

/// Code given to nulls; it never consumes a rank.
pub const NULL_CODE: i64 = -1;

/// Assigns 0, 1, 2, … to values in the order they are first seen.
///
/// Codes live only as long as this value; nothing is persisted, so a
/// different row order or a different test set yields a different mapping.
#[derive(Debug)]
pub struct FirstOccurrence<K> {
    codes: HashMap<K, i64>,
}

impl<K: Hash + Eq> FirstOccurrence<K> {
    pub fn new() -> Self {
        Self {
            codes: HashMap::new(),
        }
    }

    pub fn code(&mut self, value: K) -> i64 {
        let next = self.codes.len() as i64;
        *self.codes.entry(value).or_insert(next)
    }

    pub fn code_opt(&mut self, value: Option<K>) -> i64 {
        value.map_or(NULL_CODE, |v| self.code(v))
    }

    pub fn cardinality(&self) -> usize {
        self.codes.len()
    }
}

impl<K: Hash + Eq> Default for FirstOccurrence<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the encoder treats a column of this type as categorical.
pub fn is_categorical(dt: &DataType) -> bool {
    matches!(dt, DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean)
}

/// Replace every non-exempt text/boolean column with first-occurrence codes,
/// scanning the combined table top to bottom. Column names and positions are kept.
#[instrument(level = "info", skip_all, fields(columns = combined.num_columns()))]
pub fn encode_categoricals(combined: &RecordBatch, exempt: &[String]) -> Result<RecordBatch> {
    let schema = combined.schema();
    let mut fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    let mut encoded = 0usize;

    for (i, field) in schema.fields().iter().enumerate() {
        let col = combined.column(i);
        if exempt.iter().any(|e| e == field.name()) || !is_categorical(field.data_type()) {
            fields.push(field.clone());
            columns.push(col.clone());
            continue;
        }

        let (codes, cardinality) = factorize(col.as_ref(), field.name())?;
        debug!(column = %field.name(), cardinality, "encoded");
        fields.push(Arc::new(Field::new(field.name(), DataType::Int64, false)));
        columns.push(Arc::new(codes));
        encoded += 1;
    }

    info!(encoded, "categorical encoding done");
    table::assemble(fields, columns, combined.num_rows())
}

/// Names of the columns `encode_categoricals` would rewrite.
pub fn categorical_columns(batch: &RecordBatch, exempt: &[String]) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .filter(|f| is_categorical(f.data_type()) && !exempt.iter().any(|e| e == f.name()))
        .map(|f| f.name().to_string())
        .collect()
}

fn factorize(col: &dyn Array, name: &str) -> Result<(Int64Array, usize)> {
    match col.data_type() {
        DataType::Boolean => {
            let mut codes = FirstOccurrence::new();
            let values = table::downcast::<BooleanArray>(col, name)?;
            let out = Int64Array::from_iter_values(values.iter().map(|v| codes.code_opt(v)));
            Ok((out, codes.cardinality()))
        }
        DataType::LargeUtf8 => {
            let mut codes = FirstOccurrence::new();
            let values = table::downcast::<LargeStringArray>(col, name)?;
            let out = Int64Array::from_iter_values(values.iter().map(|v| codes.code_opt(v)));
            Ok((out, codes.cardinality()))
        }
        _ => {
            let mut codes = FirstOccurrence::new();
            let values = table::downcast::<StringArray>(col, name)?;
            let out = Int64Array::from_iter_values(values.iter().map(|v| codes.code_opt(v)));
            Ok((out, codes.cardinality()))
        }
    }
}
