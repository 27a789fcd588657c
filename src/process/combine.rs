use arrow::{
    array::{Array, ArrayRef},
    compute::{cast, cast_with_options, concat_batches, CastOptions},
    datatypes::{DataType, Field, FieldRef},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{PrepError, Result};
use crate::table;

/// Stack `test` under `train` so pruning and encoding see both halves.
///
/// Columns are matched by position and must carry the same names. Where the
/// two halves inferred different types, both are widened to a common type
/// (see [`common_type`]); if a cast still fails, both fall back to text.
pub fn concat_aligned(train: &RecordBatch, test: &RecordBatch) -> Result<RecordBatch> {
    let train_names = table::column_names(train);
    let test_names = table::column_names(test);
    if train_names != test_names {
        return Err(PrepError::SchemaMismatch(format!(
            "column order differs: train {:?} vs test {:?}",
            train_names, test_names
        )));
    }

    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };

    let mut fields: Vec<FieldRef> = Vec::with_capacity(train.num_columns());
    let mut train_cols: Vec<ArrayRef> = Vec::with_capacity(train.num_columns());
    let mut test_cols: Vec<ArrayRef> = Vec::with_capacity(train.num_columns());

    for (i, field) in train.schema().fields().iter().enumerate() {
        let tr = train.column(i);
        let te = test.column(i);

        if te.data_type() == tr.data_type() {
            fields.push(Arc::new(field.as_ref().clone().with_nullable(true)));
            train_cols.push(tr.clone());
            test_cols.push(te.clone());
            continue;
        }

        let want = common_type(tr.as_ref(), te.as_ref());
        let widened = cast_with_options(tr, &want, &strict)
            .and_then(|tr| Ok((tr, cast_with_options(te, &want, &strict)?)));
        match widened {
            Ok((cast_tr, cast_te)) => {
                debug!(column = %field.name(), train = %tr.data_type(), test = %te.data_type(),
                    to = %want, "widened column");
                fields.push(Arc::new(Field::new(field.name(), want, true)));
                train_cols.push(cast_tr);
                test_cols.push(cast_te);
            }
            Err(e) => {
                warn!(column = %field.name(), train = %tr.data_type(), test = %te.data_type(), error = %e,
                    "incompatible types, promoting column to text");
                fields.push(Arc::new(Field::new(field.name(), DataType::Utf8, true)));
                train_cols.push(cast(tr, &DataType::Utf8)?);
                test_cols.push(cast(te, &DataType::Utf8)?);
            }
        }
    }

    let train_aligned = table::assemble(fields.clone(), train_cols, train.num_rows())?;
    let test_aligned = table::assemble(fields, test_cols, test.num_rows())?;
    let combined = concat_batches(&train_aligned.schema(), [&train_aligned, &test_aligned])?;
    info!(
        rows = combined.num_rows(),
        columns = combined.num_columns(),
        "combined train + test"
    );
    Ok(combined)
}

/// Type both halves of a column can be cast to without losing values.
///
/// A half with no values at all takes the other half's type. Integers with
/// integers stay `Int64`; any other numeric pair becomes `Float64`. Every
/// remaining pairing, booleans with numbers included, is stored as text.
pub fn common_type(train: &dyn Array, test: &dyn Array) -> DataType {
    let (a, b) = (train.data_type(), test.data_type());
    if a == b {
        return a.clone();
    }
    if test.null_count() == test.len() {
        return a.clone();
    }
    if train.null_count() == train.len() {
        return b.clone();
    }
    if a.is_integer() && b.is_integer() {
        DataType::Int64
    } else if is_numeric(a) && is_numeric(b) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn is_numeric(dt: &DataType) -> bool {
    dt.is_integer() || dt.is_floating()
}

/// Split a combined table back into `(train, test)` at `n_train`.
pub fn split_at(combined: &RecordBatch, n_train: usize) -> Result<(RecordBatch, RecordBatch)> {
    let total = combined.num_rows();
    if n_train > total {
        return Err(PrepError::SchemaMismatch(format!(
            "cannot split {} rows at {}",
            total, n_train
        )));
    }
    Ok((
        combined.slice(0, n_train),
        combined.slice(n_train, total - n_train),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::{BooleanArray, Float64Array, Int64Array, StringArray},
        datatypes::Schema,
    };

    fn one_col(name: &str, array: ArrayRef) -> RecordBatch {
        let schema = Schema::new(vec![Field::new(name, array.data_type().clone(), true)]);
        RecordBatch::try_new(Arc::new(schema), vec![array]).unwrap()
    }

    #[test]
    fn round_trip_preserves_row_order() {
        let train = one_col("n", Arc::new(Int64Array::from(vec![10, 20, 30])));
        let test = one_col("n", Arc::new(Int64Array::from(vec![40, 50])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.num_rows(), 5);

        let (tr, te) = split_at(&combined, 3).unwrap();
        assert_eq!(tr.num_rows() + te.num_rows(), 5);
        let tr_vals: Vec<i64> = table::downcast::<Int64Array>(tr.column(0).as_ref(), "n")
            .unwrap()
            .values()
            .to_vec();
        let te_vals: Vec<i64> = table::downcast::<Int64Array>(te.column(0).as_ref(), "n")
            .unwrap()
            .values()
            .to_vec();
        assert_eq!(tr_vals, vec![10, 20, 30]);
        assert_eq!(te_vals, vec![40, 50]);
    }

    #[test]
    fn all_null_test_column_takes_train_type() {
        let train = one_col("n", Arc::new(Int64Array::from(vec![1, 2])));
        let test = one_col("n", Arc::new(StringArray::from(vec![None::<&str>])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Int64);
        assert!(combined.column(0).is_null(2));
    }

    #[test]
    fn mixed_kinds_promote_to_text() {
        let train = one_col("n", Arc::new(Int64Array::from(vec![1, 2])));
        let test = one_col("n", Arc::new(StringArray::from(vec!["(not set)"])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Utf8);
        let vals = table::downcast::<StringArray>(combined.column(0).as_ref(), "n").unwrap();
        assert_eq!(vals.value(0), "1");
        assert_eq!(vals.value(2), "(not set)");
    }

    #[test]
    fn int_and_float_widen_to_float() {
        let train = one_col("n", Arc::new(Int64Array::from(vec![1, 2])));
        let test = one_col("n", Arc::new(Float64Array::from(vec![1.5])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Float64);
        let vals = table::downcast::<Float64Array>(combined.column(0).as_ref(), "n").unwrap();
        assert_eq!(vals.values().to_vec(), vec![1.0, 2.0, 1.5]);
    }

    #[test]
    fn nan_in_test_keeps_column_numeric() {
        let train = one_col("n", Arc::new(Int64Array::from(vec![1, 2])));
        let test = one_col("n", Arc::new(Float64Array::from(vec![f64::NAN])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Float64);
        let vals = table::downcast::<Float64Array>(combined.column(0).as_ref(), "n").unwrap();
        assert_eq!(vals.value(1), 2.0);
        assert!(vals.value(2).is_nan());
    }

    #[test]
    fn boolean_against_number_becomes_text() {
        let train = one_col("n", Arc::new(Int64Array::from(vec![1, 2])));
        let test = one_col("n", Arc::new(BooleanArray::from(vec![true])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Utf8);
        let vals = table::downcast::<StringArray>(combined.column(0).as_ref(), "n").unwrap();
        assert_eq!(vals.value(0), "1");
        assert_eq!(vals.value(2), "true");
    }

    #[test]
    fn narrower_ints_widen_to_int64() {
        let train = one_col("n", Arc::new(arrow::array::Int32Array::from(vec![7])));
        let test = one_col("n", Arc::new(Int64Array::from(vec![8_000_000_000])));
        let combined = concat_aligned(&train, &test).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Int64);
        let vals = table::downcast::<Int64Array>(combined.column(0).as_ref(), "n").unwrap();
        assert_eq!(vals.values().to_vec(), vec![7, 8_000_000_000]);
    }

    #[test]
    fn different_columns_are_rejected() {
        let train = one_col("a", Arc::new(Int64Array::from(vec![1])));
        let test = one_col("b", Arc::new(Int64Array::from(vec![1])));
        assert!(matches!(
            concat_aligned(&train, &test),
            Err(PrepError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn split_past_end_is_rejected() {
        let t = one_col("a", Arc::new(Int64Array::from(vec![1])));
        assert!(split_at(&t, 2).is_err());
        let (tr, te) = split_at(&t, 1).unwrap();
        assert_eq!((tr.num_rows(), te.num_rows()), (1, 0));
    }
}
