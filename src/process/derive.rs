use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, Int64Builder, StringArray},
    compute::{cast, cast_with_options, CastOptions},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::{ColumnNames, LocalClock};
use crate::error::{PrepError, Result};
use crate::process::date_parser::{self, DateParts};
use crate::table;

pub const DIFF_VISIT_ID_TIME: &str = "diff_visitId_time";
pub const WEEK_OF_YEAR: &str = "WoY";
pub const MONTH: &str = "month";
pub const QUARTER_MONTH: &str = "quarter_month";
pub const WEEKDAY: &str = "weekday";
pub const VISIT_HOUR: &str = "visit_hour";

/// Derived integer features that the encoder must leave alone.
pub const TEMPORAL_FEATURES: [&str; 5] = [WEEK_OF_YEAR, MONTH, QUARTER_MONTH, WEEKDAY, VISIT_HOUR];

/// Which raw columns feed the derivations, and how to read epoch time.
#[derive(Debug, Clone)]
pub struct DeriveOptions {
    pub visit_id: String,
    pub start_time: String,
    pub date: String,
    pub clock: LocalClock,
}

impl DeriveOptions {
    pub fn new(columns: &ColumnNames, clock: LocalClock) -> Self {
        Self {
            visit_id: columns.visit_id.clone(),
            start_time: columns.start_time.clone(),
            date: columns.date.clone(),
            clock,
        }
    }
}

/// Replace the raw id/date/epoch columns with derived features.
///
/// Order matters: the mismatch flag still needs `start_time`, which is only
/// dropped once `visit_hour` has been computed.
#[instrument(level = "info", skip_all, fields(rows = combined.num_rows()))]
pub fn derive_features(combined: &RecordBatch, opts: &DeriveOptions) -> Result<RecordBatch> {
    let batch = add_visit_id_flag(combined, &opts.visit_id, &opts.start_time)?;
    let batch = add_date_features(&batch, &opts.date)?;
    add_visit_hour(&batch, &opts.start_time, &opts.clock)
}

/// `diff_visitId_time` = 1 where the request id differs from the start time
/// (a null on either side counts as different), else 0. Drops `visit_id`.
pub fn add_visit_id_flag(batch: &RecordBatch, visit_id: &str, start_time: &str) -> Result<RecordBatch> {
    let ids = as_i64(batch, visit_id)?;
    let starts = as_i64(batch, start_time)?;

    let flag: Int64Array = ids
        .iter()
        .zip(starts.iter())
        .map(|pair| match pair {
            (Some(a), Some(b)) if a == b => Some(0),
            _ => Some(1),
        })
        .collect();
    debug!(mismatched = flag.values().iter().sum::<i64>(), "visit id flag");

    let batch = table::append_columns(
        batch,
        vec![(
            Field::new(DIFF_VISIT_ID_TIME, DataType::Int64, false),
            Arc::new(flag) as ArrayRef,
        )],
    )?;
    table::drop_columns(&batch, &[visit_id])
}

/// Parse the `YYYYMMDD` column into WoY / month / quarter_month / weekday and drop it.
pub fn add_date_features(batch: &RecordBatch, date: &str) -> Result<RecordBatch> {
    let raw = table::column(batch, date, "combined")?;
    let texts = date_strings(raw.as_ref(), date)?;

    let n = batch.num_rows();
    let mut woy = Int64Builder::with_capacity(n);
    let mut month = Int64Builder::with_capacity(n);
    let mut quarter = Int64Builder::with_capacity(n);
    let mut weekday = Int64Builder::with_capacity(n);

    for (row, text) in texts.into_iter().enumerate() {
        let text = text.ok_or_else(|| PrepError::malformed(date, row, "", "date is null"))?;
        let parsed = date_parser::parse_yyyymmdd(&text)
            .ok_or_else(|| PrepError::malformed(date, row, text.as_str(), "expected YYYYMMDD"))?;
        let parts = DateParts::from(parsed);
        woy.append_value(parts.week_of_year as i64);
        month.append_value(parts.month as i64);
        quarter.append_value(parts.quarter_month as i64);
        weekday.append_value(parts.weekday as i64);
    }

    let batch = table::append_columns(
        batch,
        vec![
            (Field::new(WEEK_OF_YEAR, DataType::Int64, false), Arc::new(woy.finish()) as ArrayRef),
            (Field::new(MONTH, DataType::Int64, false), Arc::new(month.finish())),
            (Field::new(QUARTER_MONTH, DataType::Int64, false), Arc::new(quarter.finish())),
            (Field::new(WEEKDAY, DataType::Int64, false), Arc::new(weekday.finish())),
        ],
    )?;
    table::drop_columns(&batch, &[date])
}

/// Hour of day (0-23) of the epoch start time under `clock`; drops `start_time`.
pub fn add_visit_hour(batch: &RecordBatch, start_time: &str, clock: &LocalClock) -> Result<RecordBatch> {
    let starts = as_i64(batch, start_time)?;

    let mut hours = Int64Builder::with_capacity(starts.len());
    for (row, ts) in starts.iter().enumerate() {
        let ts = ts.ok_or_else(|| PrepError::malformed(start_time, row, "", "start time is null"))?;
        let hour = date_parser::local_hour(ts, clock).ok_or_else(|| {
            PrepError::malformed(start_time, row, ts.to_string(), "epoch out of range")
        })?;
        hours.append_value(hour as i64);
    }

    let batch = table::append_columns(
        batch,
        vec![(
            Field::new(VISIT_HOUR, DataType::Int64, false),
            Arc::new(hours.finish()) as ArrayRef,
        )],
    )?;
    table::drop_columns(&batch, &[start_time])
}

fn as_i64(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let raw = table::column(batch, name, "combined")?;
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };
    let ints = match cast_with_options(raw, &DataType::Int64, &strict) {
        Ok(ints) => ints,
        Err(e) => return Err(first_non_integer(raw.as_ref(), name, e.to_string())),
    };
    // float -> int casts truncate, so fractions are checked separately
    if raw.data_type().is_floating() {
        let floats = cast_with_options(raw, &DataType::Float64, &CastOptions::default())?;
        let floats = table::downcast::<Float64Array>(floats.as_ref(), name)?;
        if let Some(row) =
            (0..floats.len()).find(|&i| floats.is_valid(i) && floats.value(i).fract() != 0.0)
        {
            return Err(PrepError::malformed(
                name,
                row,
                floats.value(row).to_string(),
                "not a whole number",
            ));
        }
    }
    Ok(table::downcast::<Int64Array>(ints.as_ref(), name)?.clone())
}

/// Error for the first non-null cell of `raw` that does not read as an integer.
fn first_non_integer(raw: &dyn Array, name: &str, reason: String) -> PrepError {
    let lenient = cast(raw, &DataType::Int64).ok();
    let row = (0..raw.len()).find(|&i| {
        raw.is_valid(i) && lenient.as_ref().map_or(true, |ints| ints.is_null(i))
    });
    match row {
        Some(row) => PrepError::malformed(
            name,
            row,
            array_value_to_string(raw, row).unwrap_or_default(),
            reason,
        ),
        None => PrepError::SchemaMismatch(format!(
            "column `{}` ({}) cannot be read as integers: {}",
            name,
            raw.data_type(),
            reason
        )),
    }
}

/// Date cells as text. Integral floats (a side effect of nulls elsewhere in
/// an export) are rendered without the fractional part.
fn date_strings(raw: &dyn Array, name: &str) -> Result<Vec<Option<String>>> {
    match raw.data_type() {
        DataType::Utf8 => Ok(table::downcast::<StringArray>(raw, name)?
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()),
        DataType::Float32 | DataType::Float64 => {
            let floats = cast_with_options(raw, &DataType::Float64, &CastOptions::default())?;
            let floats = table::downcast::<Float64Array>(floats.as_ref(), name)?;
            floats
                .iter()
                .enumerate()
                .map(|(row, v)| match v {
                    None => Ok(None),
                    Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(Some(format!("{}", f as i64))),
                    Some(f) => Err(PrepError::malformed(name, row, f.to_string(), "expected YYYYMMDD")),
                })
                .collect()
        }
        dt if dt.is_integer() => {
            let ints = cast_with_options(raw, &DataType::Int64, &CastOptions::default())?;
            Ok(table::downcast::<Int64Array>(ints.as_ref(), name)?
                .iter()
                .map(|v| v.map(|i| i.to_string()))
                .collect())
        }
        other => {
            let reason = format!("{} is not a date type", other);
            Err(match (0..raw.len()).find(|&i| raw.is_valid(i)) {
                Some(row) => PrepError::malformed(
                    name,
                    row,
                    array_value_to_string(raw, row).unwrap_or_default(),
                    reason,
                ),
                None => PrepError::malformed(name, 0, "", "date is null"),
            })
        }
    }
}
