// src/load/mod.rs

use anyhow::{bail, Context, Result};
use arrow::{
    compute::{cast, concat_batches},
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, FieldRef, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{fs::File, io::Seek, path::Path, sync::Arc};
use tracing::{debug, info};

use crate::config::PrepConfig;
use crate::table;

/// How an input file is turned into a Row Table.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Columns forced to text regardless of what they look like.
    pub string_columns: Vec<String>,
    /// Rows scanned for CSV type inference; `None` scans everything.
    pub infer_rows: Option<usize>,
    pub batch_size: usize,
}

impl LoadOptions {
    pub fn from_config(cfg: &PrepConfig) -> Self {
        Self {
            string_columns: vec![cfg.columns.visitor_id.clone()],
            infer_rows: cfg.infer_rows,
            batch_size: cfg.batch_size,
        }
    }
}

pub fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("parquet"))
}

/// Read a whole CSV or Parquet file (chosen by extension) into one batch.
#[tracing::instrument(level = "info", skip(path, opts), fields(path = %path.as_ref().display()))]
pub fn load_table<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<RecordBatch> {
    let path = path.as_ref();
    let batch = if is_parquet(path) {
        load_parquet(path, opts)?
    } else {
        load_csv(path, opts)?
    };
    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "loaded table"
    );
    Ok(batch)
}

fn load_csv(path: &Path, opts: &LoadOptions) -> Result<RecordBatch> {
    let mut file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;

    // 1) infer types, then pin ids and keep dates as text
    let (inferred, scanned) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, opts.infer_rows)
        .with_context(|| format!("inferring schema of {}", path.display()))?;
    if inferred.fields().is_empty() {
        bail!("{} has no header row", path.display());
    }
    debug!(scanned, "inferred csv schema");
    let schema: SchemaRef = Arc::new(loadable_schema(&inferred, &opts.string_columns));

    // 2) read every record with the adjusted schema
    file.rewind()
        .with_context(|| format!("rewinding {}", path.display()))?;
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(opts.batch_size)
        .build(file)
        .context("creating CSV reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, ArrowError>>()
        .with_context(|| format!("reading CSV {}", path.display()))?;

    concat_batches(&schema, &batches).context("concatenating CSV batches")
}

fn load_parquet(path: &Path, opts: &LoadOptions) -> Result<RecordBatch> {
    let file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {}", path.display()))?
        .with_batch_size(opts.batch_size);
    let schema = builder.schema().clone();
    let reader = builder.build().context("creating parquet reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, ArrowError>>()
        .with_context(|| format!("reading parquet {}", path.display()))?;
    let batch = concat_batches(&schema, &batches).context("concatenating parquet batches")?;

    pin_string_columns(&batch, &opts.string_columns)
}

/// Schema used to read a CSV: pinned columns and anything temporal or
/// all-empty become text, so only numbers and booleans are typed.
fn loadable_schema(inferred: &Schema, string_columns: &[String]) -> Schema {
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| {
            let pinned = string_columns.iter().any(|c| c == f.name());
            let dt = f.data_type();
            if pinned || dt.is_temporal() || *dt == DataType::Null {
                Field::new(f.name(), DataType::Utf8, true)
            } else {
                Field::new(f.name(), dt.clone(), true)
            }
        })
        .collect();
    Schema::new(fields)
}

/// Parquet already carries types; only the pinned columns are forced to text.
fn pin_string_columns(batch: &RecordBatch, string_columns: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(schema.fields().len());
    for (i, f) in schema.fields().iter().enumerate() {
        let col = batch.column(i);
        if string_columns.iter().any(|c| c == f.name()) && f.data_type() != &DataType::Utf8 {
            fields.push(Arc::new(Field::new(f.name(), DataType::Utf8, true)));
            columns.push(cast(col, &DataType::Utf8)?);
        } else {
            fields.push(f.clone());
            columns.push(col.clone());
        }
    }
    Ok(table::assemble(fields, columns, batch.num_rows())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, BooleanArray, Int64Array, StringArray};
    use parquet::arrow::ArrowWriter;
    use std::{fs, io::Write};
    use tempfile::tempdir;

    fn opts() -> LoadOptions {
        LoadOptions::from_config(&PrepConfig::default())
    }

    const SAMPLE: &str = "\
channelGrouping,date,fullVisitorId,visitId,visitStartTime,device.isMobile,totals.transactionRevenue
Organic Search,20170815,0000436683523507380,1502755200,1502755200,False,
Direct,20170816,9674781571160116268,1502841000,1502841601,True,25000000
";

    #[test]
    fn csv_keeps_visitor_id_as_text() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("train.csv");
        fs::write(&path, SAMPLE)?;

        let batch = load_table(&path, &opts())?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 7);

        let ids = table::downcast::<StringArray>(
            batch.column_by_name("fullVisitorId").unwrap().as_ref(),
            "fullVisitorId",
        )?;
        assert_eq!(ids.value(0), "0000436683523507380");
        assert_eq!(ids.value(1), "9674781571160116268");

        let schema = batch.schema();
        assert_eq!(schema.field_with_name("visitId")?.data_type(), &DataType::Int64);
        assert_eq!(schema.field_with_name("date")?.data_type(), &DataType::Int64);

        let mobile = table::downcast::<BooleanArray>(
            batch.column_by_name("device.isMobile").unwrap().as_ref(),
            "device.isMobile",
        )?;
        assert!(!mobile.value(0));
        assert!(mobile.value(1));

        let revenue = batch.column_by_name("totals.transactionRevenue").unwrap();
        assert!(revenue.is_null(0));
        assert_eq!(
            table::downcast::<Int64Array>(revenue.as_ref(), "rev")?.value(1),
            25_000_000
        );
        Ok(())
    }

    #[test]
    fn iso_dates_stay_text() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.csv");
        let mut f = File::create(&path)?;
        writeln!(f, "when,n\n2017-08-15,1\n2017-08-16,2")?;
        drop(f);

        let batch = load_table(&path, &opts())?;
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
        Ok(())
    }

    #[test]
    fn empty_csv_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.csv");
        fs::write(&path, "")?;
        assert!(load_table(&path, &opts()).is_err());
        Ok(())
    }

    #[test]
    fn parquet_input_pins_visitor_id() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("train.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("fullVisitorId", DataType::Int64, true),
            Field::new("hits", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![42, 43])),
                Arc::new(Int64Array::from(vec![1, 2])),
            ],
        )?;
        let mut writer = ArrowWriter::try_new(File::create(&path)?, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        let loaded = load_table(&path, &opts())?;
        assert_eq!(loaded.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(loaded.schema().field(1).data_type(), &DataType::Int64);
        assert_eq!(loaded.num_rows(), 2);
        Ok(())
    }
}
