// src/pipeline.rs

use anyhow::{Context, Result};
use arrow::{array::Float64Array, record_batch::RecordBatch};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::PrepConfig;
use crate::error::PrepError;
use crate::load::{load_table, LoadOptions};
use crate::process::{
    combine::{concat_aligned, split_at},
    derive::{derive_features, DeriveOptions, DIFF_VISIT_ID_TIME, TEMPORAL_FEATURES},
    encode::{categorical_columns, encode_categoricals},
    prune::prune_constant_columns,
    target::extract_target,
};
use crate::table;
use crate::write::{write_outputs, OutputPaths};

/// What a run did, in numbers and column lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub kept_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub derived_columns: Vec<String>,
    pub encoded_columns: Vec<String>,
    pub output_columns: Vec<String>,
}

/// Processed train/test features plus the aligned target.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub train: RecordBatch,
    pub test: RecordBatch,
    pub target: Float64Array,
    pub target_name: String,
    pub summary: RunSummary,
}

/// Run the whole transform over in-memory tables.
///
/// target → prune → concat → derive → encode → split. Train and test are
/// processed together so they end up with identical columns and codes.
#[instrument(level = "info", skip_all, fields(train_rows = train.num_rows(), test_rows = test.num_rows()))]
pub fn prepare(
    train: &RecordBatch,
    test: &RecordBatch,
    cfg: &PrepConfig,
) -> std::result::Result<Prepared, PrepError> {
    let clock = cfg.clock()?;
    let n_train = train.num_rows();

    // 1) target must come out before anything reorders or drops columns
    let (train, target) = extract_target(train, &cfg.columns.target)?;

    // 2) training set decides which columns survive
    let pruned = prune_constant_columns(&train, test)?;

    // 3) one table from here on
    let combined = concat_aligned(&pruned.train, &pruned.test)?;
    let combined = derive_features(&combined, &DeriveOptions::new(&cfg.columns, clock))?;

    let exempt = cfg.exempt_columns();
    let encoded = categorical_columns(&combined, &exempt);
    let combined = encode_categoricals(&combined, &exempt)?;

    // 4) back to two halves, rows in their original order
    let (train_out, test_out) = split_at(&combined, n_train)?;

    let mut derived = vec![DIFF_VISIT_ID_TIME.to_string()];
    derived.extend(TEMPORAL_FEATURES.iter().map(|s| s.to_string()));

    let summary = RunSummary {
        train_rows: train_out.num_rows(),
        test_rows: test_out.num_rows(),
        kept_columns: pruned.kept,
        dropped_columns: pruned.dropped,
        derived_columns: derived,
        encoded_columns: encoded,
        output_columns: table::column_names(&train_out),
    };

    Ok(Prepared {
        train: train_out,
        test: test_out,
        target,
        target_name: cfg.columns.target.clone(),
        summary,
    })
}

/// Load both inputs, transform, and write every output (or none).
#[instrument(level = "info", skip_all, fields(train = %cfg.train_path.display(), test = %cfg.test_path.display()))]
pub fn run(cfg: &PrepConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let load_opts = LoadOptions::from_config(cfg);

    let train = load_table(&cfg.train_path, &load_opts)?;
    let test = load_table(&cfg.test_path, &load_opts)?;

    let prepared = prepare(&train, &test, cfg).context("processing tables")?;
    write_outputs(&prepared, &OutputPaths::from_config(cfg))?;

    info!(
        train_rows = prepared.summary.train_rows,
        test_rows = prepared.summary.test_rows,
        columns = prepared.summary.output_columns.len(),
        elapsed = ?start.elapsed(),
        "pipeline done"
    );
    Ok(prepared.summary)
}
