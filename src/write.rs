// src/write.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array},
    csv::WriterBuilder,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, instrument, warn};

use crate::config::PrepConfig;
use crate::load::is_parquet;
use crate::pipeline::{Prepared, RunSummary};

/// Where the three outputs (and the optional summary) go.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub train: PathBuf,
    pub test: PathBuf,
    pub target: PathBuf,
    pub summary: Option<PathBuf>,
}

impl OutputPaths {
    pub fn from_config(cfg: &PrepConfig) -> Self {
        Self {
            train: cfg.train_out.clone(),
            test: cfg.test_out.clone(),
            target: cfg.target_out.clone(),
            summary: cfg.summary_out.clone(),
        }
    }
}

enum Payload<'a> {
    Table(&'a RecordBatch),
    Summary(&'a RunSummary),
}

/// Write train features, test features and target, all or nothing.
///
/// Each output goes to a hidden `.name.tmp` sibling first; only when every
/// file is written are they renamed into place. On failure the temporaries
/// are removed and no final file is touched.
#[instrument(level = "info", skip_all, fields(train = %paths.train.display()))]
pub fn write_outputs(prepared: &Prepared, paths: &OutputPaths) -> Result<()> {
    let target = target_batch(&prepared.target_name, &prepared.target)?;

    let mut jobs: Vec<(&Path, Payload)> = vec![
        (paths.train.as_path(), Payload::Table(&prepared.train)),
        (paths.test.as_path(), Payload::Table(&prepared.test)),
        (paths.target.as_path(), Payload::Table(&target)),
    ];
    if let Some(summary) = &paths.summary {
        jobs.push((summary.as_path(), Payload::Summary(&prepared.summary)));
    }

    // 1) stage everything
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(jobs.len());
    for (dest, payload) in jobs {
        let tmp = tmp_path(dest);
        staged.push((tmp.clone(), dest));
        let written = match payload {
            Payload::Table(batch) => write_table(&tmp, dest, batch),
            Payload::Summary(summary) => write_summary(&tmp, summary),
        };
        if let Err(e) = written {
            discard(&staged);
            return Err(e.context(format!("writing {}", dest.display())));
        }
    }

    // 2) publish
    for (tmp, dest) in &staged {
        fs::rename(tmp, dest)
            .with_context(|| format!("renaming {:?} -> {:?}", tmp, dest))?;
    }

    info!(
        train_rows = prepared.train.num_rows(),
        test_rows = prepared.test.num_rows(),
        "wrote outputs"
    );
    Ok(())
}

/// Single-column table holding the transformed target.
pub fn target_batch(name: &str, target: &Float64Array) -> Result<RecordBatch> {
    let schema = Schema::new(vec![Field::new(name, DataType::Float64, false)]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![Arc::new(target.clone()) as ArrayRef],
    )
    .context("building target batch")
}

fn tmp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let dir = dest.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!(".{}.tmp", name))
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        if tmp.exists() {
            if let Err(e) = fs::remove_file(tmp) {
                warn!("failed to remove {}: {}", tmp.display(), e);
            }
        }
    }
}

/// Format follows the final destination's extension, not the temp name.
fn write_table(tmp: &Path, dest: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(tmp).with_context(|| format!("creating file {}", tmp.display()))?;
    if is_parquet(dest) {
        let props = WriterProperties::builder()
            .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating parquet writer")?;
        writer.write(batch).context("writing batch to parquet")?;
        writer.close().context("closing parquet writer")?;
    } else {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .build(BufWriter::new(file));
        writer.write(batch).context("writing batch to csv")?;
        writer
            .into_inner()
            .flush()
            .context("flushing csv writer")?;
    }
    Ok(())
}

fn write_summary(tmp: &Path, summary: &RunSummary) -> Result<()> {
    let mut file = File::create(tmp).with_context(|| format!("creating {:?}", tmp))?;
    // pretty-print with a trailing newline
    serde_json::to_writer_pretty(&mut file, summary).context("serializing run summary")?;
    file.write_all(b"\n")?;
    Ok(())
}
