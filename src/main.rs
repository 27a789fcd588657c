use anyhow::Result;
use clap::Parser;
use sessionprep::{pipeline, PrepConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Turn flattened session exports into encoded train/test feature tables"
)]
struct Args {
    /// YAML config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    train: Option<PathBuf>,
    #[arg(long)]
    test: Option<PathBuf>,
    #[arg(long)]
    train_out: Option<PathBuf>,
    #[arg(long)]
    test_out: Option<PathBuf>,
    #[arg(long)]
    target_out: Option<PathBuf>,
    /// Also write a JSON run summary here
    #[arg(long)]
    summary_out: Option<PathBuf>,
    /// Fixed offset such as +10:00 for visit_hour (default: host time zone)
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<String>,
    /// Rows scanned for CSV type inference (default: whole file)
    #[arg(long)]
    infer_rows: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<PrepConfig> {
        let mut cfg = match &self.config {
            Some(path) => PrepConfig::from_yaml_file(path)?,
            None => PrepConfig::default(),
        };
        if let Some(p) = self.train {
            cfg.train_path = p;
        }
        if let Some(p) = self.test {
            cfg.test_path = p;
        }
        if let Some(p) = self.train_out {
            cfg.train_out = p;
        }
        if let Some(p) = self.test_out {
            cfg.test_out = p;
        }
        if let Some(p) = self.target_out {
            cfg.target_out = p;
        }
        if self.summary_out.is_some() {
            cfg.summary_out = self.summary_out;
        }
        if self.utc_offset.is_some() {
            cfg.utc_offset = self.utc_offset;
        }
        if self.infer_rows.is_some() {
            cfg.infer_rows = self.infer_rows;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve config ───────────────────────────────────────────
    let cfg = Args::parse().into_config()?;
    info!(
        train = %cfg.train_path.display(),
        test = %cfg.test_path.display(),
        "startup"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let summary = pipeline::run(&cfg)?;
    info!(
        train_rows = summary.train_rows,
        test_rows = summary.test_rows,
        dropped = summary.dropped_columns.len(),
        encoded = summary.encoded_columns.len(),
        "all done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "sessionprep",
            "--train",
            "in/train.parquet",
            "--utc-offset",
            "-07:00",
            "--infer-rows",
            "500",
        ]);
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.train_path, PathBuf::from("in/train.parquet"));
        assert_eq!(cfg.test_path, PathBuf::from("test-flattened.csv"));
        assert_eq!(cfg.utc_offset.as_deref(), Some("-07:00"));
        assert_eq!(cfg.infer_rows, Some(500));
    }

    #[test]
    fn no_flags_reproduce_fixed_file_names() {
        let cfg = Args::parse_from(["sessionprep"]).into_config().unwrap();
        assert_eq!(cfg, PrepConfig::default());
    }
}
