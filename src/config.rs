// src/config.rs

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::error::PrepError;
use crate::process::derive::TEMPORAL_FEATURES;

/// Names of the raw columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Opaque visitor identifier; loaded as text and never encoded.
    pub visitor_id: String,
    /// Monetary column in the training set, turned into the target.
    pub target: String,
    pub visit_id: String,
    /// Unix epoch seconds.
    pub start_time: String,
    /// 8-digit `YYYYMMDD`.
    pub date: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            visitor_id: "fullVisitorId".into(),
            target: "totals.transactionRevenue".into(),
            visit_id: "visitId".into(),
            start_time: "visitStartTime".into(),
            date: "date".into(),
        }
    }
}

/// Everything a run needs. Defaults are the fixed file names the batch job
/// has always used, so an empty config is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub train_out: PathBuf,
    pub test_out: PathBuf,
    pub target_out: PathBuf,
    pub summary_out: Option<PathBuf>,
    pub columns: ColumnNames,
    /// Rows scanned for CSV type inference; `None` scans the whole file.
    pub infer_rows: Option<usize>,
    pub batch_size: usize,
    /// Fixed offset such as `+10:00` for `visit_hour`; `None` uses the host time zone.
    pub utc_offset: Option<String>,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("train-flattened.csv"),
            test_path: PathBuf::from("test-flattened.csv"),
            train_out: PathBuf::from("train-flat-clean.csv"),
            test_out: PathBuf::from("test-flat-clean.csv"),
            target_out: PathBuf::from("target.csv"),
            summary_out: None,
            columns: ColumnNames::default(),
            infer_rows: None,
            batch_size: 8192,
            utc_offset: None,
        }
    }
}

impl PrepConfig {
    /// Load a YAML config; missing keys fall back to the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {:?}", path))
    }

    /// Resolve `utc_offset` into the clock used for hour extraction.
    pub fn clock(&self) -> Result<LocalClock, PrepError> {
        match self.utc_offset.as_deref().map(str::trim) {
            None => Ok(LocalClock::System),
            Some(s) if s.eq_ignore_ascii_case("utc") || s == "Z" => {
                Ok(LocalClock::Fixed(FixedOffset::east_opt(0).ok_or_else(
                    || PrepError::Config("zero offset rejected".into()),
                )?))
            }
            Some(s) => s
                .parse::<FixedOffset>()
                .map(LocalClock::Fixed)
                .map_err(|e| PrepError::Config(format!("utc_offset {:?}: {}", s, e))),
        }
    }

    /// Columns that pass through the encoder untouched.
    pub fn exempt_columns(&self) -> Vec<String> {
        let mut exempt = vec![self.columns.visitor_id.clone()];
        exempt.extend(TEMPORAL_FEATURES.iter().map(|s| s.to_string()));
        exempt
    }
}

/// Time zone used to read epoch timestamps as wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalClock {
    /// Host time zone (`chrono::Local`).
    System,
    Fixed(FixedOffset),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_fixed_file_names() {
        let cfg = PrepConfig::default();
        assert_eq!(cfg.train_path, PathBuf::from("train-flattened.csv"));
        assert_eq!(cfg.target_out, PathBuf::from("target.csv"));
        assert_eq!(cfg.columns.visitor_id, "fullVisitorId");
        assert_eq!(cfg.clock().unwrap(), LocalClock::System);
    }

    #[test]
    fn yaml_overrides_only_given_keys() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(
            tmp,
            "train_path: data/train.parquet\nutc_offset: \"-07:00\"\ncolumns:\n  target: revenue\n"
        )?;

        let cfg = PrepConfig::from_yaml_file(tmp.path())?;
        assert_eq!(cfg.train_path, PathBuf::from("data/train.parquet"));
        assert_eq!(cfg.test_path, PathBuf::from("test-flattened.csv"));
        assert_eq!(cfg.columns.target, "revenue");
        assert_eq!(cfg.columns.date, "date");
        assert_eq!(
            cfg.clock()?,
            LocalClock::Fixed(FixedOffset::west_opt(7 * 3600).unwrap())
        );
        Ok(())
    }

    #[test]
    fn bad_offset_is_config_error() {
        let cfg = PrepConfig {
            utc_offset: Some("tomorrow".into()),
            ..Default::default()
        };
        assert!(matches!(cfg.clock(), Err(PrepError::Config(_))));
    }

    #[test]
    fn utc_alias_is_zero_offset() {
        let cfg = PrepConfig {
            utc_offset: Some("UTC".into()),
            ..Default::default()
        };
        assert_eq!(
            cfg.clock().unwrap(),
            LocalClock::Fixed(FixedOffset::east_opt(0).unwrap())
        );
    }

    #[test]
    fn exempt_columns_cover_id_and_temporal_features() {
        let exempt = PrepConfig::default().exempt_columns();
        for name in ["fullVisitorId", "WoY", "month", "quarter_month", "weekday", "visit_hour"] {
            assert!(exempt.iter().any(|e| e == name), "{} not exempt", name);
        }
        assert!(!exempt.iter().any(|e| e == "diff_visitId_time"));
    }
}
