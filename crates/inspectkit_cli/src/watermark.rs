//! Persisted per-variant run state.
//!
//! The start item number is kept as the raw JSON value a user wrote so the
//! core decides whether it is usable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeDelta};
use inspectkit_core::EnumCellValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::spec::CliError;

/// Watermark state of one report variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecWatermarkState {
    /// Item number the next report starts at.
    pub next_start_item_no: Value,
    /// Offset of the next batch window in the source rows.
    pub next_source_row: usize,
    pub last_end_item_no: Option<u64>,
    pub last_file_name: Option<String>,
    pub last_file_path: Option<PathBuf>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    /// `"{h}h {m}m {s}s"` between `started_at` and `finished_at`.
    pub duration: Option<String>,
}

/// Facts about one stored batch, committed into the state.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecBatchRecord {
    pub end_item_no: u64,
    pub cnt_source_rows: usize,
    pub file_name: String,
    pub file_path: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl SpecWatermarkState {
    /// Fresh state starting at `start_item_no` on the first source row.
    pub fn new(start_item_no: u64) -> Self {
        Self {
            next_start_item_no: Value::from(start_item_no),
            ..Default::default()
        }
    }

    /// Start item number as a cell value for the core to validate.
    pub fn start_item_value(&self) -> EnumCellValue {
        match &self.next_start_item_no {
            Value::Number(n) => n.as_f64().map_or(EnumCellValue::None, EnumCellValue::Number),
            Value::String(s) => EnumCellValue::from(s.as_str()),
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                EnumCellValue::None
            }
        }
    }

    /// Advance past a stored batch.
    pub fn record_batch(&mut self, record: SpecBatchRecord) {
        self.next_start_item_no = Value::from(record.end_item_no + 1);
        self.next_source_row += record.cnt_source_rows;
        self.last_end_item_no = Some(record.end_item_no);
        self.last_file_name = Some(record.file_name);
        self.last_file_path = Some(record.file_path);
        self.duration = Some(format_duration(record.finished_at - record.started_at));
        self.started_at = Some(record.started_at);
        self.finished_at = Some(record.finished_at);
    }
}

/// `"{h}h {m}m {s}s"`; negative spans clamp to zero.
pub fn format_duration(delta: TimeDelta) -> String {
    let n_secs = delta.num_seconds().max(0);
    format!(
        "{}h {}m {}s",
        n_secs / 3600,
        (n_secs % 3600) / 60,
        n_secs % 60
    )
}

/// Load state from `path`; a missing file is an empty state.
pub fn load_state(path: &Path) -> Result<SpecWatermarkState, CliError> {
    if !path.exists() {
        debug!(path = %path.display(), "no watermark state yet");
        return Ok(SpecWatermarkState::default());
    }
    let text = fs::read_to_string(path).map_err(|e| CliError::io("read", path, e))?;
    serde_json::from_str(&text).map_err(|source| CliError::State {
        path: path.to_path_buf(),
        source,
    })
}

/// Write state through a sibling temp file and rename it into place.
pub fn save_state(path: &Path, state: &SpecWatermarkState) -> Result<(), CliError> {
    if let Some(path_dir) = path.parent()
        && !path_dir.as_os_str().is_empty()
    {
        fs::create_dir_all(path_dir).map_err(|e| CliError::io("create", path_dir, e))?;
    }
    let text = serde_json::to_string_pretty(state).map_err(|source| CliError::State {
        path: path.to_path_buf(),
        source,
    })?;

    let mut path_tmp = path.as_os_str().to_owned();
    path_tmp.push(".tmp");
    let path_tmp = PathBuf::from(path_tmp);
    fs::write(&path_tmp, text).map_err(|e| CliError::io("write", &path_tmp, e))?;
    fs::rename(&path_tmp, path).map_err(|e| CliError::io("rename", path, e))?;

    info!(
        path = %path.display(),
        next_start_item_no = %state.next_start_item_no,
        next_source_row = state.next_source_row,
        "watermark saved"
    );
    Ok(())
}
