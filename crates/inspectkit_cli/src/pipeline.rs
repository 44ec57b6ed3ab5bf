//! Command kernels: read a batch window, assemble it, render, store, and
//! only then advance the watermark.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use inspectkit_core::{
    EnumBatchOutcome, EnumCellValue, EnumReportVariant, SpecAssembly, SpecFieldMapping, SpecRow,
    parse_start_item_no, process_batch, resolve_train_no,
};
use inspectkit_io_fs::{derive_report_dir, list_reports, sanitize_path_segment, store_report};
use inspectkit_io_xlsx::{
    C_REPORT_EXTENSION, ReportWriter, SpecReportDocument, derive_report_file_stem, read_source_csv,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SpecAppConfig;
use crate::spec::CliError;
use crate::watermark::{SpecBatchRecord, SpecWatermarkState, load_state, save_state};

////////////////////////////////////////////////////////////////////////////////
// #region Models

/// Options of one `generate` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecGenerateOptions {
    pub variant: EnumReportVariant,
    /// Replaces the stored start item number for the first batch.
    pub start_item_no: Option<u64>,
    /// Keep going until the source is exhausted.
    pub if_all: bool,
    /// Render and plan placement without storing or saving state.
    pub if_dry_run: bool,
}

/// One report produced by `generate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBatchSummary {
    pub train_no: String,
    pub start_item_no: u64,
    pub end_item_no: u64,
    pub cnt_lines: u64,
    pub cnt_source_rows: usize,
    /// Store destination (planned in dry-run, existing file when skipped).
    pub path_report: PathBuf,
    /// `false` when the store skipped the report or in dry-run.
    pub if_stored: bool,
}

/// Aggregate counters and diagnostics for one `generate` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportGenerate {
    pub batches: Vec<SpecBatchSummary>,
    /// The last window read held no rows.
    pub if_source_exhausted: bool,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportGenerate {
    /// Add warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_batches".to_string(), self.batches.len() as u64);
        dict_counts.insert(
            "cnt_lines".to_string(),
            self.batches.iter().map(|batch| batch.cnt_lines).sum(),
        );
        dict_counts.insert(
            "cnt_source_rows".to_string(),
            self.batches
                .iter()
                .map(|batch| batch.cnt_source_rows as u64)
                .sum(),
        );
        dict_counts.insert(
            "cnt_stored".to_string(),
            self.batches.iter().filter(|batch| batch.if_stored).count() as u64,
        );
        dict_counts.insert("cnt_warnings".to_string(), self.warnings.len() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} batches={} lines={} source_rows={} stored={} warnings={}",
            dict_counts["cnt_batches"],
            dict_counts["cnt_lines"],
            dict_counts["cnt_source_rows"],
            dict_counts["cnt_stored"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportGenerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[GENERATE]"))
    }
}

/// Snapshot printed by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecStatus {
    pub variant: EnumReportVariant,
    pub path_state: PathBuf,
    pub state: SpecWatermarkState,
    /// Source rows not yet covered by a stored report, when the source reads.
    pub cnt_source_rows_pending: Option<usize>,
}

impl fmt::Display for SpecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "variant: {}", self.variant)?;
        writeln!(f, "state: {}", self.path_state.display())?;
        let c_next = match &self.state.next_start_item_no {
            Value::Null => "<unset>".to_string(),
            value => value.to_string(),
        };
        writeln!(f, "next_start_item_no: {c_next}")?;
        writeln!(f, "next_source_row: {}", self.state.next_source_row)?;
        if let Some(n_pending) = self.cnt_source_rows_pending {
            writeln!(f, "pending_source_rows: {n_pending}")?;
        }
        if let Some(c_name) = &self.state.last_file_name {
            writeln!(f, "last_file_name: {c_name}")?;
        }
        if let Some(path) = &self.state.last_file_path {
            writeln!(f, "last_file_path: {}", path.display())?;
        }
        if let Some(finished_at) = &self.state.finished_at {
            writeln!(f, "finished_at: {}", finished_at.to_rfc3339())?;
        }
        if let Some(c_duration) = &self.state.duration {
            writeln!(f, "duration: {c_duration}")?;
        }
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Generate

/// Turn source batches into stored reports.
///
/// Each batch is the `batch_row_size` window at the watermark's source row.
/// The watermark is saved only after the report is in the store (or the
/// store skipped an existing one); an empty window or a window without
/// emittable rows leaves it untouched.
pub fn run_generate(
    config: &SpecAppConfig,
    options: &SpecGenerateOptions,
) -> Result<ReportGenerate, CliError> {
    let table = read_source_csv(&config.source.path, &config.source_options()?)?;
    let mapping = config.resolve_field_mapping(options.variant, table.header_names())?;
    let path_state = config.path_state_file(options.variant);
    let mut state = load_state(&path_state)?;
    if let Some(n_start_item_no) = options.start_item_no {
        state.next_start_item_no = Value::from(n_start_item_no);
    }

    let writer = ReportWriter::default();
    let mut report = ReportGenerate::default();
    loop {
        let started_at = Local::now();
        let n_offset = state.next_source_row;
        let l_rows = table.window(n_offset, config.source.batch_row_size);
        let result = process_batch(
            l_rows,
            &state.start_item_value(),
            &mapping,
            config.grouping.attribute_row_policy,
        )?;
        for c_msg in &result.grouping.warnings {
            report.warn(c_msg);
        }

        if matches!(result.outcome, EnumBatchOutcome::EmptyBatch) {
            info!(offset = n_offset, "source exhausted");
            report.if_source_exhausted = true;
            break;
        }
        let Some((assembly, n_end_item_no)) = take_emitted(result.outcome) else {
            warn!(offset = n_offset, rows = l_rows.len(), "batch produced no report lines");
            report.warn(format!(
                "Source rows {}..{} produced no report lines; watermark unchanged.",
                n_offset + 1,
                n_offset + l_rows.len()
            ));
            break;
        };

        let summary = generate_report(
            config,
            options,
            &writer,
            l_rows,
            &assembly,
            n_end_item_no,
            &mapping,
            &mut report,
        )?;
        state.record_batch(SpecBatchRecord {
            end_item_no: summary.end_item_no,
            cnt_source_rows: l_rows.len(),
            file_name: file_name_of(&summary.path_report),
            file_path: summary.path_report.clone(),
            started_at,
            finished_at: Local::now(),
        });
        if !options.if_dry_run {
            save_state(&path_state, &state)?;
        }
        report.batches.push(summary);

        if !options.if_all {
            break;
        }
    }

    info!(
        variant = %options.variant,
        batches = report.batches.len(),
        dry_run = options.if_dry_run,
        "generate finished"
    );
    Ok(report)
}

/// Assembly and last item number of a batch that produced report lines.
fn take_emitted(outcome: EnumBatchOutcome) -> Option<(SpecAssembly, u64)> {
    match outcome {
        EnumBatchOutcome::Emitted(assembly) => {
            let n_end_item_no = assembly.end_item_no()?;
            Some((assembly, n_end_item_no))
        }
        EnumBatchOutcome::EmptyBatch | EnumBatchOutcome::NoEmittableRows => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn generate_report(
    config: &SpecAppConfig,
    options: &SpecGenerateOptions,
    writer: &ReportWriter,
    rows: &[SpecRow],
    assembly: &SpecAssembly,
    n_end_item_no: u64,
    mapping: &SpecFieldMapping,
    report: &mut ReportGenerate,
) -> Result<SpecBatchSummary, CliError> {
    let c_train_no = resolve_train_no(rows, mapping);
    let c_file_name = format!(
        "{}.{C_REPORT_EXTENSION}",
        derive_report_file_stem(
            options.variant,
            &sanitize_path_segment(&c_train_no)?,
            assembly.start_item_no,
            n_end_item_no,
        )
    );

    let path_dir_staging = config.path_staging_dir();
    fs::create_dir_all(&path_dir_staging)
        .map_err(|e| CliError::io("create", &path_dir_staging, e))?;
    let path_staged = path_dir_staging.join(&c_file_name);
    let render = writer.write_report(
        &path_staged,
        &SpecReportDocument {
            assembly,
            mapping,
            train_no: &c_train_no,
        },
    )?;
    for c_msg in &render.warnings {
        report.warn(c_msg);
    }

    let store = store_report(
        &path_staged,
        &config.output.root,
        options.variant,
        &c_train_no,
        &config.store_options(options.if_dry_run),
    )?;
    for c_msg in &store.warnings {
        report.warn(c_msg);
    }
    let if_stored = store.cnt_stored > 0 && !options.if_dry_run;
    if !if_stored {
        remove_staged_report(&path_staged)?;
    }
    let path_report = match store.path_stored {
        Some(path) => path,
        None => derive_report_dir(&config.output.root, options.variant, &c_train_no)?
            .join(&c_file_name),
    };

    info!(
        train_no = %c_train_no,
        start_item_no = assembly.start_item_no,
        end_item_no = n_end_item_no,
        path = %path_report.display(),
        stored = if_stored,
        "report generated"
    );
    Ok(SpecBatchSummary {
        train_no: c_train_no,
        start_item_no: assembly.start_item_no,
        end_item_no: n_end_item_no,
        cnt_lines: render.cnt_lines,
        cnt_source_rows: rows.len(),
        path_report,
        if_stored,
    })
}

fn remove_staged_report(path: &Path) -> Result<(), CliError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CliError::io("remove", path, e)),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StateCommands

/// Write a fresh watermark for `variant`.
///
/// An existing state is only replaced with `if_force`.
pub fn run_init(
    config: &SpecAppConfig,
    variant: EnumReportVariant,
    start_item_no: u64,
    if_force: bool,
) -> Result<PathBuf, CliError> {
    parse_start_item_no(&EnumCellValue::Number(start_item_no as f64))?;
    let path_state = config.path_state_file(variant);
    if path_state.exists() && !if_force {
        return Err(CliError::Config(format!(
            "watermark state already exists: {} (use --force to replace it)",
            path_state.display()
        )));
    }
    save_state(&path_state, &SpecWatermarkState::new(start_item_no))?;
    Ok(path_state)
}

/// Current watermark of `variant` plus how much of the source is left.
pub fn run_status(
    config: &SpecAppConfig,
    variant: EnumReportVariant,
) -> Result<SpecStatus, CliError> {
    let path_state = config.path_state_file(variant);
    let state = load_state(&path_state)?;
    let cnt_source_rows_pending = match count_source_rows(config) {
        Ok(n_rows) => Some(n_rows.saturating_sub(state.next_source_row)),
        Err(e) => {
            warn!(error = %e, "source not readable, pending rows unknown");
            None
        }
    };
    Ok(SpecStatus {
        variant,
        path_state,
        state,
        cnt_source_rows_pending,
    })
}

fn count_source_rows(config: &SpecAppConfig) -> Result<usize, CliError> {
    let table = read_source_csv(&config.source.path, &config.source_options()?)?;
    Ok(table.height())
}

/// Stored reports of one train.
pub fn run_list(
    config: &SpecAppConfig,
    variant: EnumReportVariant,
    train_no: &str,
    pattern: Option<&str>,
) -> Result<Vec<PathBuf>, CliError> {
    Ok(list_reports(&config.output.root, variant, train_no, pattern)?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use inspectkit_core::ReportError;
    use inspectkit_io_fs::{EnumStoreConflictStrategy, StoreError};

    const N_COLS: usize = 27;

    /// `(inspection id, train, location, image-linked id, image url)`
    type Record<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

    fn write_source(path: &Path, l_records: &[Record<'_>]) {
        let mut l_lines = vec![
            (1..=N_COLS)
                .map(|n| format!("c{n}"))
                .collect::<Vec<_>>()
                .join(","),
        ];
        for (c_id, c_train, c_location, c_image_id, c_url) in l_records {
            let mut l_cells = vec![String::new(); N_COLS];
            l_cells[1] = c_id.to_string();
            l_cells[6] = c_train.to_string();
            l_cells[7] = c_location.to_string();
            l_cells[23] = c_image_id.to_string();
            l_cells[26] = c_url.to_string();
            l_lines.push(l_cells.join(","));
        }
        fs::write(path, l_lines.join("\n") + "\n").unwrap();
    }

    fn make_config(dir: &Path, batch_row_size: usize) -> SpecAppConfig {
        let mut config = SpecAppConfig::default();
        config.source.path = dir.join("inspections.csv");
        config.source.batch_row_size = batch_row_size;
        config.output.root = dir.join("reports");
        config.output.state_dir = dir.join("state");
        config
    }

    fn options(variant: EnumReportVariant) -> SpecGenerateOptions {
        SpecGenerateOptions {
            variant,
            start_item_no: None,
            if_all: false,
            if_dry_run: false,
        }
    }

    #[test]
    fn generate_stores_report_and_advances_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 200);
        write_source(
            &config.source.path,
            &[
                ("I1", "TS-07", "Cab A", "", ""),
                ("", "TS-07", "", "I1", "http://img/1.jpg"),
                ("", "TS-07", "", "I1", "http://img/2.jpg"),
                ("I2", "TS-07", "Cab B", "", ""),
            ],
        );
        run_init(&config, EnumReportVariant::Visual, 5, false).unwrap();

        let report = run_generate(&config, &options(EnumReportVariant::Visual)).unwrap();

        assert_eq!(report.batches.len(), 1);
        let batch = &report.batches[0];
        assert_eq!((batch.start_item_no, batch.end_item_no), (5, 7));
        assert_eq!(batch.cnt_lines, 3);
        assert!(batch.if_stored);
        let path_expected = dir
            .path()
            .join("reports/Visual_Inspection_Reports/TS-07/V_Inspection_Report_for_TS-07_5_7.xlsx");
        assert_eq!(batch.path_report, path_expected);
        assert!(path_expected.is_file());
        assert!(!config.path_staging_dir().join("V_Inspection_Report_for_TS-07_5_7.xlsx").exists());

        let state = load_state(&config.path_state_file(EnumReportVariant::Visual)).unwrap();
        assert_eq!(state.next_start_item_no, Value::from(8u64));
        assert_eq!(state.next_source_row, 4);
        assert_eq!(
            state.last_file_name.as_deref(),
            Some("V_Inspection_Report_for_TS-07_5_7.xlsx")
        );
        assert!(state.duration.is_some());
        assert_eq!(
            report.format("[GENERATE]"),
            "[GENERATE] batches=1 lines=3 source_rows=4 stored=1 warnings=0"
        );
    }

    #[test]
    fn generate_all_walks_every_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 2);
        write_source(
            &config.source.path,
            &[
                ("I1", "TS-01", "A", "", ""),
                ("I2", "TS-01", "B", "", ""),
                ("I3", "TS-02", "C", "", ""),
            ],
        );

        let report = run_generate(
            &config,
            &SpecGenerateOptions {
                start_item_no: Some(1),
                if_all: true,
                ..options(EnumReportVariant::Functional)
            },
        )
        .unwrap();

        assert!(report.if_source_exhausted);
        let l_ranges: Vec<_> = report
            .batches
            .iter()
            .map(|batch| (batch.train_no.as_str(), batch.start_item_no, batch.end_item_no))
            .collect();
        assert_eq!(l_ranges, vec![("TS-01", 1, 2), ("TS-02", 3, 3)]);
        assert!(
            dir.path()
                .join("reports/Functional_Inspection_Reports/TS-02/F_Inspection_Report_for_TS-02_3_3.xlsx")
                .is_file()
        );

        // Nothing left: the next run is a no-op.
        let report = run_generate(&config, &options(EnumReportVariant::Functional)).unwrap();
        assert!(report.batches.is_empty());
        assert!(report.if_source_exhausted);
    }

    #[test]
    fn missing_watermark_fails_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 200);
        write_source(&config.source.path, &[("I1", "TS-01", "A", "", "")]);

        let err = run_generate(&config, &options(EnumReportVariant::Visual)).unwrap_err();
        assert!(matches!(
            err,
            CliError::Report(ReportError::MissingWatermark(_))
        ));
        assert!(!config.output.root.exists());
        assert!(!config.path_state_file(EnumReportVariant::Visual).exists());
    }

    #[test]
    fn exhausted_source_is_a_no_op_even_without_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 200);
        write_source(&config.source.path, &[("I1", "TS-01", "A", "", "")]);
        let path_state = config.path_state_file(EnumReportVariant::Visual);
        let state = SpecWatermarkState {
            next_source_row: 1,
            ..Default::default()
        };
        save_state(&path_state, &state).unwrap();

        let report = run_generate(&config, &options(EnumReportVariant::Visual)).unwrap();
        assert!(report.batches.is_empty());
        assert!(report.if_source_exhausted);
        assert_eq!(load_state(&path_state).unwrap(), state);
    }

    #[test]
    fn dry_run_stores_nothing_and_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 200);
        write_source(&config.source.path, &[("I1", "TS-01", "A", "", "")]);
        run_init(&config, EnumReportVariant::Visual, 1, false).unwrap();

        let report = run_generate(
            &config,
            &SpecGenerateOptions {
                if_dry_run: true,
                ..options(EnumReportVariant::Visual)
            },
        )
        .unwrap();

        assert_eq!(report.batches.len(), 1);
        assert!(!report.batches[0].if_stored);
        assert!(!config.output.root.exists());
        let state = load_state(&config.path_state_file(EnumReportVariant::Visual)).unwrap();
        assert_eq!(state, SpecWatermarkState::new(1));
    }

    #[test]
    fn existing_report_follows_conflict_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path(), 200);
        write_source(&config.source.path, &[("I1", "TS-01", "A", "", "")]);
        let path_dir = dir.path().join("reports/Visual_Inspection_Reports/TS-01");
        fs::create_dir_all(&path_dir).unwrap();
        fs::write(path_dir.join("V_Inspection_Report_for_TS-01_1_1.xlsx"), "old").unwrap();
        let opts = SpecGenerateOptions {
            start_item_no: Some(1),
            ..options(EnumReportVariant::Visual)
        };

        let err = run_generate(&config, &opts).unwrap_err();
        assert!(matches!(
            err,
            CliError::Store(StoreError::DestinationExists(_))
        ));
        assert!(!config.path_state_file(EnumReportVariant::Visual).exists());

        config.output.conflict = EnumStoreConflictStrategy::Skip;
        let report = run_generate(&config, &opts).unwrap();
        assert!(!report.batches[0].if_stored);
        assert_eq!(
            fs::read_to_string(path_dir.join("V_Inspection_Report_for_TS-01_1_1.xlsx")).unwrap(),
            "old"
        );
        let state = load_state(&config.path_state_file(EnumReportVariant::Visual)).unwrap();
        assert_eq!(state.next_source_row, 1);
    }

    #[test]
    fn init_refuses_to_clobber_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 200);

        run_init(&config, EnumReportVariant::Functional, 10, false).unwrap();
        assert!(matches!(
            run_init(&config, EnumReportVariant::Functional, 1, false),
            Err(CliError::Config(_))
        ));
        run_init(&config, EnumReportVariant::Functional, 1, true).unwrap();
        assert!(matches!(
            run_init(&config, EnumReportVariant::Functional, 0, true),
            Err(CliError::Report(ReportError::MissingWatermark(_)))
        ));

        let status = run_status(&config, EnumReportVariant::Functional).unwrap();
        assert_eq!(status.state, SpecWatermarkState::new(1));
        assert_eq!(status.cnt_source_rows_pending, None);
        assert!(status.to_string().contains("next_start_item_no: 1"));
    }

    #[test]
    fn list_returns_stored_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = make_config(dir.path(), 200);
        write_source(&config.source.path, &[("I1", "TS-01", "A", "", "")]);
        run_init(&config, EnumReportVariant::Visual, 1, false).unwrap();
        run_generate(&config, &options(EnumReportVariant::Visual)).unwrap();

        let l_paths = run_list(&config, EnumReportVariant::Visual, "TS-01", None).unwrap();
        assert_eq!(l_paths.len(), 1);
        assert!(
            run_list(&config, EnumReportVariant::Visual, "TS-01", Some("F_*"))
                .unwrap()
                .is_empty()
        );

        let status = run_status(&config, EnumReportVariant::Visual).unwrap();
        assert_eq!(status.cnt_source_rows_pending, Some(0));
    }

    #[test]
    fn only_assemblies_with_lines_are_taken_as_emitted() {
        use inspectkit_core::SpecEmission;

        let assembly_empty = SpecAssembly {
            start_item_no: 4,
            emissions: Vec::new(),
        };
        assert_eq!(take_emitted(EnumBatchOutcome::Emitted(assembly_empty)), None);
        assert_eq!(take_emitted(EnumBatchOutcome::EmptyBatch), None);
        assert_eq!(take_emitted(EnumBatchOutcome::NoEmittableRows), None);

        let assembly = SpecAssembly {
            start_item_no: 4,
            emissions: vec![
                SpecEmission {
                    item_no: 4,
                    row: SpecRow::default(),
                },
                SpecEmission {
                    item_no: 5,
                    row: SpecRow::default(),
                },
            ],
        };
        assert_eq!(
            take_emitted(EnumBatchOutcome::Emitted(assembly.clone())),
            Some((assembly, 5))
        );
    }
}
