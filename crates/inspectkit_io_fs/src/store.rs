//! Report placement under `<root>/<variant folder>/<train>/`.

use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;
use inspectkit_core::EnumReportVariant;
use tracing::{info, warn};

use crate::conf::{C_PATTERN_REPORTS_DEFAULT, derive_variant_dir_name};
use crate::report::ReportStore;
use crate::spec::{EnumStoreConflictStrategy, SpecStoreOptions, StoreError};
use crate::util::{
    copy_file_with_metadata, count_missing_dirs, move_file, sanitize_path_segment,
    validate_destination_path_safety,
};

/// Directory a report for `variant` and `train_no` belongs in.
pub fn derive_report_dir(
    path_dir_root: &Path,
    variant: EnumReportVariant,
    train_no: &str,
) -> Result<PathBuf, StoreError> {
    Ok(path_dir_root
        .join(derive_variant_dir_name(variant))
        .join(sanitize_path_segment(train_no)?))
}

/// Place a rendered report into the store.
///
/// Directories are created on demand. The report keeps its file name; an
/// existing file with that name is handled per
/// [`SpecStoreOptions::rule_conflict`]. The source is moved unless
/// [`SpecStoreOptions::if_keep_source`] is set.
pub fn store_report(
    path_file_src: &Path,
    path_dir_root: &Path,
    variant: EnumReportVariant,
    train_no: &str,
    options: &SpecStoreOptions,
) -> Result<ReportStore, StoreError> {
    if !path_file_src.is_file() {
        return Err(StoreError::SourceNotFile(path_file_src.to_path_buf()));
    }
    let Some(name_file) = path_file_src.file_name() else {
        return Err(StoreError::SourceNotFile(path_file_src.to_path_buf()));
    };

    let path_dir_dst = derive_report_dir(path_dir_root, variant, train_no)?;
    let path_file_dst = path_dir_dst.join(name_file);
    validate_destination_path_safety(&path_file_dst, path_dir_root)?;

    let mut report = ReportStore::default();

    if path_file_dst.exists() {
        if path_file_dst.is_dir() {
            return Err(StoreError::DestinationIsDirectory(path_file_dst));
        }
        match options.rule_conflict {
            EnumStoreConflictStrategy::Skip => {
                warn!(path = %path_file_dst.display(), "report exists, skipping");
                report.cnt_skipped += 1;
                report.warn(format!(
                    "Destination exists, skipped: {}",
                    path_file_dst.display()
                ));
                return Ok(report);
            }
            EnumStoreConflictStrategy::Error => {
                return Err(StoreError::DestinationExists(path_file_dst));
            }
            EnumStoreConflictStrategy::Overwrite => {
                report.warn(format!(
                    "Destination exists, overwritten: {}",
                    path_file_dst.display()
                ));
            }
        }
    }

    report.cnt_created_dirs = count_missing_dirs(&path_dir_dst);
    if options.if_dry_run {
        report.cnt_stored += 1;
        report.path_stored = Some(path_file_dst.clone());
        report.warn("Dry run: no files were moved.");
        info!(dst = %path_file_dst.display(), "dry run, report not stored");
        return Ok(report);
    }

    fs::create_dir_all(&path_dir_dst).map_err(|e| StoreError::io("create", &path_dir_dst, e))?;
    if options.if_keep_source {
        copy_file_with_metadata(path_file_src, &path_file_dst)
            .map_err(|e| StoreError::io("copy", &path_file_dst, e))?;
    } else {
        move_file(path_file_src, &path_file_dst)?;
    }

    report.cnt_stored += 1;
    report.path_stored = Some(path_file_dst.clone());
    info!(
        src = %path_file_src.display(),
        dst = %path_file_dst.display(),
        created_dirs = report.cnt_created_dirs,
        "report stored"
    );
    Ok(report)
}

/// Stored reports of `variant` and `train_no` matching `pattern`, sorted.
///
/// A missing train directory lists as empty.
pub fn list_reports(
    path_dir_root: &Path,
    variant: EnumReportVariant,
    train_no: &str,
    pattern: Option<&str>,
) -> Result<Vec<PathBuf>, StoreError> {
    let matcher = Glob::new(pattern.unwrap_or(C_PATTERN_REPORTS_DEFAULT))
        .map_err(|e| StoreError::InvalidPattern(e.to_string()))?
        .compile_matcher();

    let path_dir = derive_report_dir(path_dir_root, variant, train_no)?;
    if !path_dir.is_dir() {
        return Ok(vec![]);
    }

    let mut l_paths = Vec::new();
    for entry in fs::read_dir(&path_dir).map_err(|e| StoreError::io("list", &path_dir, e))? {
        let entry = entry.map_err(|e| StoreError::io("list", &path_dir, e))?;
        let path_entry = entry.path();
        if path_entry.is_file() && matcher.is_match(entry.file_name()) {
            l_paths.push(path_entry);
        }
    }
    l_paths.sort();
    Ok(l_paths)
}
