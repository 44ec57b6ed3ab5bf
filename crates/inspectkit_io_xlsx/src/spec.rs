//! Source/report specification models and errors.

use std::path::PathBuf;

use inspectkit_core::{EnumCellValue, ReportError, SpecAssembly, SpecFieldMapping, SpecRow};
use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; `None` fields inherit when overlaid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Named format presets used by [`crate::writer::ReportWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReportFormats {
    /// Merged label row (`"{train} (Visual Inspection)"`).
    pub fmt_label: SpecCellFormat,
    /// Column title row.
    pub fmt_header: SpecCellFormat,
    /// Item number column.
    pub fmt_item_no: SpecCellFormat,
    /// Every other body cell.
    pub fmt_text: SpecCellFormat,
}

impl Default for SpecReportFormats {
    fn default() -> Self {
        crate::conf::derive_default_report_formats()
    }
}

/// Horizontal merge plan item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetHorizontalMerge {
    /// Row index where merge is applied.
    pub row_idx_start: usize,
    /// Start column index (inclusive).
    pub col_idx_start: usize,
    /// End column index (inclusive).
    pub col_idx_end: usize,
    /// Merge display text.
    pub text: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SourceSpecification

/// Options for reading a delimited source export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSourceOptions {
    /// First non-skipped line carries column names.
    pub has_header: bool,
    /// Lines skipped before the header (or first data line).
    pub skip_rows: usize,
    /// Field separator byte.
    pub separator: u8,
    /// Let polars infer numeric dtypes. Off keeps every cell as text so
    /// identifiers like `007` survive untouched.
    pub if_infer_types: bool,
}

impl Default for SpecSourceOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            skip_rows: 0,
            separator: b',',
            if_infer_types: false,
        }
    }
}

/// Source rows in sheet order plus the header names, when present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSourceTable {
    /// Column names; empty when the source has no header line.
    pub header: Vec<String>,
    /// Data rows in source order.
    pub rows: Vec<SpecRow>,
}

impl SpecSourceTable {
    /// Number of data rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Header names, `None` when the source had none.
    pub fn header_names(&self) -> Option<&[String]> {
        (!self.header.is_empty()).then_some(self.header.as_slice())
    }

    /// Rows `[offset, offset + size)`, clamped to the table.
    pub fn window(&self, offset: usize, size: usize) -> &[SpecRow] {
        let n_start = usize::min(offset, self.rows.len());
        let n_end = usize::min(n_start.saturating_add(size), self.rows.len());
        &self.rows[n_start..n_end]
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Column width inference policy for rendered reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Max body rows inspected for width inference; `None` inspects all.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReportWriteOptions {
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Text shown in the image column when a line has no URL.
    pub image_placeholder: String,
    /// Freeze panes below the header rows.
    pub if_freeze_header: bool,
}

impl Default for SpecReportWriteOptions {
    fn default() -> Self {
        Self {
            policy_autofit: SpecAutofitCellsPolicy::default(),
            image_placeholder: crate::conf::C_IMAGE_PLACEHOLDER.to_string(),
            if_freeze_header: true,
        }
    }
}

/// One report to render: the assembled batch and how to read its rows.
#[derive(Debug, Clone)]
pub struct SpecReportDocument<'a> {
    /// Numbered, merge-resolved lines.
    pub assembly: &'a SpecAssembly,
    /// Field mapping the rows were read with.
    pub mapping: &'a SpecFieldMapping,
    /// Train number labelling the report.
    pub train_no: &'a str,
}

/// Report body laid out in rendered column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecReportGrid {
    /// One row per report line, item number first.
    pub lines: Vec<Vec<EnumCellValue>>,
    /// Lines whose image URL was blank.
    pub cnt_lines_without_image: u64,
}

/// Per-write call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecRenderReport {
    /// Written workbook path.
    pub path: PathBuf,
    /// Worksheet name actually used.
    pub sheet_name: String,
    /// Report lines written below the header.
    pub cnt_lines: u64,
    /// Lines whose image URL was blank.
    pub cnt_lines_without_image: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecRenderReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failures while reading a tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source path does not exist or is not a file.
    #[error("source file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Polars failed to parse the payload.
    #[error("failed to read source: {0}")]
    Polars(#[from] PolarsError),
    /// Header validation failed.
    #[error(transparent)]
    Report(#[from] ReportError),
    /// A cell could not be accessed.
    #[error("failed to read cell at row {row}, column {col}: {message}")]
    Cell {
        /// Zero-based data row.
        row: usize,
        /// Zero-based column.
        col: usize,
        /// Underlying error text.
        message: String,
    },
}

/// Failures while rendering a report workbook.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Nothing to render.
    #[error("report has no lines to render")]
    EmptyDocument,
    /// Invalid writer option.
    #[error("invalid write option: {0}")]
    InvalidOption(String),
    /// Row/column index outside worksheet limits.
    #[error("{0}")]
    Overflow(String),
    /// Workbook construction or save failed.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_overlay_keeps_unset_fields() {
        let base = SpecCellFormat {
            font_name: Some("Times New Roman".to_string()),
            bold: Some(false),
            ..Default::default()
        };
        let merged = base.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        });
        assert_eq!(merged.font_name.as_deref(), Some("Times New Roman"));
        assert_eq!(merged.bold, Some(true));
    }

    #[test]
    fn window_is_clamped_to_the_table() {
        let table = SpecSourceTable {
            header: vec![],
            rows: (0..5)
                .map(|n| SpecRow::from_texts(&[n.to_string()]))
                .collect(),
        };
        assert_eq!(table.window(0, 2).len(), 2);
        assert_eq!(table.window(4, 200).len(), 1);
        assert!(table.window(5, 3).is_empty());
        assert!(table.window(99, 3).is_empty());
        assert_eq!(table.window(3, 2)[0].text_at(0), "3");
        assert_eq!(table.header_names(), None);
    }
}
