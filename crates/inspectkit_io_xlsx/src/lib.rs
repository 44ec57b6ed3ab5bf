//! `inspectkit_io_xlsx` v1:
//! Tabular record source and XLSX report rendering.
//!
//! - `conf`   : constants and default format presets
//! - `spec`   : specs/models/options/errors
//! - `util`   : pure helper functions (naming, sheet names, header merges)
//! - `source` : polars CSV/IPC -> rows
//! - `writer` : rust_xlsxwriter report kernel
pub mod conf;
pub mod source;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_IMAGE_PLACEHOLDER, C_REPORT_EXTENSION, C_TITLE_ITEM_NO, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NROWS_EXCEL_MAX, N_ROWS_REPORT_HEADER, TUP_EXCEL_ILLEGAL, derive_default_report_formats,
};
pub use source::{derive_source_table, read_source_csv, read_source_ipc_bytes};
pub use spec::{
    RenderError, SourceError, SpecAutofitCellsPolicy, SpecCellFormat, SpecRenderReport,
    SpecReportDocument, SpecReportFormats, SpecReportGrid, SpecReportWriteOptions,
    SpecSheetHorizontalMerge,
    SpecSourceOptions, SpecSourceTable,
};
pub use util::{
    derive_horizontal_merge_tracker, derive_report_file_stem, derive_report_header_label,
    plan_horizontal_merges, sanitize_sheet_name,
};
pub use writer::{ReportWriter, derive_report_header, plan_report_grid};
