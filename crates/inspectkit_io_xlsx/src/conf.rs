//! XLSX constants and default report format presets.

use crate::spec::{SpecCellFormat, SpecReportFormats};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Number of header rows above the report lines (label row + title row).
pub const N_ROWS_REPORT_HEADER: usize = 2;
/// Title of the leading item number column.
pub const C_TITLE_ITEM_NO: &str = "Item No";
/// Text rendered in the image column when a line has no image URL.
pub const C_IMAGE_PLACEHOLDER: &str = "No image available";
/// File extension of rendered reports.
pub const C_REPORT_EXTENSION: &str = "xlsx";

/// Build the default report format presets.
pub fn derive_default_report_formats() -> SpecReportFormats {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    SpecReportFormats {
        fmt_label: cfg_base_fmt_spec.with_(SpecCellFormat {
            font_size: Some(14),
            bold: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        }),
        fmt_header: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            text_wrap: Some(true),
            bg_color: Some("#D9E1F2".to_string()),
            ..Default::default()
        }),
        fmt_item_no: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            align: Some("center".to_string()),
            ..Default::default()
        }),
        fmt_text: cfg_base_fmt_spec.with_(SpecCellFormat {
            text_wrap: Some(true),
            ..Default::default()
        }),
    }
}
