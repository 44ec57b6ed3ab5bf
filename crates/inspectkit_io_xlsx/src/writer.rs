//! Report writer kernel: assembled batch -> one-sheet XLSX workbook.

use std::path::Path;

use inspectkit_core::{
    EnumCellValue, EnumField, EnumReportVariant, SpecAssembly, SpecFieldMapping,
};
use rust_xlsxwriter::{DocProperties, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::{debug, info};

use crate::conf::{C_TITLE_ITEM_NO, N_NROWS_EXCEL_MAX, N_ROWS_REPORT_HEADER};
use crate::spec::{
    RenderError, SpecAutofitCellsPolicy, SpecCellFormat, SpecRenderReport, SpecReportDocument,
    SpecReportFormats, SpecReportGrid, SpecReportWriteOptions,
};
use crate::util::{
    cast_col_num, cast_row_num, derive_horizontal_merge_tracker, derive_report_file_stem,
    derive_report_header_label, escape_page_header_text, estimate_unicode_string_width,
    plan_horizontal_merges, sanitize_sheet_name,
};

////////////////////////////////////////////////////////////////////////////////
// #region GridPlanning

/// Lay out report lines in rendered column order.
///
/// Column 0 is the item number; the rest follow
/// [`EnumField::rendered_fields`]. A blank image URL renders as
/// `image_placeholder` and counts as a line without image.
pub fn plan_report_grid(
    assembly: &SpecAssembly,
    mapping: &SpecFieldMapping,
    image_placeholder: &str,
) -> SpecReportGrid {
    let l_fields = EnumField::rendered_fields(mapping.variant());
    let mut grid = SpecReportGrid::default();
    for emission in &assembly.emissions {
        let mut l_line = Vec::with_capacity(l_fields.len() + 1);
        l_line.push(EnumCellValue::Number(emission.item_no as f64));
        for field in &l_fields {
            let value = mapping
                .cell(&emission.row, *field)
                .cloned()
                .unwrap_or_default();
            if *field == EnumField::ImageUrl && value.is_blank() {
                grid.cnt_lines_without_image += 1;
                l_line.push(EnumCellValue::String(image_placeholder.to_string()));
            } else {
                l_line.push(value);
            }
        }
        grid.lines.push(l_line);
    }
    grid
}

/// Two header rows: the label repeated across every column, then titles.
pub fn derive_report_header(label: &str, variant: EnumReportVariant) -> Vec<Vec<String>> {
    let mut l_titles = vec![C_TITLE_ITEM_NO.to_string()];
    l_titles.extend(
        EnumField::rendered_fields(variant)
            .iter()
            .map(|field| field.title().to_string()),
    );
    vec![vec![label.to_string(); l_titles.len()], l_titles]
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Writer

/// Stateless report writer bound to format presets and options.
#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    formats: SpecReportFormats,
    options: SpecReportWriteOptions,
}

impl ReportWriter {
    /// Writer with explicit presets.
    pub fn new(formats: SpecReportFormats, options: SpecReportWriteOptions) -> Self {
        Self { formats, options }
    }

    /// Active write options.
    pub fn options(&self) -> &SpecReportWriteOptions {
        &self.options
    }

    /// Render `document` into a new workbook at `path`.
    ///
    /// The sheet is named after the train number; the header label is also
    /// placed in the printed page header and the file stem in the workbook
    /// title property.
    pub fn write_report(
        &self,
        path: &Path,
        document: &SpecReportDocument<'_>,
    ) -> Result<SpecRenderReport, RenderError> {
        validate_policy_autofit(&self.options.policy_autofit)?;

        let assembly = document.assembly;
        let Some(n_end_item_no) = assembly.end_item_no() else {
            return Err(RenderError::EmptyDocument);
        };
        if assembly.len() > N_NROWS_EXCEL_MAX - N_ROWS_REPORT_HEADER {
            return Err(RenderError::Overflow(format!(
                "{} report lines exceed the worksheet row limit",
                assembly.len()
            )));
        }

        let variant = document.mapping.variant();
        let c_label = derive_report_header_label(variant, document.train_no);
        let c_title = derive_report_file_stem(
            variant,
            document.train_no,
            assembly.start_item_no,
            n_end_item_no,
        );
        let l_header_grid = derive_report_header(&c_label, variant);
        let body_grid = plan_report_grid(
            assembly,
            document.mapping,
            &self.options.image_placeholder,
        );

        let mut report = SpecRenderReport {
            path: path.to_path_buf(),
            sheet_name: sanitize_sheet_name(document.train_no, "_"),
            cnt_lines_without_image: body_grid.cnt_lines_without_image,
            ..Default::default()
        };
        if report.sheet_name != document.train_no {
            report.warn(format!(
                "Sheet name sanitized: {:?} -> {:?}.",
                document.train_no, report.sheet_name
            ));
        }

        let fmt_label = derive_rust_xlsx_format(&self.formats.fmt_label);
        let fmt_header = derive_rust_xlsx_format(&self.formats.fmt_header);
        let fmt_item_no = derive_rust_xlsx_format(&self.formats.fmt_item_no);
        let fmt_text = derive_rust_xlsx_format(&self.formats.fmt_text);

        let mut workbook = Workbook::new();
        workbook.set_properties(
            &DocProperties::new()
                .set_title(&c_title)
                .set_subject(&c_label),
        );

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&report.sheet_name)?;
        worksheet.set_header(format!("&C{}", escape_page_header_text(&c_label)));
        write_header(worksheet, &l_header_grid, &fmt_label, &fmt_header)?;
        if self.options.if_freeze_header {
            worksheet.set_freeze_panes(cast_row_num(N_ROWS_REPORT_HEADER)?, 0)?;
        }

        let mut l_width_by_col: Vec<usize> = l_header_grid[1]
            .iter()
            .map(|c_title| estimate_unicode_string_width(c_title))
            .collect();
        let n_rows_autofit = self
            .options
            .policy_autofit
            .height_body_inferred_max
            .unwrap_or(usize::MAX);

        for (n_idx_line, l_line) in body_grid.lines.iter().enumerate() {
            let n_idx_row = N_ROWS_REPORT_HEADER + n_idx_line;
            for (n_idx_col, value) in l_line.iter().enumerate() {
                let fmt = if n_idx_col == 0 { &fmt_item_no } else { &fmt_text };
                write_cell_with_format(worksheet, n_idx_row, n_idx_col, value, fmt)?;
                if n_idx_line < n_rows_autofit {
                    l_width_by_col[n_idx_col] = usize::max(
                        l_width_by_col[n_idx_col],
                        estimate_unicode_string_width(&value.to_text()),
                    );
                }
            }
            report.cnt_lines += 1;
        }

        let policy = &self.options.policy_autofit;
        let n_min = usize::max(1, policy.width_cell_min);
        let n_max = usize::min(255, usize::max(n_min, policy.width_cell_max));
        for (n_idx_col, n_width_recorded) in l_width_by_col.iter().enumerate() {
            let n_width_final = usize::min(
                n_max,
                usize::max(n_min, n_width_recorded + policy.width_cell_padding),
            );
            worksheet.set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)?;
        }

        workbook.save(path)?;
        info!(
            path = %path.display(),
            lines = report.cnt_lines,
            start_item_no = assembly.start_item_no,
            end_item_no = n_end_item_no,
            "report written"
        );
        Ok(report)
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), RenderError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(RenderError::InvalidOption(
            "policy_autofit.width_cell_min must be >= 1.".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(RenderError::InvalidOption(
            "policy_autofit.width_cell_max must be >= width_cell_min.".to_string(),
        ));
    }
    Ok(())
}

fn write_header(
    worksheet: &mut Worksheet,
    header_grid: &[Vec<String>],
    fmt_label: &Format,
    fmt_header: &Format,
) -> Result<(), RenderError> {
    let dict_horizontal_merges_by_row = plan_horizontal_merges(header_grid);
    let dict_horizontal_merge_tracker =
        derive_horizontal_merge_tracker(&dict_horizontal_merges_by_row);

    for (row_idx, row_values) in header_grid.iter().enumerate() {
        let fmt = if row_idx == 0 { fmt_label } else { fmt_header };
        for (col_idx, cell_value) in row_values.iter().enumerate() {
            if dict_horizontal_merge_tracker
                .get(&(row_idx, col_idx))
                .copied()
                .unwrap_or(false)
            {
                continue;
            }
            // Anchors of merged runs are written by `merge_range` below.
            if dict_horizontal_merges_by_row
                .get(&row_idx)
                .is_some_and(|l_merges| l_merges.iter().any(|m| m.col_idx_start == col_idx))
            {
                continue;
            }
            if cell_value.is_empty() {
                worksheet.write_blank(cast_row_num(row_idx)?, cast_col_num(col_idx)?, fmt)?;
            } else {
                worksheet.write_string_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    cell_value,
                    fmt,
                )?;
            }
        }

        if let Some(l_merges) = dict_horizontal_merges_by_row.get(&row_idx) {
            for merge in l_merges {
                worksheet.merge_range(
                    cast_row_num(row_idx)?,
                    cast_col_num(merge.col_idx_start)?,
                    cast_row_num(row_idx)?,
                    cast_col_num(merge.col_idx_end)?,
                    &merge.text,
                    fmt,
                )?;
            }
        }
    }
    debug!(rows = header_grid.len(), "report header written");

    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), RenderError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) if val.is_finite() => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_string_with_format(n_row, n_col, val.to_string(), format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    for val in [&spec.align, &spec.valign].into_iter().flatten() {
        if let Some(align) = derive_format_align(val) {
            format = format.set_align(align);
        }
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "justify" => Some(FormatAlign::Justify),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use inspectkit_core::{SpecEmission, SpecRow, derive_default_field_mapping};

    fn make_assembly(start_item_no: u64, l_urls: &[&str]) -> SpecAssembly {
        let emissions = l_urls
            .iter()
            .enumerate()
            .map(|(n_offset, c_url)| {
                let mut l_cells = vec![EnumCellValue::None; 27];
                l_cells[1] = EnumCellValue::from("X");
                l_cells[7] = EnumCellValue::from("Depot 3");
                l_cells[21] = EnumCellValue::from("hinge pin");
                l_cells[25] = EnumCellValue::from(format!("photo {n_offset}"));
                l_cells[26] = EnumCellValue::from(*c_url);
                SpecEmission {
                    item_no: start_item_no + n_offset as u64,
                    row: SpecRow::new(l_cells),
                }
            })
            .collect();
        SpecAssembly {
            start_item_no,
            emissions,
        }
    }

    #[test]
    fn grid_follows_rendered_column_order() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let assembly = make_assembly(41, &["http://img/1", ""]);
        let grid = plan_report_grid(&assembly, &mapping, "No image available").lines;

        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 14);
        assert_eq!(grid[0][0], EnumCellValue::Number(41.0));
        assert_eq!(grid[1][0], EnumCellValue::Number(42.0));
        assert_eq!(grid[0][1].to_text(), "Depot 3");
        assert_eq!(grid[0][8].to_text(), "hinge pin");
        assert_eq!(grid[0][13].to_text(), "http://img/1");
        assert_eq!(grid[1][13].to_text(), "No image available");
        assert_eq!(grid[1][12].to_text(), "photo 1");
    }

    #[test]
    fn functional_grid_has_no_sub_subcomponent_column() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Functional);
        let assembly = make_assembly(1, &["http://img/1"]);
        let grid = plan_report_grid(&assembly, &mapping, "-").lines;
        assert_eq!(grid[0].len(), 13);
        assert!(grid[0].iter().all(|value| value.to_text() != "hinge pin"));
    }

    #[test]
    fn url_equal_to_placeholder_text_still_has_an_image() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let assembly = make_assembly(1, &["No image available", "", "  "]);
        let grid = plan_report_grid(&assembly, &mapping, "No image available");

        assert_eq!(grid.cnt_lines_without_image, 2);
        assert!(
            grid.lines
                .iter()
                .all(|l_line| l_line[13].to_text() == "No image available")
        );
    }

    #[test]
    fn header_repeats_label_then_titles() {
        let l_header = derive_report_header("TS-07 (Visual Inspection)", EnumReportVariant::Visual);
        assert_eq!(l_header.len(), 2);
        assert!(l_header[0].iter().all(|c| c == "TS-07 (Visual Inspection)"));
        assert_eq!(l_header[1][0], "Item No");
        assert_eq!(l_header[1][8], "Sub-subcomponent");
        assert_eq!(l_header[1].last().map(String::as_str), Some("Image"));
    }

    #[test]
    fn write_report_creates_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("V_Inspection_Report_for_TS-07_41_42.xlsx");
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let assembly = make_assembly(41, &["http://img/1", ""]);

        let report = ReportWriter::default()
            .write_report(
                &path,
                &SpecReportDocument {
                    assembly: &assembly,
                    mapping: &mapping,
                    train_no: "TS/07",
                },
            )
            .unwrap();

        assert!(path.is_file());
        assert_eq!(report.cnt_lines, 2);
        assert_eq!(report.cnt_lines_without_image, 1);
        assert_eq!(report.sheet_name, "TS_07");
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn empty_assembly_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let assembly = SpecAssembly::default();
        let err = ReportWriter::default()
            .write_report(
                &dir.path().join("empty.xlsx"),
                &SpecReportDocument {
                    assembly: &assembly,
                    mapping: &mapping,
                    train_no: "TS-07",
                },
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyDocument));
        assert!(!dir.path().join("empty.xlsx").exists());
    }
}
