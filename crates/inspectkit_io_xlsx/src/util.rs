//! Stateless helper utilities used by the source reader and report writer.

use std::collections::BTreeMap;

use inspectkit_core::EnumReportVariant;

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{RenderError, SpecSheetHorizontalMerge};

////////////////////////////////////////////////////////////////////////////////
// #region ReportNaming

/// Report file stem: `{V|F}_Inspection_Report_for_{train}_{start}_{end}`.
pub fn derive_report_file_stem(
    variant: EnumReportVariant,
    train_no: &str,
    start_item_no: u64,
    end_item_no: u64,
) -> String {
    format!(
        "{}_Inspection_Report_for_{train_no}_{start_item_no}_{end_item_no}",
        variant.prefix()
    )
}

/// Header label shown above the column titles: `"{train} (Visual Inspection)"`.
pub fn derive_report_header_label(variant: EnumReportVariant, train_no: &str) -> String {
    format!("{train_no} ({})", variant.inspection_type())
}

/// Escape `&` for worksheet page header/footer control strings.
pub fn escape_page_header_text(text: &str) -> String {
    text.replace('&', "&&")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

pub(crate) fn cast_row_num(value: usize) -> Result<u32, RenderError> {
    u32::try_from(value).map_err(|_| RenderError::Overflow(format!("row index overflow: {value}")))
}

pub(crate) fn cast_col_num(value: usize) -> Result<u16, RenderError> {
    u16::try_from(value)
        .map_err(|_| RenderError::Overflow(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderMergeUtils

/// Plan horizontal merges for repeated non-empty header text per row.
pub fn plan_horizontal_merges(
    header_grid: &[Vec<String>],
) -> BTreeMap<usize, Vec<SpecSheetHorizontalMerge>> {
    let mut dict_horizontal_merges_map = BTreeMap::new();

    for (idx_row, row) in header_grid.iter().enumerate() {
        let n_cols = row.len();
        let mut n_col_idx = 0;

        while n_col_idx < n_cols {
            let c_cell_val = &row[n_col_idx];
            if c_cell_val.is_empty() {
                n_col_idx += 1;
                continue;
            }

            let mut n_col_idx_end = n_col_idx + 1;
            while n_col_idx_end < n_cols && row[n_col_idx_end] == *c_cell_val {
                n_col_idx_end += 1;
            }

            if n_col_idx_end - n_col_idx > 1 {
                dict_horizontal_merges_map
                    .entry(idx_row)
                    .or_insert_with(Vec::new)
                    .push(SpecSheetHorizontalMerge {
                        row_idx_start: idx_row,
                        col_idx_start: n_col_idx,
                        col_idx_end: n_col_idx_end - 1,
                        text: c_cell_val.clone(),
                    });
            }
            n_col_idx = n_col_idx_end;
        }
    }

    dict_horizontal_merges_map
}

/// Build lookup map for cells covered by a horizontal merge (excluding anchor).
pub fn derive_horizontal_merge_tracker(
    row_horizontal_merge_mapping: &BTreeMap<usize, Vec<SpecSheetHorizontalMerge>>,
) -> BTreeMap<(usize, usize), bool> {
    let mut dict_merged_cells_tracker = BTreeMap::new();

    for (row_idx, horizontal_merges) in row_horizontal_merge_mapping {
        for merge in horizontal_merges {
            for col_idx in (merge.col_idx_start + 1)..=merge.col_idx_end {
                dict_merged_cells_tracker.insert((*row_idx, col_idx), true);
            }
        }
    }

    dict_merged_cells_tracker
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Autofit

/// Displayed width units of `s`; non-ASCII glyphs count as 1.6.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    s.lines()
        .map(|line| {
            let n_ascii = line.chars().filter(|chr| chr.is_ascii()).count();
            let n_non_ascii = line.chars().count().saturating_sub(n_ascii);
            n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
        })
        .max()
        .unwrap_or(0)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_and_label_follow_report_naming() {
        assert_eq!(
            derive_report_file_stem(EnumReportVariant::Visual, "TS-07", 41, 58),
            "V_Inspection_Report_for_TS-07_41_58"
        );
        assert_eq!(
            derive_report_file_stem(EnumReportVariant::Functional, "Unknown_Train_No", 1, 1),
            "F_Inspection_Report_for_Unknown_Train_No_1_1"
        );
        assert_eq!(
            derive_report_header_label(EnumReportVariant::Visual, "TS-07"),
            "TS-07 (Visual Inspection)"
        );
        assert_eq!(escape_page_header_text("A&B"), "A&&B");
    }

    #[test]
    fn sheet_names_are_sanitized_and_capped() {
        assert_eq!(sanitize_sheet_name("TS/07 [a]", "_"), "TS_07 _a_");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }

    #[test]
    fn merges_cover_repeated_runs_only() {
        let grid = vec![
            vec!["L".to_string(), "L".to_string(), "L".to_string()],
            vec!["a".to_string(), "b".to_string(), "b".to_string()],
        ];
        let dict_merges = plan_horizontal_merges(&grid);
        assert_eq!(dict_merges[&0].len(), 1);
        assert_eq!(dict_merges[&0][0].col_idx_end, 2);
        assert_eq!(dict_merges[&1][0].col_idx_start, 1);

        let dict_tracker = derive_horizontal_merge_tracker(&dict_merges);
        assert!(dict_tracker.contains_key(&(0, 1)));
        assert!(dict_tracker.contains_key(&(0, 2)));
        assert!(!dict_tracker.contains_key(&(0, 0)));
        assert!(!dict_tracker.contains_key(&(1, 0)));
    }

    #[test]
    fn width_counts_longest_line() {
        assert_eq!(estimate_unicode_string_width("ab\nabcd"), 4);
        assert_eq!(estimate_unicode_string_width(""), 0);
        assert_eq!(estimate_unicode_string_width("车厢"), 3);
    }
}
