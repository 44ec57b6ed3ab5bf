//! Stateless helpers: column references, watermark parsing, header checks.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::C_TRAIN_NO_UNKNOWN;
use crate::spec::{EnumCellValue, EnumField, ReportError, SpecFieldMapping, SpecRow};

/// Last column a worksheet can address (`XFD`), zero-based.
const N_IDX_COL_MAX: usize = 16_383;

////////////////////////////////////////////////////////////////////////////////
// #region ColumnRefs

/// Zero-based column index -> spreadsheet letters (`0` -> `A`, `26` -> `AA`).
pub fn derive_column_letter(idx_col: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = idx_col + 1;
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

fn parse_column_letters(value: &str) -> Option<usize> {
    if value.is_empty() || value.len() > 3 || !value.chars().all(|chr| chr.is_ascii_alphabetic()) {
        return None;
    }
    let mut n_idx = 0usize;
    for chr in value.to_ascii_uppercase().bytes() {
        n_idx = n_idx * 26 + (chr - b'A' + 1) as usize;
    }
    let n_idx = n_idx - 1;
    (n_idx <= N_IDX_COL_MAX).then_some(n_idx)
}

/// Resolve a column reference to a zero-based index.
///
/// Resolution order: 1-based number, exact header name, column letters.
pub fn parse_column_ref(value: &str, header: Option<&[String]>) -> Result<usize, ReportError> {
    let c_ref = value.trim();
    if c_ref.is_empty() {
        return Err(ReportError::InvalidColumnRef(value.to_string()));
    }

    if c_ref.chars().all(|chr| chr.is_ascii_digit()) {
        return match c_ref.parse::<usize>() {
            Ok(n_col) if (1..=N_IDX_COL_MAX + 1).contains(&n_col) => Ok(n_col - 1),
            _ => Err(ReportError::InvalidColumnRef(value.to_string())),
        };
    }

    if let Some(l_header) = header
        && let Some(n_idx) = l_header.iter().position(|c_name| c_name.trim() == c_ref)
    {
        return Ok(n_idx);
    }

    parse_column_letters(c_ref).ok_or_else(|| ReportError::InvalidColumnRef(value.to_string()))
}

/// Resolve `field -> column ref` overrides against an optional header row.
pub fn resolve_column_overrides(
    refs: &BTreeMap<EnumField, String>,
    header: Option<&[String]>,
) -> Result<BTreeMap<EnumField, usize>, ReportError> {
    refs.iter()
        .map(|(field, c_ref)| Ok((*field, parse_column_ref(c_ref, header)?)))
        .collect()
}

/// Validate that header names are unique (blank names are ignored).
pub fn validate_unique_columns(columns: &[String]) -> Result<(), ReportError> {
    let l_named: Vec<&str> = columns
        .iter()
        .map(|c_name| c_name.trim())
        .filter(|c_name| !c_name.is_empty())
        .collect();
    if l_named.len() == l_named.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        let c_name = c_name.trim();
        if !c_name.is_empty() {
            dict_pos.entry(c_name).or_default().push(n_idx);
        }
    }
    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(ReportError::DuplicateColumns(c_msg))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Watermark

/// Validate the caller-supplied start item number.
///
/// Accepts positive integral numbers and numeric text up to `u32::MAX`;
/// anything else is [`ReportError::MissingWatermark`].
pub fn parse_start_item_no(value: &EnumCellValue) -> Result<u32, ReportError> {
    let n_value = match value {
        EnumCellValue::None => {
            return Err(ReportError::MissingWatermark(
                "start item number is empty".to_string(),
            ));
        }
        EnumCellValue::Number(n) => *n,
        EnumCellValue::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ReportError::MissingWatermark(format!("`{s}` is not a number"))
        })?,
    };

    if !n_value.is_finite() || n_value.fract() != 0.0 || n_value < 1.0 || n_value > u32::MAX as f64
    {
        return Err(ReportError::MissingWatermark(format!(
            "`{}` is not a positive integer",
            value.to_text()
        )));
    }
    Ok(n_value as u32)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BatchLabels

/// Train number of a batch: first row's train column, trimmed.
pub fn resolve_train_no(rows: &[SpecRow], mapping: &SpecFieldMapping) -> String {
    let c_train_no = rows
        .first()
        .map(|row| mapping.trimmed_text(row, EnumField::TrainNo))
        .unwrap_or_default();
    if c_train_no.is_empty() {
        C_TRAIN_NO_UNKNOWN.to_string()
    } else {
        c_train_no
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_field_mapping;
    use crate::spec::EnumReportVariant;

    #[test]
    fn column_letters_cover_multi_letter_columns() {
        assert_eq!(derive_column_letter(0), "A");
        assert_eq!(derive_column_letter(25), "Z");
        assert_eq!(derive_column_letter(26), "AA");
        assert_eq!(derive_column_letter(N_IDX_COL_MAX), "XFD");
    }

    #[test]
    fn column_ref_prefers_number_then_header_then_letters() {
        let l_header = vec!["ID".to_string(), "Remarks".to_string()];
        assert_eq!(parse_column_ref("2", Some(&l_header)), Ok(1));
        assert_eq!(parse_column_ref("ID", Some(&l_header)), Ok(0));
        assert_eq!(parse_column_ref("ID", None), Ok(237));
        assert_eq!(parse_column_ref(" Remarks ", Some(&l_header)), Ok(1));
        assert_eq!(parse_column_ref("aa", None), Ok(26));
        assert!(parse_column_ref("0", None).is_err());
        assert!(parse_column_ref("Remarks", None).is_err());
        assert!(parse_column_ref("XFE", None).is_err());
    }

    #[test]
    fn duplicate_header_names_are_reported_with_positions() {
        let l_cols = vec![
            "A".to_string(),
            "".to_string(),
            "A".to_string(),
            "".to_string(),
        ];
        let err = validate_unique_columns(&l_cols).unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicate column names detected: \"A\" x2 at indices [0, 2]"
        );
        assert!(validate_unique_columns(&["A".to_string(), "".to_string(), "".to_string()]).is_ok());
    }

    #[test]
    fn start_item_no_accepts_positive_integers_only() {
        assert_eq!(parse_start_item_no(&EnumCellValue::Number(41.0)), Ok(41));
        assert_eq!(parse_start_item_no(&EnumCellValue::from(" 12 ")), Ok(12));
        assert_eq!(
            parse_start_item_no(&EnumCellValue::Number(u32::MAX as f64)),
            Ok(u32::MAX)
        );
        for value in [
            EnumCellValue::None,
            EnumCellValue::Number(0.0),
            EnumCellValue::Number(-3.0),
            EnumCellValue::Number(2.5),
            EnumCellValue::Number(f64::NAN),
            EnumCellValue::Number(u32::MAX as f64 + 1.0),
            EnumCellValue::from("abc"),
        ] {
            assert!(
                matches!(
                    parse_start_item_no(&value),
                    Err(ReportError::MissingWatermark(_))
                ),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn train_no_falls_back_when_blank() {
        let mapping = derive_default_field_mapping(EnumReportVariant::Visual);
        let mut l_cells = vec![EnumCellValue::None; 27];
        l_cells[6] = EnumCellValue::from("  TS-07 ");
        assert_eq!(resolve_train_no(&[SpecRow::new(l_cells)], &mapping), "TS-07");
        assert_eq!(resolve_train_no(&[SpecRow::default()], &mapping), C_TRAIN_NO_UNKNOWN);
        assert_eq!(resolve_train_no(&[], &mapping), C_TRAIN_NO_UNKNOWN);
    }
}
