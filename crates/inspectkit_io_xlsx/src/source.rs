//! Tabular record source: polars CSV/IPC payloads -> ordered rows.

use std::io::Cursor;
use std::path::Path;

use inspectkit_core::{EnumCellValue, SpecRow, validate_unique_columns};
use polars::prelude::{
    AnyValue, CsvParseOptions, CsvReadOptions, DataFrame, IpcReader, SerReader,
};
use tracing::{debug, info};

use crate::spec::{SourceError, SpecSourceOptions, SpecSourceTable};

/// Read a delimited export into ordered rows.
pub fn read_source_csv(
    path: &Path,
    options: &SpecSourceOptions,
) -> Result<SpecSourceTable, SourceError> {
    if !path.is_file() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let n_infer_schema_length = if options.if_infer_types { Some(100) } else { Some(0) };
    let df = CsvReadOptions::default()
        .with_has_header(options.has_header)
        .with_skip_rows(options.skip_rows)
        .with_infer_schema_length(n_infer_schema_length)
        .with_parse_options(CsvParseOptions::default().with_separator(options.separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let table = derive_source_table(&df, options.has_header)?;
    info!(
        path = %path.display(),
        rows = table.height(),
        columns = df.width(),
        "source loaded"
    );
    Ok(table)
}

/// Read a polars IPC payload (the Python bridge format) into ordered rows.
pub fn read_source_ipc_bytes(v_ipc_df: &[u8]) -> Result<SpecSourceTable, SourceError> {
    let df = IpcReader::new(Cursor::new(v_ipc_df)).finish()?;
    derive_source_table(&df, true)
}

/// Convert a dataframe into header names plus rows of normalized cells.
pub fn derive_source_table(
    df: &DataFrame,
    has_header: bool,
) -> Result<SpecSourceTable, SourceError> {
    let l_header: Vec<String> = if has_header {
        df.get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    } else {
        vec![]
    };
    validate_unique_columns(&l_header)?;

    let l_cols = df.get_columns();
    let mut l_rows = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut l_cells = Vec::with_capacity(l_cols.len());
        for (n_idx_col, col) in l_cols.iter().enumerate() {
            let value = col.get(n_idx_row).map_err(|err| SourceError::Cell {
                row: n_idx_row,
                col: n_idx_col,
                message: err.to_string(),
            })?;
            l_cells.push(derive_cell_value_from_any_value(value));
        }
        l_rows.push(SpecRow::new(l_cells));
    }
    debug!(rows = l_rows.len(), "converted source frame");

    Ok(SpecSourceTable {
        header: l_header,
        rows: l_rows,
    })
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::from(val),
        AnyValue::StringOwned(val) => EnumCellValue::from(val.as_str()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int128(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}
