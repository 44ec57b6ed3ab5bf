use std::collections::BTreeMap;
use std::path::PathBuf;

use inspectkit_core::{
    EnumAttributeRowPolicy, EnumBatchOutcome, EnumCellValue, EnumField, EnumReportVariant,
    ReportError, SpecAssembly, SpecFieldMapping, derive_default_field_mapping, process_batch,
    resolve_column_overrides, resolve_train_no,
};
use inspectkit_io_xlsx::{
    C_IMAGE_PLACEHOLDER, RenderError, ReportWriter as RsReportWriter, SourceError,
    SpecAutofitCellsPolicy, SpecCellFormat, SpecReportDocument, SpecReportFormats,
    SpecReportWriteOptions, SpecSourceTable, derive_report_file_stem, plan_report_grid,
    read_source_ipc_bytes,
};
use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes, PyDict, PyFloat, PyList, PyString};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "inspectkit.report.v1";
const C_BRIDGE_TRANSPORT: &str = "polars_ipc";

////////////////////////////////////////////////////////////////////////////////
// #region PyClasses

/// Numbered report lines of one batch.
#[pyclass(name = "BatchResult", frozen)]
struct PyBatchResult {
    /// `"emitted"`, `"empty_batch"` or `"no_emittable_rows"`.
    #[pyo3(get)]
    outcome: String,
    #[pyo3(get)]
    start_item_no: Option<u64>,
    #[pyo3(get)]
    end_item_no: Option<u64>,
    /// Watermark for the next batch; `None` unless lines were emitted.
    #[pyo3(get)]
    next_start_item_no: Option<u64>,
    #[pyo3(get)]
    train_no: String,
    #[pyo3(get)]
    cnt_attribute_rows_ignored: u64,
    #[pyo3(get)]
    warnings: Vec<String>,
    l_lines: Vec<Vec<EnumCellValue>>,
}

#[pymethods]
impl PyBatchResult {
    /// Report lines in rendered column order, item number first.
    #[getter]
    fn lines<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyList>> {
        let mut l_obj = Vec::with_capacity(self.l_lines.len());
        for l_line in &self.l_lines {
            let l_cells: Vec<Py<PyAny>> = l_line.iter().map(|value| cell_to_py(py, value)).collect();
            l_obj.push(PyList::new(py, l_cells)?);
        }
        PyList::new(py, l_obj)
    }

    fn __len__(&self) -> usize {
        self.l_lines.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "BatchResult(outcome={:?}, start_item_no={:?}, end_item_no={:?}, lines={})",
            self.outcome,
            self.start_item_no,
            self.end_item_no,
            self.l_lines.len()
        )
    }
}

/// Outcome of one rendered workbook.
#[pyclass(name = "RenderReport", frozen)]
struct PyRenderReport {
    #[pyo3(get)]
    file_out: String,
    #[pyo3(get)]
    sheet_name: String,
    #[pyo3(get)]
    cnt_lines: u64,
    #[pyo3(get)]
    cnt_lines_without_image: u64,
    #[pyo3(get)]
    start_item_no: u64,
    #[pyo3(get)]
    end_item_no: u64,
    #[pyo3(get)]
    warnings: Vec<String>,
}

#[pymethods]
impl PyRenderReport {
    fn __repr__(&self) -> String {
        format!(
            "RenderReport(file_out={:?}, lines={}, without_image={})",
            self.file_out, self.cnt_lines, self.cnt_lines_without_image
        )
    }
}

#[pyclass(name = "ReportWriter")]
struct PyReportWriter {
    inner: RsReportWriter,
}

#[pymethods]
impl PyReportWriter {
    #[new]
    #[pyo3(signature = (
        fmt_label = None,
        fmt_header = None,
        fmt_item_no = None,
        fmt_text = None,
        image_placeholder = None,
        policy_autofit = None,
        if_freeze_header = true
    ))]
    fn new(
        fmt_label: Option<&Bound<'_, PyAny>>,
        fmt_header: Option<&Bound<'_, PyAny>>,
        fmt_item_no: Option<&Bound<'_, PyAny>>,
        fmt_text: Option<&Bound<'_, PyAny>>,
        image_placeholder: Option<String>,
        policy_autofit: Option<&Bound<'_, PyAny>>,
        if_freeze_header: bool,
    ) -> PyResult<Self> {
        let formats_default = SpecReportFormats::default();
        let formats = SpecReportFormats {
            fmt_label: overlay_cell_format(&formats_default.fmt_label, fmt_label)?,
            fmt_header: overlay_cell_format(&formats_default.fmt_header, fmt_header)?,
            fmt_item_no: overlay_cell_format(&formats_default.fmt_item_no, fmt_item_no)?,
            fmt_text: overlay_cell_format(&formats_default.fmt_text, fmt_text)?,
        };
        let options = SpecReportWriteOptions {
            policy_autofit: parse_spec_autofit_cells_policy(policy_autofit)?
                .unwrap_or_default(),
            image_placeholder: image_placeholder
                .unwrap_or_else(|| C_IMAGE_PLACEHOLDER.to_string()),
            if_freeze_header,
        };
        Ok(Self {
            inner: RsReportWriter::new(formats, options),
        })
    }

    /// Assemble `df` and render it to `file_out`.
    ///
    /// Raises `ValueError` when the batch yields no lines.
    #[pyo3(signature = (
        file_out,
        df,
        variant,
        start_item_no,
        columns = None,
        attribute_row_policy = "first_before_images"
    ))]
    #[allow(clippy::too_many_arguments)]
    fn write(
        &self,
        py: Python<'_>,
        file_out: String,
        df: &Bound<'_, PyAny>,
        variant: &str,
        start_item_no: &Bound<'_, PyAny>,
        columns: Option<&Bound<'_, PyDict>>,
        attribute_row_policy: &str,
    ) -> PyResult<PyRenderReport> {
        let table = derive_source_table_from_any(py, df)?;
        let mapping = derive_field_mapping(variant, columns, &table)?;
        let rule_attribute_row = parse_rule_attribute_row(attribute_row_policy)?;
        let value_start_item_no = parse_cell_value(start_item_no)?;

        let result = process_batch(
            &table.rows,
            &value_start_item_no,
            &mapping,
            rule_attribute_row,
        )
        .map_err(map_report_error)?;
        let EnumBatchOutcome::Emitted(assembly) = result.outcome else {
            return Err(PyValueError::new_err(
                "no data rows to process for report generation",
            ));
        };
        let Some(n_end_item_no) = assembly.end_item_no() else {
            return Err(map_render_error(RenderError::EmptyDocument));
        };
        let c_train_no = resolve_train_no(&table.rows, &mapping);

        let path_file_out = PathBuf::from(&file_out);
        let report = self
            .inner
            .write_report(
                &path_file_out,
                &SpecReportDocument {
                    assembly: &assembly,
                    mapping: &mapping,
                    train_no: &c_train_no,
                },
            )
            .map_err(map_render_error)?;

        let mut l_warnings = result.grouping.warnings;
        l_warnings.extend(report.warnings);
        Ok(PyRenderReport {
            file_out,
            sheet_name: report.sheet_name,
            cnt_lines: report.cnt_lines,
            cnt_lines_without_image: report.cnt_lines_without_image,
            start_item_no: assembly.start_item_no,
            end_item_no: n_end_item_no,
            warnings: l_warnings,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PyFunctions

/// Group, merge and number one batch without rendering it.
#[pyfunction]
#[pyo3(signature = (
    df,
    variant,
    start_item_no,
    columns = None,
    attribute_row_policy = "first_before_images",
    image_placeholder = None
))]
fn assemble(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
    variant: &str,
    start_item_no: &Bound<'_, PyAny>,
    columns: Option<&Bound<'_, PyDict>>,
    attribute_row_policy: &str,
    image_placeholder: Option<String>,
) -> PyResult<PyBatchResult> {
    let table = derive_source_table_from_any(py, df)?;
    let mapping = derive_field_mapping(variant, columns, &table)?;
    let rule_attribute_row = parse_rule_attribute_row(attribute_row_policy)?;
    let value_start_item_no = parse_cell_value(start_item_no)?;

    let result = process_batch(
        &table.rows,
        &value_start_item_no,
        &mapping,
        rule_attribute_row,
    )
    .map_err(map_report_error)?;

    let c_placeholder = image_placeholder.unwrap_or_else(|| C_IMAGE_PLACEHOLDER.to_string());
    let (c_outcome, assembly) = match result.outcome {
        EnumBatchOutcome::Emitted(assembly) => ("emitted", Some(assembly)),
        EnumBatchOutcome::EmptyBatch => ("empty_batch", None),
        EnumBatchOutcome::NoEmittableRows => ("no_emittable_rows", None),
    };
    let l_lines = assembly
        .as_ref()
        .map(|assembly| plan_report_grid(assembly, &mapping, &c_placeholder).lines)
        .unwrap_or_default();

    Ok(PyBatchResult {
        outcome: c_outcome.to_string(),
        start_item_no: assembly.as_ref().map(|assembly| assembly.start_item_no),
        end_item_no: assembly.as_ref().and_then(SpecAssembly::end_item_no),
        next_start_item_no: assembly.as_ref().map(SpecAssembly::next_start_item_no),
        train_no: resolve_train_no(&table.rows, &mapping),
        cnt_attribute_rows_ignored: result.grouping.cnt_attribute_rows_ignored,
        warnings: result.grouping.warnings,
        l_lines,
    })
}

/// `{V|F}_Inspection_Report_for_{train}_{start}_{end}`
#[pyfunction]
fn report_file_stem(
    variant: &str,
    train_no: &str,
    start_item_no: u64,
    end_item_no: u64,
) -> PyResult<String> {
    Ok(derive_report_file_stem(
        parse_variant(variant)?,
        train_no,
        start_item_no,
        end_item_no,
    ))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parsing

fn parse_variant(value: &str) -> PyResult<EnumReportVariant> {
    value.parse::<EnumReportVariant>().map_err(map_report_error)
}

fn parse_rule_attribute_row(value: &str) -> PyResult<EnumAttributeRowPolicy> {
    value
        .parse::<EnumAttributeRowPolicy>()
        .map_err(map_report_error)
}

fn parse_cell_value(obj: &Bound<'_, PyAny>) -> PyResult<EnumCellValue> {
    if obj.is_none() {
        return Ok(EnumCellValue::None);
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(EnumCellValue::String(obj.extract::<String>()?));
    }
    if let Ok(n_value) = obj.extract::<f64>() {
        return Ok(EnumCellValue::Number(n_value));
    }
    Err(PyValueError::new_err(
        "start_item_no must be int, float, str or None.",
    ))
}

fn parse_column_refs(
    columns: Option<&Bound<'_, PyDict>>,
) -> PyResult<BTreeMap<EnumField, String>> {
    let mut dict_refs = BTreeMap::new();
    let Some(columns) = columns else {
        return Ok(dict_refs);
    };
    for (key, value) in columns.iter() {
        let c_key = key.extract::<String>()?;
        let field = c_key.parse::<EnumField>().map_err(map_report_error)?;
        let c_ref = if value.is_instance_of::<PyString>() {
            value.extract::<String>()?
        } else if let Ok(n_col) = value.extract::<i64>() {
            n_col.to_string()
        } else {
            return Err(PyValueError::new_err(format!(
                "Column ref for `{c_key}` must be str or int."
            )));
        };
        dict_refs.insert(field, c_ref);
    }
    Ok(dict_refs)
}

fn derive_field_mapping(
    variant: &str,
    columns: Option<&Bound<'_, PyDict>>,
    table: &SpecSourceTable,
) -> PyResult<SpecFieldMapping> {
    let variant = parse_variant(variant)?;
    let dict_refs = parse_column_refs(columns)?;
    let dict_overrides =
        resolve_column_overrides(&dict_refs, table.header_names()).map_err(map_report_error)?;
    derive_default_field_mapping(variant)
        .with_overrides(&dict_overrides)
        .map_err(map_report_error)
}

fn overlay_cell_format(
    base: &SpecCellFormat,
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<SpecCellFormat> {
    let Some(obj) = obj else {
        return Ok(base.clone());
    };
    if obj.is_none() {
        return Ok(base.clone());
    }

    Ok(base.with_(SpecCellFormat {
        font_name: extract_optional_attr::<String>(obj, "font_name")?,
        font_size: extract_optional_attr::<i64>(obj, "font_size")?,
        bold: extract_optional_attr::<bool>(obj, "bold")?,
        italic: extract_optional_attr::<bool>(obj, "italic")?,
        align: extract_optional_attr::<String>(obj, "align")?,
        valign: extract_optional_attr::<String>(obj, "valign")?,
        border: extract_optional_attr::<i64>(obj, "border")?,
        text_wrap: extract_optional_attr::<bool>(obj, "text_wrap")?,
        num_format: extract_optional_attr::<String>(obj, "num_format")?,
        bg_color: extract_optional_attr::<String>(obj, "bg_color")?,
        font_color: extract_optional_attr::<String>(obj, "font_color")?,
    }))
}

fn parse_spec_autofit_cells_policy(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecAutofitCellsPolicy>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut policy = SpecAutofitCellsPolicy::default();
    if obj.hasattr("height_body_inferred_max")? {
        let val = obj.getattr("height_body_inferred_max")?;
        if val.is_none() {
            policy.height_body_inferred_max = None;
        } else {
            policy.height_body_inferred_max = Some(val.extract::<usize>()?);
        }
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_min")? {
        policy.width_cell_min = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_max")? {
        policy.width_cell_max = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_padding")? {
        policy.width_cell_padding = v;
    }

    Ok(Some(policy))
}

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val.extract::<T>()?))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Bridge

/// Accept IPC `bytes` or anything `polars.DataFrame(...)` accepts.
fn derive_source_table_from_any(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
) -> PyResult<SpecSourceTable> {
    if let Ok(obj_bytes) = df.downcast::<PyBytes>() {
        return read_source_ipc_bytes(obj_bytes.as_bytes()).map_err(map_source_error);
    }

    let df_polars = convert_to_polars_dataframe(py, df)?;
    let obj_buffer = df_polars.call_method1("write_ipc", (py.None(),))?;
    let obj_payload = obj_buffer.call_method0("getvalue")?;
    let obj_bytes = obj_payload.downcast::<PyBytes>()?;
    read_source_ipc_bytes(obj_bytes.as_bytes()).map_err(map_source_error)
}

fn convert_to_polars_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let module_polars = py.import("polars")?;
    let cls_dataframe = module_polars.getattr("DataFrame")?;

    if df.is_instance(&cls_dataframe)? {
        return Ok(df.clone());
    }

    cls_dataframe.call1((df,))
}

fn cell_to_py(py: Python<'_>, value: &EnumCellValue) -> Py<PyAny> {
    match value {
        EnumCellValue::None => py.None(),
        EnumCellValue::String(s) => PyString::new(py, s).into_any().unbind(),
        EnumCellValue::Number(n) => PyFloat::new(py, *n).into_any().unbind(),
    }
}

fn map_report_error(err: ReportError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn map_source_error(err: SourceError) -> PyErr {
    match err {
        SourceError::NotFound(_) => PyFileNotFoundError::new_err(err.to_string()),
        SourceError::Polars(_) | SourceError::Report(_) | SourceError::Cell { .. } => {
            PyValueError::new_err(err.to_string())
        }
    }
}

fn map_render_error(err: RenderError) -> PyErr {
    match err {
        RenderError::Xlsx(_) => PyRuntimeError::new_err(err.to_string()),
        RenderError::EmptyDocument | RenderError::InvalidOption(_) | RenderError::Overflow(_) => {
            PyValueError::new_err(err.to_string())
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[pymodule]
fn _inspectkit_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyBatchResult>()?;
    module.add_class::<PyRenderReport>()?;
    module.add_class::<PyReportWriter>()?;
    module.add_function(wrap_pyfunction!(assemble, module)?)?;
    module.add_function(wrap_pyfunction!(report_file_stem, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
