//! Shared inspection record models, options and errors.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::derive_column_letter;

////////////////////////////////////////////////////////////////////////////////
// #region CellAndRow

/// Normalized scalar cell value as read from the tabular source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// String-coerced cell text. Blank cells become `""`.
    ///
    /// Integral numbers drop the fractional part (`12.0` -> `"12"`) so that
    /// identifiers typed as numbers in the sheet compare equal to their text.
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(s) => s.clone(),
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    /// Trimmed text, used for keys and image URLs.
    pub fn to_trimmed_text(&self) -> String {
        self.to_text().trim().to_string()
    }

    /// `true` when the trimmed text is empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Self::None
        } else {
            Self::String(value.to_string())
        }
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Self::None
        } else {
            Self::String(value)
        }
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One source record: positional cells in sheet column order.
///
/// Rows are never mutated once read; merging builds a new row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRow {
    cells: Vec<EnumCellValue>,
}

impl SpecRow {
    /// Wrap positional cells.
    pub fn new(cells: Vec<EnumCellValue>) -> Self {
        Self { cells }
    }

    /// Build a row from text cells; empty strings become blank cells.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            cells: texts
                .iter()
                .map(|s| EnumCellValue::from(s.as_ref()))
                .collect(),
        }
    }

    /// All cells in column order.
    pub fn cells(&self) -> &[EnumCellValue] {
        &self.cells
    }

    /// Number of cells (row width).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when the row has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at zero-based column index, if the row is wide enough.
    pub fn get(&self, idx_col: usize) -> Option<&EnumCellValue> {
        self.cells.get(idx_col)
    }

    /// Cell text at zero-based column index; out-of-range reads as `""`.
    pub fn text_at(&self, idx_col: usize) -> String {
        self.get(idx_col).map(EnumCellValue::to_text).unwrap_or_default()
    }
}

impl From<Vec<EnumCellValue>> for SpecRow {
    fn from(cells: Vec<EnumCellValue>) -> Self {
        Self::new(cells)
    }
}

impl FromIterator<EnumCellValue> for SpecRow {
    fn from_iter<I: IntoIterator<Item = EnumCellValue>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Normalized (trimmed, string-coerced) inspection identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InspectionKey(String);

impl InspectionKey {
    /// Normalize raw identifier text into a key.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InspectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region VariantAndFields

/// Report variant; selects field mapping, labels and destination folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumReportVariant {
    /// Visual inspection report (carries the sub-subcomponent column).
    Visual,
    /// Functional inspection report.
    Functional,
}

impl EnumReportVariant {
    /// Lowercase identifier used in config and state file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Functional => "functional",
        }
    }

    /// One-letter report file prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Visual => "V",
            Self::Functional => "F",
        }
    }

    /// Human-readable inspection type used in the report header label.
    pub fn inspection_type(&self) -> &'static str {
        match self {
            Self::Visual => "Visual Inspection",
            Self::Functional => "Functional Inspection",
        }
    }
}

impl fmt::Display for EnumReportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnumReportVariant {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "visual" | "v" => Ok(Self::Visual),
            "functional" | "f" => Ok(Self::Functional),
            _ => Err(ReportError::InvalidVariant(value.to_string())),
        }
    }
}

/// Closed set of semantic fields a source row may carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EnumField {
    /// Primary inspection identifier.
    InspectionId,
    /// Image-linked inspection identifier (preferred grouping key when set).
    ImageInspectionId,
    /// Inspector user name.
    UserName,
    /// Train/unit number; names the report and its folder.
    TrainNo,
    /// Location.
    Location,
    /// Car body.
    CarBody,
    /// Section name.
    SectionName,
    /// Subsystem name.
    SubsystemName,
    /// Serial number.
    SerialNumber,
    /// Subcomponent.
    Subcomponent,
    /// Sub-subcomponent (Visual reports only).
    SubSubcomponent,
    /// Condition.
    Condition,
    /// Defect type.
    DefectType,
    /// Remarks.
    Remarks,
    /// Per-photo caption; kept from the image row when merging.
    ImageDescription,
    /// Photo reference; kept from the image row when merging.
    ImageUrl,
}

impl EnumField {
    /// Every field, in declaration order.
    pub const ALL: [EnumField; 16] = [
        Self::InspectionId,
        Self::ImageInspectionId,
        Self::UserName,
        Self::TrainNo,
        Self::Location,
        Self::CarBody,
        Self::SectionName,
        Self::SubsystemName,
        Self::SerialNumber,
        Self::Subcomponent,
        Self::SubSubcomponent,
        Self::Condition,
        Self::DefectType,
        Self::Remarks,
        Self::ImageDescription,
        Self::ImageUrl,
    ];

    /// Config key (`snake_case`).
    pub fn key(&self) -> &'static str {
        match self {
            Self::InspectionId => "inspection_id",
            Self::ImageInspectionId => "image_inspection_id",
            Self::UserName => "user_name",
            Self::TrainNo => "train_no",
            Self::Location => "location",
            Self::CarBody => "car_body",
            Self::SectionName => "section_name",
            Self::SubsystemName => "subsystem_name",
            Self::SerialNumber => "serial_number",
            Self::Subcomponent => "subcomponent",
            Self::SubSubcomponent => "sub_subcomponent",
            Self::Condition => "condition",
            Self::DefectType => "defect_type",
            Self::Remarks => "remarks",
            Self::ImageDescription => "image_description",
            Self::ImageUrl => "image_url",
        }
    }

    /// Column title in the rendered report.
    pub fn title(&self) -> &'static str {
        match self {
            Self::InspectionId => "Inspection ID",
            Self::ImageInspectionId => "Image Inspection ID",
            Self::UserName => "User Name",
            Self::TrainNo => "Train No",
            Self::Location => "Location",
            Self::CarBody => "Car Body",
            Self::SectionName => "Section Name",
            Self::SubsystemName => "Subsystem Name",
            Self::SerialNumber => "Serial Number",
            Self::Subcomponent => "Subcomponent",
            Self::SubSubcomponent => "Sub-subcomponent",
            Self::Condition => "Condition",
            Self::DefectType => "Defect Type",
            Self::Remarks => "Remarks",
            Self::ImageDescription => "Image Description",
            Self::ImageUrl => "Image",
        }
    }

    /// Fields rendered after the item number, in report column order.
    pub fn rendered_fields(variant: EnumReportVariant) -> Vec<EnumField> {
        let mut l_fields = vec![
            Self::Location,
            Self::CarBody,
            Self::UserName,
            Self::SectionName,
            Self::SubsystemName,
            Self::SerialNumber,
            Self::Subcomponent,
        ];
        if variant == EnumReportVariant::Visual {
            l_fields.push(Self::SubSubcomponent);
        }
        l_fields.extend([
            Self::Condition,
            Self::DefectType,
            Self::Remarks,
            Self::ImageDescription,
            Self::ImageUrl,
        ]);
        l_fields
    }

    /// Fields a mapping must declare for `variant`.
    pub fn required_fields(variant: EnumReportVariant) -> Vec<EnumField> {
        let mut l_fields = vec![Self::InspectionId, Self::TrainNo];
        l_fields.extend(Self::rendered_fields(variant));
        l_fields
    }
}

impl fmt::Display for EnumField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EnumField {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let c_key = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.key() == c_key)
            .ok_or_else(|| ReportError::InvalidFieldMapping(format!("unknown field `{value}`")))
    }
}

/// Policy deciding which non-image row becomes a group's attribute row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumAttributeRowPolicy {
    /// First non-image row wins; later non-image rows, and any non-image row
    /// arriving after the group's first image row, are ignored.
    #[default]
    FirstBeforeImages,
    /// Later non-image rows overwrite while the group has no image rows yet.
    LastBeforeImages,
    /// Every non-image row overwrites the attribute row.
    LastWins,
}

impl FromStr for EnumAttributeRowPolicy {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "first_before_images" => Ok(Self::FirstBeforeImages),
            "last_before_images" => Ok(Self::LastBeforeImages),
            "last_wins" => Ok(Self::LastWins),
            _ => Err(ReportError::InvalidPolicy(value.to_string())),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FieldMapping

/// Typed field -> zero-based column mapping for one report variant.
///
/// Always valid once constructed: required fields are present, no two fields
/// share a column, and the sub-subcomponent column only exists for Visual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFieldMapping {
    variant: EnumReportVariant,
    dict_col_by_field: BTreeMap<EnumField, usize>,
}

impl SpecFieldMapping {
    /// Validate and build a mapping.
    pub fn new(
        variant: EnumReportVariant,
        dict_col_by_field: BTreeMap<EnumField, usize>,
    ) -> Result<Self, ReportError> {
        validate_field_mapping(variant, &dict_col_by_field)?;
        Ok(Self {
            variant,
            dict_col_by_field,
        })
    }

    pub(crate) fn new_unchecked(
        variant: EnumReportVariant,
        dict_col_by_field: BTreeMap<EnumField, usize>,
    ) -> Self {
        Self {
            variant,
            dict_col_by_field,
        }
    }

    /// Overlay per-field column overrides and re-validate.
    pub fn with_overrides(
        &self,
        overrides: &BTreeMap<EnumField, usize>,
    ) -> Result<Self, ReportError> {
        let mut dict_col_by_field = self.dict_col_by_field.clone();
        for (field, idx_col) in overrides {
            dict_col_by_field.insert(*field, *idx_col);
        }
        Self::new(self.variant, dict_col_by_field)
    }

    /// Mapping variant.
    pub fn variant(&self) -> EnumReportVariant {
        self.variant
    }

    /// Zero-based column of `field`, when mapped.
    pub fn column(&self, field: EnumField) -> Option<usize> {
        self.dict_col_by_field.get(&field).copied()
    }

    /// Declared `(field, column)` pairs in field order.
    pub fn columns(&self) -> impl Iterator<Item = (EnumField, usize)> + '_ {
        self.dict_col_by_field.iter().map(|(k, v)| (*k, *v))
    }

    /// Cell of `field` in `row`; unmapped fields and short rows read as blank.
    pub fn cell<'a>(&self, row: &'a SpecRow, field: EnumField) -> Option<&'a EnumCellValue> {
        self.column(field).and_then(|idx_col| row.get(idx_col))
    }

    /// Untrimmed text of `field` in `row`.
    pub fn text(&self, row: &SpecRow, field: EnumField) -> String {
        self.cell(row, field)
            .map(EnumCellValue::to_text)
            .unwrap_or_default()
    }

    /// Trimmed text of `field` in `row`.
    pub fn trimmed_text(&self, row: &SpecRow, field: EnumField) -> String {
        self.cell(row, field)
            .map(EnumCellValue::to_trimmed_text)
            .unwrap_or_default()
    }

    /// Columns a merge must keep from the image row.
    pub fn image_columns(&self) -> BTreeSet<usize> {
        [EnumField::ImageDescription, EnumField::ImageUrl]
            .into_iter()
            .filter_map(|field| self.column(field))
            .collect()
    }
}

fn validate_field_mapping(
    variant: EnumReportVariant,
    dict_col_by_field: &BTreeMap<EnumField, usize>,
) -> Result<(), ReportError> {
    let l_missing: Vec<&str> = EnumField::required_fields(variant)
        .into_iter()
        .filter(|field| !dict_col_by_field.contains_key(field))
        .map(|field| field.key())
        .collect();
    if !l_missing.is_empty() {
        return Err(ReportError::InvalidFieldMapping(format!(
            "{variant} mapping is missing required fields: {}",
            l_missing.join(", ")
        )));
    }

    if variant == EnumReportVariant::Functional
        && dict_col_by_field.contains_key(&EnumField::SubSubcomponent)
    {
        return Err(ReportError::InvalidFieldMapping(
            "`sub_subcomponent` is only rendered for the visual variant".to_string(),
        ));
    }

    let mut dict_fields_by_col: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (field, idx_col) in dict_col_by_field {
        dict_fields_by_col
            .entry(*idx_col)
            .or_default()
            .push(field.key());
    }
    let c_msg = dict_fields_by_col
        .iter()
        .filter(|(_, l_fields)| l_fields.len() > 1)
        .map(|(idx_col, l_fields)| {
            format!(
                "column {} shared by {}",
                derive_column_letter(*idx_col),
                l_fields.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    if !c_msg.is_empty() {
        return Err(ReportError::InvalidFieldMapping(c_msg));
    }

    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GroupsAndEmissions

/// Rows of one inspection event, borrowed from the source batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecInspectionGroup<'a> {
    /// Resolved inspection identity.
    pub key: InspectionKey,
    /// Descriptive (non-image) row, when one qualified.
    pub attribute_row: Option<&'a SpecRow>,
    /// Image rows in source order.
    pub image_rows: Vec<&'a SpecRow>,
}

impl<'a> SpecInspectionGroup<'a> {
    /// Empty group for `key`.
    pub fn new(key: InspectionKey) -> Self {
        Self {
            key,
            attribute_row: None,
            image_rows: Vec::new(),
        }
    }
}

/// Diagnostics collected while grouping one batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecGroupingReport {
    /// Rows seen.
    pub cnt_rows: u64,
    /// Rows routed to `image_rows`.
    pub cnt_image_rows: u64,
    /// Non-image rows dropped by the attribute-row policy.
    pub cnt_attribute_rows_ignored: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecGroupingReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

/// Grouper output.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecGrouping<'a> {
    /// Groups in first-seen key order.
    pub groups: Vec<SpecInspectionGroup<'a>>,
    /// Grouping diagnostics.
    pub report: SpecGroupingReport,
}

/// One numbered, merge-resolved report line.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecEmission {
    /// Sequential item number.
    pub item_no: u64,
    /// Row to render.
    pub row: SpecRow,
}

/// Ordered emissions of one batch and the numbering range they cover.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecAssembly {
    /// Item number of the first emission.
    pub start_item_no: u64,
    /// Emissions ordered by `item_no`.
    pub emissions: Vec<SpecEmission>,
}

impl SpecAssembly {
    /// Number of emitted lines.
    pub fn len(&self) -> usize {
        self.emissions.len()
    }

    /// `true` when nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.emissions.is_empty()
    }

    /// Last emitted item number; `None` for an empty assembly.
    pub fn end_item_no(&self) -> Option<u64> {
        self.emissions.last().map(|emission| emission.item_no)
    }

    /// Watermark for the next batch. Unchanged when nothing was emitted.
    pub fn next_start_item_no(&self) -> u64 {
        self.end_item_no()
            .map_or(self.start_item_no, |n_end| n_end + 1)
    }
}

/// Result of processing one source batch.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumBatchOutcome {
    /// At least one line was emitted; the watermark may advance.
    Emitted(SpecAssembly),
    /// The source window held no rows.
    EmptyBatch,
    /// Rows were read but none produced a line.
    NoEmittableRows,
}

impl EnumBatchOutcome {
    /// Assembly when lines were emitted.
    pub fn assembly(&self) -> Option<&SpecAssembly> {
        match self {
            Self::Emitted(assembly) => Some(assembly),
            Self::EmptyBatch | Self::NoEmittableRows => None,
        }
    }
}

/// Batch outcome plus grouping diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecBatchResult {
    /// What the batch produced.
    pub outcome: EnumBatchOutcome,
    /// Grouping diagnostics (default for an empty batch).
    pub grouping: SpecGroupingReport,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Conditions the core surfaces to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// Start item number absent or not a positive integer.
    #[error("missing or invalid start item number: {0}")]
    MissingWatermark(String),
    /// Field mapping failed validation.
    #[error("invalid field mapping: {0}")]
    InvalidFieldMapping(String),
    /// Column reference could not be resolved.
    #[error("invalid column reference `{0}`")]
    InvalidColumnRef(String),
    /// Source header carries the same name more than once.
    #[error("duplicate column names detected: {0}")]
    DuplicateColumns(String),
    /// Unknown report variant name.
    #[error("invalid report variant `{0}`, expected one of: ['visual', 'functional']")]
    InvalidVariant(String),
    /// Unknown attribute-row policy name.
    #[error(
        "invalid attribute row policy `{0}`, expected one of: ['first_before_images', 'last_before_images', 'last_wins']"
    )]
    InvalidPolicy(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
