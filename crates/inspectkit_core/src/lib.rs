//! `inspectkit_core` v1:
//! Inspection record grouping, merge and sequencing kernel.
//!
//! Modules:
//! - `conf`     : constants and default field mapping presets
//! - `spec`     : rows/keys/mapping/emission models and errors
//! - `util`     : column references, watermark parsing, batch labels
//! - `group`    : per-inspection grouping
//! - `merge`    : attribute-row -> image-row merging
//! - `sequence` : item numbering
//! - `assemble` : batch orchestration
pub mod assemble;
pub mod conf;
pub mod group;
pub mod merge;
pub mod sequence;
pub mod spec;
pub mod util;

pub use assemble::{assemble_groups, process_batch};
pub use conf::{
    C_TRAIN_NO_UNKNOWN, N_BATCH_ROW_SIZE_DEFAULT, derive_default_field_columns,
    derive_default_field_mapping,
};
pub use group::{group_rows, is_image_row, resolve_inspection_key};
pub use merge::merge_rows;
pub use sequence::ItemSequencer;
pub use spec::{
    EnumAttributeRowPolicy, EnumBatchOutcome, EnumCellValue, EnumField, EnumReportVariant,
    InspectionKey, ReportError, SpecAssembly, SpecBatchResult, SpecEmission, SpecFieldMapping,
    SpecGrouping, SpecGroupingReport, SpecInspectionGroup, SpecRow,
};
pub use util::{
    derive_column_letter, parse_column_ref, parse_start_item_no, resolve_column_overrides,
    resolve_train_no, validate_unique_columns,
};
