//! Store layout constants.

use inspectkit_core::EnumReportVariant;

/// Folder holding Visual reports under the store root.
pub const C_DIR_VISUAL_REPORTS: &str = "Visual_Inspection_Reports";
/// Folder holding Functional reports under the store root.
pub const C_DIR_FUNCTIONAL_REPORTS: &str = "Functional_Inspection_Reports";
/// Default listing pattern.
pub const C_PATTERN_REPORTS_DEFAULT: &str = "*.xlsx";
/// Characters that cannot appear in a directory name segment.
pub const C_REGEX_PATH_SEGMENT_ILLEGAL: &str = r#"[<>:"/\\|?*\x00-\x1F]"#;

/// Variant folder name.
pub fn derive_variant_dir_name(variant: EnumReportVariant) -> &'static str {
    match variant {
        EnumReportVariant::Visual => C_DIR_VISUAL_REPORTS,
        EnumReportVariant::Functional => C_DIR_FUNCTIONAL_REPORTS,
    }
}
