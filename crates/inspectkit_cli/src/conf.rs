//! CLI defaults.

/// Config file looked up in the working directory when `--config` is absent.
pub const C_CONFIG_FILE_DEFAULT: &str = "inspectkit.toml";
/// Environment variable naming the config file.
pub const C_ENV_CONFIG: &str = "INSPECTKIT_CONFIG";
/// Default directory for watermark state and staged reports.
pub const C_DIR_STATE_DEFAULT: &str = ".inspectkit";
/// Default report store root.
pub const C_DIR_OUTPUT_ROOT_DEFAULT: &str = "reports";
/// Default source export path.
pub const C_PATH_SOURCE_DEFAULT: &str = "inspections.csv";
/// Staging folder (under the state dir) for freshly rendered reports.
pub const C_DIR_STAGING: &str = "staging";
/// Watermark state file suffix: `<variant>_watermark.json`.
pub const C_SUFFIX_STATE_FILE: &str = "_watermark.json";
