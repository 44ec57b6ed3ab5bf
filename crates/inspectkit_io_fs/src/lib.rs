//! `inspectkit_io_fs` v1:
//! Hierarchical report store.
//!
//! - `conf`   : folder names and patterns
//! - `store`  : directory derivation, placement and listing
//! - `spec`   : enums/options/errors
//! - `report` : run-time report model
//! - `util`   : shared helper functions

pub mod conf;
pub mod report;
pub mod spec;
pub mod store;
mod util;

pub use conf::{C_DIR_FUNCTIONAL_REPORTS, C_DIR_VISUAL_REPORTS, C_PATTERN_REPORTS_DEFAULT};
pub use report::ReportStore;
pub use spec::{EnumStoreConflictStrategy, SpecStoreOptions, StoreError};
pub use store::{derive_report_dir, list_reports, store_report};
pub use util::sanitize_path_segment;
