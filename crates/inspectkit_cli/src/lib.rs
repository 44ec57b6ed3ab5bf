//! `inspectkit_cli` v1:
//! Batch report generation driven by a TOML config and a per-variant
//! watermark state file.
//!
//! - `conf`      : default file and directory names
//! - `config`    : TOML configuration model and loading
//! - `watermark` : persisted run state
//! - `pipeline`  : `generate` / `init` / `status` / `list` kernels
//! - `logging`   : tracing subscriber setup
//! - `spec`      : CLI errors
pub mod conf;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod spec;
pub mod watermark;

pub use config::{SpecAppConfig, load_config, parse_config};
pub use logging::init_logging;
pub use pipeline::{
    ReportGenerate, SpecBatchSummary, SpecGenerateOptions, SpecStatus, run_generate, run_init,
    run_list, run_status,
};
pub use spec::CliError;
pub use watermark::{SpecWatermarkState, load_state, save_state};
