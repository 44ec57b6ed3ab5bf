//! CLI errors.

use std::io;
use std::path::{Path, PathBuf};

use inspectkit_core::ReportError;
use inspectkit_io_fs::StoreError;
use inspectkit_io_xlsx::{RenderError, SourceError};
use thiserror::Error;

/// Everything that can stop a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration value rejected after parsing.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Configuration file is not valid TOML for the config schema.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Watermark state file is not valid JSON for the state schema.
    #[error("failed to parse watermark state {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CliError {
    pub(crate) fn io(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Process exit code for this error.
    ///
    /// `2` for bad input (config, state, watermark, mapping), `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::ConfigParse { .. } | Self::State { .. } | Self::Report(_) => 2,
            Self::Io { .. } | Self::Source(_) | Self::Render(_) | Self::Store(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_exit_code_two() {
        let err = CliError::from(ReportError::MissingWatermark("empty".to_string()));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "missing or invalid start item number: empty");

        let err = CliError::io("read", "/x/state.json", io::Error::other("boom"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "failed to read /x/state.json: boom");
    }
}
