//! Report store specification models and top-level error types.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Existing destination report conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumStoreConflictStrategy {
    /// Keep the stored report and leave the new one in place.
    Skip,
    /// Replace the stored report.
    Overwrite,
    /// Fail the store call.
    #[default]
    Error,
}

impl EnumStoreConflictStrategy {
    /// Lowercase config name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EnumStoreConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnumStoreConflictStrategy {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            "error" => Ok(Self::Error),
            _ => Err(StoreError::InvalidOption(format!(
                "invalid conflict strategy `{value}`, expected one of: ['skip', 'overwrite', 'error']"
            ))),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `store_report`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecStoreOptions {
    /// Conflict behavior for an existing destination file.
    pub rule_conflict: EnumStoreConflictStrategy,
    /// Copy instead of move; the source file stays where it is.
    pub if_keep_source: bool,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

/// "Top-level call failed" errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid option value.
    #[error("{0}")]
    InvalidOption(String),
    /// Train number sanitizes to nothing usable as a directory name.
    #[error("train number {0:?} cannot name a report directory")]
    InvalidTrainNo(String),
    /// Invalid listing pattern.
    #[error("invalid report pattern: {0}")]
    InvalidPattern(String),
    /// Source report is missing or not a regular file.
    #[error("source report is not a file: {}", .0.display())]
    SourceNotFile(PathBuf),
    /// Destination would escape the store root or traverse a symlink.
    #[error("{0}")]
    UnsafeDestination(String),
    /// Destination exists and the conflict policy is `error`.
    #[error("destination exists: {}", .0.display())]
    DestinationExists(PathBuf),
    /// Destination exists as a directory.
    #[error("destination is a directory: {}", .0.display())]
    DestinationIsDirectory(PathBuf),
    /// Filesystem operation failed.
    #[error("{action} failed for {}: {source}", .path.display())]
    Io {
        /// Operation name.
        action: &'static str,
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
