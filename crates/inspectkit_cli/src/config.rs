//! TOML configuration.
//!
//! Every field has a default, so an absent config file and an empty one
//! behave the same. Relative paths are resolved against the directory that
//! holds the config file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use inspectkit_core::{
    EnumAttributeRowPolicy, EnumField, EnumReportVariant, N_BATCH_ROW_SIZE_DEFAULT,
    SpecFieldMapping, derive_default_field_mapping, resolve_column_overrides,
};
use inspectkit_io_fs::{EnumStoreConflictStrategy, SpecStoreOptions};
use inspectkit_io_xlsx::SpecSourceOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conf::{
    C_CONFIG_FILE_DEFAULT, C_DIR_OUTPUT_ROOT_DEFAULT, C_DIR_STAGING, C_DIR_STATE_DEFAULT,
    C_PATH_SOURCE_DEFAULT, C_SUFFIX_STATE_FILE,
};
use crate::spec::CliError;

////////////////////////////////////////////////////////////////////////////////
// #region Sections

/// `[source]`: where inspection records come from and how they are windowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecSourceConfig {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub has_header: bool,
    /// Single ASCII character.
    pub separator: String,
    /// Rows per report batch.
    pub batch_row_size: usize,
    /// Let polars infer numeric columns instead of reading text.
    pub infer_types: bool,
}

impl Default for SpecSourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(C_PATH_SOURCE_DEFAULT),
            skip_rows: 0,
            has_header: true,
            separator: ",".to_string(),
            batch_row_size: N_BATCH_ROW_SIZE_DEFAULT,
            infer_types: false,
        }
    }
}

/// `[output]`: report store and run state locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecOutputConfig {
    pub root: PathBuf,
    pub conflict: EnumStoreConflictStrategy,
    pub state_dir: PathBuf,
}

impl Default for SpecOutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(C_DIR_OUTPUT_ROOT_DEFAULT),
            conflict: EnumStoreConflictStrategy::default(),
            state_dir: PathBuf::from(C_DIR_STATE_DEFAULT),
        }
    }
}

/// `[grouping]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecGroupingConfig {
    pub attribute_row_policy: EnumAttributeRowPolicy,
}

/// Column reference as written in TOML: `8`, `"H"` or `"Location"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumColumnRef {
    /// 1-based column number.
    Number(u64),
    /// Column letters or header name.
    Text(String),
}

impl EnumColumnRef {
    fn to_ref_text(&self) -> String {
        match self {
            Self::Number(n_col) => n_col.to_string(),
            Self::Text(c_ref) => c_ref.clone(),
        }
    }
}

/// `[columns.visual]` / `[columns.functional]`: per-field overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecColumnsConfig {
    pub visual: BTreeMap<String, EnumColumnRef>,
    pub functional: BTreeMap<String, EnumColumnRef>,
}

impl SpecColumnsConfig {
    /// Overrides of one variant.
    pub fn for_variant(&self, variant: EnumReportVariant) -> &BTreeMap<String, EnumColumnRef> {
        match variant {
            EnumReportVariant::Visual => &self.visual,
            EnumReportVariant::Functional => &self.functional,
        }
    }

    /// Overrides of one variant keyed by field, references still unresolved.
    pub fn derive_column_refs(
        &self,
        variant: EnumReportVariant,
    ) -> Result<BTreeMap<EnumField, String>, CliError> {
        self.for_variant(variant)
            .iter()
            .map(|(c_field, column)| Ok((c_field.parse::<EnumField>()?, column.to_ref_text())))
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AppConfig

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecAppConfig {
    pub source: SpecSourceConfig,
    pub output: SpecOutputConfig,
    pub grouping: SpecGroupingConfig,
    pub columns: SpecColumnsConfig,
}

impl SpecAppConfig {
    /// Check values serde cannot check, including both column mappings.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.source.batch_row_size == 0 {
            return Err(CliError::Config(
                "source.batch_row_size must be >= 1".to_string(),
            ));
        }
        self.source_options()?;
        // Header names are only known once the source is read; they are
        // re-resolved then.
        for variant in [EnumReportVariant::Visual, EnumReportVariant::Functional] {
            self.columns.derive_column_refs(variant)?;
            if self
                .columns
                .for_variant(variant)
                .values()
                .all(|column| matches!(column, EnumColumnRef::Number(_)))
            {
                self.resolve_field_mapping(variant, None)?;
            }
        }
        Ok(())
    }

    /// Source reader options.
    pub fn source_options(&self) -> Result<SpecSourceOptions, CliError> {
        let mut iter_chars = self.source.separator.chars();
        let separator = match (iter_chars.next(), iter_chars.next()) {
            (Some(chr), None) if chr.is_ascii() => chr as u8,
            _ => {
                return Err(CliError::Config(format!(
                    "source.separator must be a single ASCII character, got {:?}",
                    self.source.separator
                )));
            }
        };
        Ok(SpecSourceOptions {
            has_header: self.source.has_header,
            skip_rows: self.source.skip_rows,
            separator,
            if_infer_types: self.source.infer_types,
        })
    }

    /// Variant defaults overlaid with the configured column overrides.
    ///
    /// Header names resolve only when `header` is given.
    pub fn resolve_field_mapping(
        &self,
        variant: EnumReportVariant,
        header: Option<&[String]>,
    ) -> Result<SpecFieldMapping, CliError> {
        let dict_refs = self.columns.derive_column_refs(variant)?;
        let dict_overrides = resolve_column_overrides(&dict_refs, header)?;
        let mapping = derive_default_field_mapping(variant).with_overrides(&dict_overrides)?;
        debug!(
            %variant,
            overrides = dict_overrides.len(),
            "field mapping resolved"
        );
        Ok(mapping)
    }

    /// Store options for one run.
    pub fn store_options(&self, if_dry_run: bool) -> SpecStoreOptions {
        SpecStoreOptions {
            rule_conflict: self.output.conflict,
            if_keep_source: false,
            if_dry_run,
        }
    }

    /// Watermark state file of `variant`.
    pub fn path_state_file(&self, variant: EnumReportVariant) -> PathBuf {
        self.output
            .state_dir
            .join(format!("{}{C_SUFFIX_STATE_FILE}", variant.as_str()))
    }

    /// Directory reports are rendered into before being stored.
    pub fn path_staging_dir(&self) -> PathBuf {
        self.output.state_dir.join(C_DIR_STAGING)
    }

    fn resolve_relative_paths(&mut self, path_dir_base: &Path) {
        for path in [
            &mut self.source.path,
            &mut self.output.root,
            &mut self.output.state_dir,
        ] {
            if path.is_relative() {
                *path = path_dir_base.join(&*path);
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Loading

/// Parse config text. Relative paths stay relative.
pub fn parse_config(text: &str, path: &Path) -> Result<SpecAppConfig, CliError> {
    let config: SpecAppConfig = toml::from_str(text).map_err(|source| CliError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, or `inspectkit.toml` in the working directory.
///
/// An explicit path must exist. Without one, a missing default file yields
/// the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<SpecAppConfig, CliError> {
    let path_config = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path_default = PathBuf::from(C_CONFIG_FILE_DEFAULT);
            if !path_default.is_file() {
                info!("no config file found, using defaults");
                return Ok(SpecAppConfig::default());
            }
            path_default
        }
    };

    let text = fs::read_to_string(&path_config).map_err(|e| CliError::io("read", &path_config, e))?;
    let mut config = parse_config(&text, &path_config)?;
    if let Some(path_dir_base) = path_config.parent()
        && !path_dir_base.as_os_str().is_empty()
    {
        config.resolve_relative_paths(path_dir_base);
    }
    info!(path = %path_config.display(), "config loaded");
    Ok(config)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use inspectkit_core::ReportError;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = parse_config("", Path::new("inspectkit.toml")).unwrap();
        assert_eq!(config, SpecAppConfig::default());
        assert_eq!(config.source.batch_row_size, 200);
        assert_eq!(config.output.conflict, EnumStoreConflictStrategy::Error);
        assert_eq!(
            config.path_state_file(EnumReportVariant::Functional),
            PathBuf::from(".inspectkit/functional_watermark.json")
        );
    }

    #[test]
    fn sections_parse_with_mixed_column_refs() {
        let text = r#"
            [source]
            path = "exports/trains.csv"
            separator = ";"
            batch_row_size = 50

            [output]
            root = "/srv/reports"
            conflict = "skip"

            [grouping]
            attribute_row_policy = "last_wins"

            [columns.visual]
            location = 9
            remarks = "AD"
        "#;
        let config = parse_config(text, Path::new("inspectkit.toml")).unwrap();
        assert_eq!(config.source.batch_row_size, 50);
        assert_eq!(config.source_options().unwrap().separator, b';');
        assert_eq!(config.output.conflict, EnumStoreConflictStrategy::Skip);
        assert_eq!(
            config.grouping.attribute_row_policy,
            EnumAttributeRowPolicy::LastWins
        );

        let mapping = config
            .resolve_field_mapping(EnumReportVariant::Visual, None)
            .unwrap();
        assert_eq!(mapping.column(EnumField::Location), Some(8));
        assert_eq!(mapping.column(EnumField::Remarks), Some(29));
        // Functional keeps its defaults.
        let mapping = config
            .resolve_field_mapping(EnumReportVariant::Functional, None)
            .unwrap();
        assert_eq!(mapping.column(EnumField::Location), Some(7));
    }

    #[test]
    fn header_names_resolve_against_source_header() {
        let text = r#"
            [columns.functional]
            location = "Where"
        "#;
        let config = parse_config(text, Path::new("c.toml")).unwrap();
        let l_header: Vec<String> = (0..30)
            .map(|n| if n == 13 { "Where".to_string() } else { format!("c{n}") })
            .collect();
        let mapping = config
            .resolve_field_mapping(EnumReportVariant::Functional, Some(&l_header))
            .unwrap();
        assert_eq!(mapping.column(EnumField::Location), Some(13));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = Path::new("c.toml");
        assert!(matches!(
            parse_config("[source]\nbatch_row_size = 0", path),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            parse_config("[source]\nseparator = \";;\"", path),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            parse_config("[output]\nconflict = \"merge\"", path),
            Err(CliError::ConfigParse { .. })
        ));
        assert!(matches!(
            parse_config("[source]\nunknown = 1", path),
            Err(CliError::ConfigParse { .. })
        ));
        // Location moved onto the inspection id column.
        assert!(matches!(
            parse_config("[columns.visual]\nlocation = 2", path),
            Err(CliError::Report(ReportError::InvalidFieldMapping(_)))
        ));
        assert!(matches!(
            parse_config("[columns.functional]\nsub_subcomponent = 30", path),
            Err(CliError::Report(ReportError::InvalidFieldMapping(_)))
        ));
        assert!(matches!(
            parse_config("[columns.visual]\nplatform = \"H\"", path),
            Err(CliError::Report(ReportError::InvalidFieldMapping(_)))
        ));
    }

    #[test]
    fn load_resolves_paths_next_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path_config = dir.path().join("inspectkit.toml");
        fs::write(&path_config, "[source]\npath = \"data/in.csv\"\n").unwrap();

        let config = load_config(Some(&path_config)).unwrap();
        assert_eq!(config.source.path, dir.path().join("data/in.csv"));
        assert_eq!(config.output.state_dir, dir.path().join(".inspectkit"));

        let err = load_config(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Io { action: "read", .. }));
    }
}
