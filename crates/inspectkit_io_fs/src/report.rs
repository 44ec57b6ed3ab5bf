//! Store report model.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Aggregate counters and diagnostics for one `store_report` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportStore {
    /// Directories created (or that would be created in dry-run).
    pub cnt_created_dirs: u64,
    /// Reports placed in the store.
    pub cnt_stored: u64,
    /// Reports left out by the `skip` conflict policy.
    pub cnt_skipped: u64,
    /// Final destination of the report.
    pub path_stored: Option<PathBuf>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportStore {
    /// Add warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_created_dirs".to_string(), self.cnt_created_dirs);
        dict_counts.insert("cnt_stored".to_string(), self.cnt_stored);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warnings.len() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} created_dirs={} stored={} skipped={} warnings={}",
            dict_counts["cnt_created_dirs"],
            dict_counts["cnt_stored"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[STORE]"))
    }
}

#[cfg(test)]
mod tests {
    use super::ReportStore;

    #[test]
    fn report_store_to_dict_and_format() {
        let report = ReportStore {
            cnt_created_dirs: 2,
            cnt_stored: 1,
            cnt_skipped: 0,
            path_stored: None,
            warnings: vec!["w".to_string()],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_created_dirs"], 2);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[STORE]");
        assert_eq!(txt, "[STORE] created_dirs=2 stored=1 skipped=0 warnings=1");
        assert_eq!(report.to_string(), txt);
    }
}
