//! Results table.
//!
//! Verdicts are persisted as a two-column CSV (`URL,Threat Type`) and the
//! percentage breakdown is computed back from that file, so the summary
//! always reflects what was actually written.

use crate::error::ThreatCheckError;
use crate::types::{Distribution, ResultSet};
use crate::utils::{format_csv_record, parse_csv};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header row of the results table.
pub const RESULT_HEADER: [&str; 2] = ["URL", "Threat Type"];

/// Writes verdicts to, and reads the distribution from, a CSV file.
#[derive(Debug, Clone)]
pub struct CsvResultSink {
    path: PathBuf,
}

impl CsvResultSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the header and one row per result, replacing any previous table.
    ///
    /// Parent directories are created as needed.
    pub fn persist(&self, results: &ResultSet) -> Result<(), ThreatCheckError> {
        let output_error = |e: std::io::Error| ThreatCheckError::output(&self.path, e.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(output_error)?;
        }

        let mut buffer = String::new();
        buffer.push_str(&format_csv_record(RESULT_HEADER));
        buffer.push('\n');
        for (url, verdict) in results.iter() {
            buffer.push_str(&format_csv_record([url, verdict.label().as_str()]));
            buffer.push('\n');
        }

        let mut file = fs::File::create(&self.path).map_err(output_error)?;
        file.write_all(buffer.as_bytes()).map_err(output_error)?;

        info!(path = %self.path.display(), rows = results.len(), "Results saved to {}", self.path.display());
        Ok(())
    }

    /// Percentage of rows per label, in first-appearance order.
    ///
    /// The label is each row's last column. A header-only table gives an
    /// empty distribution.
    ///
    /// # Errors
    ///
    /// `OutputError` if the table cannot be read.
    pub fn compute_distribution(&self) -> Result<Distribution, ThreatCheckError> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| ThreatCheckError::output(&self.path, format!("Failed to read results: {}", e)))?;

        let labels: Vec<String> = parse_csv(&content)
            .into_iter()
            .skip(1)
            .filter_map(|mut record| record.pop())
            .collect();

        let distribution = Distribution::from_labels(&labels);
        debug!(rows = distribution.total, labels = distribution.len(), "computed distribution");
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ThreatCategory, Verdict};
    use tempfile::TempDir;

    fn sample_results() -> ResultSet {
        let mut results = ResultSet::new();
        results.record("https://example.com", Verdict::Safe);
        results.record("https://malware.com", Verdict::Threats(vec![ThreatCategory::Malware]));
        results.record("https://also-bad.com", Verdict::Threats(vec![ThreatCategory::Malware]));
        results
    }

    #[test]
    fn test_persist_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("nested/out/results.csv"));

        sink.persist(&sample_results()).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            content,
            "URL,Threat Type\nhttps://example.com,SAFE\nhttps://malware.com,MALWARE\nhttps://also-bad.com,MALWARE\n"
        );
    }

    #[test]
    fn test_persist_overwrites_and_quotes() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("results.csv"));
        fs::write(sink.path(), "old,content\nmore,rows\nthat,linger\n").unwrap();

        let mut results = ResultSet::new();
        results.record("https://a.test/?q=1,2", Verdict::Error);
        results.record(
            "https://b.test",
            Verdict::Threats(vec![ThreatCategory::Malware, ThreatCategory::UnwantedSoftware]),
        );
        sink.persist(&results).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            content,
            "URL,Threat Type\n\"https://a.test/?q=1,2\",ERROR\nhttps://b.test,MALWARE;UNWANTED_SOFTWARE\n"
        );
    }

    #[test]
    fn test_distribution_from_table() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("results.csv"));
        sink.persist(&sample_results()).unwrap();

        let distribution = sink.compute_distribution().unwrap();
        assert_eq!(distribution.total, 3);
        assert_eq!(distribution.percentage("SAFE"), Some(33.33));
        assert_eq!(distribution.percentage("MALWARE"), Some(66.67));
        assert_eq!(distribution.shares[0].label, "SAFE");
    }

    #[test]
    fn test_distribution_uses_last_column() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("results.csv"));
        fs::write(sink.path(), "URL,Note,Threat Type\na,x,SAFE\nb,y,ERROR\n").unwrap();

        let distribution = sink.compute_distribution().unwrap();
        assert_eq!(distribution.percentage("SAFE"), Some(50.0));
        assert_eq!(distribution.percentage("ERROR"), Some(50.0));
        assert_eq!(distribution.percentage("x"), None);
    }

    #[test]
    fn test_header_only_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("results.csv"));
        sink.persist(&ResultSet::new()).unwrap();

        let distribution = sink.compute_distribution().unwrap();
        assert!(distribution.is_empty());
        assert_eq!(distribution.total, 0);
    }

    #[test]
    fn test_missing_table_is_output_error() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("missing.csv"));
        assert!(matches!(
            sink.compute_distribution(),
            Err(ThreatCheckError::OutputError { .. })
        ));
    }
}
