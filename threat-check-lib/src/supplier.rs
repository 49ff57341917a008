//! URL list loading.
//!
//! URLs come from a CSV file with a `Link` column. Other columns are
//! ignored, and rows are returned in file order with duplicates kept.

use crate::error::ThreatCheckError;
use crate::utils::parse_csv;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Header of the column holding the URLs.
pub const LINK_COLUMN: &str = "Link";

/// Reads the ordered URL list from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvUrlSupplier {
    path: PathBuf,
}

impl CsvUrlSupplier {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every non-blank `Link` cell.
    ///
    /// A missing file or one without data rows yields an empty list and a
    /// warning event.
    ///
    /// # Errors
    ///
    /// `InputError` if the file cannot be read or its header has no `Link`
    /// column.
    pub fn list_urls(&self) -> Result<Vec<String>, ThreatCheckError> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "Input file {} not found", self.path.display());
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ThreatCheckError::input(&self.path, format!("Failed to read file: {}", e)))?;

        let mut records = parse_csv(&content).into_iter();
        let Some(header) = records.next() else {
            warn!(path = %self.path.display(), "Input file {} is empty", self.path.display());
            return Ok(Vec::new());
        };

        let column = header
            .iter()
            .position(|name| name.trim() == LINK_COLUMN)
            .ok_or_else(|| {
                ThreatCheckError::input(
                    &self.path,
                    format!("Missing '{}' column in header", LINK_COLUMN),
                )
            })?;

        let urls: Vec<String> = records
            .filter_map(|record| record.into_iter().nth(column))
            .map(|cell| cell.trim().to_string())
            .filter(|cell| !cell.is_empty())
            .collect();

        if urls.is_empty() {
            warn!(path = %self.path.display(), "No URLs found in {}", self.path.display());
        } else {
            debug!(path = %self.path.display(), count = urls.len(), "loaded URL list");
        }

        Ok(urls)
    }
}
