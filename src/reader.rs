//! Columnar file reader collaborator.
//!
//! Downloaded result files are opaque to the orchestration core; a
//! [`FileReader`] turns one local file into its columnar content. The
//! default implementation reads the service's `json-columns` result format:
//! a single JSON object mapping column names to numeric arrays.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::types::Columns;

/// Reads one downloaded result file into columnar content
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Extract all columns from the file at `path`
    async fn read_columns(&self, path: &Path) -> Result<Columns>;
}

/// [`FileReader`] for the `json-columns` result format
///
/// Expects each file to be a JSON object of column name to array of
/// numbers, e.g. `{"jet_pt": [41.2, 17.9], "jet_eta": [0.1, -1.3]}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonColumnReader;

#[async_trait]
impl FileReader for JsonColumnReader {
    async fn read_columns(&self, path: &Path) -> Result<Columns> {
        let raw = tokio::fs::read(path).await?;
        let parsed: BTreeMap<String, Vec<f64>> = serde_json::from_slice(&raw)?;
        Ok(parsed)
    }
}
