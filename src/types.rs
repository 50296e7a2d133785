//! Core types for columnfetch

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Opaque identifier for one submitted transform request
///
/// Assigned by the service at submit time; the orchestrator forgets it once
/// the request's result is returned or its failure is raised.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One point-in-time status report from the transform service
///
/// `files_remaining` of `None` means the transform has not started (or the
/// service does not yet know the total). A snapshot is terminal iff
/// `files_remaining == Some(0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Files the service still has to process, if known
    pub files_remaining: Option<u64>,
    /// Files processed so far
    pub files_processed: u64,
    /// Files the service failed to transform
    pub files_failed: u64,
}

impl StatusSnapshot {
    /// True once the service reports zero files remaining
    pub fn is_terminal(&self) -> bool {
        self.files_remaining == Some(0)
    }
}

/// Shape of the merged result: row-structured or raw column arrays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Row-structured result (rows across all files, in completion order)
    #[default]
    Tabular,
    /// Mapping from column name to one flat concatenated array
    Columnar,
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tabular" => Ok(OutputMode::Tabular),
            "columnar" => Ok(OutputMode::Columnar),
            other => Err(Error::UnsupportedOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Tabular => write!(f, "tabular"),
            OutputMode::Columnar => write!(f, "columnar"),
        }
    }
}

/// Columnar content of one result file: column name to value array
///
/// `BTreeMap` keeps column iteration order deterministic regardless of the
/// order columns appear in the file.
pub type Columns = BTreeMap<String, Vec<f64>>;

/// Row-structured merged result
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    /// Column names, in deterministic (sorted) order
    pub columns: Vec<String>,
    /// One entry per row; each row has one value per column, same order as
    /// `columns`
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    /// Number of rows in the table
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Aggregate result of one transform request, built once after every
/// download task has completed
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateResult {
    /// Row-structured result ([`OutputMode::Tabular`])
    Table(Table),
    /// Column-name to flat concatenated array ([`OutputMode::Columnar`])
    Columns(Columns),
}

impl AggregateResult {
    /// Total number of rows in the result
    ///
    /// For columnar results this is the common length of the column arrays
    /// (0 for an empty result).
    pub fn row_count(&self) -> usize {
        match self {
            AggregateResult::Table(t) => t.len(),
            AggregateResult::Columns(c) => c.values().next().map(|v| v.len()).unwrap_or(0),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_terminal() {
        let s = StatusSnapshot {
            files_remaining: Some(0),
            files_processed: 1,
            files_failed: 0,
        };
        assert!(s.is_terminal());

        let s = StatusSnapshot {
            files_remaining: None,
            files_processed: 0,
            files_failed: 0,
        };
        assert!(!s.is_terminal());

        let s = StatusSnapshot {
            files_remaining: Some(2),
            files_processed: 0,
            files_failed: 0,
        };
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_output_mode_parse() {
        assert_eq!("tabular".parse::<OutputMode>().unwrap(), OutputMode::Tabular);
        assert_eq!(
            "columnar".parse::<OutputMode>().unwrap(),
            OutputMode::Columnar
        );
        let err = "forkme".parse::<OutputMode>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedOutputFormat(ref s) if s == "forkme"));
    }

    #[test]
    fn test_row_count() {
        let mut cols = Columns::new();
        cols.insert("jet_pt".to_string(), vec![1.0, 2.0, 3.0]);
        assert_eq!(AggregateResult::Columns(cols).row_count(), 3);
        assert_eq!(AggregateResult::Columns(Columns::new()).row_count(), 0);
    }
}
