//! Result merging.
//!
//! Once every download task for a request has finished, the local files are
//! merged into one [`AggregateResult`]: columns are concatenated file by
//! file in the order the downloads completed, and the result is shaped
//! according to the requested [`OutputMode`].

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::reader::FileReader;
use crate::types::{AggregateResult, Columns, OutputMode, Table};

/// Merge downloaded result files into one aggregate result
///
/// `paths` must be ordered by download completion; segment `i` of every
/// merged column comes from `paths[i]`. All files must share one column
/// set; a file with different columns (or ragged column lengths) fails with
/// [`Error::ColumnMismatch`].
pub async fn merge_files(
    reader: &dyn FileReader,
    paths: &[PathBuf],
    mode: OutputMode,
) -> Result<AggregateResult> {
    let mut merged = Columns::new();
    let mut expected: Option<Vec<String>> = None;

    for path in paths {
        let columns = reader.read_columns(path).await?;
        let names: Vec<String> = columns.keys().cloned().collect();

        match &expected {
            None => expected = Some(names),
            Some(want) if *want != names => {
                return Err(Error::ColumnMismatch {
                    path: path.display().to_string(),
                    expected: want.join(", "),
                    found: names.join(", "),
                });
            }
            Some(_) => {}
        }

        check_rectangular(path, &columns)?;

        for (name, mut values) in columns {
            merged.entry(name).or_default().append(&mut values);
        }
    }

    tracing::debug!(
        files = paths.len(),
        columns = merged.len(),
        rows = merged.values().next().map(|v| v.len()).unwrap_or(0),
        "Merged result files"
    );

    match mode {
        OutputMode::Columnar => Ok(AggregateResult::Columns(merged)),
        OutputMode::Tabular => Ok(AggregateResult::Table(to_table(merged))),
    }
}

/// Every column in one file must have the same length for rows to exist
fn check_rectangular(path: &std::path::Path, columns: &Columns) -> Result<()> {
    let mut lengths = columns.values().map(|v| v.len());
    let first = lengths.next().unwrap_or(0);
    if lengths.any(|len| len != first) {
        return Err(Error::ColumnMismatch {
            path: path.display().to_string(),
            expected: format!("{} values per column", first),
            found: columns
                .iter()
                .map(|(name, v)| format!("{}={}", name, v.len()))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(())
}

/// Pivot column arrays into row-structured form
fn to_table(merged: Columns) -> Table {
    let columns: Vec<String> = merged.keys().cloned().collect();
    let row_count = merged.values().next().map(|v| v.len()).unwrap_or(0);
    let arrays: Vec<Vec<f64>> = merged.into_values().collect();

    let rows = (0..row_count)
        .map(|i| arrays.iter().map(|col| col[i]).collect())
        .collect();

    Table { columns, rows }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::JsonColumnReader;
    use tempfile::TempDir;

    async fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_columnar_segments_follow_completion_order() {
        let dir = tempfile::tempdir().unwrap();
        // Completion order c1=b, c2=a with row counts 2 and 3
        let a = write_file(&dir, "a.json", r#"{"jet_pt": [4.0, 5.0, 6.0]}"#).await;
        let b = write_file(&dir, "b.json", r#"{"jet_pt": [1.0, 2.0]}"#).await;

        let result = merge_files(&JsonColumnReader, &[b, a], OutputMode::Columnar)
            .await
            .unwrap();
        let AggregateResult::Columns(cols) = result else {
            panic!("expected columnar result");
        };
        assert_eq!(cols["jet_pt"], vec![1.0, 2.0, 4.0, 5.0, 6.0]);
        assert_eq!(cols["jet_pt"].len(), 2 + 3);
    }

    #[tokio::test]
    async fn test_tabular_rows_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(
            &dir,
            "a.json",
            r#"{"jet_pt": [1.0, 2.0], "jet_eta": [0.5, -0.5]}"#,
        )
        .await;
        let b = write_file(&dir, "b.json", r#"{"jet_pt": [3.0], "jet_eta": [1.5]}"#).await;

        let result = merge_files(&JsonColumnReader, &[a, b], OutputMode::Tabular)
            .await
            .unwrap();
        let AggregateResult::Table(table) = result else {
            panic!("expected tabular result");
        };
        assert_eq!(table.columns, vec!["jet_eta", "jet_pt"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0], vec![0.5, 1.0]);
        assert_eq!(table.rows[2], vec![1.5, 3.0]);
    }

    #[tokio::test]
    async fn test_empty_input_merges_to_empty_result() {
        let result = merge_files(&JsonColumnReader, &[], OutputMode::Tabular)
            .await
            .unwrap();
        assert_eq!(result.row_count(), 0);

        let result = merge_files(&JsonColumnReader, &[], OutputMode::Columnar)
            .await
            .unwrap();
        assert_eq!(result.row_count(), 0);
    }

    #[tokio::test]
    async fn test_column_mismatch_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.json", r#"{"jet_pt": [1.0]}"#).await;
        let b = write_file(&dir, "b.json", r#"{"mu_pt": [1.0]}"#).await;

        let err = merge_files(&JsonColumnReader, &[a, b], OutputMode::Columnar)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ColumnMismatch { .. }));
    }

    #[tokio::test]
    async fn test_ragged_columns_within_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.json", r#"{"jet_pt": [1.0, 2.0], "jet_eta": [0.1]}"#).await;

        let err = merge_files(&JsonColumnReader, &[a], OutputMode::Tabular)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ColumnMismatch { .. }));
    }

    #[tokio::test]
    async fn test_many_single_column_files_sum_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        let row_counts = [1usize, 4, 2, 3];
        for (i, n) in row_counts.iter().enumerate() {
            let values: Vec<String> = (0..*n).map(|v| format!("{}.0", i * 10 + v)).collect();
            let body = format!(r#"{{"x": [{}]}}"#, values.join(", "));
            paths.push(write_file(&dir, &format!("f{}.json", i), &body).await);
        }

        let result = merge_files(&JsonColumnReader, &paths, OutputMode::Columnar)
            .await
            .unwrap();
        let AggregateResult::Columns(cols) = result else {
            panic!("expected columnar result");
        };
        assert_eq!(cols["x"].len(), row_counts.iter().sum::<usize>());
        // Segment i equals file i's column
        let mut offset = 0;
        for (i, n) in row_counts.iter().enumerate() {
            let segment = &cols["x"][offset..offset + n];
            assert_eq!(segment[0], (i * 10) as f64);
            offset += n;
        }
    }
}
