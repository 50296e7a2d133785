//! Error types for columnfetch
//!
//! This module provides the failure taxonomy for the library:
//! - Typed failures for each phase (submit, status, download, merge)
//! - Transparent wrappers for transport, I/O, and serialization errors
//! - A `Result` alias used throughout the crate
//!
//! Every failure surfaced by the top-level entry points is one of these
//! variants; nothing is silently swallowed.

use thiserror::Error;

/// Result type alias for columnfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for columnfetch
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Submit request was rejected by the transform service (non-2xx response)
    #[error("transform submit failed with status {status}: {message}")]
    SubmitFailed {
        /// HTTP status code returned by the submit endpoint
        status: u16,
        /// The `message` field of the response body, or the raw body
        message: String,
    },

    /// Status query on a request id the service has forgotten
    #[error("unable to fetch transformation status for unknown request id {0}")]
    UnknownRequestId(String),

    /// Generic non-2xx response from the status endpoint
    #[error("transform request failed with status {status}: {message}")]
    RequestFailed {
        /// HTTP status code returned by the status endpoint
        status: u16,
        /// The `message` field of the response body, or the raw body
        message: String,
    },

    /// The service failed to transform one or more input files
    #[error("transform service failed to transform {failed} file(s) ({processed} processed)")]
    FilesFailed {
        /// Number of files the service reported as failed
        failed: u64,
        /// Number of files the service had processed at that point
        processed: u64,
    },

    /// A result file could not be downloaded after all retry attempts
    #[error("download of object '{object}' failed after {attempts} attempt(s): {reason}")]
    DownloadFailed {
        /// Name of the remote object that could not be fetched
        object: String,
        /// Number of attempts made before giving up
        attempts: usize,
        /// Description of the last failure
        reason: String,
    },

    /// Requested output mode is not recognized
    #[error("unsupported output format '{0}' (expected 'tabular' or 'columnar')")]
    UnsupportedOutputFormat(String),

    /// Result files do not share a common column set in tabular mode
    #[error("column mismatch in '{path}': expected [{expected}], found [{found}]")]
    ColumnMismatch {
        /// The file whose columns did not match
        path: String,
        /// Columns of the first file, comma separated
        expected: String,
        /// Columns of the offending file, comma separated
        found: String,
    },

    /// The configured overall deadline elapsed before the request completed
    #[error("transform request did not complete before the configured deadline")]
    DeadlineExceeded,

    /// Transient object-store error (bucket not ready, listing hiccup)
    #[error("transient object store error: {0}")]
    StoreTransient(String),

    /// Service endpoint URL could not be parsed
    #[error("invalid service endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A spawned download task panicked or was aborted
    #[error("download task failed: {0}")]
    TaskPanic(String),
}
