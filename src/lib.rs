//! # columnfetch
//!
//! Client library for remote "transform" data-extraction services: submit a
//! query, poll the transform's status, download result files from the
//! object store as they appear, and merge them into one in-memory result.
//!
//! ## Design Philosophy
//!
//! columnfetch is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Overlapped** - Downloads start the moment a result file appears,
//!   concurrently with the next status poll
//! - **Isolated** - Any number of requests run concurrently on one client;
//!   a failure in one never touches another
//! - **Pluggable** - The object store and file reader are trait seams with
//!   working HTTP/JSON defaults
//!
//! ## Quick Start
//!
//! ```no_run
//! use columnfetch::{Config, QueryOptions, TransformClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TransformClient::new(Config::new("http://localhost:5000/sx"))?;
//!
//!     let result = client
//!         .get_data("(call Select (call EventDataset 'localds:bogus'))", "my_dataset", QueryOptions::default())
//!         .await?;
//!     println!("{} rows", result.row_count());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP transport to the transform service
pub mod adaptor;
/// Transform client and request orchestration
pub mod client;
/// Configuration types
pub mod config;
/// Download dispatch (idempotent discovery, concurrent fetches)
mod downloader;
/// Error types
pub mod error;
/// Result merging
pub mod merge;
/// Columnar file reader collaborator
pub mod reader;
/// Retry logic with exponential backoff
pub mod retry;
/// Status polling and failure trapping
pub mod status;
/// Object store collaborator
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use adaptor::TransformAdaptor;
pub use client::{QueryOptions, TransformClient};
pub use config::{Config, RetryConfig};
pub use error::{Error, Result};
pub use reader::{FileReader, JsonColumnReader};
pub use store::{HttpObjectStore, ObjectStore};
pub use types::{AggregateResult, Columns, OutputMode, RequestId, StatusSnapshot, Table};
