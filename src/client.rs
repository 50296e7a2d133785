//! Transform client and request orchestration.
//!
//! [`TransformClient`] ties the collaborators together and drives one state
//! machine per request: submit, poll status through the failure trap,
//! dispatch downloads on every snapshot so fetch I/O overlaps the next
//! poll's wait, drain all spawned downloads, and merge the local files into
//! the final [`AggregateResult`]. Clients are cheap to clone and any number
//! of requests may run concurrently on one client; requests share nothing
//! but the HTTP connection pool, so one request's failure never affects
//! another.

use futures::TryStreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::adaptor::TransformAdaptor;
use crate::config::Config;
use crate::downloader::Dispatcher;
use crate::error::{Error, Result};
use crate::merge::merge_files;
use crate::reader::{FileReader, JsonColumnReader};
use crate::status::{status_stream, trap_failures};
use crate::store::{HttpObjectStore, ObjectStore};
use crate::types::{AggregateResult, OutputMode, RequestId};

/// Per-request submission options
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Shape of the merged result (default: tabular)
    pub output_mode: OutputMode,
    /// Override the transformer image the service runs
    pub image: Option<String>,
    /// Override the result file format the service writes
    pub result_format: Option<String>,
}

impl QueryOptions {
    /// Options with the given output mode and defaults for the rest
    pub fn with_output_mode(output_mode: OutputMode) -> Self {
        Self {
            output_mode,
            ..Self::default()
        }
    }
}

/// Client for one transform service endpoint
///
/// Created once and shared; every [`get_data`](Self::get_data) call is an
/// independent request with its own polling loop and download tasks.
#[derive(Clone)]
pub struct TransformClient {
    adaptor: TransformAdaptor,
    store: Arc<dyn ObjectStore>,
    reader: Arc<dyn FileReader>,
    config: Arc<Config>,
}

impl std::fmt::Debug for TransformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformClient")
            .field("adaptor", &self.adaptor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransformClient {
    /// Create a client with the default HTTP object store and JSON column
    /// reader rooted at the configured endpoint
    pub fn new(config: Config) -> Result<Self> {
        let adaptor = TransformAdaptor::new(&config.endpoint)?;
        let store = Arc::new(HttpObjectStore::new(
            config.endpoint.clone(),
            adaptor.http_client(),
        ));
        Ok(Self {
            adaptor,
            store,
            reader: Arc::new(JsonColumnReader),
            config: Arc::new(config),
        })
    }

    /// Create a client with explicit store and reader collaborators
    ///
    /// Useful when results live in a different store than the service
    /// endpoint, or for plugging in another columnar file format.
    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn ObjectStore>,
        reader: Arc<dyn FileReader>,
    ) -> Result<Self> {
        let adaptor = TransformAdaptor::new(&config.endpoint)?;
        Ok(Self {
            adaptor,
            store,
            reader,
            config: Arc::new(config),
        })
    }

    /// Submit a translated query against a dataset and return the merged
    /// result once every output file has been transformed and downloaded
    ///
    /// # Errors
    ///
    /// Any of the typed failures in [`Error`]: submit rejection, unknown
    /// request id, failed input files, exhausted download retries, or the
    /// configured deadline elapsing.
    pub async fn get_data(
        &self,
        query: &str,
        dataset: &str,
        options: QueryOptions,
    ) -> Result<AggregateResult> {
        self.run(query, dataset, options).await
    }

    /// Blocking form of [`get_data`](Self::get_data)
    ///
    /// Works from any call site: inside a multi-thread runtime it blocks in
    /// place on that runtime, inside a current-thread runtime it drives the
    /// request on a dedicated worker thread with its own runtime, and
    /// without any ambient runtime it builds a private one.
    pub fn get_data_blocking(
        &self,
        query: &str,
        dataset: &str,
        options: QueryOptions,
    ) -> Result<AggregateResult> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle)
                if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread =>
            {
                tokio::task::block_in_place(|| {
                    handle.block_on(self.get_data(query, dataset, options))
                })
            }
            // A current-thread runtime would deadlock if we blocked its one
            // driver thread, so the request runs on its own thread instead.
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| self.block_on_fresh_runtime(query, dataset, options))
                    .join()
                    .map_err(|_| Error::TaskPanic("blocking worker thread panicked".to_string()))?
            }),
            Err(_) => self.block_on_fresh_runtime(query, dataset, options),
        }
    }

    fn block_on_fresh_runtime(
        &self,
        query: &str,
        dataset: &str,
        options: QueryOptions,
    ) -> Result<AggregateResult> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(self.get_data(query, dataset, options))
    }

    /// Run one request end to end: submit, poll, dispatch, drain, merge
    async fn run(
        &self,
        query: &str,
        dataset: &str,
        options: QueryOptions,
    ) -> Result<AggregateResult> {
        let payload = build_submit_payload(query, dataset, &options);
        let request_id = self.adaptor.submit_query(&payload).await?;
        tracing::info!(request_id = %request_id, dataset = dataset, "Transform request accepted");

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            request_id.clone(),
            self.config.staging_dir.clone(),
            self.config.retry.clone(),
        );

        // The deadline bounds the open-ended phases (polling and downloads).
        // The dispatcher outlives the timed-out future, so its abort handles
        // still reach every spawned fetch when the deadline fires.
        let outcome = match self.config.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.drive(&dispatcher, &request_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::DeadlineExceeded),
                }
            }
            None => self.drive(&dispatcher, &request_id).await,
        };

        // Any failure cancels sibling downloads before propagating, so no
        // background work outlives the request.
        if let Err(e) = outcome {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "Aborting in-flight downloads after failure"
            );
            dispatcher.abort_all().await;
            return Err(e);
        }

        let paths = dispatcher.completed_paths().await;
        tracing::info!(
            request_id = %request_id,
            files = paths.len(),
            "Transform complete, merging results"
        );
        merge_files(self.reader.as_ref(), &paths, options.output_mode).await
    }

    /// Poll the request to its terminal snapshot and drain every download
    async fn drive(&self, dispatcher: &Arc<Dispatcher>, request_id: &RequestId) -> Result<()> {
        let mut handles: Vec<JoinHandle<Result<()>>> = Vec::new();

        {
            let statuses = trap_failures(status_stream(
                self.adaptor.clone(),
                request_id.clone(),
                self.config.poll_interval,
            ));
            futures::pin_mut!(statuses);

            // Polling: every snapshot (the terminal one included) triggers a
            // re-listing, so downloads run while the next poll waits.
            while let Some(_snapshot) = statuses.try_next().await? {
                handles.extend(dispatcher.discover_and_fetch().await?);
            }
        }

        // Draining: every spawned download reaches a terminal state.
        let mut failure: Option<Error> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(join_err) => {
                    if failure.is_none() {
                        failure = Some(Error::TaskPanic(join_err.to_string()));
                    }
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Build the JSON submission body for one request
fn build_submit_payload(
    query: &str,
    dataset: &str,
    options: &QueryOptions,
) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "did": dataset,
        "selection": query,
        "result-destination": "object-store",
        "result-format": options.result_format.as_deref().unwrap_or("json-columns"),
    });
    if let Some(image) = &options.image {
        payload["image"] = serde_json::Value::String(image.clone());
    }
    payload
}
