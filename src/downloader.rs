//! Download dispatch for one transform request.
//!
//! The [`Dispatcher`] tracks which remote objects have already been seen
//! for a request and spawns one concurrent fetch task per newly discovered
//! object, so downloads overlap with the orchestrator's next status poll.
//! An object name is downloaded at most once no matter how many times the
//! request is re-listed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::store::{ObjectStore, staging_path};
use crate::types::RequestId;

/// Per-request download dispatcher
///
/// Shared between the orchestrator and its spawned fetch tasks via `Arc`.
/// The `known` set and the completion-order list are each guarded by their
/// own mutex; both are held only for a membership diff or a push, never
/// across an await of store I/O.
pub(crate) struct Dispatcher {
    store: Arc<dyn ObjectStore>,
    request_id: RequestId,
    staging_dir: PathBuf,
    retry: RetryConfig,
    /// Object names already dispatched (grows monotonically)
    known: Mutex<HashSet<String>>,
    /// Local paths of finished downloads, in completion order
    completed: Mutex<Vec<PathBuf>>,
    /// Abort handles for every spawned fetch, so the request can cancel
    /// them even after the owning `JoinHandle`s are gone
    aborts: Mutex<Vec<AbortHandle>>,
}

impl Dispatcher {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        request_id: RequestId,
        staging_dir: PathBuf,
        retry: RetryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            request_id,
            staging_dir,
            retry,
            known: Mutex::new(HashSet::new()),
            completed: Mutex::new(Vec::new()),
            aborts: Mutex::new(Vec::new()),
        })
    }

    /// List the store and spawn a fetch task for every newly seen object
    ///
    /// Listing goes through the retry policy because the request's bucket
    /// often does not exist until the first result file lands. Returns the
    /// handles of the newly spawned fetches; the caller owns draining them.
    pub(crate) async fn discover_and_fetch(
        self: &Arc<Self>,
    ) -> Result<Vec<JoinHandle<Result<()>>>> {
        let names = with_retry(&self.retry, || self.store.list(&self.request_id)).await?;

        // One critical section for the membership diff and the inserts, so
        // two overlapping listings cannot double-spawn the same object.
        let fresh: Vec<String> = {
            let mut known = self.known.lock().await;
            names
                .into_iter()
                .filter(|name| known.insert(name.clone()))
                .collect()
        };

        if !fresh.is_empty() {
            tracing::debug!(
                request_id = %self.request_id,
                new_objects = fresh.len(),
                "Discovered new result objects"
            );
        }

        let handles: Vec<JoinHandle<Result<()>>> = fresh
            .into_iter()
            .map(|object| {
                let dispatcher = Arc::clone(self);
                tokio::spawn(async move { dispatcher.fetch_one(object).await })
            })
            .collect();
        self.aborts
            .lock()
            .await
            .extend(handles.iter().map(JoinHandle::abort_handle));
        Ok(handles)
    }

    /// Cancel every fetch spawned for this request
    ///
    /// Works through the retained abort handles, so it also reaches tasks
    /// whose `JoinHandle`s were dropped when the driving future was
    /// cancelled (a deadline firing mid-request). Aborting a finished task
    /// is a no-op.
    pub(crate) async fn abort_all(&self) {
        let aborts = self.aborts.lock().await;
        if !aborts.is_empty() {
            tracing::debug!(
                request_id = %self.request_id,
                tasks = aborts.len(),
                "Cancelling fetch tasks"
            );
        }
        for abort in aborts.iter() {
            abort.abort();
        }
    }

    /// Fetch one object into its staging path, with bounded retries
    async fn fetch_one(&self, object: String) -> Result<()> {
        let dest = staging_path(&self.staging_dir, &self.request_id, &object);

        let outcome = with_retry(&self.retry, || {
            self.store.fetch(&self.request_id, &object, &dest)
        })
        .await;

        match outcome {
            Ok(()) => {
                self.completed.lock().await.push(dest);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    request_id = %self.request_id,
                    object = %object,
                    error = %e,
                    "Object download failed"
                );
                Err(Error::DownloadFailed {
                    object,
                    attempts: self.retry.max_attempts + 1,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Local paths of all finished downloads, in the order they completed
    pub(crate) async fn completed_paths(&self) -> Vec<PathBuf> {
        self.completed.lock().await.clone()
    }

    /// Number of distinct objects dispatched so far
    #[cfg(test)]
    pub(crate) async fn known_count(&self) -> usize {
        self.known.lock().await.len()
    }
}
