//! Object store collaborator.
//!
//! Completed result files land in a remote object store, scoped by request
//! id. The orchestration core only needs two operations — list the objects
//! currently available for a request, and fetch one object to a local path —
//! so the store is a trait seam with a default HTTP implementation.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::RequestId;

/// Remote blob storage holding completed result files
///
/// Implementations must be safe to call concurrently from many download
/// tasks. Transient failures (the request's bucket not yet created, a
/// connection drop mid-fetch) should surface as [`Error::StoreTransient`]
/// so the retry policy can distinguish them from permanent errors.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the names of all objects currently available for a request
    async fn list(&self, request_id: &RequestId) -> Result<Vec<String>>;

    /// Copy one object's bytes to `dest`
    async fn fetch(&self, request_id: &RequestId, object: &str, dest: &Path) -> Result<()>;
}

/// Deterministic local staging path for one remote object
///
/// The object name is hashed so arbitrary store names (which may contain
/// path separators and other unfriendly characters) map to stable,
/// filesystem-safe file names. The same `(request_id, object)` pair always
/// maps to the same path, so repeated runs do not collide with each other.
pub fn staging_path(staging_dir: &Path, request_id: &RequestId, object: &str) -> PathBuf {
    let digest = Sha256::digest(object.as_bytes());
    let name = format!("{:x}", digest);
    staging_dir
        .join(&request_id.0)
        .join(format!("{}.json", &name[..32]))
}

/// Default [`ObjectStore`] implementation over HTTP
///
/// Lists via `GET {base}/files/{request_id}` (body
/// `{"files": [{"name": ...}, ...]}`) and fetches via
/// `GET {base}/files/{request_id}/{name}`.
#[derive(Clone, Debug)]
pub struct HttpObjectStore {
    base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    files: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

impl HttpObjectStore {
    /// Create a store client rooted at `base`, reusing an existing HTTP client
    pub fn new(base: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            client,
        }
    }

    fn route(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list(&self, request_id: &RequestId) -> Result<Vec<String>> {
        let url = self.route(&format!("files/{}", request_id));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            // The bucket usually does not exist until the first file lands.
            return Err(Error::StoreTransient(format!(
                "listing objects for {} returned status {}",
                request_id, status
            )));
        }
        let parsed: ListResponse = response.json().await?;
        Ok(parsed.files.into_iter().map(|f| f.name).collect())
    }

    async fn fetch(&self, request_id: &RequestId, object: &str, dest: &Path) -> Result<()> {
        let url = self.route(&format!("files/{}/{}", request_id, object));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::StoreTransient(format!(
                "fetching object '{}' returned status {}",
                object, status
            )));
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        tracing::debug!(
            request_id = %request_id,
            object = object,
            bytes = bytes.len(),
            dest = %dest.display(),
            "Fetched object to staging"
        );
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_staging_path_is_deterministic_and_scoped() {
        let rid = RequestId::from("1234-4433");
        let a = staging_path(Path::new("/tmp/staging"), &rid, "part-0001");
        let b = staging_path(Path::new("/tmp/staging"), &rid, "part-0001");
        let c = staging_path(Path::new("/tmp/staging"), &rid, "part-0002");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/tmp/staging/1234-4433"));
    }

    #[test]
    fn test_staging_path_handles_hostile_object_names() {
        let rid = RequestId::from("abc");
        let p = staging_path(
            Path::new("./staging"),
            &rid,
            "root:::dcache-atlas:1094::pnfs/de:rucio/x.part",
        );
        // Everything below the request directory is one hashed component
        assert_eq!(p.parent(), Some(Path::new("./staging/abc")));
    }

    #[tokio::test]
    async fn test_list_and_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"files": [{"name": "part-1"}, {"name": "part-2"}]}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/req-1/part-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"x": [1.0]}"#))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri(), reqwest::Client::new());
        let rid = RequestId::from("req-1");
        let names = store.list(&rid).await.unwrap();
        assert_eq!(names, vec!["part-1", "part-2"]);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("part-1.json");
        store.fetch(&rid, "part-1", &dest).await.unwrap();
        let content = tokio::fs::read_to_string(&dest).await.unwrap();
        assert_eq!(content, r#"{"x": [1.0]}"#);
    }

    #[tokio::test]
    async fn test_missing_bucket_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/req-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri(), reqwest::Client::new());
        let err = store.list(&RequestId::from("req-1")).await.unwrap_err();
        assert!(matches!(err, Error::StoreTransient(_)));
    }
}
