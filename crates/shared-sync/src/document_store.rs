//! Remote path-addressable JSON document store.
//!
//! Three operations: read a subtree, overwrite a subtree, merge into a
//! subtree. Paths are slash-separated, e.g. `scope/42/targets/7`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Method, RequestBuilder};
use serde_json::{Map, Value};

use chainwatch_core::{Error, Result};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the subtree at `path`. An absent subtree reads as `Value::Null`.
    async fn read(&self, path: &str) -> Result<Value>;

    /// Replace the subtree at `path` with `value`.
    async fn put(&self, path: &str, value: &Value) -> Result<()>;

    /// Merge the children of `value` into the subtree at `path`.
    async fn patch(&self, path: &str, value: &Value) -> Result<()>;
}

/// Document store reached over its REST interface:
/// `GET|PUT|PATCH {base}/{path}.json[?auth=token]`.
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str, auth: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: auth.filter(|a| !a.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    /// Request for `path`, with the auth token as an encoded query value.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.auth {
            Some(auth) => request.query(&[("auth", auth.as_str())]),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!("Document store error body ({}): {}", status, body);
            return Err(Error::HttpError(status.as_u16()));
        }
        Ok(body)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn read(&self, path: &str) -> Result<Value> {
        let response = self.request(Method::GET, path).send().await?;
        let body = Self::check(response).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn put(&self, path: &str, value: &Value) -> Result<()> {
        let response = self
            .request(Method::PUT, path)
            .json(value)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn patch(&self, path: &str, value: &Value) -> Result<()> {
        let response = self
            .request(Method::PATCH, path)
            .json(value)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }
}

/// One recorded mutation against a [`MemoryDocumentStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum StoreOp {
    Put { path: String, value: Value },
    Patch { path: String, value: Value },
}

/// In-process document store.
///
/// Used when no remote backend is configured (the list then stays local to
/// this instance) and as the backend in tests, where the recorded
/// operations are inspected.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    root: Mutex<Value>,
    ops: Mutex<Vec<StoreOp>>,
    reads: Mutex<Vec<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put/patch in arrival order.
    pub fn ops(&self) -> Vec<StoreOp> {
        lock(&self.ops).clone()
    }

    /// Every read path in arrival order.
    pub fn reads(&self) -> Vec<String> {
        lock(&self.reads).clone()
    }

    /// Current value at `path`, without recording a read.
    pub fn snapshot(&self, path: &str) -> Value {
        let root = lock(&self.root);
        lookup(&root, path).cloned().unwrap_or(Value::Null)
    }

    /// Replace a subtree directly, as another instance would.
    pub fn seed(&self, path: &str, value: Value) {
        set_at(&mut lock(&self.root), path, value);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Memory document store mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, key| node.get(key))
}

/// Walk to `path`, creating objects on the way, and return the slot there.
fn slot_at<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    segments(path).fold(root, |node, key| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
            _ => unreachable!("node was just made an object"),
        }
    })
}

fn set_at(root: &mut Value, path: &str, value: Value) {
    *slot_at(root, path) = value;
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, path: &str) -> Result<Value> {
        lock(&self.reads).push(path.to_string());
        Ok(self.snapshot(path))
    }

    async fn put(&self, path: &str, value: &Value) -> Result<()> {
        lock(&self.ops).push(StoreOp::Put {
            path: path.to_string(),
            value: value.clone(),
        });
        set_at(&mut lock(&self.root), path, value.clone());
        Ok(())
    }

    async fn patch(&self, path: &str, value: &Value) -> Result<()> {
        lock(&self.ops).push(StoreOp::Patch {
            path: path.to_string(),
            value: value.clone(),
        });
        let Value::Object(children) = value else {
            return Err(Error::ParseError("patch value must be an object".into()));
        };
        let mut root = lock(&self.root);
        let node = slot_at(&mut root, path);
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(map) = node {
            for (key, child) in children {
                map.insert(key.clone(), child.clone());
            }
        }
        Ok(())
    }
}
