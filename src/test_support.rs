//! Test doubles shared across this crate's `#[cfg(test)]` modules.
//!
//! Asserts directly on the recorded URL rather than standing up a fake HTTP server,
//! in the style of `kube-core::request`'s own tests, adapted to this crate's
//! [`RequestExecutor`] trait boundary: fixtures are keyed by exact URL.
use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::{
    error::{Error, Result},
    executor::{ByteStream, RequestExecutor},
};

/// A [`RequestExecutor`] backed by an in-memory table of URL -> JSON response.
///
/// `do_get`/`do_post`/`do_put`/`do_delete` all consult the same table; callers that
/// care about which verb was used should record calls separately (see
/// [`MockExecutor::calls`]).
pub struct MockExecutor {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, String)>>,
    streams: Mutex<HashMap<String, mpsc::UnboundedReceiver<String>>>,
}

impl MockExecutor {
    /// An executor with no canned responses; every call will fail with `UnknownKind`
    /// style errors unless you `set_json` first.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Register the JSON document returned for `GET`/`POST`/`PUT`/`DELETE` of `url`.
    pub fn set_json(&self, url: impl Into<String>, body: Value) {
        self.responses.lock().unwrap().insert(url.into(), body);
    }

    /// Register a channel-fed NDJSON stream for `open_stream(url)`. Feed lines with
    /// the sender half and drop it to simulate EOF.
    pub fn set_stream(&self, url: impl Into<String>) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().insert(url.into(), rx);
        tx
    }

    /// `(verb, url)` pairs recorded so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, verb: &str, url: &str) {
        self.calls.lock().unwrap().push((verb.to_string(), url.to_string()));
    }

    fn lookup(&self, url: &str) -> Result<Value> {
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("no mock response registered for {url}")))
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Treats a JSON body with `status == "Failure"` as an [`Error::ApiFailure`], mirroring
/// what the real [`HttpExecutor`](crate::transport::HttpExecutor) does.
pub(crate) fn check_api_failure(body: Value) -> Result<Value> {
    if body.get("status").and_then(Value::as_str) == Some("Failure") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let reason = body
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let code = body.get("code").and_then(Value::as_u64).unwrap_or(0) as u16;
        return Err(Error::ApiFailure { message, reason, code });
    }
    Ok(body)
}

#[async_trait]
impl RequestExecutor for MockExecutor {
    async fn do_get(&self, url: &str) -> Result<Value> {
        self.record("GET", url);
        check_api_failure(self.lookup(url)?)
    }

    async fn do_post(&self, url: &str, _body: &Value) -> Result<Value> {
        self.record("POST", url);
        check_api_failure(self.lookup(url).unwrap_or_else(|_| json!({"status": "ok"})))
    }

    async fn do_put(&self, url: &str, _body: &Value) -> Result<Value> {
        self.record("PUT", url);
        check_api_failure(self.lookup(url).unwrap_or_else(|_| json!({"status": "ok"})))
    }

    async fn do_delete(&self, url: &str) -> Result<Value> {
        self.record("DELETE", url);
        check_api_failure(self.lookup(url).unwrap_or_else(|_| json!({"status": "ok"})))
    }

    async fn open_stream(&self, url: &str) -> Result<ByteStream> {
        self.record("WATCH", url);
        let rx = self
            .streams
            .lock()
            .unwrap()
            .remove(url)
            .ok_or_else(|| Error::InvalidArgument(format!("no mock stream registered for {url}")))?;
        let lines = futures::stream::unfold(rx, |mut rx| async move {
            let line = rx.recv().await?;
            let mut line = line;
            line.push('\n');
            Some((Ok(Bytes::from(line)), rx))
        });
        Ok(Box::pin(lines))
    }
}
