//! The [`RequestExecutor`] trait: the only boundary the Registry, Convertor, Analyzer,
//! Watch Engine, and Facade use to talk to the network.
//!
//! This crate ships exactly one implementation, [`crate::transport::HttpExecutor`], but
//! nothing in `kubedyn`'s core depends on it directly -- everything is expressed against
//! this trait so that tests (and alternative transports) can swap in their own.
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;

use crate::error::Result;

/// A stream of raw bytes from an open watch connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Abstract request execution, satisfied by an authenticated HTTP client.
///
/// Every method carries whatever credential the executor was configured with
/// (bearer token, basic auth, or kubeconfig-derived mTLS/token material); callers of
/// this trait never see or handle credentials themselves.
///
/// Implementations are responsible for: issuing the request, parsing a JSON response
/// body, and treating a response whose `status` field is `"Failure"` as
/// [`Error::ApiFailure`](crate::error::Error::ApiFailure) regardless of the HTTP status
/// code.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// `GET url`, returning the parsed JSON body.
    async fn do_get(&self, url: &str) -> Result<Value>;

    /// `POST url` with a JSON body, returning the parsed JSON response.
    async fn do_post(&self, url: &str, body: &Value) -> Result<Value>;

    /// `PUT url` with a JSON body, returning the parsed JSON response.
    async fn do_put(&self, url: &str, body: &Value) -> Result<Value>;

    /// `DELETE url`, returning the parsed JSON response.
    async fn do_delete(&self, url: &str) -> Result<Value>;

    /// Open a long-lived `GET` stream, e.g. for a watch connection.
    ///
    /// The returned stream yields raw bytes as they arrive; the [Watch
    /// Engine](crate::watch) is responsible for framing them into newline-delimited
    /// JSON records.
    async fn open_stream(&self, url: &str) -> Result<ByteStream>;
}
