//! The default [`RequestExecutor`] implementation: HTTP client construction, TLS, and
//! credential handling.
//!
//! Nothing in `kubedyn`'s core (registry, convertor, discovery, watch engine, facade)
//! depends on this module directly -- they only ever see
//! `Arc<dyn RequestExecutor>`. This module exists so the crate is usable end to end,
//! the same way `kube_client::Client` ships a real transport behind its own
//! `Service` abstraction, just built directly on `hyper_util`'s legacy client rather
//! than a `tower::Service` stack of its own.
mod auth;
pub mod kubeconfig;
mod tls;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::{header::CONTENT_TYPE, Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client as HyperClient},
    rt::TokioExecutor,
};
use serde_json::Value;

pub use auth::Credentials;

use crate::{
    error::{Error, Result, TransportError},
    executor::{ByteStream, RequestExecutor},
};

type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

/// A [`RequestExecutor`] backed by `hyper` + `hyper-rustls`, carrying one configured
/// credential for every request it issues.
pub struct HttpExecutor {
    client: HyperClient<Connector, Full<Bytes>>,
    credentials: Credentials,
}

impl HttpExecutor {
    /// Build an executor carrying `credentials` for every request it issues.
    ///
    /// Per-call URLs are supplied by the [`Convertor`](crate::convertor) at call time;
    /// this type only ever sees fully-formed absolute URLs.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let connector = tls::build_connector(&credentials)?;
        let client = HyperClient::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client, credentials })
    }

    fn authorize(&self, mut builder: http::request::Builder) -> Result<http::request::Builder> {
        match &self.credentials {
            Credentials::Bearer(token) => {
                use secrecy::ExposeSecret;
                builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
            }
            Credentials::Basic { username, password } => {
                use secrecy::ExposeSecret;
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{username}:{}", password.expose_secret()),
                );
                builder = builder.header(http::header::AUTHORIZATION, format!("Basic {encoded}"));
            }
            Credentials::ClientCertificate { .. } => {
                // Identity is carried at the TLS layer; no Authorization header needed.
            }
        }
        Ok(builder)
    }

    async fn send_json(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let mut builder = Request::builder().method(method).uri(url);
        builder = self.authorize(builder)?;
        let payload = match body {
            Some(v) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                serde_json::to_vec(v).map_err(Error::Parse)?
            }
            None => Vec::new(),
        };
        let request = builder
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| Error::Transport(TransportError::BuildRequest(e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::Transport(TransportError::Hyper(Box::new(e))))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Transport(TransportError::Body(Box::new(e))))?
            .to_bytes();

        if body.is_empty() {
            if status.is_success() {
                return Ok(Value::Null);
            }
            return Err(Error::Transport(TransportError::HttpStatus {
                status: status.as_u16(),
                body: String::new(),
            }));
        }

        let parsed: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                if status.is_success() {
                    return Err(Error::Parse(e));
                }
                return Err(Error::Transport(TransportError::HttpStatus {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                }));
            }
        };
        check_api_failure(parsed)
    }
}

fn check_api_failure(body: Value) -> Result<Value> {
    if body.get("status").and_then(Value::as_str) == Some("Failure") {
        let message = body.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
        let reason = body.get("reason").and_then(Value::as_str).unwrap_or_default().to_string();
        let code = body.get("code").and_then(Value::as_u64).unwrap_or(0) as u16;
        return Err(Error::ApiFailure { message, reason, code });
    }
    Ok(body)
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn do_get(&self, url: &str) -> Result<Value> {
        self.send_json(Method::GET, url, None).await
    }

    async fn do_post(&self, url: &str, body: &Value) -> Result<Value> {
        self.send_json(Method::POST, url, Some(body)).await
    }

    async fn do_put(&self, url: &str, body: &Value) -> Result<Value> {
        self.send_json(Method::PUT, url, Some(body)).await
    }

    async fn do_delete(&self, url: &str) -> Result<Value> {
        self.send_json(Method::DELETE, url, None).await
    }

    async fn open_stream(&self, url: &str) -> Result<ByteStream> {
        let mut builder = Request::builder().method(Method::GET).uri(url);
        builder = self.authorize(builder)?;
        let request = builder
            .body(Full::new(Bytes::new()))
            .map_err(|e| Error::Transport(TransportError::BuildRequest(e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::Transport(TransportError::Hyper(Box::new(e))))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Transport(TransportError::Body(Box::new(e))))?
                .to_bytes();
            return Err(Error::Transport(TransportError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }));
        }

        let stream = http_body_util::BodyStream::new(response.into_body()).map(|frame| match frame {
            Ok(frame) => frame.into_data().map_err(|_| {
                Error::Transport(TransportError::Body(Box::<dyn std::error::Error + Send + Sync>::from(
                    "non-data frame in watch stream",
                )))
            }),
            Err(e) => Err(Error::Transport(TransportError::Body(Box::new(e)))),
        });
        Ok(Box::pin(stream))
    }
}

/// Wraps `executor` for handoff to code that only wants `Arc<dyn RequestExecutor>`.
pub fn boxed(executor: HttpExecutor) -> Arc<dyn RequestExecutor> {
    Arc::new(executor)
}
