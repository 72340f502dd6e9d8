//! A dynamic, schema-discovering client for Kubernetes-style REST/Watch APIs.
//!
//! Unlike a client generated from a fixed OpenAPI schema, `kubedyn` learns what kinds
//! exist, and where, by crawling a cluster's own discovery endpoints at startup and
//! keeping that knowledge current as `CustomResourceDefinition`s come and go. Callers
//! address resources by kind name (`"Pod"`, or `"apps.Deployment"` when a shortKind is
//! ambiguous) and never construct a URL themselves.
//!
//! ```no_run
//! use kubedyn::KubeDynClient;
//!
//! # async fn run() -> kubedyn::error::Result<()> {
//! let client = KubeDynClient::with_bearer_token("https://host:6443", "my-token").await?;
//! let pods = client.list_resources("Pod", "default", &Default::default()).await?;
//! # Ok(())
//! # }
//! ```
pub mod client;
pub mod convertor;
pub mod crd_watch;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod registry;
#[cfg(test)]
pub(crate) mod test_support;
pub mod transport;
pub mod watch;

pub use client::KubeDynClient;
pub use convertor::{Convertor, ListOptions};
pub use error::{Error, Result};
pub use executor::{ByteStream, RequestExecutor};
pub use registry::{KindDescriptor, Registry};
pub use watch::{WatchHandle, WatchHandler};
