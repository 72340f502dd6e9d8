//! The Watch Engine: opens a long-lived stream via a [`RequestExecutor`] and dispatches
//! framed watch events to a [`WatchHandler`].
//!
//! Watch responses are newline-delimited JSON, so the raw byte stream is wrapped in
//! `tokio_util::codec::FramedRead` with `LinesCodec`, and each line is parsed as one
//! `WatchEvent`, the same decomposition `kube_client::Client` uses for its own watch
//! reader.
use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::{
    codec::{FramedRead, LinesCodec},
    io::StreamReader,
};

use crate::{
    error::{Error, Result},
    executor::RequestExecutor,
};

/// One decoded line of a Kubernetes-style watch stream.
#[derive(Debug, Deserialize)]
struct WatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    object: Value,
}

/// Callbacks invoked as a watch stream delivers events.
///
/// Exactly one of `on_added`/`on_modified`/`on_deleted` is invoked per non-bookmark
/// event, in stream order, never concurrently with another callback on the same
/// watcher. `on_close` always fires exactly once when the stream ends, whether
/// cleanly or due to an error.
#[async_trait::async_trait]
pub trait WatchHandler: Send + Sync {
    /// An `ADDED` event arrived.
    async fn on_added(&self, object: Value);
    /// A `MODIFIED` event arrived.
    async fn on_modified(&self, object: Value);
    /// A `DELETED` event arrived.
    async fn on_deleted(&self, object: Value);
    /// The stream ended; `cause` is `None` for a clean server-initiated close.
    async fn on_close(&self, cause: Option<Error>);
}

/// A handle to a running watch. Dropping it does not stop the watch; call
/// [`WatchHandle::cancel`] to do that explicitly.
pub struct WatchHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl WatchHandle {
    /// Signal the watcher task to stop after its current event, if any, finishes
    /// dispatching. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Open `url` on `executor` and dispatch decoded events to `handler` on a background
/// task until the stream ends or [`WatchHandle::cancel`] is called.
pub fn start(executor: Arc<dyn RequestExecutor>, url: String, handler: Arc<dyn WatchHandler>) -> WatchHandle {
    let (cancel_tx, mut cancel_rx) = oneshot::channel();

    tokio::spawn(async move {
        let cause = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                tracing::debug!(url = url.as_str(), "watch cancelled by caller");
                None
            }
            result = watch_until_closed(&executor, &url, handler.as_ref()) => result.err(),
        };
        handler.on_close(cause).await;
    });

    WatchHandle {
        cancel_tx: Some(cancel_tx),
    }
}

/// Run one watch session to completion: open `url`, dispatch every event to `handler`,
/// and return once the stream ends (cleanly or with an error). Used directly by the
/// [CRD bootstrap watcher](crate::crd_watch), which needs to await a session's natural
/// end before deciding whether to reconnect.
pub async fn watch_until_closed(executor: &Arc<dyn RequestExecutor>, url: &str, handler: &dyn WatchHandler) -> Result<()> {
    let stream = executor.open_stream(url).await?;
    let reader = StreamReader::new(stream.map(|chunk| chunk.map_err(std::io::Error::other)));
    let mut lines = FramedRead::new(reader, LinesCodec::new());

    while let Some(next) = lines.next().await {
        match next {
            Err(e) => return Err(Error::Cancelled(e.to_string())),
            Ok(line) => dispatch_line(handler, &line).await?,
        }
    }
    Ok(())
}

async fn dispatch_line(handler: &dyn WatchHandler, line: &str) -> Result<()> {
    if line.trim().is_empty() {
        return Ok(());
    }
    let event: WatchEvent = serde_json::from_str(line).map_err(Error::Parse)?;
    match event.event_type.as_str() {
        "ADDED" => handler.on_added(event.object).await,
        "MODIFIED" => handler.on_modified(event.object).await,
        "DELETED" => handler.on_deleted(event.object).await,
        "BOOKMARK" => {}
        "ERROR" => {
            return Err(Error::Cancelled(format!(
                "watch stream reported an ERROR event: {}",
                event.object
            )))
        }
        other => tracing::warn!(event_type = other, "ignoring unrecognized watch event type"),
    }
    Ok(())
}
