//! The CRD bootstrap watcher: keeps the [`Registry`] in sync with
//! `CustomResourceDefinition` objects as they are created and deleted.
//!
//! Reconnects use the same flattened-retry shape as other long-running watch loops in
//! this crate (`backon::ExponentialBuilder`, iterated rather than recursed) so a
//! dropped watch connection does not grow the call stack.
use std::sync::Arc;

use backon::{BackoffBuilder, ExponentialBuilder};
use serde_json::Value;

use crate::{
    convertor::Convertor,
    discovery::Analyzer,
    error::{Error, Result},
    executor::RequestExecutor,
    registry::Registry,
    watch::{watch_until_closed, WatchHandler},
};

/// The fullKind this watcher targets. Registered like any other built-in kind by the
/// initial full discovery pass, since `apiextensions.k8s.io` is itself a discoverable
/// API group.
const CRD_FULL_KIND: &str = "apiextensions.k8s.io.CustomResourceDefinition";

/// Watches every `CustomResourceDefinition` cluster-wide and registers/unregisters the
/// kinds they describe as they come and go.
///
/// `ADDED` extracts `spec.group` and `spec.versions[0]` and runs targeted discovery
/// against that single group/version -- later versions in `spec.versions` are not
/// registered, matching the upstream client this crate's behavior is modeled on.
/// `MODIFIED` is ignored: a CRD's served versions rarely change in ways this client
/// needs to react to, and a full re-discovery on every spec edit would be disruptive.
/// `DELETED` removes the fullKind this watcher itself registered for that CRD.
struct CrdHandler {
    registry: Arc<Registry>,
    analyzer: Arc<Analyzer>,
}

impl CrdHandler {
    async fn register_from_crd(&self, crd: &Value) {
        let Some(group) = crd.pointer("/spec/group").and_then(Value::as_str) else {
            tracing::warn!("CustomResourceDefinition is missing spec.group, ignoring");
            return;
        };
        let Some(version) = crd
            .pointer("/spec/versions/0/name")
            .and_then(Value::as_str)
        else {
            tracing::warn!(group, "CustomResourceDefinition has no spec.versions[0], ignoring");
            return;
        };

        match self.analyzer.discover_group_version(&self.registry, group, version).await {
            Ok(()) => tracing::info!(group, version, "registered kinds from new CustomResourceDefinition"),
            Err(err) => tracing::warn!(group, version, error = %err, "failed to discover CRD group/version"),
        }
    }

    fn unregister_from_crd(&self, crd: &Value) {
        let (Some(group), Some(kind)) = (
            crd.pointer("/spec/group").and_then(Value::as_str),
            crd.pointer("/spec/names/kind").and_then(Value::as_str),
        ) else {
            return;
        };
        let full_kind = format!("{group}.{kind}");
        tracing::info!(kind, full_kind, "unregistering kind after CustomResourceDefinition deletion");
        self.registry.remove_full_kind(kind, &full_kind);
    }
}

#[async_trait::async_trait]
impl WatchHandler for CrdHandler {
    async fn on_added(&self, object: Value) {
        self.register_from_crd(&object).await;
    }

    async fn on_modified(&self, _object: Value) {}

    async fn on_deleted(&self, object: Value) {
        self.unregister_from_crd(&object);
    }

    async fn on_close(&self, cause: Option<Error>) {
        if let Some(err) = cause {
            tracing::warn!(error = %err, "CRD watch stream closed, reconnect will be attempted");
        } else {
            tracing::debug!("CRD watch stream closed");
        }
    }
}

/// A running CRD bootstrap watcher. Dropping it aborts the background reconnect loop.
pub struct CrdWatcher {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for CrdWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start the CRD bootstrap watcher, registering discovered kinds into `registry` via
/// `analyzer`. Requires `registry` to already know about
/// `apiextensions.k8s.io.CustomResourceDefinition`, i.e. to be called after an initial
/// full discovery pass.
pub fn spawn(executor: Arc<dyn RequestExecutor>, registry: Arc<Registry>, analyzer: Arc<Analyzer>) -> Result<CrdWatcher> {
    let url = Convertor::new(&registry).watch_all_url(CRD_FULL_KIND, "")?;
    let handler = Arc::new(CrdHandler { registry, analyzer });

    let task = tokio::spawn(async move {
        // A flattened loop rather than recursion: each failed connection attempt
        // advances the same `backon::Backoff` iterator instead of growing the stack.
        // A successful session resets it, so a cluster that stays up for a while
        // doesn't inherit backoff state from an unrelated earlier blip.
        let mut backoff = ExponentialBuilder::default().with_max_times(10).build();

        loop {
            match watch_until_closed(&executor, &url, handler.as_ref()).await {
                Ok(()) => {
                    tracing::debug!("CRD watch stream closed cleanly, reconnecting");
                    backoff = ExponentialBuilder::default().with_max_times(10).build();
                    continue;
                }
                Err(err) => tracing::warn!(error = %err, "CRD watch stream failed"),
            }

            match backoff.next() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    tracing::error!("CRD watcher exhausted reconnect attempts, stopping");
                    return;
                }
            }
        }
    });

    Ok(CrdWatcher { task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockExecutor;
    use serde_json::json;

    #[tokio::test]
    async fn added_event_registers_the_crds_first_version() {
        let master = "https://host:6443";
        let mock = Arc::new(MockExecutor::new());
        mock.set_json(
            format!("{master}/apis/example.com/v1"),
            json!({
                "groupVersion": "example.com/v1",
                "resources": [
                    {"name": "crontabs", "kind": "CronTab", "namespaced": true, "verbs": ["get", "list", "watch"]},
                ]
            }),
        );

        let registry = Arc::new(Registry::new());
        let analyzer = Arc::new(Analyzer::new(master, mock.clone()));
        let handler = CrdHandler {
            registry: registry.clone(),
            analyzer,
        };

        handler
            .register_from_crd(&json!({
                "spec": {
                    "group": "example.com",
                    "versions": [{"name": "v1"}],
                    "names": {"kind": "CronTab"}
                }
            }))
            .await;

        assert_eq!(registry.descriptor("example.com.CronTab").unwrap().plural, "crontabs");
    }

    #[test]
    fn deleted_event_removes_the_registered_kind() {
        let registry = Arc::new(Registry::new());
        registry
            .put_kind(
                "CronTab",
                "example.com.CronTab",
                crate::registry::KindDescriptor {
                    plural: "crontabs".into(),
                    group: "example.com".into(),
                    version: "v1".into(),
                    namespaced: true,
                    api_prefix: "https://host:6443/apis/example.com/v1".into(),
                    verbs: vec!["get".into()],
                },
            )
            .unwrap();

        let mock = Arc::new(MockExecutor::new());
        let analyzer = Arc::new(Analyzer::new("https://host:6443", mock));
        let handler = CrdHandler { registry: registry.clone(), analyzer };

        handler.unregister_from_crd(&json!({
            "spec": {"group": "example.com", "names": {"kind": "CronTab"}}
        }));

        assert!(registry.descriptor("example.com.CronTab").is_err());
    }
}
