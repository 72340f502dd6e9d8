//! The Facade: a single `Clone`able entry point composing the Registry, Convertor,
//! Analyzer, an executor, the Watch Engine, and the CRD bootstrap watcher.
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;

use crate::{
    convertor::{Convertor, ListOptions},
    crd_watch::{self, CrdWatcher},
    discovery::Analyzer,
    error::Result,
    executor::RequestExecutor,
    registry::{KindDescriptor, Registry},
    transport::{kubeconfig, Credentials, HttpExecutor},
    watch::{self, WatchHandle, WatchHandler},
};

/// A dynamic, schema-discovering client for Kubernetes-style REST/Watch APIs.
///
/// `KubeDynClient` is cheap to clone: the registry and executor are both held behind
/// `Arc`, and cloning shares them rather than copying state. The CRD bootstrap watcher
/// keeps running for as long as any clone (or the original) is alive.
#[derive(Clone)]
pub struct KubeDynClient {
    registry: Arc<Registry>,
    executor: Arc<dyn RequestExecutor>,
    analyzer: Arc<Analyzer>,
    crd_watcher: Arc<CrdWatcher>,
}

impl KubeDynClient {
    async fn build(master_url: String, executor: Arc<dyn RequestExecutor>) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let analyzer = Arc::new(Analyzer::new(master_url, executor.clone()));
        analyzer.run(&registry).await?;

        let crd_watcher = crd_watch::spawn(executor.clone(), registry.clone(), analyzer.clone())?;

        Ok(Self {
            registry,
            executor,
            analyzer,
            crd_watcher: Arc::new(crd_watcher),
        })
    }

    /// Construct a client authenticating with a bearer token.
    pub async fn with_bearer_token(master_url: impl Into<String>, token: impl Into<SecretString>) -> Result<Self> {
        let executor = Arc::new(HttpExecutor::new(Credentials::Bearer(token.into()))?);
        Self::build(master_url.into(), executor).await
    }

    /// Construct a client authenticating with HTTP basic auth.
    pub async fn with_basic_auth(
        master_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Result<Self> {
        let executor = Arc::new(HttpExecutor::new(Credentials::Basic {
            username: username.into(),
            password: password.into(),
        })?);
        Self::build(master_url.into(), executor).await
    }

    /// Construct a client from a kubeconfig file's current context.
    pub async fn from_kubeconfig(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let parsed = kubeconfig::load(path)?;
        let executor = Arc::new(HttpExecutor::new(parsed.credentials)?);
        Self::build(parsed.master_url, executor).await
    }

    /// Construct a client against a custom [`RequestExecutor`], e.g. a
    /// [`MockExecutor`](crate::test_support::MockExecutor) in tests or an alternative
    /// transport.
    pub async fn with_executor(master_url: impl Into<String>, executor: Arc<dyn RequestExecutor>) -> Result<Self> {
        Self::build(master_url.into(), executor).await
    }

    fn convertor(&self) -> Convertor<'_> {
        Convertor::new(&self.registry)
    }

    /// Create a new instance of `kind` in `ns` from `doc`. The `status` subtree, if
    /// present, is stripped before sending: the API server rejects `status` writes on
    /// create and a caller round-tripping a fetched object would otherwise fail.
    pub async fn create_resource(&self, kind: &str, ns: &str, doc: Value) -> Result<Value> {
        let url = self.convertor().create_url(kind, ns)?;
        self.executor.do_post(&url, &strip_status(doc)).await
    }

    /// Create a new instance inferring kind/namespace from `doc`'s `apiVersion`/`kind`/
    /// `metadata.namespace`. See [`Self::create_resource`] for the `status` handling.
    pub async fn create_resource_from_doc(&self, doc: Value) -> Result<Value> {
        let url = self.convertor().create_url_from_doc(&doc)?;
        self.executor.do_post(&url, &strip_status(doc)).await
    }

    /// Replace an existing instance of `kind` named `name` in `ns` with `doc`. Like
    /// [`Self::create_resource`], any `status` subtree in `doc` is stripped first.
    pub async fn update_resource(&self, kind: &str, ns: &str, name: &str, doc: Value) -> Result<Value> {
        let url = self.convertor().update_url(kind, ns, name)?;
        self.executor.do_put(&url, &strip_status(doc)).await
    }

    /// Replace the `/status` subresource of `name` with `doc` (which should itself
    /// carry the full object including its intended `status`).
    pub async fn update_resource_status(&self, kind: &str, ns: &str, name: &str, doc: Value) -> Result<Value> {
        let url = self.convertor().update_status_url(kind, ns, name)?;
        self.executor.do_put(&url, &doc).await
    }

    /// Delete the instance of `kind` named `name` in `ns`.
    pub async fn delete_resource(&self, kind: &str, ns: &str, name: &str) -> Result<Value> {
        let url = self.convertor().delete_url(kind, ns, name)?;
        self.executor.do_delete(&url).await
    }

    /// Fetch the instance of `kind` named `name` in `ns`.
    pub async fn get_resource(&self, kind: &str, ns: &str, name: &str) -> Result<Value> {
        let url = self.convertor().get_url(kind, ns, name)?;
        self.executor.do_get(&url).await
    }

    /// Whether `name` exists. Any error (not found, unknown kind, transport failure)
    /// is reported as `false` rather than propagated.
    pub async fn has_resource(&self, kind: &str, ns: &str, name: &str) -> bool {
        self.get_resource(kind, ns, name).await.is_ok()
    }

    /// List instances of `kind` in `ns` (or cluster-wide/all-namespaces depending on
    /// the kind's scope and an empty `ns`), subject to `opts`.
    pub async fn list_resources(&self, kind: &str, ns: &str, opts: &ListOptions) -> Result<Value> {
        let url = self.convertor().list_url(kind, ns, opts)?;
        self.executor.do_get(&url).await
    }

    /// Bind `pod_name` to `host` via the `Pod`'s `binding` subresource.
    pub async fn binding_resource(&self, ns: &str, pod_name: &str, host: &str) -> Result<Value> {
        let url = self.convertor().binding_url(ns, pod_name)?;
        let body = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Binding",
            "metadata": {"name": pod_name},
            "target": {"apiVersion": "v1", "kind": "Node", "name": host},
        });
        self.executor.do_post(&url, &body).await
    }

    /// Watch a single named instance of `kind`, dispatching events to `handler` until
    /// the returned [`WatchHandle`] is cancelled or the stream ends.
    pub fn watch_resource(&self, kind: &str, ns: &str, name: &str, handler: Arc<dyn WatchHandler>) -> Result<WatchHandle> {
        let url = self.convertor().watch_one_url(kind, ns, name)?;
        Ok(watch::start(self.executor.clone(), url, handler))
    }

    /// Watch every instance of `kind` in `ns`, dispatching events to `handler` until
    /// the returned [`WatchHandle`] is cancelled or the stream ends.
    pub fn watch_resources(&self, kind: &str, ns: &str, handler: Arc<dyn WatchHandler>) -> Result<WatchHandle> {
        let url = self.convertor().watch_all_url(kind, ns)?;
        Ok(watch::start(self.executor.clone(), url, handler))
    }

    /// All known shortKinds.
    pub fn get_kinds(&self) -> Vec<String> {
        self.registry.short_kinds()
    }

    /// All known fullKinds.
    pub fn get_full_kinds(&self) -> Vec<String> {
        self.registry.full_kinds()
    }

    /// Every fullKind's descriptor, as a snapshot.
    pub fn get_kind_desc(&self) -> std::collections::HashMap<String, KindDescriptor> {
        self.registry.kind_descriptors()
    }
}

fn strip_status(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        obj.remove("status");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockExecutor;
    use serde_json::json;

    fn master() -> &'static str {
        "https://host:6443"
    }

    fn seed_discovery(mock: &MockExecutor) {
        mock.set_json(format!("{}/api", master()), json!({"versions": ["v1"]}));
        mock.set_json(
            format!("{}/api/v1", master()),
            json!({
                "groupVersion": "v1",
                "resources": [
                    {"name": "pods", "kind": "Pod", "namespaced": true, "verbs": ["get", "list", "watch", "create", "update", "delete"]},
                ]
            }),
        );
        mock.set_json(format!("{}/apis", master()), json!({"groups": []}));
        mock.set_json(
            format!("{}/apis/apiextensions.k8s.io/v1", master()),
            json!({
                "groupVersion": "apiextensions.k8s.io/v1",
                "resources": [
                    {"name": "customresourcedefinitions", "kind": "CustomResourceDefinition", "namespaced": false, "verbs": ["get", "list", "watch"]},
                ]
            }),
        );
    }

    async fn client_with_mock() -> (KubeDynClient, Arc<MockExecutor>) {
        let mock = Arc::new(MockExecutor::new());
        seed_discovery(&mock);
        // apiextensions.k8s.io is only in `/apis` once added, so register it manually
        // for tests that construct a client without going through full group discovery.
        mock.set_json(
            format!("{}/apis", master()),
            json!({
                "groups": [
                    {"name": "apiextensions.k8s.io", "preferredVersion": {"version": "v1"}}
                ]
            }),
        );
        mock.set_stream(format!(
            "{}/apis/apiextensions.k8s.io/v1/watch/customresourcedefinitions?watch=true&timeoutSeconds=315360000",
            master()
        ));
        let client = KubeDynClient::with_executor(master(), mock.clone() as Arc<dyn RequestExecutor>)
            .await
            .unwrap();
        (client, mock)
    }

    #[tokio::test]
    async fn create_resource_strips_status_subtree() {
        let (client, mock) = client_with_mock().await;
        let doc = json!({"metadata": {"name": "x"}, "status": {"phase": "Running"}});
        mock.set_json(format!("{}/api/v1/namespaces/default/pods", master()), json!({"status": "ok"}));

        client.create_resource("Pod", "default", doc).await.unwrap();

        let (_verb, url) = mock
            .calls()
            .into_iter()
            .find(|(v, _)| v == "POST")
            .expect("a POST call was recorded");
        assert_eq!(url, format!("{}/api/v1/namespaces/default/pods", master()));
    }

    #[tokio::test]
    async fn has_resource_reports_false_on_unknown_kind() {
        let (client, _mock) = client_with_mock().await;
        assert!(!client.has_resource("Widget", "default", "x").await);
    }

    #[tokio::test]
    async fn get_kinds_reflects_discovered_registry() {
        let (client, _mock) = client_with_mock().await;
        assert!(client.get_kinds().contains(&"Pod".to_string()));
    }
}
