//! The Analyzer: crawls `/api` and `/apis/<group>/<version>` and populates a
//! [`Registry`] with what it finds.
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    executor::RequestExecutor,
    registry::{KindDescriptor, Registry},
};

/// `APIResourceList`-shaped discovery document: `/api/v1` or `/apis/<group>/<version>`.
#[derive(Debug, Deserialize)]
struct ApiResourceList {
    #[serde(rename = "groupVersion")]
    group_version: String,
    resources: Vec<ApiResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiResourceEntry {
    name: String,
    kind: String,
    namespaced: bool,
    #[serde(default)]
    verbs: Vec<String>,
}

/// `APIVersions`-shaped discovery document: `/api`.
#[derive(Debug, Deserialize)]
struct ApiVersions {
    versions: Vec<String>,
}

/// `APIGroupList`-shaped discovery document: `/apis`.
#[derive(Debug, Deserialize)]
struct ApiGroupList {
    groups: Vec<ApiGroup>,
}

#[derive(Debug, Deserialize)]
struct ApiGroup {
    name: String,
    #[serde(rename = "preferredVersion")]
    preferred_version: Option<ApiGroupVersion>,
}

#[derive(Debug, Deserialize)]
struct ApiGroupVersion {
    version: String,
}

/// Crawls cluster discovery endpoints and writes what it finds into a [`Registry`].
///
/// `Analyzer` holds only a master URL and a [`RequestExecutor`]; it does not cache
/// anything itself -- the [`Registry`] is the cache.
pub struct Analyzer {
    master_url: String,
    executor: Arc<dyn RequestExecutor>,
}

impl Analyzer {
    /// Build an analyzer targeting `master_url` (no trailing slash) using `executor`
    /// for the actual HTTP calls.
    pub fn new(master_url: impl Into<String>, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            master_url: master_url.into(),
            executor,
        }
    }

    /// Run full discovery: `/api` (core group) plus every group under `/apis`,
    /// registering every resource it finds into `registry`.
    ///
    /// Registration failures for an individual group/version are propagated -- unlike
    /// the CRD bootstrap watcher's targeted discovery, this is meant to run once at
    /// client construction and a partial registry would be a surprising starting state.
    pub async fn run(&self, registry: &Registry) -> Result<()> {
        self.discover_core(registry).await?;
        self.discover_groups(registry).await?;
        Ok(())
    }

    async fn discover_core(&self, registry: &Registry) -> Result<()> {
        let versions: ApiVersions = self.fetch(&format!("{}/api", self.master_url)).await?;
        for version in &versions.versions {
            tracing::debug!(version = version.as_str(), "discovering core api version");
            let url = format!("{}/api/{}", self.master_url, version);
            let list: ApiResourceList = self.fetch(&url).await?;
            let prefix = format!("{}/api/{}", self.master_url, version);
            self.register_list(registry, "", version, &prefix, list);
        }
        Ok(())
    }

    async fn discover_groups(&self, registry: &Registry) -> Result<()> {
        let groups: ApiGroupList = self.fetch(&format!("{}/apis", self.master_url)).await?;
        for group in &groups.groups {
            let Some(preferred) = &group.preferred_version else {
                continue;
            };
            tracing::debug!(name = group.name.as_str(), "listing group versions");
            self.discover_group_version(registry, &group.name, &preferred.version)
                .await?;
        }
        Ok(())
    }

    /// Targeted discovery of exactly one `/apis/<group>/<version>` document, used by
    /// the CRD bootstrap watcher when a new CRD group/version appears.
    pub async fn discover_group_version(&self, registry: &Registry, group: &str, version: &str) -> Result<()> {
        let prefix = format!("{}/apis/{}/{}", self.master_url, group, version);
        let list: ApiResourceList = self.fetch(&prefix).await?;
        self.register_list(registry, group, version, &prefix, list);
        Ok(())
    }

    fn register_list(
        &self,
        registry: &Registry,
        group: &str,
        version: &str,
        api_prefix: &str,
        list: ApiResourceList,
    ) {
        debug_assert_eq!(list.group_version.is_empty(), false);
        for res in list.resources {
            // Skip subresources like "pods/status".
            if res.name.contains('/') {
                continue;
            }
            let full_kind = if group.is_empty() {
                res.kind.clone()
            } else {
                format!("{group}.{}", res.kind)
            };
            let descriptor = KindDescriptor {
                plural: res.name,
                group: group.to_string(),
                version: version.to_string(),
                namespaced: res.namespaced,
                api_prefix: api_prefix.to_string(),
                verbs: res.verbs,
            };
            if let Err(err) = registry.put_kind(&res.kind, &full_kind, descriptor) {
                tracing::warn!(full_kind = full_kind.as_str(), error = %err, "failed to register discovered kind");
            }
        }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let body: Value = self.executor.do_get(url).await?;
        serde_json::from_value(body).map_err(Error::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockExecutor;
    use serde_json::json;

    fn core_v1_list() -> Value {
        json!({
            "groupVersion": "v1",
            "resources": [
                {"name": "pods", "kind": "Pod", "namespaced": true, "verbs": ["get", "list", "watch"]},
                {"name": "nodes", "kind": "Node", "namespaced": false, "verbs": ["get", "list"]},
                {"name": "pods/status", "kind": "Pod", "namespaced": true, "verbs": ["get", "update"]},
            ]
        })
    }

    #[tokio::test]
    async fn full_discovery_registers_core_and_grouped_kinds() {
        let master = "https://host:6443";
        let mock = MockExecutor::new();
        mock.set_json(format!("{master}/api"), json!({"versions": ["v1"]}));
        mock.set_json(format!("{master}/api/v1"), core_v1_list());
        mock.set_json(
            format!("{master}/apis"),
            json!({
                "groups": [
                    {"name": "apps", "preferredVersion": {"version": "v1"}}
                ]
            }),
        );
        mock.set_json(
            format!("{master}/apis/apps/v1"),
            json!({
                "groupVersion": "apps/v1",
                "resources": [
                    {"name": "deployments", "kind": "Deployment", "namespaced": true, "verbs": ["get", "list", "watch"]},
                ]
            }),
        );

        let registry = Registry::new();
        let analyzer = Analyzer::new(master, Arc::new(mock));
        analyzer.run(&registry).await.unwrap();

        assert_eq!(registry.full_kind_of("Pod").unwrap(), "Pod");
        let pod = registry.descriptor("Pod").unwrap();
        assert_eq!(pod.plural, "pods");
        assert_eq!(pod.api_prefix, "https://host:6443/api/v1");
        assert!(pod.namespaced);

        // subresource skipped
        assert_eq!(registry.full_kinds().iter().filter(|fk| *fk == "Pod").count(), 1);

        let dep = registry.descriptor("apps.Deployment").unwrap();
        assert_eq!(dep.plural, "deployments");
        assert_eq!(dep.api_prefix, "https://host:6443/apis/apps/v1");
    }

    #[tokio::test]
    async fn targeted_discovery_registers_a_single_group_version() {
        let master = "https://host:6443";
        let mock = MockExecutor::new();
        mock.set_json(
            format!("{master}/apis/example.com/v1"),
            json!({
                "groupVersion": "example.com/v1",
                "resources": [
                    {"name": "crontabs", "kind": "CronTab", "namespaced": true, "verbs": ["get", "list", "watch"]},
                ]
            }),
        );

        let registry = Registry::new();
        let analyzer = Analyzer::new(master, Arc::new(mock));
        analyzer
            .discover_group_version(&registry, "example.com", "v1")
            .await
            .unwrap();

        let d = registry.descriptor("example.com.CronTab").unwrap();
        assert_eq!(d.plural, "crontabs");
        assert_eq!(d.api_prefix, "https://host:6443/apis/example.com/v1");
    }
}
