//! Pure `(Registry, inputs) -> URL` construction, with no I/O of its own.
//!
//! Every operation either resolves a kind against the [`Registry`] and formats the
//! corresponding path, or fails with [`Error::UnknownKind`] /
//! [`Error::AmbiguousKind`] / [`Error::InvalidArgument`].
use serde_json::Value;

use crate::{
    error::{Error, Result},
    registry::{KindDescriptor, Registry},
};

const WATCH_SUFFIX: &str = "?watch=true&timeoutSeconds=315360000";

/// Optional query parameters for [`Convertor::list_url`].
///
/// Concatenated in a fixed order: `kind=`, `limit=`, `continue=`, `fieldSelector=`,
/// `labelSelector=`. `kind=` is only appended when [`ListOptions::with_kind_param`]
/// has been set, since it is not required by upstream Kubernetes (see Open Question
/// in the design notes).
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    limit: Option<u32>,
    continue_token: Option<String>,
    field_selector: Option<String>,
    label_selector: Option<String>,
    with_kind_param: bool,
}

impl ListOptions {
    /// Start from defaults (no query parameters at all).
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of items returned per page.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume a previous paged list using its continuation token.
    #[must_use]
    pub fn continue_token(mut self, token: impl Into<String>) -> Self {
        self.continue_token = Some(token.into());
        self
    }

    /// Restrict the list by field selector expression.
    #[must_use]
    pub fn field_selector(mut self, expr: impl Into<String>) -> Self {
        self.field_selector = Some(expr.into());
        self
    }

    /// Restrict the list by label selector expression.
    #[must_use]
    pub fn label_selector(mut self, expr: impl Into<String>) -> Self {
        self.label_selector = Some(expr.into());
        self
    }

    /// Append a redundant `kind=` query parameter, matching the source client's
    /// (non-upstream-required) behavior. Off by default.
    #[must_use]
    pub fn with_kind_param(mut self, enabled: bool) -> Self {
        self.with_kind_param = enabled;
        self
    }
}

/// Pure URL builder over a [`Registry`].
///
/// `Convertor` borrows the registry for the lifetime of each call; it holds no state
/// of its own and performs no I/O.
pub struct Convertor<'r> {
    registry: &'r Registry,
}

impl<'r> Convertor<'r> {
    /// Wrap a registry reference for URL construction.
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolve a caller-supplied kind string to a fullKind.
    ///
    /// A kind containing `.` is already a fullKind; anything else is treated as a
    /// shortKind and resolved through the registry.
    pub fn resolve_full_kind(&self, kind: &str) -> Result<String> {
        if kind.is_empty() {
            return Err(Error::invalid_argument("kind must not be empty"));
        }
        if kind.contains('.') {
            Ok(kind.to_string())
        } else {
            self.registry.full_kind_of(kind)
        }
    }

    fn descriptor_for(&self, kind: &str) -> Result<KindDescriptor> {
        let full_kind = self.resolve_full_kind(kind)?;
        self.registry.descriptor(&full_kind)
    }

    fn ns_segment(namespaced: bool, ns: &str) -> String {
        if namespaced && !ns.is_empty() {
            format!("/namespaces/{ns}")
        } else {
            String::new()
        }
    }

    fn require_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_argument("resource name must not be empty"));
        }
        Ok(())
    }

    /// URL for creating a new instance of `kind` in `ns` (POST target; body is the
    /// caller's JSON document).
    pub fn create_url(&self, kind: &str, ns: &str) -> Result<String> {
        let d = self.descriptor_for(kind)?;
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!("{}{}/{}", d.api_prefix, nss, d.plural))
    }

    /// URL for creating a new instance, inferring kind/namespace from a JSON document's
    /// `apiVersion`/`kind`/`metadata`.
    ///
    /// `apiVersion` is parsed directly (without consulting the registry) to build the
    /// group/version portion of the prefix and the fullKind: `group/version` ->
    /// `/apis/<group>/<version>` and `"<group>.<kind>"`; a bare version -> `/api/<version>`
    /// and the bare kind. Only the origin (scheme/host/port) is recovered from the
    /// registry's descriptor, since the document itself carries no host; the
    /// group/version the document names always wins over whatever version the registry
    /// happens to have that fullKind registered under. Plural/namespaced still come from
    /// the registry, keyed by that fullKind.
    pub fn create_url_from_doc(&self, doc: &Value) -> Result<String> {
        let (full_kind, prefix_hint) = full_kind_from_doc(doc)?;
        let ns = doc
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let d = self.registry.descriptor(&full_kind)?;
        let origin = api_prefix_origin(&d);
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!("{origin}{prefix_hint}{nss}/{}", d.plural))
    }

    /// URL for `GET`, `PUT` (update), or `DELETE` of a single named instance.
    pub fn instance_url(&self, kind: &str, ns: &str, name: &str) -> Result<String> {
        Self::require_name(name)?;
        let d = self.descriptor_for(kind)?;
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!("{}{}/{}/{}", d.api_prefix, nss, d.plural, name))
    }

    /// Alias of [`Self::instance_url`] for a `GET`.
    pub fn get_url(&self, kind: &str, ns: &str, name: &str) -> Result<String> {
        self.instance_url(kind, ns, name)
    }

    /// Alias of [`Self::instance_url`] for a `PUT` (update).
    pub fn update_url(&self, kind: &str, ns: &str, name: &str) -> Result<String> {
        self.instance_url(kind, ns, name)
    }

    /// Alias of [`Self::instance_url`] for a `DELETE`.
    pub fn delete_url(&self, kind: &str, ns: &str, name: &str) -> Result<String> {
        self.instance_url(kind, ns, name)
    }

    /// URL for listing (or watching, see [`Self::watch_all_url`]) the collection of `kind`.
    pub fn list_url(&self, kind: &str, ns: &str, opts: &ListOptions) -> Result<String> {
        let d = self.descriptor_for(kind)?;
        let nss = Self::ns_segment(d.namespaced, ns);
        let base = format!("{}{}/{}", d.api_prefix, nss, d.plural);

        let mut qp = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        if opts.with_kind_param {
            qp.append_pair("kind", kind);
            any = true;
        }
        if let Some(limit) = opts.limit.filter(|l| *l > 0) {
            qp.append_pair("limit", &limit.to_string());
            any = true;
        }
        if let Some(token) = &opts.continue_token {
            qp.append_pair("continue", token);
            any = true;
        }
        if let Some(fs) = &opts.field_selector {
            qp.append_pair("fieldSelector", fs);
            any = true;
        }
        if let Some(ls) = &opts.label_selector {
            qp.append_pair("labelSelector", ls);
            any = true;
        }

        if any {
            Ok(format!("{base}?{}", qp.finish()))
        } else {
            Ok(base)
        }
    }

    /// URL for `PUT`ting the `/status` subresource of a named instance.
    pub fn update_status_url(&self, kind: &str, ns: &str, name: &str) -> Result<String> {
        Self::require_name(name)?;
        let d = self.descriptor_for(kind)?;
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!("{}{}/{}/{}/status", d.api_prefix, nss, d.plural, name))
    }

    /// URL for `POST`ing a `Binding` document that assigns `pod_name` to `host`.
    ///
    /// Always resolved against the core `Pod` kind; `ns` follows the same namespace
    /// segment policy as every other operation.
    pub fn binding_url(&self, ns: &str, pod_name: &str) -> Result<String> {
        Self::require_name(pod_name)?;
        let d = self.descriptor_for("Pod")?;
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!("{}{}/pods/{}/binding", d.api_prefix, nss, pod_name))
    }

    /// URL for watching a single named instance of `kind`.
    pub fn watch_one_url(&self, kind: &str, ns: &str, name: &str) -> Result<String> {
        Self::require_name(name)?;
        let d = self.descriptor_for(kind)?;
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!(
            "{}/watch{}/{}/{}{}",
            d.api_prefix, nss, d.plural, name, WATCH_SUFFIX
        ))
    }

    /// URL for watching every instance of `kind` in `ns` (or, if `ns` is empty and the
    /// kind is namespaced, all namespaces).
    pub fn watch_all_url(&self, kind: &str, ns: &str) -> Result<String> {
        let d = self.descriptor_for(kind)?;
        let nss = Self::ns_segment(d.namespaced, ns);
        Ok(format!("{}/watch{}/{}{}", d.api_prefix, nss, d.plural, WATCH_SUFFIX))
    }
}

/// Recover the origin (scheme/host/port) a [`KindDescriptor`]'s `api_prefix` was built
/// on top of, by stripping the `/api/<version>` or `/apis/<group>/<version>` suffix the
/// [`Analyzer`](crate::discovery) appended to the master URL for that same descriptor.
fn api_prefix_origin(d: &KindDescriptor) -> &str {
    let registered_suffix = if d.group.is_empty() {
        format!("/api/{}", d.version)
    } else {
        format!("/apis/{}/{}", d.group, d.version)
    };
    d.api_prefix.strip_suffix(registered_suffix.as_str()).unwrap_or(&d.api_prefix)
}

/// Parse `apiVersion`/`kind` off a resource document into a fullKind and the
/// `/api/<v>` or `/apis/<g>/<v>` prefix it implies, without consulting a [`Registry`].
///
/// Used by [`Convertor::create_url_from_doc`] and by the [`Analyzer`](crate::discovery)
/// when registering kinds discovered from `/apis/<group>/<version>`.
pub fn full_kind_from_doc(doc: &Value) -> Result<(String, String)> {
    let api_version = doc
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("document is missing apiVersion"))?;
    let kind = doc
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("document is missing kind"))?;

    Ok(match api_version.split_once('/') {
        Some((group, version)) => (format!("{group}.{kind}"), format!("/apis/{group}/{version}")),
        None => (kind.to_string(), format!("/api/{api_version}")),
    })
}
