//! The Registry ("RuleBase"): an in-memory index mapping short and fully-qualified
//! resource kinds to their API group, version, plural name, namespaced flag,
//! HTTP prefix, and supported verbs.
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Everything the [`Convertor`](crate::convertor) needs to know about one fullKind.
///
/// One `KindDescriptor` exists per fullKind. Multiple fullKinds may share a shortKind
/// (e.g. `Ingress` is served by more than one API group), so lookups from a shortKind
/// go through [`Registry::full_kind_of`] first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDescriptor {
    /// URL segment for the resource collection, e.g. `pods`. Always lowercase, non-empty.
    pub plural: String,
    /// API group, empty string for the core group.
    pub group: String,
    /// API version, e.g. `v1`, `v1beta1`.
    pub version: String,
    /// Whether the resource is namespace-scoped.
    pub namespaced: bool,
    /// Absolute base URL up to and including `/api/v1` or `/apis/<group>/<version>`.
    /// Never ends with a trailing slash.
    pub api_prefix: String,
    /// Verbs the API server advertised for this resource (`get`, `list`, `watch`, ...).
    pub verbs: Vec<String>,
}

impl KindDescriptor {
    fn validate(&self, full_kind: &str) -> Result<()> {
        if self.plural.is_empty() || self.plural != self.plural.to_ascii_lowercase() {
            return Err(Error::invalid_argument(format!(
                "descriptor for {full_kind} has invalid plural {:?}",
                self.plural
            )));
        }
        if self.api_prefix.ends_with('/') {
            return Err(Error::invalid_argument(format!(
                "descriptor for {full_kind} has a trailing slash in api_prefix"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    short_to_full: HashMap<String, Vec<String>>,
    descriptors: HashMap<String, KindDescriptor>,
}

/// The in-memory index of known resource kinds.
///
/// Entries are created by the [`Analyzer`](crate::discovery) at construction time and by the
/// [CRD bootstrap watcher](crate::crd_watch) as CRDs come and go; between those events the
/// Registry is read-only from the perspective of the [`Convertor`](crate::convertor) and the
/// [`Facade`](crate::client).
///
/// All reads and writes go through a single [`parking_lot::RwLock`] guarding both maps
/// together, so a reader can never observe the shortKind list and the descriptor map in two
/// different generations (invariants I1/I2).
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently insert (or replace) the descriptor for `full_kind`, and make sure
    /// `short_kind` lists it.
    pub fn put_kind(&self, short_kind: &str, full_kind: &str, descriptor: KindDescriptor) -> Result<()> {
        descriptor.validate(full_kind)?;
        let mut state = self.state.write();
        state.descriptors.insert(full_kind.to_string(), descriptor);
        let entries = state.short_to_full.entry(short_kind.to_string()).or_default();
        if !entries.iter().any(|fk| fk == full_kind) {
            entries.push(full_kind.to_string());
        }
        Ok(())
    }

    /// Remove `full_kind` from every map (I4). No-op if it was not present.
    ///
    /// If this was the last fullKind registered under `short_kind`, the shortKind entry
    /// itself is removed too.
    pub fn remove_full_kind(&self, short_kind: &str, full_kind: &str) {
        let mut state = self.state.write();
        state.descriptors.remove(full_kind);
        if let Some(entries) = state.short_to_full.get_mut(short_kind) {
            entries.retain(|fk| fk != full_kind);
            if entries.is_empty() {
                state.short_to_full.remove(short_kind);
            }
        }
    }

    /// Resolve a shortKind to its unique fullKind.
    ///
    /// Fails with [`Error::UnknownKind`] if nothing is registered, or
    /// [`Error::AmbiguousKind`] if more than one fullKind shares this shortKind.
    pub fn full_kind_of(&self, short_kind: &str) -> Result<String> {
        let state = self.state.read();
        match state.short_to_full.get(short_kind).map(Vec::as_slice) {
            None | Some([]) => Err(Error::UnknownKind(short_kind.to_string())),
            Some([single]) => Ok(single.clone()),
            Some(candidates) => Err(Error::AmbiguousKind {
                kind: short_kind.to_string(),
                candidates: candidates.to_vec(),
            }),
        }
    }

    /// Look up the descriptor for an already-resolved fullKind.
    pub fn descriptor(&self, full_kind: &str) -> Result<KindDescriptor> {
        self.state
            .read()
            .descriptors
            .get(full_kind)
            .cloned()
            .ok_or_else(|| Error::UnknownKind(full_kind.to_string()))
    }

    /// All known shortKinds (`getKinds()`).
    pub fn short_kinds(&self) -> Vec<String> {
        self.state.read().short_to_full.keys().cloned().collect()
    }

    /// All known fullKinds (`getFullKinds()`).
    pub fn full_kinds(&self) -> Vec<String> {
        self.state.read().descriptors.keys().cloned().collect()
    }

    /// A snapshot of every fullKind's descriptor (`getKindDesc()`).
    pub fn kind_descriptors(&self) -> HashMap<String, KindDescriptor> {
        self.state.read().descriptors.clone()
    }

    /// Number of registered fullKinds. Mostly useful for tests.
    pub fn len(&self) -> usize {
        self.state.read().descriptors.len()
    }

    /// Whether the registry holds no kinds at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
