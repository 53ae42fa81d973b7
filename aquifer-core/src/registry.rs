//! Scope-keyed factory and post-processor discovery.
//!
//! A [`DiscoveryScope`] is an opaque plugin-discovery boundary supplied by
//! the host (a module, an application unit, a test fixture). The
//! [`ScopeRegistry`] caches three artifacts per scope: the default data
//! source type, the type-to-factory mapping and the priority-ordered
//! post-processor list. Discovery runs at most once per scope; concurrent
//! first use serializes on a per-scope cell, and distinct scopes never
//! block each other. Cached scopes are evicted explicitly by the host
//! rather than by garbage-collection semantics, so long-running hosts own
//! the scope lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::factory::{DataSourceFactory, DataSourcePostProcessor, TYPE_BASIC, TYPE_DEADPOOL, TYPE_R2D2};

/// Default-type detection precedence. First pool the scope provides wins;
/// [`TYPE_BASIC`] is the fallback when none match.
const DEFAULT_TYPE_PRECEDENCE: [&str; 2] = [TYPE_DEADPOOL, TYPE_R2D2];

/// Opaque identity of a discovery scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        ScopeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A plugin-discovery boundary.
///
/// The scope enumerates the factories and post-processors reachable from
/// it and answers pool-availability probes for default-type detection.
/// Enumeration is invoked at most once per scope; results are cached by
/// the [`ScopeRegistry`].
pub trait DiscoveryScope: Send + Sync {
    /// Identity under which discovery results are cached.
    fn id(&self) -> ScopeId;

    /// Factories reachable from this scope, in discovery order.
    fn factories(&self) -> Vec<Arc<dyn DataSourceFactory>> {
        Vec::new()
    }

    /// Post-processors reachable from this scope, in discovery order.
    fn post_processors(&self) -> Vec<Arc<dyn DataSourcePostProcessor>> {
        Vec::new()
    }

    /// Whether the optional pooling backend identified by `type_name` is
    /// available in this scope.
    fn provides_pool(&self, type_name: &str) -> bool {
        let _ = type_name;
        false
    }
}

/// Ready-made [`DiscoveryScope`] backed by explicit lists.
#[derive(Default)]
pub struct StaticScope {
    id: String,
    factories: Vec<Arc<dyn DataSourceFactory>>,
    post_processors: Vec<Arc<dyn DataSourcePostProcessor>>,
    pools: Vec<String>,
}

impl StaticScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn DataSourceFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn with_post_processor(mut self, post_processor: Arc<dyn DataSourcePostProcessor>) -> Self {
        self.post_processors.push(post_processor);
        self
    }

    /// Mark a pooling backend as available for default-type detection.
    pub fn with_pool(mut self, type_name: impl Into<String>) -> Self {
        self.pools.push(type_name.into());
        self
    }
}

impl DiscoveryScope for StaticScope {
    fn id(&self) -> ScopeId {
        ScopeId::new(self.id.clone())
    }

    fn factories(&self) -> Vec<Arc<dyn DataSourceFactory>> {
        self.factories.clone()
    }

    fn post_processors(&self) -> Vec<Arc<dyn DataSourcePostProcessor>> {
        self.post_processors.clone()
    }

    fn provides_pool(&self, type_name: &str) -> bool {
        self.pools.iter().any(|p| p == type_name)
    }
}

/// Discovery artifacts derived once per scope.
struct ScopeArtifacts {
    default_type: String,
    factories: HashMap<String, Arc<dyn DataSourceFactory>>,
    post_processors: Vec<Arc<dyn DataSourcePostProcessor>>,
}

/// Per-scope cache of discovered factories, post-processors and the
/// default data source type.
#[derive(Default)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<ScopeId, Arc<OnceCell<Arc<ScopeArtifacts>>>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default data source type for the scope. Computed once per
    /// scope, idempotent across repeated and concurrent calls.
    pub fn default_type(&self, scope: &dyn DiscoveryScope) -> String {
        self.artifacts(scope).default_type.clone()
    }

    /// Look up the discovered factory bound to `type_name` in the scope.
    pub fn factory(
        &self,
        scope: &dyn DiscoveryScope,
        type_name: &str,
    ) -> Option<Arc<dyn DataSourceFactory>> {
        self.artifacts(scope).factories.get(type_name).cloned()
    }

    /// All discovered post-processors for the scope, priority-ordered.
    pub fn post_processors(&self, scope: &dyn DiscoveryScope) -> Vec<Arc<dyn DataSourcePostProcessor>> {
        self.artifacts(scope).post_processors.clone()
    }

    /// Drop the cached discovery results for a scope. The next use of the
    /// scope runs discovery again.
    pub fn evict(&self, id: &ScopeId) -> bool {
        self.scopes.write().remove(id).is_some()
    }

    fn artifacts(&self, scope: &dyn DiscoveryScope) -> Arc<ScopeArtifacts> {
        let cell = self.scope_cell(scope.id());
        // per-scope serialization: the first caller runs discovery, late
        // arrivals block on the cell rather than re-running it
        cell.get_or_init(|| Arc::new(Self::discover(scope))).clone()
    }

    fn scope_cell(&self, id: ScopeId) -> Arc<OnceCell<Arc<ScopeArtifacts>>> {
        if let Some(cell) = self.scopes.read().get(&id) {
            return Arc::clone(cell);
        }
        let mut scopes = self.scopes.write();
        Arc::clone(scopes.entry(id).or_default())
    }

    fn discover(scope: &dyn DiscoveryScope) -> ScopeArtifacts {
        let scope_id = scope.id();

        let default_type = DEFAULT_TYPE_PRECEDENCE
            .iter()
            .copied()
            .find(|type_name| scope.provides_pool(type_name))
            .unwrap_or(TYPE_BASIC)
            .to_string();
        debug!(scope = %scope_id, default_type = %default_type, "resolved default data source type");

        let mut ranked: Vec<(i32, usize, Arc<dyn DataSourceFactory>)> = scope
            .factories()
            .into_iter()
            .enumerate()
            .map(|(order, factory)| (factory.priority(), order, factory))
            .collect();
        ranked.sort_by_key(|(priority, order, _)| (*priority, *order));

        let mut factories: HashMap<String, Arc<dyn DataSourceFactory>> = HashMap::new();
        for (_, _, factory) in ranked {
            let type_name = factory.data_source_type().to_string();
            if type_name.trim().is_empty() {
                warn!(scope = %scope_id, "ignoring discovered data source factory with no type name");
                continue;
            }
            if !factories.contains_key(&type_name) {
                debug!(scope = %scope_id, type_name = %type_name, "registered discovered data source factory");
                factories.insert(type_name, factory);
            }
        }

        let mut post_processors = scope.post_processors();
        post_processors.sort_by_key(|p| p.priority());

        ScopeArtifacts {
            default_type,
            factories,
            post_processors,
        }
    }
}
