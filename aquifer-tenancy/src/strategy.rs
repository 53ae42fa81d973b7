//! Tenant resolution and provisioning strategies.
//!
//! The router is driven by two injected strategies: a [`TenantResolver`]
//! that identifies the tenant behind the current call, and a
//! [`TenantDataSourceProvider`] that supplies the data source for a tenant
//! id (typically by delegating to the aquifer-core provisioning pipeline
//! with a tenant-bound configuration).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use aquifer_core::datasource::{DataSource, DataSourceError};

/// Resolves the tenant id behind the current call.
///
/// Implementations read call context (task-local state, request metadata
/// propagated by the host) and must not block.
pub trait TenantResolver: Send + Sync {
    /// The current tenant id, or `None` when no tenant applies.
    fn current_tenant_id(&self) -> Option<String>;
}

impl<F> TenantResolver for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_tenant_id(&self) -> Option<String> {
        self()
    }
}

/// [`TenantResolver`] that always answers with the same tenant id.
pub struct FixedTenantResolver {
    tenant_id: Option<String>,
}

impl FixedTenantResolver {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
        }
    }

    /// Resolver for the "no tenant" case.
    pub fn none() -> Self {
        Self { tenant_id: None }
    }
}

impl TenantResolver for FixedTenantResolver {
    fn current_tenant_id(&self) -> Option<String> {
        self.tenant_id.clone()
    }
}

/// Supplies the data source for a resolved tenant id.
///
/// `tenant_id` is `None` for the "no tenant" case. Returning `Ok(None)`
/// means no data source exists for the tenant; the router surfaces this as
/// a routing error without caching the miss.
#[async_trait]
pub trait TenantDataSourceProvider: Send + Sync {
    async fn data_source_for(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Option<Arc<dyn DataSource>>, DataSourceError>;
}

/// Explicitly injected fallback strategies, consulted when the router has
/// no strategy of its own. Replaces ambient global lookup: the host passes
/// the bundle at construction time.
#[derive(Clone, Default)]
pub struct AmbientStrategies {
    resolver: Option<Arc<dyn TenantResolver>>,
    provider: Option<Arc<dyn TenantDataSourceProvider>>,
}

impl AmbientStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn TenantDataSourceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn resolver(&self) -> Option<Arc<dyn TenantResolver>> {
        self.resolver.clone()
    }

    pub fn provider(&self) -> Option<Arc<dyn TenantDataSourceProvider>> {
        self.provider.clone()
    }
}

/// Cache key for a tenant identity. The "no tenant" sentinel is a
/// distinct variant and can never collide with a real tenant id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantKey {
    Tenant(String),
    NoTenant,
}

impl TenantKey {
    /// Build a key from a resolved tenant id.
    pub fn from_id(tenant_id: Option<&str>) -> Self {
        match tenant_id {
            Some(id) => TenantKey::Tenant(id.to_string()),
            None => TenantKey::NoTenant,
        }
    }

    /// The tenant id behind this key, or `None` for the sentinel.
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TenantKey::Tenant(id) => Some(id),
            TenantKey::NoTenant => None,
        }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantKey::Tenant(id) => f.write_str(id),
            TenantKey::NoTenant => f.write_str("<no tenant>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_key_sentinel_is_distinct() {
        assert_ne!(TenantKey::from_id(Some("t1")), TenantKey::NoTenant);
        assert_ne!(
            TenantKey::from_id(Some("<no tenant>")),
            TenantKey::NoTenant
        );
        assert_eq!(TenantKey::from_id(None), TenantKey::NoTenant);
    }

    #[test]
    fn test_tenant_key_round_trips_id() {
        assert_eq!(TenantKey::from_id(Some("t1")).tenant_id(), Some("t1"));
        assert_eq!(TenantKey::NoTenant.tenant_id(), None);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = || Some("closure-tenant".to_string());
        assert_eq!(
            TenantResolver::current_tenant_id(&resolver),
            Some("closure-tenant".to_string())
        );
    }

    #[test]
    fn test_fixed_resolver() {
        assert_eq!(
            FixedTenantResolver::new("t1").current_tenant_id(),
            Some("t1".to_string())
        );
        assert_eq!(FixedTenantResolver::none().current_tenant_id(), None);
    }
}
