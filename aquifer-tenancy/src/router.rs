//! Multi-tenant routing data source.
//!
//! [`MultiTenantDataSource`] resolves the current tenant on every call,
//! lazily builds and caches one concrete data source per tenant identity,
//! and forwards all connection acquisition to the cached instance. Cache
//! entries persist until reset or until the router is closed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use aquifer_core::datasource::{Connection, DataSource, DataSourceError};

use crate::strategy::{AmbientStrategies, TenantDataSourceProvider, TenantKey, TenantResolver};

/// Tenant routing errors.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("failed to resolve tenant data source: missing tenant resolver")]
    MissingResolver,

    #[error("failed to resolve tenant data source: missing tenant data source provider")]
    MissingProvider,

    /// The provider answered with no data source for the tenant.
    #[error("tenant data source provider returned no data source for tenant [{tenant}]")]
    NoDataSource { tenant: TenantKey },

    #[error("tenant data source provider failed for tenant [{tenant}]")]
    Provider {
        tenant: TenantKey,
        #[source]
        source: DataSourceError,
    },

    #[error("failed to acquire connection for tenant [{tenant}]")]
    Connection {
        tenant: TenantKey,
        #[source]
        source: DataSourceError,
    },

    /// One or more cached data sources failed to close. Every cause is
    /// listed; closing was still attempted for every cached instance.
    #[error("failed to close tenant data sources: {}", causes.join("; "))]
    Close { causes: Vec<String> },
}

type TenantCell = Arc<OnceCell<Arc<dyn DataSource>>>;

/// A data source that routes every connection request to a per-tenant
/// concrete data source.
///
/// The per-tenant cache populates atomically: concurrent first access for
/// the same tenant results in exactly one provider invocation, and all
/// callers share the resulting instance. A failed build is not cached, so
/// the next call retries. Distinct tenants never block each other.
pub struct MultiTenantDataSource {
    resolver: Option<Arc<dyn TenantResolver>>,
    provider: Option<Arc<dyn TenantDataSourceProvider>>,
    ambient: AmbientStrategies,
    entries: RwLock<HashMap<TenantKey, TenantCell>>,
}

impl MultiTenantDataSource {
    /// Start building a router.
    pub fn builder() -> MultiTenantDataSourceBuilder {
        MultiTenantDataSourceBuilder::new()
    }

    /// Acquire a connection for the current tenant.
    pub async fn get_connection(&self) -> Result<Box<dyn Connection>, RoutingError> {
        let (tenant, data_source) = self.current_data_source().await?;
        data_source
            .connection()
            .await
            .map_err(|source| RoutingError::Connection { tenant, source })
    }

    /// Acquire a connection for the current tenant using explicit
    /// credentials.
    pub async fn get_connection_with(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn Connection>, RoutingError> {
        let (tenant, data_source) = self.current_data_source().await?;
        data_source
            .connection_with(username, password)
            .await
            .map_err(|source| RoutingError::Connection { tenant, source })
    }

    /// Clear every cached tenant entry. Subsequent calls rebuild lazily.
    pub fn reset(&self) {
        self.entries.write().clear();
    }

    /// Clear the entry for one tenant (`None` clears the "no tenant"
    /// entry).
    pub fn reset_tenant(&self, tenant_id: Option<&str>) {
        self.entries.write().remove(&TenantKey::from_id(tenant_id));
    }

    /// Close every cached data source.
    ///
    /// All cached instances are attempted; failures are accumulated and
    /// reported as a single [`RoutingError::Close`] listing each cause.
    pub async fn close(&self) -> Result<(), RoutingError> {
        let cached: Vec<(TenantKey, Arc<dyn DataSource>)> = self
            .entries
            .read()
            .iter()
            .filter_map(|(tenant, cell)| cell.get().map(|ds| (tenant.clone(), Arc::clone(ds))))
            .collect();

        let mut causes = Vec::new();
        for (tenant, data_source) in cached {
            if let Err(err) = data_source.close().await {
                warn!(tenant = %tenant, error = %err, "failed to close tenant data source");
                causes.push(format!("[{tenant}] {err}"));
            }
        }

        if causes.is_empty() {
            Ok(())
        } else {
            Err(RoutingError::Close { causes })
        }
    }

    /// Resolve the current tenant and return its cached (or freshly
    /// built) data source.
    async fn current_data_source(
        &self,
    ) -> Result<(TenantKey, Arc<dyn DataSource>), RoutingError> {
        let resolver = self
            .resolver
            .clone()
            .or_else(|| self.ambient.resolver())
            .ok_or(RoutingError::MissingResolver)?;
        let tenant = TenantKey::from_id(resolver.current_tenant_id().as_deref());
        debug!(tenant = %tenant, "resolving tenant data source");

        let provider = self
            .provider
            .clone()
            .or_else(|| self.ambient.provider())
            .ok_or(RoutingError::MissingProvider)?;

        let cell = self.entry_cell(&tenant);
        let data_source = cell
            .get_or_try_init(|| async {
                match provider.data_source_for(tenant.tenant_id()).await {
                    Ok(Some(data_source)) => Ok(data_source),
                    Ok(None) => Err(RoutingError::NoDataSource {
                        tenant: tenant.clone(),
                    }),
                    Err(source) => Err(RoutingError::Provider {
                        tenant: tenant.clone(),
                        source,
                    }),
                }
            })
            .await?;

        Ok((tenant.clone(), Arc::clone(data_source)))
    }

    /// Fetch or insert the per-tenant cell. The lock is never held across
    /// an await; population happens on the cell itself so distinct tenants
    /// do not block each other.
    fn entry_cell(&self, tenant: &TenantKey) -> TenantCell {
        if let Some(cell) = self.entries.read().get(tenant) {
            return Arc::clone(cell);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(tenant.clone()).or_default())
    }
}

#[async_trait]
impl DataSource for MultiTenantDataSource {
    async fn connection(&self) -> Result<Box<dyn Connection>, DataSourceError> {
        self.get_connection()
            .await
            .map_err(|err| DataSourceError::Connection(err.to_string()))
    }

    async fn connection_with(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn Connection>, DataSourceError> {
        self.get_connection_with(username, password)
            .await
            .map_err(|err| DataSourceError::Connection(err.to_string()))
    }

    async fn close(&self) -> Result<(), DataSourceError> {
        MultiTenantDataSource::close(self)
            .await
            .map_err(|err| DataSourceError::Close(err.to_string()))
    }
}

/// Builder for [`MultiTenantDataSource`].
#[derive(Default)]
pub struct MultiTenantDataSourceBuilder {
    resolver: Option<Arc<dyn TenantResolver>>,
    provider: Option<Arc<dyn TenantDataSourceProvider>>,
    ambient: AmbientStrategies,
}

impl MultiTenantDataSourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tenant resolution strategy.
    pub fn resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the tenant data source provisioning strategy.
    pub fn provider(mut self, provider: Arc<dyn TenantDataSourceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the fallback strategies consulted when no explicit resolver or
    /// provider was given.
    pub fn ambient(mut self, ambient: AmbientStrategies) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn build(self) -> MultiTenantDataSource {
        MultiTenantDataSource {
            resolver: self.resolver,
            provider: self.provider,
            ambient: self.ambient,
            entries: RwLock::new(HashMap::new()),
        }
    }
}
