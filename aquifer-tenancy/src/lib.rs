//! Multi-Tenant Data Source Routing for Aquifer
//!
//! Routes connection requests to the correct per-tenant data source based
//! on a caller-supplied tenant identity.
//!
//! # Features
//!
//! - **Tenant Resolution** - Injected strategy identifying the tenant
//!   behind every call
//! - **Lazy Per-Tenant Provisioning** - One data source per tenant, built
//!   on first use and cached
//! - **At-Most-Once Builds** - Concurrent first access results in exactly
//!   one provider invocation per tenant
//! - **Lifecycle Control** - Per-tenant and global reset, aggregate-error
//!   close
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aquifer_tenancy::prelude::*;
//!
//! let router = MultiTenantDataSource::builder()
//!     .resolver(Arc::new(my_resolver))
//!     .provider(Arc::new(my_provider))
//!     .build();
//!
//! // every call resolves the tenant and routes to its data source
//! let connection = router.get_connection().await?;
//!
//! // drop one tenant's cached data source; it rebuilds on next use
//! router.reset_tenant(Some("acme"));
//!
//! // close all cached data sources, collecting every failure
//! router.close().await?;
//! ```

pub mod router;
pub mod strategy;

pub use router::{MultiTenantDataSource, MultiTenantDataSourceBuilder, RoutingError};
pub use strategy::{
    AmbientStrategies, FixedTenantResolver, TenantDataSourceProvider, TenantKey, TenantResolver,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::router::{MultiTenantDataSource, RoutingError};
    pub use crate::strategy::{
        AmbientStrategies, TenantDataSourceProvider, TenantKey, TenantResolver,
    };
}
