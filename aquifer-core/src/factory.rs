//! Data source factory and post-processor collaborator traits.
//!
//! Factories translate a configuration property set into a concrete
//! [`DataSource`] for exactly one symbolic type name. Post-processors run
//! over every freshly built data source, in priority order. Both are
//! registered as shared, stateless instances and must hold no mutable
//! state between calls.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DataSourceConfig;
use crate::datasource::DataSource;
use crate::error::ConfigurationError;

/// Built-in, non-pooled data source type name.
pub const TYPE_BASIC: &str = "basic";

/// Deadpool-backed data source type name.
pub const TYPE_DEADPOOL: &str = "deadpool";

/// r2d2-backed data source type name.
pub const TYPE_R2D2: &str = "r2d2";

/// Reserved type name triggering the externally implemented naming-service
/// lookup path instead of a registered factory.
pub const TYPE_JNDI: &str = "JNDI";

/// Priority assigned to factories and post-processors that do not declare
/// one. Lower values take precedence, so undeclared instances sort last.
pub const DEFAULT_PRIORITY: i32 = 10_000;

/// Builds a concrete data source from a configuration property set.
#[async_trait]
pub trait DataSourceFactory: Send + Sync {
    /// The symbolic type name this factory answers to.
    fn data_source_type(&self) -> &str;

    /// Discovery precedence. Lower values win; ties are resolved by
    /// discovery order.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Build a data source from the given configuration.
    async fn build(
        &self,
        config: &DataSourceConfig,
    ) -> Result<Arc<dyn DataSource>, ConfigurationError>;
}

/// Hook invoked against every data source after construction.
#[async_trait]
pub trait DataSourcePostProcessor: Send + Sync {
    /// Invocation order among discovered post-processors. Lower values
    /// run first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Configure the freshly built data source. An error aborts the
    /// provisioning pipeline: the data source is never returned
    /// half-configured.
    async fn post_process(
        &self,
        data_source: &Arc<dyn DataSource>,
        type_name: &str,
        config: &DataSourceConfig,
    ) -> Result<(), ConfigurationError>;
}
