//! Data source provisioning pipeline.
//!
//! [`DataSourceProvisioner`] resolves a data source type from a
//! configuration property set, locates a factory (explicit registrations
//! first, scope discovery second), builds the data source and runs every
//! post-processor over it. [`DataSourceBuilder`] is the direct fluent
//! entry point, which additionally runs initialization SQL scripts against
//! the freshly built data source.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{DataSourceConfig, DataSourceConfigBuilder, DatabasePlatform};
use crate::datasource::DataSource;
use crate::error::{ConfigurationError, InitializationError, ProvisionError};
use crate::factory::{DataSourceFactory, DataSourcePostProcessor, TYPE_JNDI};
use crate::registry::{DiscoveryScope, ScopeRegistry};
use crate::script::execute_script;

/// Provisions data sources from configuration property sets.
///
/// Explicitly registered factories and post-processors always take
/// precedence over scope-discovered ones and are never removed by
/// re-discovery. Registered instances are shared, read-only collaborators
/// across all provisioning calls.
pub struct DataSourceProvisioner {
    registry: Arc<ScopeRegistry>,
    factories: RwLock<HashMap<String, Arc<dyn DataSourceFactory>>>,
    post_processors: RwLock<Vec<Arc<dyn DataSourcePostProcessor>>>,
}

impl Default for DataSourceProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSourceProvisioner {
    /// Create a provisioner with its own private scope registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ScopeRegistry::new()))
    }

    /// Create a provisioner sharing an existing scope registry.
    pub fn with_registry(registry: Arc<ScopeRegistry>) -> Self {
        Self {
            registry,
            factories: RwLock::new(HashMap::new()),
            post_processors: RwLock::new(Vec::new()),
        }
    }

    /// The scope registry backing discovery for this provisioner.
    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    /// Explicitly register a factory for its declared type name.
    ///
    /// Replaces any previously registered factory for the same type. A
    /// factory with no type name is ignored.
    pub fn register_factory(&self, factory: Arc<dyn DataSourceFactory>) {
        let type_name = factory.data_source_type().to_string();
        if type_name.trim().is_empty() {
            warn!("ignoring data source factory registration with no type name");
            return;
        }
        self.factories.write().insert(type_name, factory);
    }

    /// Explicitly register a post-processor. Registration order is
    /// preserved; the same instance is never registered twice.
    pub fn register_post_processor(&self, post_processor: Arc<dyn DataSourcePostProcessor>) {
        let mut post_processors = self.post_processors.write();
        if !post_processors.iter().any(|p| Arc::ptr_eq(p, &post_processor)) {
            post_processors.push(post_processor);
        }
    }

    /// Build a data source from the given configuration.
    ///
    /// Type resolution order: a non-blank `jndi-name` property forces the
    /// reserved [`TYPE_JNDI`] type (a conflicting explicit type fails
    /// before any factory is consulted); otherwise the explicit `type`
    /// property; otherwise the scope default. Without a scope, a missing
    /// explicit type is a configuration error.
    pub async fn build(
        &self,
        scope: Option<&dyn DiscoveryScope>,
        config: &DataSourceConfig,
    ) -> Result<Arc<dyn DataSource>, ConfigurationError> {
        let type_name = self.resolve_type(scope, config)?;
        debug!(type_name = %type_name, data_context_id = config.data_context_id(), "building data source");

        let factory = self
            .factories
            .read()
            .get(&type_name)
            .cloned()
            .or_else(|| scope.and_then(|s| self.registry.factory(s, &type_name)))
            .ok_or_else(|| ConfigurationError::UnknownType {
                type_name: type_name.clone(),
                data_context_id: config.data_context_id().map(str::to_string),
            })?;

        let data_source = factory.build(config).await?;

        // explicitly registered post-processors run first, in registration
        // order; discovered ones follow in priority order
        let explicit: Vec<_> = self.post_processors.read().clone();
        for post_processor in explicit {
            post_processor
                .post_process(&data_source, &type_name, config)
                .await?;
        }
        if let Some(scope) = scope {
            for post_processor in self.registry.post_processors(scope) {
                post_processor
                    .post_process(&data_source, &type_name, config)
                    .await?;
            }
        }

        Ok(data_source)
    }

    fn resolve_type(
        &self,
        scope: Option<&dyn DiscoveryScope>,
        config: &DataSourceConfig,
    ) -> Result<String, ConfigurationError> {
        let explicit = config.type_name().filter(|t| !t.trim().is_empty());

        if config
            .jndi_name()
            .is_some_and(|name| !name.trim().is_empty())
        {
            if let Some(explicit) = explicit {
                if explicit != TYPE_JNDI {
                    return Err(ConfigurationError::JndiTypeConflict {
                        type_name: explicit.to_string(),
                    });
                }
            }
            return Ok(TYPE_JNDI.to_string());
        }

        if let Some(explicit) = explicit {
            return Ok(explicit.to_string());
        }

        match scope {
            Some(scope) => Ok(self.registry.default_type(scope)),
            None => Err(ConfigurationError::MissingType {
                data_context_id: config.data_context_id().map(str::to_string),
            }),
        }
    }
}

enum ScriptSource {
    Inline(String),
    File(PathBuf),
}

/// Direct fluent builder: configuration, provisioning and initialization
/// scripts in one call chain.
///
/// ```rust,ignore
/// let data_source = DataSourceBuilder::new()
///     .url("postgres://localhost/app")
///     .username("app")
///     .with_init_script("CREATE TABLE users (id INT); INSERT INTO users VALUES (1);")
///     .build_with(&provisioner, Some(&scope))
///     .await?;
/// ```
pub struct DataSourceBuilder {
    config: DataSourceConfigBuilder,
    scripts: Vec<ScriptSource>,
}

impl Default for DataSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSourceBuilder {
    pub fn new() -> Self {
        Self {
            config: DataSourceConfigBuilder::new(),
            scripts: Vec::new(),
        }
    }

    pub fn data_context_id(mut self, id: impl Into<String>) -> Self {
        self.config = self.config.data_context_id(id);
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.config = self.config.type_name(type_name);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.name(name);
        self
    }

    pub fn driver_class_name(mut self, driver_class_name: impl Into<String>) -> Self {
        self.config = self.config.driver_class_name(driver_class_name);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.url(url);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config = self.config.username(username);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config = self.config.password(password);
        self
    }

    pub fn platform(mut self, platform: DatabasePlatform) -> Self {
        self.config = self.config.platform(platform);
        self
    }

    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.config = self.config.auto_commit(auto_commit);
        self
    }

    pub fn min_pool_size(mut self, min_pool_size: u32) -> Self {
        self.config = self.config.min_pool_size(min_pool_size);
        self
    }

    pub fn max_pool_size(mut self, max_pool_size: u32) -> Self {
        self.config = self.config.max_pool_size(max_pool_size);
        self
    }

    pub fn validation_query(mut self, validation_query: impl Into<String>) -> Self {
        self.config = self.config.validation_query(validation_query);
        self
    }

    pub fn jndi_name(mut self, jndi_name: impl Into<String>) -> Self {
        self.config = self.config.jndi_name(jndi_name);
        self
    }

    /// Queue an inline SQL script to run against the built data source.
    /// Scripts run in the order they were added.
    pub fn with_init_script(mut self, sql: impl Into<String>) -> Self {
        self.scripts.push(ScriptSource::Inline(sql.into()));
        self
    }

    /// Queue a UTF-8 SQL script file to run against the built data source.
    pub fn with_init_script_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scripts.push(ScriptSource::File(path.into()));
        self
    }

    /// Provision the data source and run the queued initialization
    /// scripts. A script failure aborts the build: no data source is
    /// returned.
    pub async fn build_with(
        self,
        provisioner: &DataSourceProvisioner,
        scope: Option<&dyn DiscoveryScope>,
    ) -> Result<Arc<dyn DataSource>, ProvisionError> {
        let config = self.config.build();
        let data_source = provisioner.build(scope, &config).await?;

        for script in self.scripts {
            let sql = match script {
                ScriptSource::Inline(sql) => sql,
                ScriptSource::File(path) => tokio::fs::read_to_string(&path).await.map_err(
                    |source| ProvisionError::ScriptRead {
                        path: path.display().to_string(),
                        source,
                    },
                )?,
            };
            execute_script(data_source.as_ref(), &sql)
                .await
                .map_err(|source| InitializationError { source })?;
        }

        Ok(data_source)
    }
}
