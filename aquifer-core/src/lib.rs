//! Data Source Provisioning for Aquifer
//!
//! Builds database connection resources ("data sources") from declarative
//! configuration, with pluggable pool-backend factories, priority-ordered
//! post-processing and SQL initialization scripts.
//!
//! # Features
//!
//! - **Configuration Property Sets** - Typed, immutable, optionally bound
//!   to a data context id
//! - **Pluggable Factories** - One factory per symbolic type name,
//!   discovered per scope or registered explicitly
//! - **Post-Processors** - Priority-ordered hooks over every built data
//!   source
//! - **Scope-Keyed Discovery** - Plugin discovery cached once per
//!   host-managed scope
//! - **Init Scripts** - Quote- and comment-aware SQL statement splitting
//!   and execution
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aquifer_core::prelude::*;
//!
//! let provisioner = DataSourceProvisioner::new();
//! provisioner.register_factory(Arc::new(MyPoolFactory::new()));
//!
//! let data_source = DataSourceBuilder::new()
//!     .type_name("my-pool")
//!     .url("postgres://localhost/app")
//!     .username("app")
//!     .with_init_script("CREATE TABLE users (id INT);")
//!     .build_with(&provisioner, None)
//!     .await?;
//!
//! let mut connection = data_source.connection().await?;
//! connection.execute("INSERT INTO users VALUES (1)").await?;
//! ```

pub mod config;
pub mod datasource;
pub mod error;
pub mod factory;
pub mod provision;
pub mod registry;
pub mod script;

pub use config::{
    ConfigValue, DEFAULT_MAX_POOL_SIZE, DataSourceConfig, DataSourceConfigBuilder,
    DatabasePlatform,
};
pub use datasource::{Connection, DataSource, DataSourceError};
pub use error::{ConfigurationError, InitializationError, ProvisionError, ScriptError};
pub use factory::{
    DEFAULT_PRIORITY, DataSourceFactory, DataSourcePostProcessor, TYPE_BASIC, TYPE_DEADPOOL,
    TYPE_JNDI, TYPE_R2D2,
};
pub use provision::{DataSourceBuilder, DataSourceProvisioner};
pub use registry::{DiscoveryScope, ScopeId, ScopeRegistry, StaticScope};
pub use script::{execute_script, split_statements};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DataSourceConfig, DataSourceConfigBuilder, DatabasePlatform};
    pub use crate::datasource::{Connection, DataSource, DataSourceError};
    pub use crate::error::{ConfigurationError, InitializationError, ProvisionError, ScriptError};
    pub use crate::factory::{DataSourceFactory, DataSourcePostProcessor};
    pub use crate::provision::{DataSourceBuilder, DataSourceProvisioner};
    pub use crate::registry::{DiscoveryScope, ScopeId, ScopeRegistry, StaticScope};
}
