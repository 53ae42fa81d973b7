//! Error types for data source provisioning.

use thiserror::Error;

use crate::datasource::DataSourceError;

/// Configuration and provisioning errors.
///
/// Raised when a data source cannot be built from its configuration
/// property set. Never retried automatically.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No `type` property was set and no default type could be resolved.
    #[error("missing data source type property and no default data source type available{}", data_context_suffix(.data_context_id))]
    MissingType { data_context_id: Option<String> },

    /// The `jndi-name` property was set together with a conflicting `type`.
    #[error(
        "invalid data source type [{type_name}]: when the jndi-name property is specified only the type [JNDI] is admitted, or it must be omitted"
    )]
    JndiTypeConflict { type_name: String },

    /// No factory is bound to the resolved type name.
    #[error("no data source factory bound to type [{type_name}]{}", data_context_suffix(.data_context_id))]
    UnknownType {
        type_name: String,
        data_context_id: Option<String>,
    },

    /// A post-processor rejected the built data source.
    #[error("post processing failed for data source type [{type_name}]: {reason}")]
    PostProcess { type_name: String, reason: String },

    /// A configuration property has an unusable value.
    #[error("invalid configuration property [{key}]: {reason}")]
    InvalidProperty { key: String, reason: String },

    /// The factory failed to build the data source.
    #[error("failed to build data source: {0}")]
    Build(String),
}

/// SQL script splitting and execution errors.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A `/*` block comment is never closed.
    #[error("missing block comment end delimiter at offset {position}")]
    UnterminatedBlockComment { position: usize },

    /// No connection could be acquired to run the script.
    #[error("failed to acquire a connection for script execution")]
    Connection {
        #[source]
        source: DataSourceError,
    },

    /// A statement failed; remaining statements were abandoned.
    #[error("failed to execute statement [{statement}]")]
    Statement {
        statement: String,
        #[source]
        source: DataSourceError,
    },
}

/// Failure while running initialization scripts against an otherwise
/// successfully built data source.
#[derive(Debug, Error)]
#[error("failed to initialize data source using the provided SQL scripts")]
pub struct InitializationError {
    #[source]
    pub source: ScriptError,
}

/// Union of the failures surfaced by the direct data source builder.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// An init script file could not be read.
    #[error("failed to read SQL script [{path}]")]
    ScriptRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn data_context_suffix(data_context_id: &Option<String>) -> String {
    data_context_id
        .as_deref()
        .map(|id| format!(" [data context id: {id}]"))
        .unwrap_or_default()
}
