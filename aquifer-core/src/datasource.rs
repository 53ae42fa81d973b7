//! Data source and connection capability traits.
//!
//! A data source is anything able to hand out connections: a pooling
//! backend adapter, an externally looked-up resource or the multi-tenant
//! router itself. Concrete implementations live outside this crate and are
//! always held behind `Arc<dyn DataSource>`, never inspected by concrete
//! type.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by data source and connection implementations.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("failed to acquire connection: {0}")]
    Connection(String),

    #[error("statement execution failed: {0}")]
    Statement(String),

    #[error("failed to close data source: {0}")]
    Close(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// A live database connection.
#[async_trait]
pub trait Connection: Send {
    /// Execute a single SQL statement, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, DataSourceError>;

    /// Release the connection. The default implementation is a no-op for
    /// implementations whose drop already returns the connection.
    async fn close(&mut self) -> Result<(), DataSourceError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Connection")
    }
}

/// A connection-providing resource.
///
/// Implementations may block on network I/O when acquiring connections;
/// callers must treat these as potentially slow calls. No timeout is
/// enforced at this layer.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Acquire a connection using the configured credentials.
    async fn connection(&self) -> Result<Box<dyn Connection>, DataSourceError>;

    /// Acquire a connection using explicit credentials. Optional
    /// capability; the default implementation rejects the call.
    async fn connection_with(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn Connection>, DataSourceError> {
        let _ = (username, password);
        Err(DataSourceError::Unsupported(
            "credential-scoped connection acquisition",
        ))
    }

    /// Release all underlying resources. Optional capability; the default
    /// implementation is a no-op.
    async fn close(&self) -> Result<(), DataSourceError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn DataSource")
    }
}
