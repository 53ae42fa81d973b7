//! Data source configuration property set.
//!
//! A [`DataSourceConfig`] is an immutable, ordered mapping from string keys
//! to typed values, optionally bound to a data context id (a tenant or
//! environment discriminator). It is created through
//! [`DataSourceConfigBuilder`] from typed setters, plain key/value pairs or
//! a flat JSON property source, and consumed read-only by the provisioning
//! pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Property source namespace prefix.
pub const PROPERTY_PREFIX: &str = "datasource";

/// Data source type name property.
pub const KEY_TYPE: &str = "type";
/// Driver class/implementation name property.
pub const KEY_DRIVER_CLASS_NAME: &str = "driver-class-name";
/// Connection URL property.
pub const KEY_URL: &str = "url";
/// Connection username property.
pub const KEY_USERNAME: &str = "username";
/// Connection password property.
pub const KEY_PASSWORD: &str = "password";
/// Data source name property.
pub const KEY_NAME: &str = "name";
/// Database platform property.
pub const KEY_PLATFORM: &str = "platform";
/// Auto-commit mode property.
pub const KEY_AUTO_COMMIT: &str = "auto-commit";
/// Minimum pool size property.
pub const KEY_MIN_POOL_SIZE: &str = "min-pool-size";
/// Maximum pool size property.
pub const KEY_MAX_POOL_SIZE: &str = "max-pool-size";
/// Connection validation query property.
pub const KEY_VALIDATION_QUERY: &str = "validation-query";
/// Naming-service lookup name property.
pub const KEY_JNDI_NAME: &str = "jndi-name";

/// Maximum pool size applied when the property is not set.
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;

/// A typed configuration property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl ConfigValue {
    /// String representation, if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean representation; string values are parsed leniently.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Integer representation; string values are parsed leniently.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

/// Known database platforms, used to derive sensible per-platform defaults
/// when the configuration omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabasePlatform {
    Postgres,
    MySql,
    MariaDb,
    Sqlite,
    SqlServer,
    Oracle,
    Db2,
    H2,
}

impl DatabasePlatform {
    /// Canonical configuration value for this platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabasePlatform::Postgres => "postgres",
            DatabasePlatform::MySql => "mysql",
            DatabasePlatform::MariaDb => "mariadb",
            DatabasePlatform::Sqlite => "sqlite",
            DatabasePlatform::SqlServer => "sqlserver",
            DatabasePlatform::Oracle => "oracle",
            DatabasePlatform::Db2 => "db2",
            DatabasePlatform::H2 => "h2",
        }
    }

    /// Parse a platform from its configuration value, case-insensitively.
    pub fn from_name(name: &str) -> Option<DatabasePlatform> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(DatabasePlatform::Postgres),
            "mysql" => Some(DatabasePlatform::MySql),
            "mariadb" => Some(DatabasePlatform::MariaDb),
            "sqlite" => Some(DatabasePlatform::Sqlite),
            "sqlserver" | "sql_server" => Some(DatabasePlatform::SqlServer),
            "oracle" => Some(DatabasePlatform::Oracle),
            "db2" => Some(DatabasePlatform::Db2),
            "h2" => Some(DatabasePlatform::H2),
            _ => None,
        }
    }

    /// Detect the platform from a connection URL prefix.
    pub fn from_url(url: &str) -> Option<DatabasePlatform> {
        let url = url.trim().to_ascii_lowercase();
        const PREFIXES: &[(&str, DatabasePlatform)] = &[
            ("postgres://", DatabasePlatform::Postgres),
            ("postgresql://", DatabasePlatform::Postgres),
            ("jdbc:postgresql:", DatabasePlatform::Postgres),
            ("mysql://", DatabasePlatform::MySql),
            ("jdbc:mysql:", DatabasePlatform::MySql),
            ("mariadb://", DatabasePlatform::MariaDb),
            ("jdbc:mariadb:", DatabasePlatform::MariaDb),
            ("sqlite://", DatabasePlatform::Sqlite),
            ("sqlite:", DatabasePlatform::Sqlite),
            ("jdbc:sqlite:", DatabasePlatform::Sqlite),
            ("sqlserver://", DatabasePlatform::SqlServer),
            ("jdbc:sqlserver:", DatabasePlatform::SqlServer),
            ("oracle://", DatabasePlatform::Oracle),
            ("jdbc:oracle:", DatabasePlatform::Oracle),
            ("db2://", DatabasePlatform::Db2),
            ("jdbc:db2:", DatabasePlatform::Db2),
            ("h2:", DatabasePlatform::H2),
            ("jdbc:h2:", DatabasePlatform::H2),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix))
            .map(|(_, platform)| *platform)
    }

    /// Default connection validation query for the platform, if one exists.
    pub fn validation_query(&self) -> Option<&'static str> {
        match self {
            DatabasePlatform::Postgres
            | DatabasePlatform::MySql
            | DatabasePlatform::MariaDb
            | DatabasePlatform::SqlServer
            | DatabasePlatform::H2 => Some("SELECT 1"),
            DatabasePlatform::Oracle => Some("SELECT 1 FROM DUAL"),
            DatabasePlatform::Db2 => Some("SELECT 1 FROM SYSIBM.SYSDUMMY1"),
            DatabasePlatform::Sqlite => None,
        }
    }
}

/// Immutable data source configuration property set.
#[derive(Debug, Clone, Default)]
pub struct DataSourceConfig {
    data_context_id: Option<String>,
    properties: BTreeMap<String, ConfigValue>,
}

impl DataSourceConfig {
    /// Start building a configuration property set.
    pub fn builder() -> DataSourceConfigBuilder {
        DataSourceConfigBuilder::new()
    }

    /// Build a configuration from a flat JSON object property source.
    ///
    /// Keys may be plain (`url`), namespaced (`datasource.url`) or bound to
    /// a data context id (`datasource.tenant1.url`). When a data context id
    /// is given, only keys in that context (or un-namespaced keys) are
    /// retained; keys belonging to other contexts are skipped.
    pub fn from_json(
        source: &serde_json::Value,
        data_context_id: Option<&str>,
    ) -> Result<DataSourceConfig, ConfigurationError> {
        let object = source
            .as_object()
            .ok_or_else(|| ConfigurationError::InvalidProperty {
                key: PROPERTY_PREFIX.to_string(),
                reason: "property source must be a JSON object".to_string(),
            })?;

        let mut builder = DataSourceConfigBuilder::new();
        if let Some(id) = data_context_id {
            builder = builder.data_context_id(id);
        }

        for (key, value) in object {
            let Some(key) = strip_namespace(key, data_context_id) else {
                continue;
            };
            let value = match value {
                serde_json::Value::String(s) => ConfigValue::String(s.clone()),
                serde_json::Value::Bool(b) => ConfigValue::Bool(*b),
                serde_json::Value::Number(n) => {
                    ConfigValue::Int(n.as_i64().ok_or_else(|| {
                        ConfigurationError::InvalidProperty {
                            key: key.to_string(),
                            reason: format!("expected an integer value, got {n}"),
                        }
                    })?)
                }
                other => {
                    return Err(ConfigurationError::InvalidProperty {
                        key: key.to_string(),
                        reason: format!("unsupported property value: {other}"),
                    });
                }
            };
            builder = builder.property(key, value);
        }

        Ok(builder.build())
    }

    /// The data context id this configuration is bound to, if any.
    pub fn data_context_id(&self) -> Option<&str> {
        self.data_context_id.as_deref()
    }

    /// Raw property lookup.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.properties.get(key)
    }

    /// String property lookup.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    /// Iterate all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The explicit data source type name, if set.
    pub fn type_name(&self) -> Option<&str> {
        self.get_str(KEY_TYPE)
    }

    /// The naming-service lookup name, if set.
    pub fn jndi_name(&self) -> Option<&str> {
        self.get_str(KEY_JNDI_NAME)
    }

    pub fn url(&self) -> Option<&str> {
        self.get_str(KEY_URL)
    }

    pub fn username(&self) -> Option<&str> {
        self.get_str(KEY_USERNAME)
    }

    pub fn password(&self) -> Option<&str> {
        self.get_str(KEY_PASSWORD)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(KEY_NAME)
    }

    pub fn driver_class_name(&self) -> Option<&str> {
        self.get_str(KEY_DRIVER_CLASS_NAME)
    }

    /// The database platform: the explicit property when set, otherwise
    /// detected from the connection URL.
    pub fn platform(&self) -> Option<DatabasePlatform> {
        if let Some(name) = self.get_str(KEY_PLATFORM) {
            return DatabasePlatform::from_name(name);
        }
        self.url().and_then(DatabasePlatform::from_url)
    }

    /// Auto-commit mode; defaults to `true` when unset.
    pub fn auto_commit(&self) -> bool {
        self.get(KEY_AUTO_COMMIT)
            .and_then(ConfigValue::as_bool)
            .unwrap_or(true)
    }

    /// Whether auto-commit has been explicitly disabled.
    pub fn is_auto_commit_disabled(&self) -> bool {
        !self.auto_commit()
    }

    pub fn min_pool_size(&self) -> Option<u32> {
        self.get(KEY_MIN_POOL_SIZE)
            .and_then(ConfigValue::as_int)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Maximum pool size; defaults to [`DEFAULT_MAX_POOL_SIZE`] when unset.
    pub fn max_pool_size(&self) -> u32 {
        self.get(KEY_MAX_POOL_SIZE)
            .and_then(ConfigValue::as_int)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE)
    }

    /// The connection validation query: the explicit property when set,
    /// otherwise the detected platform default.
    pub fn validation_query(&self) -> Option<&str> {
        if let Some(query) = self.get_str(KEY_VALIDATION_QUERY) {
            if !query.trim().is_empty() {
                return Some(query);
            }
        }
        self.platform().and_then(|p| p.validation_query())
    }
}

/// Strip the `datasource.` namespace (and data context segment) from a
/// property-source key. Returns `None` when the key belongs to another
/// data context.
fn strip_namespace<'a>(key: &'a str, data_context_id: Option<&str>) -> Option<&'a str> {
    let Some(rest) = key.strip_prefix(PROPERTY_PREFIX).and_then(|r| r.strip_prefix('.')) else {
        // un-namespaced keys are taken as-is
        return Some(key);
    };
    match data_context_id {
        Some(id) => rest.strip_prefix(id).and_then(|r| r.strip_prefix('.')),
        None => (!rest.contains('.')).then_some(rest),
    }
}

/// Builder for [`DataSourceConfig`].
#[derive(Debug, Clone, Default)]
pub struct DataSourceConfigBuilder {
    data_context_id: Option<String>,
    properties: BTreeMap<String, ConfigValue>,
}

impl DataSourceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the configuration to a data context id.
    pub fn data_context_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.data_context_id = (!id.trim().is_empty()).then_some(id);
        self
    }

    /// Set an arbitrary property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set multiple properties at once.
    pub fn properties(
        mut self,
        properties: impl IntoIterator<Item = (String, ConfigValue)>,
    ) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn type_name(self, type_name: impl Into<String>) -> Self {
        self.property(KEY_TYPE, type_name.into())
    }

    pub fn driver_class_name(self, driver_class_name: impl Into<String>) -> Self {
        self.property(KEY_DRIVER_CLASS_NAME, driver_class_name.into())
    }

    pub fn url(self, url: impl Into<String>) -> Self {
        self.property(KEY_URL, url.into())
    }

    pub fn username(self, username: impl Into<String>) -> Self {
        self.property(KEY_USERNAME, username.into())
    }

    pub fn password(self, password: impl Into<String>) -> Self {
        self.property(KEY_PASSWORD, password.into())
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.property(KEY_NAME, name.into())
    }

    pub fn platform(self, platform: DatabasePlatform) -> Self {
        self.property(KEY_PLATFORM, platform.as_str())
    }

    pub fn auto_commit(self, auto_commit: bool) -> Self {
        self.property(KEY_AUTO_COMMIT, auto_commit)
    }

    pub fn min_pool_size(self, min_pool_size: u32) -> Self {
        self.property(KEY_MIN_POOL_SIZE, min_pool_size)
    }

    pub fn max_pool_size(self, max_pool_size: u32) -> Self {
        self.property(KEY_MAX_POOL_SIZE, max_pool_size)
    }

    pub fn validation_query(self, validation_query: impl Into<String>) -> Self {
        self.property(KEY_VALIDATION_QUERY, validation_query.into())
    }

    pub fn jndi_name(self, jndi_name: impl Into<String>) -> Self {
        self.property(KEY_JNDI_NAME, jndi_name.into())
    }

    /// Finalize the property set.
    pub fn build(self) -> DataSourceConfig {
        DataSourceConfig {
            data_context_id: self.data_context_id,
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors_and_defaults() {
        let config = DataSourceConfig::builder()
            .url("postgres://localhost/app")
            .username("app")
            .min_pool_size(2)
            .build();

        assert_eq!(config.url(), Some("postgres://localhost/app"));
        assert_eq!(config.username(), Some("app"));
        assert_eq!(config.min_pool_size(), Some(2));
        assert_eq!(config.max_pool_size(), DEFAULT_MAX_POOL_SIZE);
        assert!(config.auto_commit());
        assert!(!config.is_auto_commit_disabled());
    }

    #[test]
    fn test_platform_detected_from_url() {
        let config = DataSourceConfig::builder()
            .url("postgres://localhost/app")
            .build();
        assert_eq!(config.platform(), Some(DatabasePlatform::Postgres));
        assert_eq!(config.validation_query(), Some("SELECT 1"));
    }

    #[test]
    fn test_explicit_platform_wins_over_url() {
        let config = DataSourceConfig::builder()
            .url("postgres://localhost/app")
            .platform(DatabasePlatform::Oracle)
            .build();
        assert_eq!(config.platform(), Some(DatabasePlatform::Oracle));
        assert_eq!(config.validation_query(), Some("SELECT 1 FROM DUAL"));
    }

    #[test]
    fn test_explicit_validation_query_wins_over_platform() {
        let config = DataSourceConfig::builder()
            .url("mysql://localhost/app")
            .validation_query("SELECT version()")
            .build();
        assert_eq!(config.validation_query(), Some("SELECT version()"));
    }

    #[test]
    fn test_lenient_string_parsing() {
        let config = DataSourceConfig::builder()
            .property(KEY_MAX_POOL_SIZE, "25")
            .property(KEY_AUTO_COMMIT, "false")
            .build();
        assert_eq!(config.max_pool_size(), 25);
        assert!(config.is_auto_commit_disabled());
    }

    #[test]
    fn test_from_json_plain_keys() {
        let source = serde_json::json!({
            "url": "mysql://db/app",
            "max-pool-size": 15,
            "auto-commit": false,
        });
        let config = DataSourceConfig::from_json(&source, None).unwrap();
        assert_eq!(config.url(), Some("mysql://db/app"));
        assert_eq!(config.max_pool_size(), 15);
        assert!(config.is_auto_commit_disabled());
    }

    #[test]
    fn test_from_json_filters_other_data_contexts() {
        let source = serde_json::json!({
            "datasource.one.url": "postgres://db/one",
            "datasource.two.url": "postgres://db/two",
        });
        let config = DataSourceConfig::from_json(&source, Some("one")).unwrap();
        assert_eq!(config.data_context_id(), Some("one"));
        assert_eq!(config.url(), Some("postgres://db/one"));
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        let source = serde_json::json!({ "url": { "nested": true } });
        let err = DataSourceConfig::from_json(&source, None).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidProperty { .. }));
    }

    #[test]
    fn test_blank_data_context_id_is_ignored() {
        let config = DataSourceConfig::builder().data_context_id("  ").build();
        assert_eq!(config.data_context_id(), None);
    }
}
