//! Extractor configuration
//!
//! The orchestrator hands the extractor a flat mapping of already-resolved
//! strings. It is deserialized into [`ExtractorConfig`] and validated before any
//! driver is touched.

use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};

/// A wrapper around `SecretString` for passwords.
///
/// Redacts the value in `Debug`, `Display` and serialized output.
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Create a new sensitive string from any string-like value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Use sparingly - only when the actual value is needed (e.g., for authentication).
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

impl JsonSchema for SensitiveString {
    fn schema_name() -> String {
        "SensitiveString".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = gen.subschema_for::<String>();
        if let schemars::schema::Schema::Object(obj) = &mut schema {
            obj.format = Some("password".to_string());
        }
        schema
    }
}

/// Relational extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Registered driver id (e.g. "postgres")
    #[validate(length(min = 1))]
    pub driver: String,

    /// Connection URL, interpreted by the driver
    #[validate(length(min = 1))]
    pub url: String,

    /// User name
    pub user_name: String,

    /// User password
    pub user_password: SensitiveString,

    /// Query that extracts records
    #[validate(length(min = 1))]
    pub query: String,

    /// Query returning a single integer column with the expected record count
    #[serde(default)]
    #[validate(length(min = 1))]
    pub query_count: Option<String>,
}

impl ExtractorConfig {
    /// Create a configuration without a count query
    pub fn new(
        driver: impl Into<String>,
        url: impl Into<String>,
        user_name: impl Into<String>,
        user_password: impl Into<SensitiveString>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
            user_name: user_name.into(),
            user_password: user_password.into(),
            query: query.into(),
            query_count: None,
        }
    }

    /// Set the count query
    pub fn with_query_count(mut self, query_count: impl Into<String>) -> Self {
        self.query_count = Some(query_count.into());
        self
    }

    /// Parse and validate a configuration mapping
    pub fn from_value(params: &serde_json::Value) -> Result<Self> {
        let config: Self = Self::deserialize(params)
            .map_err(|e| Error::config(format!("invalid extractor configuration: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Run field validation
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("invalid extractor configuration: {}", e)))
    }

    /// Driver-facing connection settings
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.url)
            .with_credentials(&self.user_name, self.user_password.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_camel_case_keys() {
        let config = ExtractorConfig::from_value(&json!({
            "driver": "postgres",
            "url": "postgres://localhost/shop",
            "userName": "etl",
            "userPassword": "secret",
            "query": "SELECT * FROM orders",
            "queryCount": "SELECT count(*) FROM orders"
        }))
        .unwrap();

        assert_eq!(config.driver, "postgres");
        assert_eq!(config.user_name, "etl");
        assert_eq!(config.user_password.expose_secret(), "secret");
        assert_eq!(
            config.query_count.as_deref(),
            Some("SELECT count(*) FROM orders")
        );
    }

    #[test]
    fn test_empty_query_rejected() {
        let config = ExtractorConfig::new("memory", "memory://db", "u", "p", "");
        assert!(config.check().is_err());
    }

    #[test]
    fn test_password_never_serialized() {
        let config = ExtractorConfig::new("memory", "memory://db", "u", "hunter2", "SELECT 1");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
