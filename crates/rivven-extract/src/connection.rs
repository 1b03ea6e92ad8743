//! Driver traits for rivven-extract
//!
//! Core abstractions every source backend implements:
//! - Driver: factory that opens connections
//! - Connection: an exclusive session with the source
//! - Statement: executes queries on a connection
//! - Cursor: forward-only row iteration over a query result
//!
//! Driver-specific handles never leave the backend modules; the extractor only
//! sees these trait objects.

use async_trait::async_trait;

use crate::config::SensitiveString;
use crate::error::Result;
use crate::types::{ColumnDescriptor, Value};

/// Factory for opening connections, registered under an id in a
/// [`DriverRegistry`](crate::registry::DriverRegistry)
#[async_trait]
pub trait Driver: Send + Sync {
    /// Human-readable driver name
    fn name(&self) -> &str;

    /// Open a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

/// An exclusive connection to a source database
#[async_trait]
pub trait Connection: Send {
    /// Create a statement for executing queries
    async fn create_statement(&mut self) -> Result<Box<dyn Statement>>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// A statement bound to a connection
#[async_trait]
pub trait Statement: Send {
    /// Execute a query and open a forward-only cursor over its result
    async fn execute_query(&mut self, sql: &str) -> Result<Box<dyn Cursor>>;

    /// Close the statement
    async fn close(&mut self) -> Result<()>;
}

/// Forward-only cursor over a query result.
///
/// The cursor starts before the first row. `advance` moves to the next row and
/// reports whether one exists; `read_row` returns the values at the current row.
#[async_trait]
pub trait Cursor: Send {
    /// Result column metadata, available before the first advance
    fn columns(&self) -> &[ColumnDescriptor];

    /// Move to the next row, returning false once the result is exhausted
    async fn advance(&mut self) -> Result<bool>;

    /// Read all column values of the current row, by position
    async fn read_row(&mut self) -> Result<Vec<Value>>;

    /// Close the cursor
    async fn close(&mut self) -> Result<()>;
}

/// Configuration for creating connections
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Connection URL (e.g., postgres://host:5432/db)
    pub url: String,
    /// User name
    pub user: Option<String>,
    /// Password
    pub password: Option<SensitiveString>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Application name (shown in pg_stat_activity, etc)
    pub application_name: Option<String>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &redact_url(&self.url))
            .field("user", &self.user)
            .field("password", &self.password)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: None,
            password: None,
            connect_timeout_ms: 10_000,
            application_name: Some("rivven-extract".into()),
        }
    }
}

impl ConnectionConfig {
    /// Create configuration with just a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set credentials
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<SensitiveString>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// URL with any embedded password replaced, safe for logs
    pub fn redacted_url(&self) -> String {
        redact_url(&self.url)
    }
}

/// Redact credentials from a URL to prevent leaking passwords to logs.
pub(crate) fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
