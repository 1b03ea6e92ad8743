//! In-memory scripted driver
//!
//! Serves result sets declared up front, keyed by exact SQL text, and records
//! every resource release. Failures can be injected at each step of the cursor
//! protocol, which makes it the driver of choice for testing extractors and the
//! orchestrators built on top of them.
//!
//! ```rust,ignore
//! let db = MemoryDatabase::new().with_result(
//!     "SELECT id, name FROM t",
//!     MemoryResult::new()
//!         .column("id", SqlTypeCode::INTEGER, "integer")
//!         .column("name", SqlTypeCode::VARCHAR, "varchar")
//!         .row(vec![Value::Int32(1), Value::from("a")]),
//! );
//! registry.register("memory", Arc::new(MemoryDriver::new(db.clone())));
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::connection::{Connection, ConnectionConfig, Cursor, Driver, Statement};
use crate::error::{Error, Result};
use crate::types::{ColumnDescriptor, SqlTypeCode, Value};

/// URL scheme accepted by the memory driver
pub const MEMORY_SCHEME: &str = "memory:";

/// Kind of resource released through the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A cursor
    Cursor,
    /// A statement
    Statement,
    /// A connection
    Connection,
}

/// A scripted result set
#[derive(Debug, Clone, Default)]
pub struct MemoryResult {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Value>>,
    fail_advance_at: Option<usize>,
    fail_read_at: Option<usize>,
}

impl MemoryResult {
    /// Create an empty result with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    pub fn column(
        mut self,
        name: impl Into<String>,
        type_code: SqlTypeCode,
        type_name: impl Into<String>,
    ) -> Self {
        self.columns
            .push(ColumnDescriptor::new(name, type_code, type_name));
        self
    }

    /// Append a row
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// Fail the advance that would move onto the row at this 0-based index
    pub fn fail_advance_at(mut self, idx: usize) -> Self {
        self.fail_advance_at = Some(idx);
        self
    }

    /// Fail reading the row at this 0-based index
    pub fn fail_read_at(mut self, idx: usize) -> Self {
        self.fail_read_at = Some(idx);
        self
    }
}

#[derive(Debug, Clone)]
enum Script {
    Rows(MemoryResult),
    Error(String),
}

#[derive(Debug, Default)]
struct Inner {
    scripts: HashMap<String, Script>,
    connect_error: Option<String>,
    failing_close: HashSet<ResourceKind>,
    released: Vec<ResourceKind>,
    executed: Vec<String>,
    advances: usize,
}

/// Shared handle to the scripted database state
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this result for the exact query text
    pub fn with_result(self, sql: impl Into<String>, result: MemoryResult) -> Self {
        self.inner
            .lock()
            .scripts
            .insert(sql.into(), Script::Rows(result));
        self
    }

    /// Fail execution of the exact query text
    pub fn with_query_error(self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.inner
            .lock()
            .scripts
            .insert(sql.into(), Script::Error(message.into()));
        self
    }

    /// Refuse every connection attempt
    pub fn with_connect_error(self, message: impl Into<String>) -> Self {
        self.inner.lock().connect_error = Some(message.into());
        self
    }

    /// Fail every close of this resource kind
    pub fn with_failing_close(self, kind: ResourceKind) -> Self {
        self.inner.lock().failing_close.insert(kind);
        self
    }

    /// Resources released so far, in release order
    pub fn released(&self) -> Vec<ResourceKind> {
        self.inner.lock().released.clone()
    }

    /// Number of releases of one resource kind
    pub fn release_count(&self, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .released
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    /// Queries executed so far, in execution order
    pub fn executed(&self) -> Vec<String> {
        self.inner.lock().executed.clone()
    }

    /// Total cursor advances performed across all cursors
    pub fn advance_calls(&self) -> usize {
        self.inner.lock().advances
    }

    fn release(&self, kind: ResourceKind) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.released.push(kind);
        if inner.failing_close.contains(&kind) {
            return Err(Error::connection(format!("failed to close {:?}", kind)));
        }
        Ok(())
    }
}

/// Driver serving a [`MemoryDatabase`]
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    database: MemoryDatabase,
}

impl MemoryDriver {
    /// Create a driver over the given database
    pub fn new(database: MemoryDatabase) -> Self {
        Self { database }
    }

    /// The database this driver serves
    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        if !config.url.starts_with(MEMORY_SCHEME) {
            return Err(Error::connection(format!(
                "unsupported url '{}', expected {}",
                config.redacted_url(),
                MEMORY_SCHEME
            )));
        }
        if let Some(message) = self.database.inner.lock().connect_error.clone() {
            return Err(Error::connection(message));
        }
        Ok(Box::new(MemoryConnection {
            database: self.database.clone(),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    database: MemoryDatabase,
    closed: bool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn create_statement(&mut self) -> Result<Box<dyn Statement>> {
        if self.closed {
            return Err(Error::connection("connection is closed"));
        }
        Ok(Box::new(MemoryStatement {
            database: self.database.clone(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.database.release(ResourceKind::Connection)
    }
}

struct MemoryStatement {
    database: MemoryDatabase,
}

#[async_trait]
impl Statement for MemoryStatement {
    async fn execute_query(&mut self, sql: &str) -> Result<Box<dyn Cursor>> {
        let script = {
            let mut inner = self.database.inner.lock();
            inner.executed.push(sql.to_string());
            inner.scripts.get(sql).cloned()
        };

        match script {
            Some(Script::Rows(result)) => Ok(Box::new(MemoryCursor {
                database: self.database.clone(),
                result,
                position: None,
            })),
            Some(Script::Error(message)) => Err(Error::query_with_sql(message, sql)),
            None => Err(Error::query_with_sql("no result scripted for query", sql)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.database.release(ResourceKind::Statement)
    }
}

struct MemoryCursor {
    database: MemoryDatabase,
    result: MemoryResult,
    /// None before the first advance
    position: Option<usize>,
}

#[async_trait]
impl Cursor for MemoryCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.result.columns
    }

    async fn advance(&mut self) -> Result<bool> {
        self.database.inner.lock().advances += 1;

        let next = self.position.map_or(0, |p| p + 1);
        if self.result.fail_advance_at == Some(next) {
            return Err(Error::connection(format!(
                "connection reset while fetching row {}",
                next
            )));
        }
        // stays one past the end once exhausted
        self.position = Some(next.min(self.result.rows.len()));
        Ok(next < self.result.rows.len())
    }

    async fn read_row(&mut self) -> Result<Vec<Value>> {
        let idx = self
            .position
            .filter(|p| *p < self.result.rows.len())
            .ok_or_else(|| Error::query("cursor is not positioned on a row"))?;
        if self.result.fail_read_at == Some(idx) {
            return Err(Error::type_conversion(format!(
                "cannot decode row {}",
                idx
            )));
        }
        Ok(self.result.rows[idx].clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.database.release(ResourceKind::Cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rows() -> MemoryResult {
        MemoryResult::new()
            .column("id", SqlTypeCode::INTEGER, "integer")
            .row(vec![Value::Int32(1)])
            .row(vec![Value::Int32(2)])
    }

    #[tokio::test]
    async fn test_cursor_walks_rows() {
        let db = MemoryDatabase::new().with_result("SELECT id FROM t", two_rows());
        let driver = MemoryDriver::new(db.clone());

        let mut conn = driver
            .connect(&ConnectionConfig::new("memory://test"))
            .await
            .unwrap();
        let mut stmt = conn.create_statement().await.unwrap();
        let mut cursor = stmt.execute_query("SELECT id FROM t").await.unwrap();

        assert_eq!(cursor.columns().len(), 1);
        assert!(cursor.read_row().await.is_err());
        assert!(cursor.advance().await.unwrap());
        assert_eq!(cursor.read_row().await.unwrap(), vec![Value::Int32(1)]);
        assert!(cursor.advance().await.unwrap());
        assert!(!cursor.advance().await.unwrap());
        assert!(!cursor.advance().await.unwrap());
        assert_eq!(db.advance_calls(), 4);
    }

    #[tokio::test]
    async fn test_rejects_foreign_url() {
        let driver = MemoryDriver::default();
        let err = driver
            .connect(&ConnectionConfig::new("postgres://localhost/db"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("unsupported url"));
    }

    #[tokio::test]
    async fn test_unscripted_query_fails() {
        let driver = MemoryDriver::default();
        let mut conn = driver
            .connect(&ConnectionConfig::new("memory://test"))
            .await
            .unwrap();
        let mut stmt = conn.create_statement().await.unwrap();
        let err = stmt.execute_query("SELECT 1").await.err().unwrap();
        assert_eq!(err.sql(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn test_failing_close_is_still_recorded() {
        let db = MemoryDatabase::new().with_failing_close(ResourceKind::Connection);
        let driver = MemoryDriver::new(db.clone());
        let mut conn = driver
            .connect(&ConnectionConfig::new("memory://test"))
            .await
            .unwrap();

        assert!(conn.close().await.is_err());
        assert_eq!(db.released(), vec![ResourceKind::Connection]);
    }
}
