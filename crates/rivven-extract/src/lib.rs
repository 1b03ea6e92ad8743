//! # rivven-extract
//!
//! Relational source extraction for Rivven pipelines.
//!
//! This crate turns an arbitrary SQL query into a lazily-pulled stream of
//! schema-annotated records, one row at a time, for the transform and load stages
//! of a pipeline.
//!
//! ## Features
//!
//! - **Pull-based iteration**: `has_next`/`next` with single-step lookahead
//! - **Canonical typing**: result columns annotated with driver-independent type tags
//! - **Progress reporting**: yielded-record counter plus an optional count query
//! - **Driver registry**: pluggable backends resolved by id at configure time
//! - **Best-effort release**: cursor, statement and connection always released on `end`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivven_extract::prelude::*;
//! use std::sync::Arc;
//!
//! let mut extractor = RdbcExtractor::new(Arc::new(DriverRegistry::with_defaults()));
//! extractor
//!     .configure(&serde_json::json!({
//!         "driver": "postgres",
//!         "url": "postgres://localhost/shop",
//!         "userName": "etl",
//!         "userPassword": "secret",
//!         "query": "SELECT id, name FROM customers",
//!         "queryCount": "SELECT count(*) FROM customers"
//!     }))
//!     .await?;
//!
//! extractor.begin().await?;
//! while extractor.has_next().await? {
//!     let record = extractor.next().await?;
//!     println!("{} / {}: {}", extractor.progress(), extractor.total(), record.to_json());
//! }
//! extractor.end().await;
//! ```
//!
//! ## Feature Flags
//!
//! - `postgres` - PostgreSQL driver via tokio-postgres (default)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod description;
pub mod error;
pub mod extractor;
pub mod mapping;
pub mod memory;
pub mod registry;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Values, records and schema
    pub use crate::types::{
        ColumnDescriptor, ColumnSchema, Record, SchemaColumn, SqlTypeCode, TypeTag, Value,
    };
    pub use crate::mapping::map_type;

    // Configuration
    pub use crate::config::{ExtractorConfig, SensitiveString};
    pub use crate::connection::{Connection, ConnectionConfig, Cursor, Driver, Statement};
    pub use crate::registry::DriverRegistry;

    // Extractor
    pub use crate::description::{ComponentDescription, ParameterDescription};
    pub use crate::extractor::{CursorState, Extractor, ExtractorState, RdbcExtractor};

    // Drivers
    pub use crate::memory::{MemoryDatabase, MemoryDriver, MemoryResult, ResourceKind};
    #[cfg(feature = "postgres")]
    pub use crate::postgres::PgDriver;
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use extractor::{Extractor, RdbcExtractor};
pub use types::{Record, Value};

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _value = Value::Int32(42);
        let _config = ConnectionConfig::new("memory://test");
        let _state = CursorState::default();
        let _registry = DriverRegistry::with_defaults();
    }

    #[test]
    fn test_error_types() {
        let err = Error::connection("test error");
        assert!(err.is_retriable());
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn test_cursor_state_starts_unknown() {
        let state = CursorState::default();
        assert_eq!(state.progress, -1);
        assert_eq!(state.total, -1);
        assert!(!state.exhausted);
    }
}
