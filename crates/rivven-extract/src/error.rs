//! Error types for rivven-extract
//!
//! Two layers of errors live here:
//! - Driver-level errors raised by backends (connection, query, type conversion, timeout)
//! - Extractor-level errors surfaced to the orchestrator (configuration, extraction,
//!   exhaustion, invalid state), which wrap the driver-level cause

use std::fmt;
use thiserror::Error;

use crate::extractor::ExtractorState;

/// Result type for rivven-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used as the cause of wrapped failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection-related errors (retriable)
    Connection,
    /// Query execution errors raised by a driver
    Query,
    /// Type conversion errors (not retriable)
    TypeConversion,
    /// Timeout errors (retriable)
    Timeout,
    /// Configuration error
    Configuration,
    /// Extraction run failed
    Extraction,
    /// Caller read past the end of the result set
    Exhaustion,
    /// Operation invoked in the wrong lifecycle state
    State,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

/// Main error type for rivven-extract
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection failed (driver level)
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Query execution failed (driver level)
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// Type conversion failed while decoding a column value
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Driver could not be resolved, parameters are invalid, or the connection
    /// could not be established
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Query execution or cursor failure during an extraction run
    #[error("extraction error: {message} (query '{query}'). Previous position was {progress}")]
    Extraction {
        message: String,
        query: String,
        progress: i64,
        #[source]
        source: Option<BoxError>,
    },

    /// `next()` called with no row available
    #[error("no more records. Previous position was {progress}")]
    Exhausted { progress: i64 },

    /// Operation not permitted in the current lifecycle state
    #[error("cannot {operation} while extractor is {state}")]
    InvalidState {
        operation: &'static str,
        state: ExtractorState,
    },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::TypeConversion { .. } => ErrorCategory::TypeConversion,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Extraction { .. } => ErrorCategory::Extraction,
            Self::Exhausted { .. } => ErrorCategory::Exhaustion,
            Self::InvalidState { .. } => ErrorCategory::State,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with SQL
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a query error with SQL and source
    pub fn query_with_source(
        message: impl Into<String>,
        sql: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error wrapping an underlying failure
    pub fn config_with_source(message: impl Into<String>, source: Error) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an extraction error wrapping an underlying failure
    pub fn extraction(
        message: impl Into<String>,
        query: impl Into<String>,
        progress: i64,
        source: Error,
    ) -> Self {
        Self::Extraction {
            message: message.into(),
            query: query.into(),
            progress,
            source: Some(Box::new(source)),
        }
    }

    /// Create an exhaustion error
    pub fn exhausted(progress: i64) -> Self {
        Self::Exhausted { progress }
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: ExtractorState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// The query text attached to this error, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Query { sql, .. } => sql.as_deref(),
            Self::Extraction { query, .. } => Some(query.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Timeout => write!(f, "timeout"),
            Self::Configuration => write!(f, "configuration"),
            Self::Extraction => write!(f, "extraction"),
            Self::Exhaustion => write!(f, "exhaustion"),
            Self::State => write!(f, "state"),
        }
    }
}
