//! Unit tests for rivven-extract error module

use rivven_extract::error::{Error, ErrorCategory};
use rivven_extract::extractor::ExtractorState;
use std::error::Error as _;

#[test]
fn test_error_connection() {
    let err = Error::connection("Connection refused: host=localhost port=5432");

    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.to_string().contains("Connection refused"));
    assert!(err.to_string().contains("localhost"));
    assert!(err.is_retriable());
}

#[test]
fn test_error_timeout() {
    let err = Error::timeout("Query exceeded 30s");

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(err.to_string().contains("timeout"));
    assert!(err.is_retriable());
}

#[test]
fn test_error_type_conversion() {
    let err = Error::type_conversion("Cannot decode column 3");

    assert_eq!(err.category(), ErrorCategory::TypeConversion);
    assert!(err.to_string().contains("Cannot decode"));
    assert!(!err.is_retriable());
}

#[test]
fn test_query_with_sql() {
    let err = Error::query_with_sql("Syntax error", "SELECT * FORM users");

    assert_eq!(err.category(), ErrorCategory::Query);
    assert!(err.to_string().contains("Syntax error"));
    assert_eq!(err.sql(), Some("SELECT * FORM users"));
}

#[test]
fn test_plain_query_has_no_sql() {
    let err = Error::query("Test error");
    assert_eq!(err.sql(), None);
}

#[test]
fn test_config_error() {
    let err = Error::config("driver 'oracle' not found");

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(err.to_string().contains("oracle"));
    assert!(err.source().is_none());
    assert!(!err.is_retriable());
}

#[test]
fn test_config_error_wraps_connection_failure() {
    let err = Error::config_with_source(
        "error on connecting to url 'memory:down' using user 'etl' and the password provided",
        Error::connection("refused"),
    );

    assert!(err.to_string().contains("memory:down"));
    assert!(err.to_string().contains("'etl'"));
    assert!(!err.to_string().contains("secret"));
    assert_eq!(err.source().unwrap().to_string(), "connection error: refused");
}

#[test]
fn test_extraction_error_display() {
    let err = Error::extraction(
        "error on reading next record",
        "SELECT id FROM t",
        2,
        Error::connection("connection reset"),
    );

    assert_eq!(err.category(), ErrorCategory::Extraction);
    assert_eq!(
        err.to_string(),
        "extraction error: error on reading next record (query 'SELECT id FROM t'). Previous position was 2"
    );
    assert_eq!(err.sql(), Some("SELECT id FROM t"));
    assert!(err.source().is_some());
}

#[test]
fn test_exhausted_display() {
    let err = Error::exhausted(3);

    assert_eq!(err.category(), ErrorCategory::Exhaustion);
    assert_eq!(err.to_string(), "no more records. Previous position was 3");
}

#[test]
fn test_invalid_state() {
    let err = Error::invalid_state("next", ExtractorState::NotStarted);

    assert_eq!(err.category(), ErrorCategory::State);
    assert_eq!(err.to_string(), "cannot next while extractor is not started");
}

#[test]
fn test_error_debug() {
    let err = Error::query("SELECT * FROM invalid_table");
    let debug = format!("{:?}", err);

    assert!(debug.contains("Query"));
}

#[test]
fn test_result_type() {
    fn test_fn() -> rivven_extract::error::Result<i32> {
        Ok(42)
    }

    assert_eq!(test_fn().unwrap(), 42);
}

#[test]
fn test_error_category_display() {
    assert_eq!(ErrorCategory::TypeConversion.to_string(), "type_conversion");
    assert_eq!(ErrorCategory::Exhaustion.to_string(), "exhaustion");
}

#[test]
fn test_error_category_is_retriable() {
    assert!(ErrorCategory::Connection.is_retriable());
    assert!(ErrorCategory::Timeout.is_retriable());

    assert!(!ErrorCategory::Query.is_retriable());
    assert!(!ErrorCategory::TypeConversion.is_retriable());
    assert!(!ErrorCategory::Configuration.is_retriable());
    assert!(!ErrorCategory::Extraction.is_retriable());
    assert!(!ErrorCategory::Exhaustion.is_retriable());
    assert!(!ErrorCategory::State.is_retriable());
}
