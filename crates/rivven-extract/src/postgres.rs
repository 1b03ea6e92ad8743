//! PostgreSQL backend for rivven-extract
//!
//! Provides:
//! - Driver parsing `postgres://` URLs with credential override and connect timeout
//! - Statements that prepare the query to expose column metadata up front
//! - Cursors streaming rows through `query_raw`, so the result set is never buffered
//! - OID to portable type code translation

use async_trait::async_trait;
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::{FromSql, ToSql, Type};

use crate::connection::{Connection, ConnectionConfig, Cursor, Driver, Statement};
use crate::error::{Error, Result};
use crate::types::{ColumnDescriptor, SqlTypeCode, Value};

/// Translate a PostgreSQL type to a portable type code
pub fn pg_type_code(pg_type: &Type) -> SqlTypeCode {
    match *pg_type {
        Type::BOOL => SqlTypeCode::BOOLEAN,
        Type::CHAR => SqlTypeCode::CHAR,
        Type::INT2 => SqlTypeCode::SMALLINT,
        Type::INT4 | Type::OID => SqlTypeCode::INTEGER,
        Type::INT8 => SqlTypeCode::BIGINT,
        Type::FLOAT4 => SqlTypeCode::REAL,
        Type::FLOAT8 => SqlTypeCode::DOUBLE,
        Type::NUMERIC => SqlTypeCode::NUMERIC,
        Type::VARCHAR | Type::BPCHAR | Type::NAME => SqlTypeCode::VARCHAR,
        Type::TEXT => SqlTypeCode::LONGVARCHAR,
        Type::BYTEA => SqlTypeCode::BINARY,
        Type::DATE => SqlTypeCode::DATE,
        Type::TIME => SqlTypeCode::TIME,
        Type::TIMESTAMP => SqlTypeCode::TIMESTAMP,
        Type::TIMESTAMPTZ => SqlTypeCode::TIMESTAMP_WITH_TIMEZONE,
        Type::XML => SqlTypeCode::SQLXML,
        _ if matches!(pg_type.kind(), tokio_postgres::types::Kind::Array(_)) => {
            SqlTypeCode::ARRAY
        }
        _ => SqlTypeCode::OTHER,
    }
}

/// Undecoded column value, accepted for every type
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode a PostgreSQL value into a rivven Value
fn pg_value_to_value(row: &tokio_postgres::Row, idx: usize, pg_type: &Type) -> Result<Value> {
    fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Option<T>>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(idx).map_err(|e| {
            Error::type_conversion(format!("failed to decode column {}: {}", idx, e))
        })
    }

    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, idx)?.into(),
        Type::CHAR => get::<i8>(row, idx)?.into(),
        Type::INT2 => get::<i16>(row, idx)?.into(),
        Type::INT4 => get::<i32>(row, idx)?.into(),
        Type::OID => get::<u32>(row, idx)?.map(i64::from).into(),
        Type::INT8 => get::<i64>(row, idx)?.into(),
        Type::FLOAT4 => get::<f32>(row, idx)?.into(),
        Type::FLOAT8 => get::<f64>(row, idx)?.into(),
        Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx)?.into(),
        Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME => get::<String>(row, idx)?.into(),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.into(),
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.into(),
        Type::TIME => get::<chrono::NaiveTime>(row, idx)?
            .map(Value::Time)
            .unwrap_or(Value::Null),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?.into(),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?.into(),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.into(),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?
            .map(Value::Json)
            .unwrap_or(Value::Null),
        // Unmapped types pass through as their binary wire encoding
        _ => get::<RawValue>(row, idx)?
            .map(|raw| Value::Bytes(raw.0))
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

/// PostgreSQL driver
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDriver;

#[async_trait]
impl Driver for PgDriver {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let mut pg_config: tokio_postgres::Config = config
            .url
            .parse()
            .map_err(|e| Error::connection_with_source("invalid connection url", e))?;

        if let Some(user) = config.user.as_deref().filter(|u| !u.is_empty()) {
            pg_config.user(user);
        }
        if let Some(password) = &config.password {
            pg_config.password(password.expose_secret());
        }
        if let Some(name) = &config.application_name {
            pg_config.application_name(name);
        }
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        pg_config.connect_timeout(timeout);

        let (client, connection) =
            tokio::time::timeout(timeout, pg_config.connect(tokio_postgres::NoTls))
                .await
                .map_err(|_| {
                    Error::timeout(format!(
                        "connecting to '{}' took longer than {:?}",
                        config.redacted_url(),
                        timeout
                    ))
                })?
                .map_err(|e| Error::connection_with_source("failed to connect", e))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });

        Ok(Box::new(PgConnection {
            client: Some(Arc::new(client)),
        }))
    }
}

/// PostgreSQL connection
pub struct PgConnection {
    client: Option<Arc<tokio_postgres::Client>>,
}

impl PgConnection {
    fn client(&self) -> Result<&Arc<tokio_postgres::Client>> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::connection("connection is closed"))
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn create_statement(&mut self) -> Result<Box<dyn Statement>> {
        Ok(Box::new(PgStatement {
            client: Arc::clone(self.client()?),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the last client handle terminates the background connection task
        self.client = None;
        Ok(())
    }
}

/// PostgreSQL statement
pub struct PgStatement {
    client: Arc<tokio_postgres::Client>,
}

#[async_trait]
impl Statement for PgStatement {
    async fn execute_query(&mut self, sql: &str) -> Result<Box<dyn Cursor>> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| Error::query_with_source(e.to_string(), sql, e))?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| ColumnDescriptor::new(c.name(), pg_type_code(c.type_()), c.type_().name()))
            .collect();
        let types = statement
            .columns()
            .iter()
            .map(|c| c.type_().clone())
            .collect();

        let stream = self
            .client
            .query_raw(&statement, std::iter::empty::<&(dyn ToSql + Sync)>())
            .await
            .map_err(|e| Error::query_with_source(e.to_string(), sql, e))?;

        Ok(Box::new(PgCursor {
            columns,
            types,
            stream: Some(Box::pin(stream)),
            current: None,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        // Prepared statements are deallocated when their handle drops
        Ok(())
    }
}

/// Forward-only cursor over a PostgreSQL row stream
pub struct PgCursor {
    columns: Vec<ColumnDescriptor>,
    types: Vec<Type>,
    stream: Option<Pin<Box<tokio_postgres::RowStream>>>,
    current: Option<tokio_postgres::Row>,
}

#[async_trait]
impl Cursor for PgCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    async fn advance(&mut self) -> Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            self.current = None;
            return Ok(false);
        };

        match stream.next().await {
            Some(Ok(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Some(Err(e)) => {
                self.current = None;
                Err(Error::connection_with_source("failed to fetch row", e))
            }
            None => {
                self.current = None;
                self.stream = None;
                Ok(false)
            }
        }
    }

    async fn read_row(&mut self) -> Result<Vec<Value>> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| Error::query("cursor is not positioned on a row"))?;

        self.types
            .iter()
            .enumerate()
            .map(|(idx, pg_type)| pg_value_to_value(row, idx, pg_type))
            .collect()
    }

    async fn close(&mut self) -> Result<()> {
        self.current = None;
        self.stream = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::map_type;
    use crate::types::TypeTag;

    #[test]
    fn test_pg_type_codes_map_to_canonical_types() {
        assert_eq!(map_type(pg_type_code(&Type::BOOL)), TypeTag::Boolean);
        assert_eq!(map_type(pg_type_code(&Type::INT2)), TypeTag::Short);
        assert_eq!(map_type(pg_type_code(&Type::INT4)), TypeTag::Integer);
        assert_eq!(map_type(pg_type_code(&Type::INT8)), TypeTag::Long);
        assert_eq!(map_type(pg_type_code(&Type::FLOAT4)), TypeTag::Float);
        assert_eq!(map_type(pg_type_code(&Type::FLOAT8)), TypeTag::Double);
        assert_eq!(map_type(pg_type_code(&Type::NUMERIC)), TypeTag::Decimal);
        assert_eq!(map_type(pg_type_code(&Type::TEXT)), TypeTag::String);
        assert_eq!(map_type(pg_type_code(&Type::BYTEA)), TypeTag::Binary);
        assert_eq!(map_type(pg_type_code(&Type::DATE)), TypeTag::Date);
        assert_eq!(map_type(pg_type_code(&Type::TIMESTAMPTZ)), TypeTag::Datetime);
    }

    #[test]
    fn test_exotic_pg_types_are_any() {
        assert_eq!(pg_type_code(&Type::INT4_ARRAY), SqlTypeCode::ARRAY);
        assert_eq!(map_type(pg_type_code(&Type::JSONB)), TypeTag::Any);
        assert_eq!(map_type(pg_type_code(&Type::UUID)), TypeTag::Any);
        assert_eq!(map_type(pg_type_code(&Type::BIT)), TypeTag::Any);
        assert_eq!(map_type(pg_type_code(&Type::VARBIT)), TypeTag::Any);
        assert_eq!(map_type(pg_type_code(&Type::INTERVAL)), TypeTag::Any);
    }

    #[test]
    fn test_raw_value_accepts_unmapped_types() {
        for ty in [Type::BIT, Type::INTERVAL, Type::INET, Type::MONEY, Type::INT4_ARRAY] {
            assert!(<RawValue as FromSql>::accepts(&ty), "{}", ty);
        }
        let raw = RawValue::from_sql(&Type::INET, &[2, 32, 0, 4, 10, 0, 0, 1]).unwrap();
        assert_eq!(raw.0, vec![2, 32, 0, 4, 10, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_connection_error() {
        let err = PgDriver
            .connect(&ConnectionConfig::new("definitely not a url ::"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.category(), crate::error::ErrorCategory::Connection);
    }
}
