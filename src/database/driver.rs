use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any as AnyDb, AnyPool, Column, Row as SqlxRow};
use std::any::Any;

use super::config::DatabaseConfig;
use super::provider::{ConnectionSettings, ProviderRegistry};
use crate::driver::ManagedDriver;
use crate::error::{DatabaseError, DriverError, Result};

/// One result row, column name to value
pub type Row = serde_json::Map<String, Value>;

/// Database capability set
#[async_trait]
pub trait Database: ManagedDriver {
    /// Name of the provider the connection was opened with
    fn provider(&self) -> &str;

    /// Run a query and collect every row
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// First row of a query, if any
    async fn query_single(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// Run a statement and return the number of affected rows
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    fn as_any(&self) -> &dyn Any;
}

/// Database driver over a sqlx `AnyPool`
pub struct DatabaseDriver {
    pool: AnyPool,
    provider: String,
}

impl DatabaseDriver {
    pub fn new(pool: AnyPool, provider: impl Into<String>) -> Self {
        Self {
            pool,
            provider: provider.into(),
        }
    }

    /// Connect through the registry using the configured provider
    pub async fn connect(config: &DatabaseConfig, registry: &ProviderRegistry) -> Result<Self> {
        let pool = registry
            .connect(&config.provider, ConnectionSettings::from(config))
            .await?;
        Ok(Self::new(pool, config.provider.to_ascii_lowercase()))
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(DriverError::Closed(self.kind().to_string()).into());
        }
        Ok(())
    }
}

fn bind_params<'q>(
    mut query: Query<'q, AnyDb, AnyArguments<'q>>,
    params: &[Value],
) -> std::result::Result<Query<'q, AnyDb, AnyArguments<'q>>, DatabaseError> {
    for (index, value) in params.iter().enumerate() {
        query = match value {
            Value::String(s) => query.bind(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    return Err(DatabaseError::Query(format!("Parameter {} is not a representable number", index)));
                }
            }
            Value::Bool(b) => query.bind(*b),
            Value::Null => query.bind(Option::<String>::None),
            // Structured values are passed as JSON text
            Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
        };
    }
    Ok(query)
}

fn decode_value(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map(|bytes| Value::String(STANDARD.encode(bytes))).unwrap_or(Value::Null);
    }
    Value::Null
}

fn to_row(row: &AnyRow) -> Row {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_value(row, index));
    }
    map
}

#[async_trait]
impl ManagedDriver for DatabaseDriver {
    fn kind(&self) -> &'static str {
        "database"
    }

    fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl Database for DatabaseDriver {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open()?;
        let query = bind_params(sqlx::query(sql), params)?;
        let rows = query.fetch_all(&self.pool).await.map_err(DatabaseError::from)?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        let query = bind_params(sqlx::query(sql), params)?;
        let result = query.execute(&self.pool).await.map_err(DatabaseError::from)?;
        Ok(result.rows_affected())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
