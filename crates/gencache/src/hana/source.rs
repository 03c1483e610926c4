use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::PoolError;
use hdbconnect_async::HdbValue;

use super::pool::{Pool, connection_url, create_pool};
use crate::worker::{
    ConnectionInfo, RowSet, SourceError, SourceFactory, SqlSource, Value, WorkerConfig,
};

/// Convert a HANA cell to the tabular [`Value`] model.
///
/// Decimals are carried as text to keep their exact representation;
/// unmapped types fall back to their debug form.
pub fn hdb_value_to_value(value: HdbValue) -> Value {
    match value {
        HdbValue::NULL => Value::Null,
        HdbValue::TINYINT(v) => Value::Int(i64::from(v)),
        HdbValue::SMALLINT(v) => Value::Int(i64::from(v)),
        HdbValue::INT(v) => Value::Int(i64::from(v)),
        HdbValue::BIGINT(v) => Value::Int(v),
        HdbValue::DECIMAL(v) => Value::Text(v.to_string()),
        HdbValue::REAL(v) => Value::Float(f64::from(v)),
        HdbValue::DOUBLE(v) => Value::Float(v),
        HdbValue::STRING(v) => Value::Text(v),
        HdbValue::BOOLEAN(v) => Value::Boolean(v),
        HdbValue::BINARY(v) => Value::Bytes(v),
        other => Value::Text(format!("{other:?}")),
    }
}

async fn with_timeout<F, T>(timeout: Duration, query_fn: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, hdbconnect::HdbError>>,
{
    tokio::time::timeout(timeout, query_fn)
        .await
        .map_err(|_| SourceError::Timeout(timeout))?
        .map_err(|e| SourceError::Query(e.to_string()))
}

/// Only a wait timeout means every connection is busy; anything else is a
/// failure to reach the database and keeps its cause.
fn pool_error(err: PoolError<hdbconnect::HdbError>) -> SourceError {
    match err {
        PoolError::Timeout(_) => SourceError::PoolExhausted,
        PoolError::Backend(e) => SourceError::Connection(e.to_string()),
        other => SourceError::Connection(other.to_string()),
    }
}

/// [`SqlSource`] over a pool of HANA connections for one identity
pub struct HanaSource {
    pool: Pool,
    query_timeout: Duration,
}

impl fmt::Debug for HanaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HanaSource")
            .field("pool", &self.pool.status())
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl HanaSource {
    pub const fn new(pool: Pool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl SqlSource for HanaSource {
    async fn query(&self, sql: &str, row_limit: usize) -> Result<RowSet, SourceError> {
        let conn = Box::pin(self.pool.get())
            .await
            .map_err(pool_error)?;

        let result_set = with_timeout(self.query_timeout, conn.query(sql)).await?;

        let metadata = result_set.metadata().clone();
        let all_rows = with_timeout(self.query_timeout, result_set.into_rows()).await?;

        let columns: Vec<String> = metadata
            .iter()
            .map(|col| col.columnname().to_string())
            .collect();

        let rows: Vec<Vec<Value>> = all_rows
            .into_iter()
            .take(row_limit)
            .map(|row| row.into_iter().map(hdb_value_to_value).collect())
            .collect();

        tracing::debug!(
            source.rows = rows.len(),
            source.columns = columns.len(),
            "HANA query completed"
        );

        Ok(RowSet::infer(columns, rows))
    }
}

/// Creates one [`HanaSource`] with its own connection pool per identity.
#[derive(Debug, Clone, Copy)]
pub struct HanaSourceFactory {
    pool_size: usize,
    query_timeout: Duration,
}

impl HanaSourceFactory {
    #[must_use]
    pub const fn new(pool_size: usize, query_timeout: Duration) -> Self {
        Self {
            pool_size,
            query_timeout,
        }
    }

    #[must_use]
    pub const fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.connection_pool_size, config.query_timeout)
    }
}

impl SourceFactory for HanaSourceFactory {
    fn create(&self, connection: &ConnectionInfo) -> Result<Arc<dyn SqlSource>, SourceError> {
        let pool = create_pool(connection_url(connection)?, self.pool_size)?;
        Ok(Arc::new(HanaSource::new(pool, self.query_timeout)))
    }
}
