//! Pooled MySQL source built on `mysql_async`.
//!
//! Every prepared statement is prepared server-side and kept in the
//! connection's statement cache, except statements whose SQL is longer than
//! [`PoolSettings::prepared_statement_cache_sql_limit`], which are closed
//! again when the statement is closed.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::credentials::{Credentials, PoolSettings};
use crate::error::{Result, RowForgeError, SqlError};
use crate::traits::{
    BoundParameter, Connection, ConnectionSource, PreparedStatement, SqlResult, Statement,
};
use crate::types::{ColumnMeta, ResultSet, Value};

fn sql_error(err: mysql_async::Error) -> SqlError {
    match err {
        mysql_async::Error::Server(server) => SqlError::new(server.message)
            .with_code(i32::from(server.code))
            .with_state(server.state),
        other => SqlError::new(other.to_string()),
    }
}

/// Runs a driver call, failing it once the socket timeout elapses.
async fn timed<T, F>(limit: Duration, call: F) -> SqlResult<T>
where
    F: Future<Output = std::result::Result<T, mysql_async::Error>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(sql_error),
        Err(_) => Err(SqlError::new(format!(
            "Read timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

fn connection_closed() -> SqlError {
    SqlError::new("No operations allowed after connection closed.")
}

fn date_value(date: NaiveDate) -> mysql_async::Value {
    mysql_async::Value::Date(
        date.year() as u16,
        date.month() as u8,
        date.day() as u8,
        0,
        0,
        0,
        0,
    )
}

fn time_value(time: NaiveTime) -> mysql_async::Value {
    mysql_async::Value::Time(
        false,
        0,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
        time.nanosecond() / 1000,
    )
}

fn datetime_value(dt: NaiveDateTime) -> mysql_async::Value {
    mysql_async::Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1000,
    )
}

/// Convert a Value to a MySQL compatible parameter
fn value_to_mysql(value: Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::from(b),
        Value::Int8(n) => mysql_async::Value::from(n),
        Value::Int16(n) => mysql_async::Value::from(n),
        Value::Int32(n) => mysql_async::Value::from(n),
        Value::Int64(n) => mysql_async::Value::from(n),
        Value::Float32(n) => mysql_async::Value::from(n),
        Value::Float64(n) => mysql_async::Value::from(n),
        // MySQL accepts decimals as strings to preserve precision
        Value::Decimal(d) => mysql_async::Value::from(d.to_string()),
        Value::String(s) => mysql_async::Value::from(s),
        Value::Bytes(b) => mysql_async::Value::from(b),
        Value::Date(d) => date_value(d),
        Value::Time(t) => time_value(t),
        Value::DateTime(dt) => datetime_value(dt),
        Value::DateTimeTz(dt) => datetime_value(dt.naive_utc()),
        Value::Uuid(u) => mysql_async::Value::from(u.to_string()),
    }
}

fn parameter_to_mysql(parameter: BoundParameter) -> mysql_async::Value {
    match parameter {
        BoundParameter::Null(_) => mysql_async::Value::NULL,
        BoundParameter::String(s)
        | BoundParameter::NString(s)
        | BoundParameter::Clob(s)
        | BoundParameter::NClob(s) => mysql_async::Value::from(s),
        BoundParameter::Decimal(d) => mysql_async::Value::from(d.to_string()),
        BoundParameter::Bool(b) => mysql_async::Value::from(b),
        BoundParameter::Date(d, _) => date_value(d),
        BoundParameter::Time(t, _) => time_value(t),
        BoundParameter::Timestamp(dt, None) => datetime_value(dt),
        BoundParameter::Timestamp(dt, Some(offset)) => {
            datetime_value(dt - chrono::Duration::seconds(i64::from(offset.local_minus_utc())))
        }
        BoundParameter::Object(value, _) => value_to_mysql(value),
    }
}

/// Convert a MySQL value to a Value, using the column type where the
/// protocol leaves it ambiguous
fn mysql_to_value(value: mysql_async::Value, column_type: Option<ColumnType>) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => match column_type {
            Some(ColumnType::MYSQL_TYPE_NEWDECIMAL | ColumnType::MYSQL_TYPE_DECIMAL) => {
                match std::str::from_utf8(&b).ok().and_then(|s| s.parse::<Decimal>().ok()) {
                    Some(d) => Value::Decimal(d),
                    None => Value::Bytes(b),
                }
            }
            _ => match String::from_utf8(b) {
                Ok(s) => Value::String(s),
                Err(e) => Value::Bytes(e.into_bytes()),
            },
        },
        mysql_async::Value::Int(n) => Value::Int64(n),
        mysql_async::Value::UInt(n) => match i64::try_from(n) {
            Ok(n) => Value::Int64(n),
            Err(_) => Value::Decimal(Decimal::from(n)),
        },
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
            else {
                // Zero dates ('0000-00-00') have no calendar equivalent
                return Value::Null;
            };
            let is_date_column = matches!(
                column_type,
                Some(ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE)
            );
            if is_date_column {
                return Value::Date(date);
            }
            NaiveTime::from_hms_micro_opt(u32::from(hour), u32::from(min), u32::from(sec), micro)
                .map(|time| Value::DateTime(NaiveDateTime::new(date, time)))
                .unwrap_or(Value::Null)
        }
        mysql_async::Value::Time(neg, days, hour, min, sec, micro) => {
            let hours = days * 24 + u32::from(hour);
            let time_of_day = if neg || hours >= 24 {
                None
            } else {
                NaiveTime::from_hms_micro_opt(hours, u32::from(min), u32::from(sec), micro)
            };
            // Durations outside a single day keep MySQL's own text form
            match time_of_day {
                Some(time) => Value::Time(time),
                None => Value::String(duration_text(neg, hours, min, sec, micro)),
            }
        }
    }
}

fn duration_text(neg: bool, hours: u32, min: u8, sec: u8, micro: u32) -> String {
    let sign = if neg { "-" } else { "" };
    if micro == 0 {
        format!("{}{:02}:{:02}:{:02}", sign, hours, min, sec)
    } else {
        format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, min, sec, micro)
    }
}

fn column_meta(column: &Column) -> ColumnMeta {
    let name = column.org_name_str();
    let label = column.name_str();
    if name.is_empty() {
        ColumnMeta::new(label.into_owned())
    } else {
        ColumnMeta::new(name.into_owned()).with_label(label.into_owned())
    }
}

fn into_result_set(columns: &[Column], rows: Vec<mysql_async::Row>) -> ResultSet {
    let types: Vec<ColumnType> = columns.iter().map(Column::column_type).collect();
    let rows = rows
        .into_iter()
        .map(|row| {
            (0..row.len())
                .map(|i| {
                    let value = row.as_ref(i).cloned().unwrap_or(mysql_async::Value::NULL);
                    mysql_to_value(value, types.get(i).copied())
                })
                .collect()
        })
        .collect();
    ResultSet::new(columns.iter().map(column_meta).collect(), rows)
}

fn generated_keys_result(last_insert_id: Option<u64>) -> ResultSet {
    match last_insert_id {
        Some(id) => ResultSet::new(
            vec![ColumnMeta::new("GENERATED_KEY")],
            vec![vec![mysql_to_value(mysql_async::Value::UInt(id), None)]],
        ),
        None => ResultSet::empty(),
    }
}

fn url_with_properties(base: String, properties: &BTreeMap<String, String>) -> String {
    if properties.is_empty() {
        return base;
    }
    let query: Vec<String> = properties
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    format!("{}?{}", base, query.join("&"))
}

/// A [`ConnectionSource`] backed by a `mysql_async` pool.
pub struct MySqlSource {
    pool: parking_lot::Mutex<Option<Pool>>,
    pool_name: String,
    settings: Arc<PoolSettings>,
}

impl MySqlSource {
    /// Creates the pool. No connection is opened until the first `acquire`.
    pub fn new(credentials: &Credentials, settings: PoolSettings) -> Result<Self> {
        let url = url_with_properties(credentials.connection_url(), &settings.properties);
        let opts = Opts::from_url(&url).map_err(|e| {
            RowForgeError::data_source_init(format!("Invalid connection URL {}", url), e)
        })?;

        let constraints = PoolConstraints::new(settings.min_idle, settings.max_pool_size)
            .ok_or_else(|| RowForgeError::DataSourceInit {
                message: format!(
                    "min idle ({}) must not exceed max pool size ({})",
                    settings.min_idle, settings.max_pool_size
                ),
                source: None,
            })?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_abs_conn_ttl(Some(settings.max_lifetime));

        let cache_size = if settings.cache_prepared_statements {
            settings.prepared_statement_cache_size
        } else {
            0
        };
        let opts = OptsBuilder::from_opts(opts)
            .user(Some(credentials.username()))
            .pass(credentials.password())
            .stmt_cache_size(cache_size)
            .pool_opts(pool_opts);

        let pool = Pool::new(opts);
        info!(
            pool = credentials.pool_name(),
            url = %credentials.connection_url(),
            max_pool_size = settings.max_pool_size,
            "MySQL pool created"
        );

        Ok(Self {
            pool: parking_lot::Mutex::new(Some(pool)),
            pool_name: credentials.pool_name().to_string(),
            settings: Arc::new(settings),
        })
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

#[async_trait]
impl ConnectionSource for MySqlSource {
    async fn acquire(&self) -> Result<Option<Box<dyn Connection>>> {
        let pool = self.pool.lock().clone();
        let Some(pool) = pool else {
            return Err(RowForgeError::ConnectionRetrieve {
                message: format!("{} - pool has been closed", self.pool_name),
                source: None,
            });
        };

        let timeout = self.settings.connection_timeout;
        let conn = match tokio::time::timeout(timeout, pool.get_conn()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                return Err(RowForgeError::connection_retrieve(
                    format!("{} - cannot open a connection", self.pool_name),
                    e,
                ))
            }
            Err(_) => {
                return Err(RowForgeError::ConnectionRetrieve {
                    message: format!(
                        "{} - Connection is not available, request timed out after {}ms.",
                        self.pool_name,
                        timeout.as_millis()
                    ),
                    source: None,
                })
            }
        };

        Ok(Some(Box::new(MySqlConnection {
            conn: Arc::new(Mutex::new(Some(conn))),
            pool_name: self.pool_name.clone(),
            settings: Arc::clone(&self.settings),
            acquired_at: Instant::now(),
        })))
    }

    async fn close(&self) -> Result<()> {
        let pool = self.pool.lock().take();
        if let Some(pool) = pool {
            pool.disconnect().await.map_err(|e| {
                RowForgeError::data_source_init(format!("{} - shutdown failed", self.pool_name), e)
            })?;
            info!(pool = %self.pool_name, "MySQL pool closed");
        }
        Ok(())
    }
}

type SharedConn = Arc<Mutex<Option<Conn>>>;

struct MySqlConnection {
    conn: SharedConn,
    pool_name: String,
    settings: Arc<PoolSettings>,
    acquired_at: Instant,
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn create_statement(&self) -> SqlResult<Box<dyn Statement>> {
        Ok(Box::new(MySqlStatement {
            conn: Arc::clone(&self.conn),
            socket_timeout: self.settings.socket_timeout,
            last_insert_id: None,
        }))
    }

    async fn prepare_statement(
        &self,
        sql: &str,
        return_generated_keys: bool,
    ) -> SqlResult<Box<dyn PreparedStatement>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(connection_closed)?;
        let statement = timed(self.settings.socket_timeout, conn.prep(sql)).await?;
        let cached = self.settings.cache_prepared_statements
            && sql.len() <= self.settings.prepared_statement_cache_sql_limit;

        Ok(Box::new(MySqlPreparedStatement {
            conn: Arc::clone(&self.conn),
            sql: sql.to_string(),
            statement,
            cached,
            params: BTreeMap::new(),
            batch: Vec::new(),
            return_generated_keys,
            last_insert_id: None,
            socket_timeout: self.settings.socket_timeout,
        }))
    }

    fn supports_batch_updates(&self) -> bool {
        true
    }

    async fn close(&mut self) -> SqlResult<()> {
        // Dropping a pooled connection hands it back to the pool
        let conn = self.conn.lock().await.take();
        if conn.is_some() {
            let held = self.acquired_at.elapsed();
            if held > self.settings.leak_detection_threshold {
                warn!(
                    pool = %self.pool_name,
                    held_ms = held.as_millis() as u64,
                    "Connection held longer than the leak detection threshold"
                );
            }
        }
        Ok(())
    }
}

struct MySqlStatement {
    conn: SharedConn,
    socket_timeout: Duration,
    last_insert_id: Option<u64>,
}

#[async_trait]
impl Statement for MySqlStatement {
    async fn execute_query(&mut self, sql: &str) -> SqlResult<ResultSet> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(connection_closed)?;
        let rows: Vec<mysql_async::Row> = timed(self.socket_timeout, conn.query(sql)).await?;
        let columns = rows
            .first()
            .map(|row| row.columns_ref().to_vec())
            .unwrap_or_default();
        Ok(into_result_set(&columns, rows))
    }

    async fn execute_update(&mut self, sql: &str, return_generated_keys: bool) -> SqlResult<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(connection_closed)?;
        timed(self.socket_timeout, conn.query_drop(sql)).await?;
        self.last_insert_id = if return_generated_keys {
            conn.last_insert_id()
        } else {
            None
        };
        Ok(conn.affected_rows())
    }

    async fn generated_keys(&mut self) -> SqlResult<ResultSet> {
        Ok(generated_keys_result(self.last_insert_id))
    }

    async fn close(&mut self) -> SqlResult<()> {
        Ok(())
    }
}

struct MySqlPreparedStatement {
    conn: SharedConn,
    sql: String,
    statement: mysql_async::Statement,
    cached: bool,
    params: BTreeMap<usize, BoundParameter>,
    batch: Vec<Vec<mysql_async::Value>>,
    return_generated_keys: bool,
    last_insert_id: Option<u64>,
    socket_timeout: Duration,
}

impl MySqlPreparedStatement {
    fn take_params(&mut self) -> SqlResult<Vec<mysql_async::Value>> {
        let expected = usize::from(self.statement.num_params());
        if let Some(missing) = (1..=expected).find(|i| !self.params.contains_key(i)) {
            return Err(SqlError::new(format!(
                "No value specified for parameter {}",
                missing
            )));
        }
        Ok(std::mem::take(&mut self.params)
            .into_values()
            .map(parameter_to_mysql)
            .collect())
    }
}

#[async_trait]
impl PreparedStatement for MySqlPreparedStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, parameter: BoundParameter) -> SqlResult<()> {
        let expected = usize::from(self.statement.num_params());
        if index == 0 || index > expected {
            return Err(SqlError::new(format!(
                "Parameter index out of range ({} > number of parameters, which is {}).",
                index, expected
            )));
        }
        self.params.insert(index, parameter);
        Ok(())
    }

    fn clear_parameters(&mut self) {
        self.params.clear();
    }

    fn supports_batch_updates(&self) -> bool {
        true
    }

    fn add_batch(&mut self) -> SqlResult<()> {
        let params = self.take_params()?;
        self.batch.push(params);
        Ok(())
    }

    async fn execute_query(&mut self) -> SqlResult<ResultSet> {
        let params = self.take_params()?;
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(connection_closed)?;
        let rows: Vec<mysql_async::Row> =
            timed(self.socket_timeout, conn.exec(&self.statement, params)).await?;
        Ok(into_result_set(self.statement.columns(), rows))
    }

    async fn execute_update(&mut self) -> SqlResult<u64> {
        let params = self.take_params()?;
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(connection_closed)?;
        timed(self.socket_timeout, conn.exec_drop(&self.statement, params)).await?;
        self.last_insert_id = if self.return_generated_keys {
            conn.last_insert_id()
        } else {
            None
        };
        Ok(conn.affected_rows())
    }

    async fn generated_keys(&mut self) -> SqlResult<ResultSet> {
        Ok(generated_keys_result(self.last_insert_id))
    }

    async fn execute_batch(&mut self) -> SqlResult<Vec<u64>> {
        let batch = std::mem::take(&mut self.batch);
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(connection_closed)?;
        let mut counts = Vec::with_capacity(batch.len());
        for params in batch {
            timed(self.socket_timeout, conn.exec_drop(&self.statement, params)).await?;
            counts.push(conn.affected_rows());
        }
        debug!(sql = %self.sql, entries = counts.len(), "Batch executed");
        Ok(counts)
    }

    async fn close(&mut self) -> SqlResult<()> {
        if self.cached {
            return Ok(());
        }
        let mut guard = self.conn.lock().await;
        match guard.as_mut() {
            Some(conn) => timed(self.socket_timeout, conn.close(self.statement.clone())).await,
            None => Ok(()),
        }
    }
}
