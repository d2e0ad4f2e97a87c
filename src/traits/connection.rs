use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::{Result, SqlError};
use crate::types::{ResultSet, SqlType, Value};

/// Result type for raw driver calls.
pub type SqlResult<T> = std::result::Result<T, SqlError>;

/// A single typed bind call recorded against a prepared statement.
///
/// Drivers translate these to their native parameter representation.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundParameter {
    /// NULL of a declared type
    Null(SqlType),
    String(String),
    /// National character string (NCHAR family)
    NString(String),
    /// Character large object, streamed rather than sent inline
    Clob(String),
    NClob(String),
    Decimal(Decimal),
    Bool(bool),
    /// Date, optionally interpreted in the given offset
    Date(NaiveDate, Option<FixedOffset>),
    Time(NaiveTime, Option<FixedOffset>),
    Timestamp(NaiveDateTime, Option<FixedOffset>),
    /// Generic bind, the driver decides the conversion
    Object(Value, Option<SqlType>),
}

/// A parameterized statement accepting positional values (1-based).
///
/// Only [`PreparedStatement::bind`] is required for binding; the typed
/// setters are conveniences that record the matching [`BoundParameter`].
#[async_trait]
pub trait PreparedStatement: Send {
    /// SQL text this statement was prepared from.
    fn sql(&self) -> &str;

    fn bind(&mut self, index: usize, parameter: BoundParameter) -> SqlResult<()>;

    /// Discards all bound parameters of the current execution.
    fn clear_parameters(&mut self);

    /// Whether the owning connection supports batch updates.
    fn supports_batch_updates(&self) -> bool;

    /// Stores the current parameters as one batch entry and clears them.
    fn add_batch(&mut self) -> SqlResult<()>;

    async fn execute_query(&mut self) -> SqlResult<ResultSet>;

    /// Executes a data-modifying statement, returns the affected row count.
    async fn execute_update(&mut self) -> SqlResult<u64>;

    /// Keys generated by the last update. Empty unless the statement was
    /// prepared with generated keys requested.
    async fn generated_keys(&mut self) -> SqlResult<ResultSet>;

    async fn execute_batch(&mut self) -> SqlResult<Vec<u64>>;

    async fn close(&mut self) -> SqlResult<()>;

    fn set_null(&mut self, index: usize, sql_type: SqlType) -> SqlResult<()> {
        self.bind(index, BoundParameter::Null(sql_type))
    }

    fn set_string(&mut self, index: usize, value: String) -> SqlResult<()> {
        self.bind(index, BoundParameter::String(value))
    }

    fn set_nstring(&mut self, index: usize, value: String) -> SqlResult<()> {
        self.bind(index, BoundParameter::NString(value))
    }

    fn set_clob(&mut self, index: usize, value: String) -> SqlResult<()> {
        self.bind(index, BoundParameter::Clob(value))
    }

    fn set_nclob(&mut self, index: usize, value: String) -> SqlResult<()> {
        self.bind(index, BoundParameter::NClob(value))
    }

    fn set_decimal(&mut self, index: usize, value: Decimal) -> SqlResult<()> {
        self.bind(index, BoundParameter::Decimal(value))
    }

    fn set_bool(&mut self, index: usize, value: bool) -> SqlResult<()> {
        self.bind(index, BoundParameter::Bool(value))
    }

    fn set_date(
        &mut self,
        index: usize,
        value: NaiveDate,
        offset: Option<FixedOffset>,
    ) -> SqlResult<()> {
        self.bind(index, BoundParameter::Date(value, offset))
    }

    fn set_time(
        &mut self,
        index: usize,
        value: NaiveTime,
        offset: Option<FixedOffset>,
    ) -> SqlResult<()> {
        self.bind(index, BoundParameter::Time(value, offset))
    }

    fn set_timestamp(
        &mut self,
        index: usize,
        value: NaiveDateTime,
        offset: Option<FixedOffset>,
    ) -> SqlResult<()> {
        self.bind(index, BoundParameter::Timestamp(value, offset))
    }

    fn set_object(
        &mut self,
        index: usize,
        value: Value,
        sql_type: Option<SqlType>,
    ) -> SqlResult<()> {
        self.bind(index, BoundParameter::Object(value, sql_type))
    }
}

/// A plain statement that executes SQL text directly.
#[async_trait]
pub trait Statement: Send {
    async fn execute_query(&mut self, sql: &str) -> SqlResult<ResultSet>;

    async fn execute_update(&mut self, sql: &str, return_generated_keys: bool) -> SqlResult<u64>;

    async fn generated_keys(&mut self) -> SqlResult<ResultSet>;

    async fn close(&mut self) -> SqlResult<()>;
}

/// A live database connection taken from a [`ConnectionSource`].
#[async_trait]
pub trait Connection: Send + Sync {
    async fn create_statement(&self) -> SqlResult<Box<dyn Statement>>;

    async fn prepare_statement(
        &self,
        sql: &str,
        return_generated_keys: bool,
    ) -> SqlResult<Box<dyn PreparedStatement>>;

    fn supports_batch_updates(&self) -> bool;

    /// Releases the connection (back to its pool, for pooled sources).
    async fn close(&mut self) -> SqlResult<()>;
}

/// Trait for connection providers.
/// Sources are responsible for:
/// - Owning whatever pool backs the connections
/// - Handing out one connection per call
/// - Shutting the pool down on [`ConnectionSource::close`]
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Takes a connection.
    ///
    /// Fails with [`crate::RowForgeError::ConnectionRetrieve`] when the pool
    /// cannot hand one out, including once the source is closed. `Ok(None)`
    /// means an open source has no connection to offer.
    async fn acquire(&self) -> Result<Option<Box<dyn Connection>>>;

    async fn close(&self) -> Result<()>;
}
