//! Statement creators and the callbacks behind the `Database` operations.

use async_trait::async_trait;

use crate::binding::{BatchSetter, ParametrizedBatchSetter, PreparedStatementSetter};
use crate::error::{Result, RowForgeError};
use crate::mapping::{RowExtractor, RowMapper};
use crate::traits::{
    Connection, PreparedStatement, PreparedStatementCreator, PreparedStatementFunction, SqlResult,
    Statement, StatementFunction,
};
use crate::types::{ResultSet, Row, SqlKind};

/// Prepares a fixed SQL string, optionally asking for generated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultCreator {
    sql: String,
    generated_keys: bool,
}

impl DefaultCreator {
    pub fn new(sql: impl Into<String>) -> Result<Self> {
        Self::with_generated_keys(sql, false)
    }

    pub fn with_generated_keys(sql: impl Into<String>, generated_keys: bool) -> Result<Self> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(RowForgeError::InvalidArgument(
                "Sql statement cannot be empty.".to_string(),
            ));
        }
        Ok(Self {
            sql,
            generated_keys,
        })
    }

    pub fn generated_keys(&self) -> bool {
        self.generated_keys
    }
}

#[async_trait]
impl PreparedStatementCreator for DefaultCreator {
    async fn create(&self, connection: &dyn Connection) -> SqlResult<Box<dyn PreparedStatement>> {
        connection
            .prepare_statement(&self.sql, self.generated_keys)
            .await
    }

    fn sql(&self) -> Option<&str> {
        Some(&self.sql)
    }
}

/// First column of the first generated-keys row, or 0 when there is none.
fn first_key(keys: ResultSet) -> Result<i64> {
    let mut cursor = keys.into_cursor();
    let Some(row) = cursor.next_row() else {
        return Ok(0);
    };
    if row.is_empty() {
        return Ok(0);
    }
    Ok(row.get_as(1, SqlKind::Int64)?.as_i64().unwrap_or(0))
}

/// Borrowed mapper, so one mapper instance serves many queries.
pub(crate) struct MapperRef<'m, M: ?Sized>(pub(crate) &'m M);

impl<T, M> RowMapper<T> for MapperRef<'_, M>
where
    M: RowMapper<T> + ?Sized,
{
    fn map_row(&self, row: &Row<'_>, row_number: usize) -> Result<T> {
        self.0.map_row(row, row_number)
    }
}

pub(crate) struct QueryCallback<'q, E: ?Sized> {
    pub(crate) sql: &'q str,
    pub(crate) extractor: &'q E,
}

#[async_trait]
impl<'q, R, E> StatementFunction<Option<R>> for QueryCallback<'q, E>
where
    R: Send + 'static,
    E: RowExtractor<R> + ?Sized,
{
    async fn apply(&self, statement: &mut dyn Statement) -> Result<Option<R>> {
        let mut cursor = statement.execute_query(self.sql).await?.into_cursor();
        self.extractor.extract(&mut cursor)
    }

    fn sql(&self) -> Option<&str> {
        Some(self.sql)
    }
}

pub(crate) struct UpdateCallback<'q> {
    pub(crate) sql: &'q str,
    pub(crate) generated_key: bool,
}

#[async_trait]
impl<'q> StatementFunction<i64> for UpdateCallback<'q> {
    async fn apply(&self, statement: &mut dyn Statement) -> Result<i64> {
        let affected = statement
            .execute_update(self.sql, self.generated_key)
            .await?;
        if self.generated_key {
            first_key(statement.generated_keys().await?)
        } else {
            Ok(i64::try_from(affected).unwrap_or(i64::MAX))
        }
    }

    fn sql(&self) -> Option<&str> {
        Some(self.sql)
    }
}

pub(crate) struct PreparedQueryCallback<'q, E: ?Sized> {
    pub(crate) setter: Option<&'q dyn PreparedStatementSetter>,
    pub(crate) extractor: &'q E,
}

#[async_trait]
impl<'q, R, E> PreparedStatementFunction<Option<R>> for PreparedQueryCallback<'q, E>
where
    R: Send + 'static,
    E: RowExtractor<R> + ?Sized,
{
    async fn apply(&self, statement: &mut dyn PreparedStatement) -> Result<Option<R>> {
        if let Some(setter) = self.setter {
            setter.set_values(statement)?;
        }
        let mut cursor = statement.execute_query().await?.into_cursor();
        self.extractor.extract(&mut cursor)
    }
}

pub(crate) struct PreparedUpdateCallback<'q> {
    pub(crate) setter: Option<&'q dyn PreparedStatementSetter>,
    pub(crate) generated_key: bool,
}

#[async_trait]
impl<'q> PreparedStatementFunction<i64> for PreparedUpdateCallback<'q> {
    async fn apply(&self, statement: &mut dyn PreparedStatement) -> Result<i64> {
        if let Some(setter) = self.setter {
            setter.set_values(statement)?;
        }
        let affected = statement.execute_update().await?;
        if self.generated_key {
            first_key(statement.generated_keys().await?)
        } else {
            Ok(i64::try_from(affected).unwrap_or(i64::MAX))
        }
    }
}

fn ensure_batch_support(statement: &dyn PreparedStatement) -> Result<()> {
    if statement.supports_batch_updates() {
        Ok(())
    } else {
        Err(RowForgeError::Unsupported(
            "This driver doesn't support batch updates.".to_string(),
        ))
    }
}

pub(crate) struct BatchCallback<'q, B: ?Sized> {
    pub(crate) setter: &'q B,
}

#[async_trait]
impl<'q, B> PreparedStatementFunction<Vec<u64>> for BatchCallback<'q, B>
where
    B: BatchSetter + ?Sized,
{
    async fn apply(&self, statement: &mut dyn PreparedStatement) -> Result<Vec<u64>> {
        ensure_batch_support(statement)?;
        for i in 0..self.setter.batch_size() {
            self.setter.set_values(statement, i)?;
            statement.add_batch()?;
        }
        Ok(statement.execute_batch().await?)
    }
}

pub(crate) struct ParametrizedBatchCallback<'q, T, P: ?Sized> {
    pub(crate) items: &'q [T],
    pub(crate) setter: &'q P,
}

#[async_trait]
impl<'q, T, P> PreparedStatementFunction<Vec<u64>> for ParametrizedBatchCallback<'q, T, P>
where
    T: Sync,
    P: ParametrizedBatchSetter<T> + ?Sized,
{
    async fn apply(&self, statement: &mut dyn PreparedStatement) -> Result<Vec<u64>> {
        ensure_batch_support(statement)?;
        for item in self.items {
            self.setter.set_values(statement, item)?;
            statement.add_batch()?;
        }
        Ok(statement.execute_batch().await?)
    }
}
