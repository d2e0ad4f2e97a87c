use std::sync::Arc;

use tracing::{debug, warn};

use crate::binding::{
    BatchSetter, DefaultBatchSetter, DefaultSetter, ParametrizedBatchSetter,
    PreparedStatementSetter, UnknownTypeSetter,
};
use crate::callbacks::{
    BatchCallback, DefaultCreator, MapperRef, ParametrizedBatchCallback, PreparedQueryCallback,
    PreparedUpdateCallback, QueryCallback, UpdateCallback,
};
use crate::error::{Result, RowForgeError};
use crate::mapping::{optional_single_result, single_result, DefaultExtractor, RowExtractor, RowMapper};
use crate::traits::{
    Connection, ConnectionSource, PreparedStatement, PreparedStatementCreator,
    PreparedStatementFunction, Statement, StatementFunction,
};
use crate::types::{SqlType, Value};

#[cfg(feature = "mysql")]
use crate::credentials::{Credentials, PoolSettings};
#[cfg(feature = "mysql")]
use crate::drivers::MySqlSource;

const STATEMENT_CONTEXT: &str = "statement callback";
const PREPARED_CONTEXT: &str = "prepared statement callback";

/// Runs SQL against a [`ConnectionSource`] on the awaiting task.
///
/// Every operation takes its own connection from the source and releases it,
/// together with the statement it created, before returning, on success and
/// failure alike.
///
/// Operations return `Ok(None)` when the source had no connection to give;
/// that case is logged and never an error.
///
/// # Example
/// ```ignore
/// let db = Database::connect(&credentials).await?;
/// let names = db
///     .query_for_list_typed(
///         "SELECT name FROM users WHERE score > ?",
///         vec![Value::from(10)],
///         &[SqlType::Integer],
///         &SingleColumnMapper::<String>::new(),
///     )
///     .await?;
/// ```
#[derive(Clone)]
pub struct Database {
    source: Arc<dyn ConnectionSource>,
}

impl Database {
    /// Create a pooled MySQL database with the default pool settings.
    #[cfg(feature = "mysql")]
    pub async fn connect(credentials: &Credentials) -> Result<Self> {
        Self::connect_with(credentials, PoolSettings::default()).await
    }

    #[cfg(feature = "mysql")]
    pub async fn connect_with(credentials: &Credentials, settings: PoolSettings) -> Result<Self> {
        let source = MySqlSource::new(credentials, settings)?;
        Ok(Self::with_source(Arc::new(source)))
    }

    /// Create a database over a custom source.
    /// Useful for testing or using alternative drivers.
    pub fn with_source(source: Arc<dyn ConnectionSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    /// Shuts the source down. Operations issued afterwards fail to acquire.
    pub async fn close(&self) -> Result<()> {
        self.source.close().await
    }

    async fn acquire(&self) -> Result<Option<Box<dyn Connection>>> {
        let connection = self.source.acquire().await.map_err(|e| match e {
            RowForgeError::Sql(err) => RowForgeError::ConnectionRetrieve {
                message: err.message.clone(),
                source: Some(Box::new(err)),
            },
            other => other,
        })?;
        if connection.is_none() {
            warn!("Cannot retrieve a connection.");
        }
        Ok(connection)
    }

    /// Runs `action` with a plain statement.
    ///
    /// Driver failures are reported as [`RowForgeError::DataAccess`] carrying
    /// the SQL the action exposes.
    pub async fn execute<T, F>(&self, action: &F) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: StatementFunction<T> + ?Sized,
    {
        let Some(mut connection) = self.acquire().await? else {
            return Ok(None);
        };

        let result = match connection.create_statement().await {
            Ok(mut statement) => {
                let result = action.apply(statement.as_mut()).await;
                close_statement(statement).await;
                result
            }
            Err(e) => Err(e.into()),
        };
        release_connection(connection.as_mut()).await;

        result
            .map(Some)
            .map_err(|e| e.into_data_access(STATEMENT_CONTEXT, action.sql()))
    }

    /// Runs `action` with the statement `creator` prepares.
    ///
    /// The SQL attached to failures comes from the creator, else the action.
    pub async fn execute_prepared<T, C, F>(&self, creator: &C, action: &F) -> Result<Option<T>>
    where
        T: Send + 'static,
        C: PreparedStatementCreator + ?Sized,
        F: PreparedStatementFunction<T> + ?Sized,
    {
        let Some(mut connection) = self.acquire().await? else {
            return Ok(None);
        };

        let result = match creator.create(connection.as_ref()).await {
            Ok(mut statement) => {
                let result = action.apply(statement.as_mut()).await;
                close_prepared(statement).await;
                result
            }
            Err(e) => Err(e.into()),
        };
        release_connection(connection.as_mut()).await;

        let sql = creator.sql().or_else(|| action.sql());
        result
            .map(Some)
            .map_err(|e| e.into_data_access(PREPARED_CONTEXT, sql))
    }

    /// Prepares `sql` and runs `action` with it.
    pub async fn execute_sql<T, F>(&self, sql: &str, action: &F) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: PreparedStatementFunction<T> + ?Sized,
    {
        let creator = DefaultCreator::new(sql)?;
        self.execute_prepared(&creator, action).await
    }

    /// Executes a data-modifying statement without parameters.
    ///
    /// Returns the affected row count, or the first generated key (0 when
    /// none was generated) if `generated_key` is set.
    pub async fn update(&self, sql: &str, generated_key: bool) -> Result<Option<i64>> {
        if generated_key {
            return self.update_with(sql, None, true).await;
        }
        debug!(sql, "Executing update");
        self.execute(&UpdateCallback {
            sql,
            generated_key,
        })
        .await
    }

    pub async fn update_prepared<C>(
        &self,
        creator: &C,
        setter: Option<&dyn PreparedStatementSetter>,
        generated_key: bool,
    ) -> Result<Option<i64>>
    where
        C: PreparedStatementCreator + ?Sized,
    {
        self.execute_prepared(
            creator,
            &PreparedUpdateCallback {
                setter,
                generated_key,
            },
        )
        .await
    }

    pub async fn update_with(
        &self,
        sql: &str,
        setter: Option<&dyn PreparedStatementSetter>,
        generated_key: bool,
    ) -> Result<Option<i64>> {
        debug!(sql, generated_key, "Executing prepared update");
        let creator = DefaultCreator::with_generated_keys(sql, generated_key)?;
        self.update_prepared(&creator, setter, generated_key).await
    }

    /// Binds `params` positionally with the matching type tags.
    pub async fn update_typed(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        generated_key: bool,
    ) -> Result<Option<i64>> {
        let setter = DefaultSetter::new(params, types.to_vec());
        self.update_with(sql, Some(&setter), generated_key).await
    }

    /// Runs a plain query and hands the whole result to `extractor`.
    pub async fn query<R, E>(&self, sql: &str, extractor: &E) -> Result<Option<R>>
    where
        R: Send + 'static,
        E: RowExtractor<R> + ?Sized,
    {
        debug!(sql, "Executing query");
        let result = self.execute(&QueryCallback { sql, extractor }).await?;
        Ok(result.flatten())
    }

    /// Like [`Database::query`], falling back to `supplier` when there is no
    /// result.
    pub async fn query_or_else_get<R, E, G>(&self, sql: &str, extractor: &E, supplier: G) -> Result<R>
    where
        R: Send + 'static,
        E: RowExtractor<R> + ?Sized,
        G: FnOnce() -> R,
    {
        Ok(self.query(sql, extractor).await?.unwrap_or_else(supplier))
    }

    pub async fn query_for_list<T, M>(&self, sql: &str, mapper: &M) -> Result<Option<Vec<T>>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
    {
        self.query(sql, &DefaultExtractor::new(MapperRef(mapper))).await
    }

    /// Falls back to `supplier` when there is no result or it has no rows.
    pub async fn query_for_list_or_else_get<T, M, G>(
        &self,
        sql: &str,
        mapper: &M,
        supplier: G,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
        G: FnOnce() -> Vec<T>,
    {
        let list = self.query_for_list(sql, mapper).await?;
        Ok(non_empty_or_else(list, supplier))
    }

    /// Exactly one row is expected; anything else is
    /// [`RowForgeError::IncorrectResultSize`].
    pub async fn query_for_object<T, M>(&self, sql: &str, mapper: &M) -> Result<Option<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
    {
        match self.query_for_list(sql, mapper).await? {
            Some(list) => single_result(Some(list)).map(Some),
            None => Ok(None),
        }
    }

    /// Zero rows call `supplier`; more than one row is still an error.
    pub async fn query_for_object_or_else_get<T, M, G>(
        &self,
        sql: &str,
        mapper: &M,
        supplier: G,
    ) -> Result<T>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
        G: FnOnce() -> T,
    {
        let list = self.query_for_list(sql, mapper).await?;
        Ok(optional_single_result(list)?.unwrap_or_else(supplier))
    }

    pub async fn query_prepared<R, C, E>(
        &self,
        creator: &C,
        setter: Option<&dyn PreparedStatementSetter>,
        extractor: &E,
    ) -> Result<Option<R>>
    where
        R: Send + 'static,
        C: PreparedStatementCreator + ?Sized,
        E: RowExtractor<R> + ?Sized,
    {
        let result = self
            .execute_prepared(creator, &PreparedQueryCallback { setter, extractor })
            .await?;
        Ok(result.flatten())
    }

    pub async fn query_with<R, E>(
        &self,
        sql: &str,
        setter: Option<&dyn PreparedStatementSetter>,
        extractor: &E,
    ) -> Result<Option<R>>
    where
        R: Send + 'static,
        E: RowExtractor<R> + ?Sized,
    {
        debug!(sql, "Executing prepared query");
        let creator = DefaultCreator::new(sql)?;
        self.query_prepared(&creator, setter, extractor).await
    }

    /// Binds `params` without type tags; the driver picks the conversions.
    pub async fn query_args<R, E>(&self, sql: &str, params: Vec<Value>, extractor: &E) -> Result<Option<R>>
    where
        R: Send + 'static,
        E: RowExtractor<R> + ?Sized,
    {
        let setter = UnknownTypeSetter::new(params);
        self.query_with(sql, Some(&setter), extractor).await
    }

    pub async fn query_typed<R, E>(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        extractor: &E,
    ) -> Result<Option<R>>
    where
        R: Send + 'static,
        E: RowExtractor<R> + ?Sized,
    {
        let setter = DefaultSetter::new(params, types.to_vec());
        self.query_with(sql, Some(&setter), extractor).await
    }

    pub async fn query_typed_or_else_get<R, E, G>(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        extractor: &E,
        supplier: G,
    ) -> Result<R>
    where
        R: Send + 'static,
        E: RowExtractor<R> + ?Sized,
        G: FnOnce() -> R,
    {
        let result = self.query_typed(sql, params, types, extractor).await?;
        Ok(result.unwrap_or_else(supplier))
    }

    pub async fn query_for_list_args<T, M>(
        &self,
        sql: &str,
        params: Vec<Value>,
        mapper: &M,
    ) -> Result<Option<Vec<T>>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
    {
        self.query_args(sql, params, &DefaultExtractor::new(MapperRef(mapper)))
            .await
    }

    pub async fn query_for_list_args_or_else_get<T, M, G>(
        &self,
        sql: &str,
        params: Vec<Value>,
        mapper: &M,
        supplier: G,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
        G: FnOnce() -> Vec<T>,
    {
        let list = self.query_for_list_args(sql, params, mapper).await?;
        Ok(non_empty_or_else(list, supplier))
    }

    pub async fn query_for_list_typed<T, M>(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        mapper: &M,
    ) -> Result<Option<Vec<T>>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
    {
        self.query_typed(sql, params, types, &DefaultExtractor::new(MapperRef(mapper)))
            .await
    }

    pub async fn query_for_list_typed_or_else_get<T, M, G>(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        mapper: &M,
        supplier: G,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
        G: FnOnce() -> Vec<T>,
    {
        let list = self.query_for_list_typed(sql, params, types, mapper).await?;
        Ok(non_empty_or_else(list, supplier))
    }

    pub async fn query_for_object_args<T, M>(
        &self,
        sql: &str,
        params: Vec<Value>,
        mapper: &M,
    ) -> Result<Option<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
    {
        match self.query_for_list_args(sql, params, mapper).await? {
            Some(list) => single_result(Some(list)).map(Some),
            None => Ok(None),
        }
    }

    pub async fn query_for_object_args_or_else_get<T, M, G>(
        &self,
        sql: &str,
        params: Vec<Value>,
        mapper: &M,
        supplier: G,
    ) -> Result<T>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
        G: FnOnce() -> T,
    {
        let list = self.query_for_list_args(sql, params, mapper).await?;
        Ok(optional_single_result(list)?.unwrap_or_else(supplier))
    }

    pub async fn query_for_object_typed<T, M>(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        mapper: &M,
    ) -> Result<Option<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
    {
        match self.query_for_list_typed(sql, params, types, mapper).await? {
            Some(list) => single_result(Some(list)).map(Some),
            None => Ok(None),
        }
    }

    pub async fn query_for_object_typed_or_else_get<T, M, G>(
        &self,
        sql: &str,
        params: Vec<Value>,
        types: &[SqlType],
        mapper: &M,
        supplier: G,
    ) -> Result<T>
    where
        T: Send + 'static,
        M: RowMapper<T> + ?Sized,
        G: FnOnce() -> T,
    {
        let list = self.query_for_list_typed(sql, params, types, mapper).await?;
        Ok(optional_single_result(list)?.unwrap_or_else(supplier))
    }

    /// Runs `setter.batch_size()` parameter sets as one batch.
    ///
    /// Fails with [`RowForgeError::Unsupported`] before binding anything when
    /// the connection cannot batch. Returns the per-entry update counts.
    pub async fn batch_update<B>(&self, sql: &str, setter: &B) -> Result<Option<Vec<u64>>>
    where
        B: BatchSetter + ?Sized,
    {
        debug!(sql, entries = setter.batch_size(), "Executing batch update");
        self.execute_sql(sql, &BatchCallback { setter }).await
    }

    /// One row of values per batch entry. An empty `rows` does nothing.
    pub async fn batch_update_typed(
        &self,
        sql: &str,
        rows: Vec<Vec<Value>>,
        types: &[SqlType],
    ) -> Result<Option<Vec<u64>>> {
        if rows.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let setter = DefaultBatchSetter::new(rows, types.to_vec());
        self.batch_update(sql, &setter).await
    }

    /// One batch entry per item, bound by `setter`. An empty `items` does
    /// nothing.
    pub async fn batch_update_with<T, P>(
        &self,
        sql: &str,
        items: &[T],
        setter: &P,
    ) -> Result<Option<Vec<u64>>>
    where
        T: Sync,
        P: ParametrizedBatchSetter<T> + ?Sized,
    {
        let creator = DefaultCreator::new(sql)?;
        if items.is_empty() {
            return Ok(Some(Vec::new()));
        }
        debug!(sql, entries = items.len(), "Executing batch update");
        self.execute_prepared(&creator, &ParametrizedBatchCallback { items, setter })
            .await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

fn non_empty_or_else<T>(list: Option<Vec<T>>, supplier: impl FnOnce() -> Vec<T>) -> Vec<T> {
    match list {
        Some(list) if !list.is_empty() => list,
        _ => supplier(),
    }
}

async fn close_statement(mut statement: Box<dyn Statement>) {
    if let Err(e) = statement.close().await {
        warn!(error = %e, "Could not close statement");
    }
}

async fn close_prepared(mut statement: Box<dyn PreparedStatement>) {
    if let Err(e) = statement.close().await {
        warn!(error = %e, sql = statement.sql(), "Could not close prepared statement");
    }
}

async fn release_connection(connection: &mut dyn Connection) {
    if let Err(e) = connection.close().await {
        warn!(error = %e, "Could not close connection");
    }
}
