use std::sync::Arc;

use crate::binding::{BatchSetter, ParametrizedBatchSetter, PreparedStatementSetter};
use crate::database::Database;
use crate::error::Result;
use crate::mapping::{RowExtractor, RowMapper};
use crate::traits::{
    schedule, ConnectionSource, PreparedStatementCreator, PreparedStatementFunction,
    StatementFunction, TaskExecutor, TaskHandle,
};
use crate::types::{SqlType, Value};

#[cfg(feature = "mysql")]
use crate::credentials::{Credentials, PoolSettings};

/// Setter handed to the asynchronous operations.
pub type BoxedSetter = Box<dyn PreparedStatementSetter>;

/// Same operations as [`Database`], run on a [`TaskExecutor`].
///
/// Every call returns at once with a [`TaskHandle`]; the work itself runs on
/// the executor. Arguments are taken by value so the work can outlive the
/// caller's borrows.
///
/// # Example
/// ```ignore
/// let db = AsyncDatabase::connect(&credentials, tokio::runtime::Handle::current()).await?;
/// db.update_typed(
///     "UPDATE users SET score = ? WHERE id = ?",
///     vec![Value::from(10), Value::from(3)],
///     vec![SqlType::Integer, SqlType::Integer],
///     false,
/// )
/// .on_complete(db.executor(), |result| {
///     if let Err(e) = result {
///         tracing::error!(error = %e, "score update failed");
///     }
/// });
/// ```
pub struct AsyncDatabase<E: TaskExecutor> {
    database: Database,
    executor: E,
}

impl<E: TaskExecutor> AsyncDatabase<E> {
    pub fn new(database: Database, executor: E) -> Self {
        Self { database, executor }
    }

    #[cfg(feature = "mysql")]
    pub async fn connect(credentials: &Credentials, executor: E) -> Result<Self> {
        Ok(Self::new(Database::connect(credentials).await?, executor))
    }

    #[cfg(feature = "mysql")]
    pub async fn connect_with(
        credentials: &Credentials,
        settings: PoolSettings,
        executor: E,
    ) -> Result<Self> {
        Ok(Self::new(
            Database::connect_with(credentials, settings).await?,
            executor,
        ))
    }

    pub fn with_source(source: Arc<dyn ConnectionSource>, executor: E) -> Self {
        Self::new(Database::with_source(source), executor)
    }

    /// The facade the scheduled work runs against.
    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        self.database.source()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn close(&self) -> Result<()> {
        self.database.close().await
    }

    pub fn execute<T, F>(&self, action: F) -> TaskHandle<Option<T>>
    where
        T: Send + 'static,
        F: StatementFunction<T> + 'static,
    {
        let db = self.database.clone();
        schedule(&self.executor, async move { db.execute(&action).await })
    }

    pub fn execute_prepared<T, C, F>(&self, creator: C, action: F) -> TaskHandle<Option<T>>
    where
        T: Send + 'static,
        C: PreparedStatementCreator + 'static,
        F: PreparedStatementFunction<T> + 'static,
    {
        let db = self.database.clone();
        schedule(&self.executor, async move {
            db.execute_prepared(&creator, &action).await
        })
    }

    pub fn execute_sql<T, F>(&self, sql: impl Into<String>, action: F) -> TaskHandle<Option<T>>
    where
        T: Send + 'static,
        F: PreparedStatementFunction<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move { db.execute_sql(&sql, &action).await })
    }

    pub fn update(&self, sql: impl Into<String>, generated_key: bool) -> TaskHandle<Option<i64>> {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move { db.update(&sql, generated_key).await })
    }

    pub fn update_prepared<C>(
        &self,
        creator: C,
        setter: Option<BoxedSetter>,
        generated_key: bool,
    ) -> TaskHandle<Option<i64>>
    where
        C: PreparedStatementCreator + 'static,
    {
        let db = self.database.clone();
        schedule(&self.executor, async move {
            db.update_prepared(&creator, setter.as_deref(), generated_key)
                .await
        })
    }

    pub fn update_with(
        &self,
        sql: impl Into<String>,
        setter: Option<BoxedSetter>,
        generated_key: bool,
    ) -> TaskHandle<Option<i64>> {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.update_with(&sql, setter.as_deref(), generated_key).await
        })
    }

    pub fn update_typed(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        generated_key: bool,
    ) -> TaskHandle<Option<i64>> {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.update_typed(&sql, params, &types, generated_key).await
        })
    }

    pub fn query<R, X>(&self, sql: impl Into<String>, extractor: X) -> TaskHandle<Option<R>>
    where
        R: Send + 'static,
        X: RowExtractor<R> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move { db.query(&sql, &extractor).await })
    }

    pub fn query_or_else_get<R, X, G>(
        &self,
        sql: impl Into<String>,
        extractor: X,
        supplier: G,
    ) -> TaskHandle<R>
    where
        R: Send + 'static,
        X: RowExtractor<R> + 'static,
        G: FnOnce() -> R + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_or_else_get(&sql, &extractor, supplier).await
        })
    }

    pub fn query_for_list<T, M>(&self, sql: impl Into<String>, mapper: M) -> TaskHandle<Option<Vec<T>>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_list(&sql, &mapper).await
        })
    }

    pub fn query_for_list_or_else_get<T, M, G>(
        &self,
        sql: impl Into<String>,
        mapper: M,
        supplier: G,
    ) -> TaskHandle<Vec<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
        G: FnOnce() -> Vec<T> + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_list_or_else_get(&sql, &mapper, supplier).await
        })
    }

    pub fn query_for_object<T, M>(&self, sql: impl Into<String>, mapper: M) -> TaskHandle<Option<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_object(&sql, &mapper).await
        })
    }

    pub fn query_for_object_or_else_get<T, M, G>(
        &self,
        sql: impl Into<String>,
        mapper: M,
        supplier: G,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
        G: FnOnce() -> T + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_object_or_else_get(&sql, &mapper, supplier)
                .await
        })
    }

    pub fn query_prepared<R, C, X>(
        &self,
        creator: C,
        setter: Option<BoxedSetter>,
        extractor: X,
    ) -> TaskHandle<Option<R>>
    where
        R: Send + 'static,
        C: PreparedStatementCreator + 'static,
        X: RowExtractor<R> + 'static,
    {
        let db = self.database.clone();
        schedule(&self.executor, async move {
            db.query_prepared(&creator, setter.as_deref(), &extractor)
                .await
        })
    }

    pub fn query_with<R, X>(
        &self,
        sql: impl Into<String>,
        setter: Option<BoxedSetter>,
        extractor: X,
    ) -> TaskHandle<Option<R>>
    where
        R: Send + 'static,
        X: RowExtractor<R> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_with(&sql, setter.as_deref(), &extractor).await
        })
    }

    pub fn query_args<R, X>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        extractor: X,
    ) -> TaskHandle<Option<R>>
    where
        R: Send + 'static,
        X: RowExtractor<R> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_args(&sql, params, &extractor).await
        })
    }

    pub fn query_typed<R, X>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        extractor: X,
    ) -> TaskHandle<Option<R>>
    where
        R: Send + 'static,
        X: RowExtractor<R> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_typed(&sql, params, &types, &extractor).await
        })
    }

    pub fn query_typed_or_else_get<R, X, G>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        extractor: X,
        supplier: G,
    ) -> TaskHandle<R>
    where
        R: Send + 'static,
        X: RowExtractor<R> + 'static,
        G: FnOnce() -> R + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_typed_or_else_get(&sql, params, &types, &extractor, supplier)
                .await
        })
    }

    pub fn query_for_list_args<T, M>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        mapper: M,
    ) -> TaskHandle<Option<Vec<T>>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_list_args(&sql, params, &mapper).await
        })
    }

    pub fn query_for_list_args_or_else_get<T, M, G>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        mapper: M,
        supplier: G,
    ) -> TaskHandle<Vec<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
        G: FnOnce() -> Vec<T> + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_list_args_or_else_get(&sql, params, &mapper, supplier)
                .await
        })
    }

    pub fn query_for_list_typed<T, M>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        mapper: M,
    ) -> TaskHandle<Option<Vec<T>>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_list_typed(&sql, params, &types, &mapper).await
        })
    }

    pub fn query_for_list_typed_or_else_get<T, M, G>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        mapper: M,
        supplier: G,
    ) -> TaskHandle<Vec<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
        G: FnOnce() -> Vec<T> + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_list_typed_or_else_get(&sql, params, &types, &mapper, supplier)
                .await
        })
    }

    pub fn query_for_object_args<T, M>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        mapper: M,
    ) -> TaskHandle<Option<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_object_args(&sql, params, &mapper).await
        })
    }

    pub fn query_for_object_args_or_else_get<T, M, G>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        mapper: M,
        supplier: G,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
        G: FnOnce() -> T + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_object_args_or_else_get(&sql, params, &mapper, supplier)
                .await
        })
    }

    pub fn query_for_object_typed<T, M>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        mapper: M,
    ) -> TaskHandle<Option<T>>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_object_typed(&sql, params, &types, &mapper)
                .await
        })
    }

    pub fn query_for_object_typed_or_else_get<T, M, G>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        types: Vec<SqlType>,
        mapper: M,
        supplier: G,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        M: RowMapper<T> + 'static,
        G: FnOnce() -> T + Send + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.query_for_object_typed_or_else_get(&sql, params, &types, &mapper, supplier)
                .await
        })
    }

    pub fn batch_update<B>(&self, sql: impl Into<String>, setter: B) -> TaskHandle<Option<Vec<u64>>>
    where
        B: BatchSetter + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.batch_update(&sql, &setter).await
        })
    }

    pub fn batch_update_typed(
        &self,
        sql: impl Into<String>,
        rows: Vec<Vec<Value>>,
        types: Vec<SqlType>,
    ) -> TaskHandle<Option<Vec<u64>>> {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.batch_update_typed(&sql, rows, &types).await
        })
    }

    pub fn batch_update_with<T, P>(
        &self,
        sql: impl Into<String>,
        items: Vec<T>,
        setter: P,
    ) -> TaskHandle<Option<Vec<u64>>>
    where
        T: Send + Sync + 'static,
        P: ParametrizedBatchSetter<T> + 'static,
    {
        let db = self.database.clone();
        let sql = sql.into();
        schedule(&self.executor, async move {
            db.batch_update_with(&sql, &items, &setter).await
        })
    }
}

impl<E: TaskExecutor + std::fmt::Debug> std::fmt::Debug for AsyncDatabase<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDatabase")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
