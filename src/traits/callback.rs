use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::traits::{Connection, PreparedStatement, SqlResult, Statement};

/// Work performed with a plain [`Statement`].
///
/// `sql()` lets the lifecycle helper attach the SQL text to data access
/// failures.
#[async_trait]
pub trait StatementFunction<T: Send>: Send + Sync {
    async fn apply(&self, statement: &mut dyn Statement) -> Result<T>;

    fn sql(&self) -> Option<&str> {
        None
    }
}

/// Work performed with a [`PreparedStatement`].
#[async_trait]
pub trait PreparedStatementFunction<T: Send>: Send + Sync {
    async fn apply(&self, statement: &mut dyn PreparedStatement) -> Result<T>;

    fn sql(&self) -> Option<&str> {
        None
    }
}

/// Creates a prepared statement on a given connection.
#[async_trait]
pub trait PreparedStatementCreator: Send + Sync {
    async fn create(&self, connection: &dyn Connection) -> SqlResult<Box<dyn PreparedStatement>>;

    fn sql(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
impl<T, F> StatementFunction<T> for F
where
    T: Send + 'static,
    F: for<'a> Fn(&'a mut dyn Statement) -> BoxFuture<'a, Result<T>> + Send + Sync,
{
    async fn apply(&self, statement: &mut dyn Statement) -> Result<T> {
        (self)(statement).await
    }
}

#[async_trait]
impl<T, F> PreparedStatementFunction<T> for F
where
    T: Send + 'static,
    F: for<'a> Fn(&'a mut dyn PreparedStatement) -> BoxFuture<'a, Result<T>> + Send + Sync,
{
    async fn apply(&self, statement: &mut dyn PreparedStatement) -> Result<T> {
        (self)(statement).await
    }
}
