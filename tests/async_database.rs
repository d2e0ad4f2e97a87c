use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use rowforge::drivers::{InMemoryTestDriver, InMemoryTestResponse, InMemoryTestResponseBuilder};
use rowforge::error::ErrorKind;
use rowforge::mapping::SingleColumnMapper;
use rowforge::traits::PreparedStatement;
use rowforge::{AsyncDatabase, DefaultSetter, Result, SqlType, TaskExecutor, Value};

fn async_database(driver: &InMemoryTestDriver) -> AsyncDatabase<Handle> {
    AsyncDatabase::with_source(Arc::new(driver.clone()), Handle::current())
}

#[tokio::test]
async fn test_query_runs_on_the_executor() {
    let driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["name"])
            .row(["Ann"])
            .row(["Bob"])
            .build(),
    );
    let db = async_database(&driver);

    let names = db
        .query_for_list_typed(
            "SELECT name FROM users WHERE score > ?",
            vec![Value::from(3)],
            vec![SqlType::Integer],
            SingleColumnMapper::<String>::new(),
        )
        .await
        .unwrap();

    assert_eq!(names, Some(vec!["Ann".to_string(), "Bob".to_string()]));
    driver.assert_all_released();
}

#[tokio::test]
async fn test_on_complete_delivers_the_result() {
    let driver = InMemoryTestDriver::new().with_response(InMemoryTestResponse::update(2));
    let db = async_database(&driver);
    let (tx, rx) = oneshot::channel();

    db.update_with(
        "UPDATE users SET score = ? WHERE score < ?",
        Some(Box::new(DefaultSetter::new(
            vec![Value::from(0), Value::from(0)],
            vec![SqlType::Integer, SqlType::Integer],
        ))),
        false,
    )
    .on_complete(db.executor(), move |result| {
        let _ = tx.send(result);
    });

    assert_eq!(rx.await.unwrap().unwrap(), Some(2));
}

#[tokio::test]
async fn test_failures_arrive_through_the_handle() {
    let driver = InMemoryTestDriver::new().with_response(InMemoryTestResponse::error("Deadlock found"));
    let db = async_database(&driver);

    let err = db
        .query_for_object_args(
            "SELECT name FROM users WHERE id = ?",
            vec![Value::from(1)],
            SingleColumnMapper::<String>::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataAccess);
    assert_eq!(err.sql(), Some("SELECT name FROM users WHERE id = ?"));
    driver.assert_all_released();
}

#[tokio::test]
async fn test_supplier_runs_without_a_connection() {
    let driver = InMemoryTestDriver::new().without_connections();
    let db = async_database(&driver);

    let names = db
        .query_for_list_or_else_get(
            "SELECT name FROM users",
            SingleColumnMapper::<String>::new(),
            || vec!["fallback".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(names, vec!["fallback".to_string()]);
}

#[tokio::test]
async fn test_untyped_arguments_with_supplier() {
    let driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new().columns(&["name"]).build(),
    );
    let db = async_database(&driver);

    let name = db
        .query_for_object_args_or_else_get(
            "SELECT name FROM users WHERE id = ?",
            vec![Value::from(7)],
            SingleColumnMapper::<String>::new(),
            || "guest".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(name, "guest");
    driver.assert_all_released();
}

#[tokio::test]
async fn test_parametrized_batch_with_owned_items() {
    let driver = InMemoryTestDriver::new();
    let db = async_database(&driver);

    let counts = db
        .batch_update_with(
            "DELETE FROM users WHERE id = ?",
            vec![1i64, 2, 3],
            |statement: &mut dyn PreparedStatement, id: &i64| -> Result<()> {
                statement.set_object(1, Value::from(*id), Some(SqlType::BigInt))?;
                Ok(())
            },
        )
        .await
        .unwrap();

    assert_eq!(counts, Some(vec![1, 1, 1]));
    assert_eq!(driver.last_statement().unwrap().batch.len(), 3);
}

struct DroppingExecutor;

impl TaskExecutor for DroppingExecutor {
    fn submit(&self, _task: BoxFuture<'static, ()>) {}
}

#[tokio::test]
async fn test_dropped_work_resolves_to_aborted() {
    let driver = InMemoryTestDriver::new();
    let db = AsyncDatabase::with_source(Arc::new(driver.clone()), DroppingExecutor);

    let err = db.update("DELETE FROM users", false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TaskAborted);
    assert_eq!(driver.connections_opened(), 0);
}

#[tokio::test]
async fn test_try_take_before_and_after_completion() {
    let driver = InMemoryTestDriver::new();
    let db = AsyncDatabase::with_source(Arc::new(driver), DroppingExecutor);

    let mut handle = db.update("DELETE FROM users", false);
    assert!(matches!(
        handle.try_take(),
        Some(Err(rowforge::RowForgeError::TaskAborted))
    ));
}
