use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, RowForgeError, SqlError};
use crate::traits::{
    BoundParameter, Connection, ConnectionSource, PreparedStatement, SqlResult, Statement,
};
use crate::types::{ColumnMeta, ResultSet, Value};

/// How a recorded statement was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Query,
    Update,
    Batch,
}

/// A recorded statement execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub kind: ExecutionKind,
    /// Parameters in index order; empty for plain statements.
    pub params: Vec<BoundParameter>,
    /// One parameter list per entry, for batches.
    pub batch: Vec<Vec<BoundParameter>>,
}

/// A scripted result for the next execution.
#[derive(Debug, Clone, PartialEq)]
pub enum InMemoryTestResponse {
    Rows(ResultSet),
    Update {
        affected: u64,
        generated_key: Option<Value>,
    },
    Batch(Vec<u64>),
    Error(SqlError),
}

impl InMemoryTestResponse {
    pub fn update(affected: u64) -> Self {
        Self::Update {
            affected,
            generated_key: None,
        }
    }

    pub fn update_with_key(affected: u64, key: impl Into<Value>) -> Self {
        Self::Update {
            affected,
            generated_key: Some(key.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(SqlError::new(message))
    }
}

enum AcquireMode {
    Available,
    Empty,
    Failing(String),
}

struct DriverState {
    responses: VecDeque<InMemoryTestResponse>,
    recorded: Vec<RecordedStatement>,
    acquire: AcquireMode,
    batch_support: bool,
    fail_statement_close: bool,
    closed: bool,
    connections_opened: usize,
    connections_closed: usize,
    statements_opened: usize,
    statements_closed: usize,
}

impl DriverState {
    fn next_response(&mut self) -> Option<InMemoryTestResponse> {
        self.responses.pop_front()
    }

    fn record(
        &mut self,
        sql: &str,
        kind: ExecutionKind,
        params: Vec<BoundParameter>,
        batch: Vec<Vec<BoundParameter>>,
    ) {
        self.recorded.push(RecordedStatement {
            sql: sql.to_string(),
            kind,
            params,
            batch,
        });
    }
}

type Shared = Arc<Mutex<DriverState>>;

/// An in-memory connection source for testing.
///
/// Executions consume scripted [`InMemoryTestResponse`]s in FIFO order and
/// are recorded for verification. Without a queued response a query returns
/// no rows, an update affects nothing and a batch reports one row per entry.
///
/// Clones share the same state, so a test can hand one clone to the facade
/// and inspect the other.
///
/// # Example
/// ```
/// use rowforge::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
/// use rowforge::Value;
///
/// let driver = InMemoryTestDriver::new().with_response(
///     InMemoryTestResponseBuilder::new()
///         .columns(&["id", "name"])
///         .row([Value::from(1), Value::from("Alice")])
///         .build(),
/// );
/// ```
#[derive(Clone)]
pub struct InMemoryTestDriver {
    shared: Shared,
}

impl InMemoryTestDriver {
    /// Create a new in-memory test driver with no pre-configured responses.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(DriverState {
                responses: VecDeque::new(),
                recorded: Vec::new(),
                acquire: AcquireMode::Available,
                batch_support: true,
                fail_statement_close: false,
                closed: false,
                connections_opened: 0,
                connections_closed: 0,
                statements_opened: 0,
                statements_closed: 0,
            })),
        }
    }

    /// Add a response to be returned by the next execution.
    pub fn with_response(self, response: InMemoryTestResponse) -> Self {
        self.shared.lock().responses.push_back(response);
        self
    }

    /// Add multiple responses to be returned by subsequent executions.
    pub fn with_responses(self, responses: impl IntoIterator<Item = InMemoryTestResponse>) -> Self {
        self.shared.lock().responses.extend(responses);
        self
    }

    /// Connections report no batch support.
    pub fn without_batch_support(self) -> Self {
        self.shared.lock().batch_support = false;
        self
    }

    /// `acquire` succeeds but hands out no connection.
    pub fn without_connections(self) -> Self {
        self.shared.lock().acquire = AcquireMode::Empty;
        self
    }

    /// `acquire` fails as an exhausted pool would.
    pub fn failing_acquire(self, message: impl Into<String>) -> Self {
        self.shared.lock().acquire = AcquireMode::Failing(message.into());
        self
    }

    /// Closing a statement fails (the statement still counts as closed).
    pub fn failing_statement_close(self) -> Self {
        self.shared.lock().fail_statement_close = true;
        self
    }

    /// Get all recorded executions.
    pub fn recorded_statements(&self) -> Vec<RecordedStatement> {
        self.shared.lock().recorded.clone()
    }

    /// Get the last recorded execution, if any.
    pub fn last_statement(&self) -> Option<RecordedStatement> {
        self.shared.lock().recorded.last().cloned()
    }

    pub fn clear_recorded_statements(&self) {
        self.shared.lock().recorded.clear();
    }

    pub fn connections_opened(&self) -> usize {
        self.shared.lock().connections_opened
    }

    pub fn connections_closed(&self) -> usize {
        self.shared.lock().connections_closed
    }

    pub fn statements_opened(&self) -> usize {
        self.shared.lock().statements_opened
    }

    pub fn statements_closed(&self) -> usize {
        self.shared.lock().statements_closed
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Assert that the last execution matches the expected SQL and parameters.
    pub fn assert_last_statement(&self, expected_sql: &str, expected_params: &[BoundParameter]) {
        let last = self.last_statement().expect("No statements were recorded");
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.params, expected_params,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_params, last.params
        );
    }

    /// Assert that exactly n executions were recorded.
    pub fn assert_statement_count(&self, expected: usize) {
        let actual = self.shared.lock().recorded.len();
        assert_eq!(
            actual, expected,
            "Statement count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }

    /// Assert that every statement and connection handed out was closed.
    pub fn assert_all_released(&self) {
        let state = self.shared.lock();
        assert_eq!(
            state.statements_opened, state.statements_closed,
            "Statements leaked. Opened: {}, Closed: {}",
            state.statements_opened, state.statements_closed
        );
        assert_eq!(
            state.connections_opened, state.connections_closed,
            "Connections leaked. Opened: {}, Closed: {}",
            state.connections_opened, state.connections_closed
        );
    }
}

impl Default for InMemoryTestDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionSource for InMemoryTestDriver {
    async fn acquire(&self) -> Result<Option<Box<dyn Connection>>> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(RowForgeError::ConnectionRetrieve {
                message: "in-memory source has been closed".to_string(),
                source: None,
            });
        }
        match &state.acquire {
            AcquireMode::Empty => return Ok(None),
            AcquireMode::Failing(message) => {
                return Err(RowForgeError::ConnectionRetrieve {
                    message: message.clone(),
                    source: None,
                });
            }
            AcquireMode::Available => {}
        }
        state.connections_opened += 1;
        Ok(Some(Box::new(InMemoryConnection {
            shared: Arc::clone(&self.shared),
            batch_support: state.batch_support,
            closed: false,
        })))
    }

    async fn close(&self) -> Result<()> {
        self.shared.lock().closed = true;
        Ok(())
    }
}

struct InMemoryConnection {
    shared: Shared,
    batch_support: bool,
    closed: bool,
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn create_statement(&self) -> SqlResult<Box<dyn Statement>> {
        self.shared.lock().statements_opened += 1;
        Ok(Box::new(InMemoryStatement {
            shared: Arc::clone(&self.shared),
            generated: None,
            closed: false,
        }))
    }

    async fn prepare_statement(
        &self,
        sql: &str,
        return_generated_keys: bool,
    ) -> SqlResult<Box<dyn PreparedStatement>> {
        self.shared.lock().statements_opened += 1;
        Ok(Box::new(InMemoryPreparedStatement {
            shared: Arc::clone(&self.shared),
            sql: sql.to_string(),
            placeholders: count_placeholders(sql),
            params: BTreeMap::new(),
            batch: Vec::new(),
            return_generated_keys,
            batch_support: self.batch_support,
            generated: None,
            closed: false,
        }))
    }

    fn supports_batch_updates(&self) -> bool {
        self.batch_support
    }

    async fn close(&mut self) -> SqlResult<()> {
        if !self.closed {
            self.closed = true;
            self.shared.lock().connections_closed += 1;
        }
        Ok(())
    }
}

fn close_statement(shared: &Shared, closed: &mut bool) -> SqlResult<()> {
    if *closed {
        return Ok(());
    }
    *closed = true;
    let mut state = shared.lock();
    state.statements_closed += 1;
    if state.fail_statement_close {
        return Err(SqlError::new("statement close failed"));
    }
    Ok(())
}

fn run_query(shared: &Shared, sql: &str, params: Vec<BoundParameter>) -> SqlResult<ResultSet> {
    let mut state = shared.lock();
    state.record(sql, ExecutionKind::Query, params, Vec::new());
    match state.next_response() {
        None => Ok(ResultSet::empty()),
        Some(InMemoryTestResponse::Rows(result)) => Ok(result),
        Some(InMemoryTestResponse::Error(err)) => Err(err),
        Some(other) => Err(SqlError::new(format!(
            "scripted response {:?} cannot answer a query",
            other
        ))),
    }
}

fn run_update(
    shared: &Shared,
    sql: &str,
    params: Vec<BoundParameter>,
) -> SqlResult<(u64, Option<Value>)> {
    let mut state = shared.lock();
    state.record(sql, ExecutionKind::Update, params, Vec::new());
    match state.next_response() {
        None => Ok((0, None)),
        Some(InMemoryTestResponse::Update {
            affected,
            generated_key,
        }) => Ok((affected, generated_key)),
        Some(InMemoryTestResponse::Error(err)) => Err(err),
        Some(other) => Err(SqlError::new(format!(
            "scripted response {:?} cannot answer an update",
            other
        ))),
    }
}

fn generated_keys_result(key: &Option<Value>) -> ResultSet {
    match key {
        Some(key) => ResultSet::new(
            vec![ColumnMeta::new("GENERATED_KEY")],
            vec![vec![key.clone()]],
        ),
        None => ResultSet::empty(),
    }
}

struct InMemoryStatement {
    shared: Shared,
    generated: Option<Value>,
    closed: bool,
}

#[async_trait]
impl Statement for InMemoryStatement {
    async fn execute_query(&mut self, sql: &str) -> SqlResult<ResultSet> {
        run_query(&self.shared, sql, Vec::new())
    }

    async fn execute_update(&mut self, sql: &str, return_generated_keys: bool) -> SqlResult<u64> {
        let (affected, key) = run_update(&self.shared, sql, Vec::new())?;
        self.generated = if return_generated_keys { key } else { None };
        Ok(affected)
    }

    async fn generated_keys(&mut self) -> SqlResult<ResultSet> {
        Ok(generated_keys_result(&self.generated))
    }

    async fn close(&mut self) -> SqlResult<()> {
        close_statement(&self.shared, &mut self.closed)
    }
}

struct InMemoryPreparedStatement {
    shared: Shared,
    sql: String,
    placeholders: usize,
    params: BTreeMap<usize, BoundParameter>,
    batch: Vec<Vec<BoundParameter>>,
    return_generated_keys: bool,
    batch_support: bool,
    generated: Option<Value>,
    closed: bool,
}

impl InMemoryPreparedStatement {
    /// Bound parameters in index order; every placeholder must be bound.
    fn take_params(&mut self) -> SqlResult<Vec<BoundParameter>> {
        if let Some(missing) = (1..=self.placeholders).find(|i| !self.params.contains_key(i)) {
            return Err(SqlError::new(format!(
                "No value specified for parameter {}",
                missing
            )));
        }
        Ok(std::mem::take(&mut self.params).into_values().collect())
    }
}

#[async_trait]
impl PreparedStatement for InMemoryPreparedStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, parameter: BoundParameter) -> SqlResult<()> {
        if index == 0 || index > self.placeholders {
            return Err(SqlError::new(format!(
                "Parameter index out of range ({} > number of parameters, which is {}).",
                index, self.placeholders
            )));
        }
        self.params.insert(index, parameter);
        Ok(())
    }

    fn clear_parameters(&mut self) {
        self.params.clear();
    }

    fn supports_batch_updates(&self) -> bool {
        self.batch_support
    }

    fn add_batch(&mut self) -> SqlResult<()> {
        let params = self.take_params()?;
        self.batch.push(params);
        Ok(())
    }

    async fn execute_query(&mut self) -> SqlResult<ResultSet> {
        let params = self.take_params()?;
        run_query(&self.shared, &self.sql, params)
    }

    async fn execute_update(&mut self) -> SqlResult<u64> {
        let params = self.take_params()?;
        let (affected, key) = run_update(&self.shared, &self.sql, params)?;
        self.generated = if self.return_generated_keys { key } else { None };
        Ok(affected)
    }

    async fn generated_keys(&mut self) -> SqlResult<ResultSet> {
        Ok(generated_keys_result(&self.generated))
    }

    async fn execute_batch(&mut self) -> SqlResult<Vec<u64>> {
        let batch = std::mem::take(&mut self.batch);
        let entries = batch.len();
        let mut state = self.shared.lock();
        state.record(&self.sql, ExecutionKind::Batch, Vec::new(), batch);
        match state.next_response() {
            None => Ok(vec![1; entries]),
            Some(InMemoryTestResponse::Batch(counts)) => Ok(counts),
            Some(InMemoryTestResponse::Error(err)) => Err(err),
            Some(other) => Err(SqlError::new(format!(
                "scripted response {:?} cannot answer a batch",
                other
            ))),
        }
    }

    async fn close(&mut self) -> SqlResult<()> {
        close_statement(&self.shared, &mut self.closed)
    }
}

/// Counts `?` placeholders outside quoted literals.
fn count_placeholders(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;
    for c in sql.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '?') => count += 1,
            (None, _) => {}
        }
    }
    count
}

/// Builder for creating row responses easily.
pub struct InMemoryTestResponseBuilder {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
}

impl InMemoryTestResponseBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| ColumnMeta::new(*s)).collect();
        self
    }

    /// Add a column whose label differs from its name (`SELECT name AS label`).
    pub fn labeled_column(mut self, name: &str, label: &str) -> Self {
        self.columns.push(ColumnMeta::new(name).with_label(label));
        self
    }

    /// Add a row of values.
    pub fn row<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> InMemoryTestResponse {
        InMemoryTestResponse::Rows(ResultSet::new(self.columns, self.rows))
    }
}

impl Default for InMemoryTestResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_ignore_quoted_text() {
        assert_eq!(count_placeholders("SELECT * FROM t WHERE a = ? AND b = ?"), 2);
        assert_eq!(count_placeholders("SELECT '?' FROM t WHERE a = ?"), 1);
        assert_eq!(count_placeholders("SELECT 1"), 0);
    }

    #[tokio::test]
    async fn test_bind_out_of_range_is_rejected() {
        let driver = InMemoryTestDriver::new();
        let conn = driver.acquire().await.unwrap().unwrap();
        let mut ps = conn.prepare_statement("SELECT ?", false).await.unwrap();
        assert!(ps.set_bool(2, true).is_err());
        assert!(ps.set_bool(1, true).is_ok());
    }

    #[tokio::test]
    async fn test_unbound_parameter_fails_execution() {
        let driver = InMemoryTestDriver::new();
        let conn = driver.acquire().await.unwrap().unwrap();
        let mut ps = conn
            .prepare_statement("UPDATE t SET a = ? WHERE b = ?", false)
            .await
            .unwrap();
        ps.set_bool(1, true).unwrap();
        let err = ps.execute_update().await.unwrap_err();
        assert!(err.message.contains("parameter 2"));
    }

    #[tokio::test]
    async fn test_counters_track_open_and_close() {
        let driver = InMemoryTestDriver::new();
        let mut conn = driver.acquire().await.unwrap().unwrap();
        let mut stmt = conn.create_statement().await.unwrap();
        stmt.close().await.unwrap();
        stmt.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(driver.statements_closed(), 1);
        driver.assert_all_released();
    }

    #[tokio::test]
    async fn test_closed_source_refuses_connections() {
        let driver = InMemoryTestDriver::new();
        driver.close().await.unwrap();
        assert!(driver.acquire().await.is_err());
    }
}
