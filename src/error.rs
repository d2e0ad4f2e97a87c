use std::fmt;

use thiserror::Error;

/// A failure reported by the underlying driver.
///
/// Drivers return this from every statement, cursor and connection call. The
/// lifecycle helper in [`crate::Database`] turns it into
/// [`RowForgeError::DataAccess`] once the SQL text of the operation is known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({})", .code.unwrap_or(0))]
pub struct SqlError {
    /// Vendor error code, if the driver reported one.
    pub code: Option<i32>,
    /// SQLSTATE, if the driver reported one.
    pub state: Option<String>,
    pub message: String,
}

impl SqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            state: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Error type for rowforge operations
#[derive(Debug, Error)]
pub enum RowForgeError {
    #[error("Data access failed: {context} - SQL: {} - {message} ({})", .sql.as_deref().unwrap_or(""), .code.unwrap_or(0))]
    DataAccess {
        context: String,
        sql: Option<String>,
        code: Option<i32>,
        message: String,
    },

    #[error("Driver error: {0}")]
    Sql(#[from] SqlError),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Conversion failed in {converter}: {message}")]
    Conversion { converter: String, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Incorrect result size: expected {expected}, actual {actual}")]
    IncorrectResultSize { expected: usize, actual: usize },

    #[error("Cannot create the data source: {message}")]
    DataSourceInit {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot retrieve a connection: {message}")]
    ConnectionRetrieve {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot create an instance of {target}: {message}")]
    Instantiation { target: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Task was dropped by the executor before completing")]
    TaskAborted,
}

/// Coarse classification of [`RowForgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DataAccess,
    TypeMismatch,
    Conversion,
    Unsupported,
    IncorrectResultSize,
    DataSourceInit,
    ConnectionRetrieve,
    Instantiation,
    InvalidArgument,
    Internal,
    TaskAborted,
}

impl RowForgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataAccess { .. } | Self::Sql(_) => ErrorKind::DataAccess,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Self::Conversion { .. } => ErrorKind::Conversion,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::IncorrectResultSize { .. } => ErrorKind::IncorrectResultSize,
            Self::DataSourceInit { .. } => ErrorKind::DataSourceInit,
            Self::ConnectionRetrieve { .. } => ErrorKind::ConnectionRetrieve,
            Self::Instantiation { .. } => ErrorKind::Instantiation,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Internal(_) => ErrorKind::Internal,
            Self::TaskAborted => ErrorKind::TaskAborted,
        }
    }

    /// The SQL text attached to a data access failure.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::DataAccess { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    /// Wraps a raw driver failure with the operation that raised it.
    ///
    /// Anything that is not [`RowForgeError::Sql`] is returned untouched.
    pub(crate) fn into_data_access(self, context: &str, sql: Option<&str>) -> Self {
        match self {
            Self::Sql(err) => Self::DataAccess {
                context: context.to_string(),
                sql: sql.map(str::to_string),
                code: err.code,
                message: err.message,
            },
            other => other,
        }
    }

    pub(crate) fn data_source_init(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DataSourceInit {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn connection_retrieve(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConnectionRetrieve {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DataAccess => "data_access",
            Self::TypeMismatch => "type_mismatch",
            Self::Conversion => "conversion",
            Self::Unsupported => "unsupported",
            Self::IncorrectResultSize => "incorrect_result_size",
            Self::DataSourceInit => "data_source_init",
            Self::ConnectionRetrieve => "connection_retrieve",
            Self::Instantiation => "instantiation",
            Self::InvalidArgument => "invalid_argument",
            Self::Internal => "internal",
            Self::TaskAborted => "task_aborted",
        };
        f.write_str(name)
    }
}

/// Result type alias for rowforge operations
pub type Result<T> = std::result::Result<T, RowForgeError>;
