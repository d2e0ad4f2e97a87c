//! rowforge - Callback-style SQL access with pooled connections and row mapping
//!
//! # Example
//! ```ignore
//! use rowforge::{Bean, BeanRowMapper, Credentials, Database, PropertyTable, SqlType, Value};
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Bean for User {
//!     fn describe(table: &mut PropertyTable<Self>) {
//!         table.property("id", |u: &mut Self, v| u.id = v);
//!         table.property("name", |u: &mut Self, v| u.name = v)
//!             .column("username");
//!     }
//! }
//!
//! let credentials = Credentials::builder()
//!     .host("localhost")
//!     .user("app")
//!     .schema("shop")
//!     .pool("shop-pool")
//!     .build()?;
//! let db = Database::connect(&credentials).await?;
//!
//! let user = db
//!     .query_for_object_typed(
//!         "SELECT id, username FROM users WHERE id = ?",
//!         vec![Value::from(3)],
//!         &[SqlType::Integer],
//!         &BeanRowMapper::<User>::new(),
//!     )
//!     .await?;
//! ```

pub mod binding;
pub mod drivers;
pub mod error;
pub mod mapping;
pub mod traits;
pub mod types;

mod async_database;
mod callbacks;
mod credentials;
mod database;

// Re-export main types for convenient access
pub use async_database::{AsyncDatabase, BoxedSetter};
pub use binding::{
    BatchSetter, DefaultBatchSetter, DefaultSetter, ParametrizedBatchSetter,
    PreparedStatementSetter, UnknownTypeSetter,
};
pub use callbacks::DefaultCreator;
pub use credentials::{Credentials, CredentialsBuilder, PoolSettings, DEFAULT_PORT};
pub use database::Database;
pub use error::{ErrorKind, Result, RowForgeError, SqlError};
pub use mapping::{
    Bean, BeanRowMapper, Converter, ConverterRegistry, DefaultExtractor, RowExtractor, RowMapper,
    SingleColumnMapper, StringToUuid,
};
pub use traits::{
    ConnectionSource, PreparedStatementCreator, PreparedStatementFunction, StatementFunction,
    TaskExecutor, TaskHandle,
};
pub use types::{ResultSet, Row, SqlEnum, SqlField, SqlKind, SqlType, Value};
