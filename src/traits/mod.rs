mod callback;
mod connection;
mod executor;

pub use callback::{PreparedStatementCreator, PreparedStatementFunction, StatementFunction};
pub use connection::{
    BoundParameter, Connection, ConnectionSource, PreparedStatement, SqlResult, Statement,
};
pub(crate) use executor::schedule;
pub use executor::{TaskExecutor, TaskHandle};
