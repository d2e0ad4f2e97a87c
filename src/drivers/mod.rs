mod in_memory_test;
#[cfg(feature = "mysql")]
mod mysql;

pub use self::in_memory_test::{
    ExecutionKind, InMemoryTestDriver, InMemoryTestResponse, InMemoryTestResponseBuilder,
    RecordedStatement,
};
#[cfg(feature = "mysql")]
pub use self::mysql::MySqlSource;
