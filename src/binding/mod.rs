mod binder;
mod setter;

pub use self::binder::{bind_unknown, bind_value, CLOB_LENGTH};
pub use self::setter::{
    BatchSetter, DefaultBatchSetter, DefaultSetter, ParametrizedBatchSetter,
    PreparedStatementSetter, UnknownTypeSetter,
};
