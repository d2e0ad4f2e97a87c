mod field;
mod row;
mod sql_type;
mod value;

pub use self::field::{enum_from_value, SqlEnum, SqlField};
pub use self::row::{ColumnMeta, ResultCursor, ResultSet, Row};
pub use self::sql_type::SqlType;
pub use self::value::{SqlKind, Value};
