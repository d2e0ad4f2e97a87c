use crate::binding::{bind_unknown, bind_value};
use crate::error::{Result, RowForgeError, SqlError};
use crate::traits::PreparedStatement;
use crate::types::{SqlType, Value};

/// Binds every parameter of one statement execution.
pub trait PreparedStatementSetter: Send + Sync {
    fn set_values(&self, statement: &mut dyn PreparedStatement) -> Result<()>;
}

/// Binds the parameters of batch entry `i`, for `i` in `0..batch_size()`.
pub trait BatchSetter: Send + Sync {
    fn set_values(&self, statement: &mut dyn PreparedStatement, i: usize) -> Result<()>;

    fn batch_size(&self) -> usize;
}

/// Binds the parameters of one element of a caller-supplied batch.
pub trait ParametrizedBatchSetter<T>: Send + Sync {
    fn set_values(&self, statement: &mut dyn PreparedStatement, item: &T) -> Result<()>;
}

impl<F> PreparedStatementSetter for F
where
    F: Fn(&mut dyn PreparedStatement) -> Result<()> + Send + Sync,
{
    fn set_values(&self, statement: &mut dyn PreparedStatement) -> Result<()> {
        self(statement)
    }
}

impl<T, F> ParametrizedBatchSetter<T> for F
where
    F: Fn(&mut dyn PreparedStatement, &T) -> Result<()> + Send + Sync,
{
    fn set_values(&self, statement: &mut dyn PreparedStatement, item: &T) -> Result<()> {
        self(statement, item)
    }
}

fn with_index(index: usize, err: SqlError) -> RowForgeError {
    RowForgeError::Sql(SqlError {
        message: format!("cannot bind parameter {}: {}", index, err.message),
        ..err
    })
}

fn check_types(params: &[Value], types: &[SqlType]) -> Result<()> {
    if types.len() < params.len() {
        return Err(RowForgeError::InvalidArgument(format!(
            "{} parameters but only {} type tags",
            params.len(),
            types.len()
        )));
    }
    Ok(())
}

fn bind_all(
    statement: &mut dyn PreparedStatement,
    params: &[Value],
    types: &[SqlType],
) -> Result<()> {
    check_types(params, types)?;
    for (position, (param, sql_type)) in params.iter().zip(types).enumerate() {
        let index = position + 1;
        bind_value(statement, index, *sql_type, param.clone())
            .map_err(|e| with_index(index, e))?;
    }
    Ok(())
}

/// Binds values with their declared type tags, positionally.
#[derive(Debug, Clone, Default)]
pub struct DefaultSetter {
    params: Vec<Value>,
    types: Vec<SqlType>,
}

impl DefaultSetter {
    pub fn new(params: Vec<Value>, types: Vec<SqlType>) -> Self {
        Self { params, types }
    }
}

impl PreparedStatementSetter for DefaultSetter {
    fn set_values(&self, statement: &mut dyn PreparedStatement) -> Result<()> {
        bind_all(statement, &self.params, &self.types)
    }
}

/// Binds values without type tags.
#[derive(Debug, Clone, Default)]
pub struct UnknownTypeSetter {
    params: Vec<Value>,
}

impl UnknownTypeSetter {
    pub fn new(params: Vec<Value>) -> Self {
        Self { params }
    }
}

impl PreparedStatementSetter for UnknownTypeSetter {
    fn set_values(&self, statement: &mut dyn PreparedStatement) -> Result<()> {
        for (position, param) in self.params.iter().enumerate() {
            let index = position + 1;
            bind_unknown(statement, index, param.clone()).map_err(|e| with_index(index, e))?;
        }
        Ok(())
    }
}

/// One row of values per batch entry, sharing the same type tags.
#[derive(Debug, Clone, Default)]
pub struct DefaultBatchSetter {
    rows: Vec<Vec<Value>>,
    types: Vec<SqlType>,
}

impl DefaultBatchSetter {
    pub fn new(rows: Vec<Vec<Value>>, types: Vec<SqlType>) -> Self {
        Self { rows, types }
    }
}

impl BatchSetter for DefaultBatchSetter {
    fn set_values(&self, statement: &mut dyn PreparedStatement, i: usize) -> Result<()> {
        let row = self.rows.get(i).ok_or_else(|| {
            RowForgeError::InvalidArgument(format!(
                "batch entry {} out of range ({} entries)",
                i,
                self.rows.len()
            ))
        })?;
        bind_all(statement, row, &self.types)
    }

    fn batch_size(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_missing_type_tags_are_rejected() {
        let err = check_types(&[Value::Int32(1), Value::Int32(2)], &[SqlType::Integer]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bind_errors_carry_the_index() {
        let err = with_index(3, SqlError::new("Parameter index out of range").with_code(0));
        assert!(err.to_string().contains("parameter 3"));
    }

    #[test]
    fn test_batch_size() {
        let setter = DefaultBatchSetter::new(
            vec![vec![Value::Int32(1)], vec![Value::Int32(2)]],
            vec![SqlType::Integer],
        );
        assert_eq!(setter.batch_size(), 2);
    }
}
