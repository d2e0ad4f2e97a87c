use std::marker::PhantomData;

use crate::error::Result;
use crate::types::{Row, SqlField};

/// Maps the current row of a result to one object.
///
/// Mappers never move the cursor. `row_number` is zero-based. A mapper that
/// wants to skip rows returns `Option<_>`; collecting extractors keep the
/// `None` entries.
pub trait RowMapper<T>: Send + Sync {
    fn map_row(&self, row: &Row<'_>, row_number: usize) -> Result<T>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row<'_>, usize) -> Result<T> + Send + Sync,
{
    fn map_row(&self, row: &Row<'_>, row_number: usize) -> Result<T> {
        self(row, row_number)
    }
}

/// Maps the first column of each row to `F`.
pub struct SingleColumnMapper<F> {
    _field: PhantomData<fn() -> F>,
}

impl<F: SqlField> SingleColumnMapper<F> {
    pub fn new() -> Self {
        Self {
            _field: PhantomData,
        }
    }
}

impl<F: SqlField> Default for SingleColumnMapper<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: SqlField> RowMapper<F> for SingleColumnMapper<F> {
    fn map_row(&self, row: &Row<'_>, _row_number: usize) -> Result<F> {
        row.get_field(1)
    }
}
