use crate::error::{Result, RowForgeError};
use crate::mapping::RowMapper;
use crate::types::ResultCursor;

/// Consumes a whole result cursor and produces one result.
///
/// The result does not have to be a per-row collection; aggregates are fine.
/// `Ok(None)` means "no result".
pub trait RowExtractor<R>: Send + Sync {
    fn extract(&self, cursor: &mut ResultCursor) -> Result<Option<R>>;
}

impl<R, F> RowExtractor<R> for F
where
    F: Fn(&mut ResultCursor) -> Result<Option<R>> + Send + Sync,
{
    fn extract(&self, cursor: &mut ResultCursor) -> Result<Option<R>> {
        self(cursor)
    }
}

/// Collects every row through a [`RowMapper`], in cursor order.
///
/// A zero-row cursor yields an empty `Vec`, never `None`.
pub struct DefaultExtractor<M> {
    mapper: M,
    limit: usize,
}

impl<M> DefaultExtractor<M> {
    pub fn new(mapper: M) -> Self {
        Self { mapper, limit: 0 }
    }

    /// At most `|limit|` rows are mapped; `0` means no limit.
    pub fn with_limit(mapper: M, limit: i64) -> Self {
        Self {
            mapper,
            limit: usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<T, M> RowExtractor<Vec<T>> for DefaultExtractor<M>
where
    M: RowMapper<T>,
{
    fn extract(&self, cursor: &mut ResultCursor) -> Result<Option<Vec<T>>> {
        let mut mapped = Vec::new();
        let mut row_number = 0;
        while self.limit == 0 || row_number < self.limit {
            let Some(row) = cursor.next_row() else {
                break;
            };
            mapped.push(self.mapper.map_row(&row, row_number)?);
            row_number += 1;
        }
        Ok(Some(mapped))
    }
}

/// Exactly one result is expected.
pub fn single_result<T>(results: Option<Vec<T>>) -> Result<T> {
    optional_single_result(results)?.ok_or(RowForgeError::IncorrectResultSize {
        expected: 1,
        actual: 0,
    })
}

/// At most one result is expected; none yields `None`.
pub fn optional_single_result<T>(results: Option<Vec<T>>) -> Result<Option<T>> {
    let results = results.unwrap_or_default();
    match results.len() {
        0 => Ok(None),
        1 => Ok(results.into_iter().next()),
        actual => Err(RowForgeError::IncorrectResultSize {
            expected: 1,
            actual,
        }),
    }
}
