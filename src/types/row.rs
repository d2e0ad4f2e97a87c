use crate::error::{Result, RowForgeError, SqlError};
use crate::types::{SqlField, SqlKind, Value};

/// Metadata of one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    /// Column name as stored in the table
    pub name: String,
    /// Alias given with `AS`, if any
    pub label: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The alias when present and non-empty, otherwise the raw name.
    pub fn effective_label(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.name,
        }
    }
}

/// Driver-agnostic result of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column metadata in order
    pub columns: Vec<ColumnMeta>,
    /// Rows, where each row holds one value per column
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_cursor(self) -> ResultCursor {
        ResultCursor::new(self)
    }
}

/// Forward-only cursor over a fetched [`ResultSet`].
#[derive(Debug)]
pub struct ResultCursor {
    result: ResultSet,
    position: usize,
}

impl ResultCursor {
    pub fn new(result: ResultSet) -> Self {
        Self {
            result,
            position: 0,
        }
    }

    /// Advances to the next row and returns it, or `None` once exhausted.
    pub fn next_row(&mut self) -> Option<Row<'_>> {
        if self.position >= self.result.rows.len() {
            return None;
        }
        let values = &self.result.rows[self.position];
        self.position += 1;
        Some(Row {
            columns: &self.result.columns,
            values,
        })
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.result.columns
    }

    /// Number of rows consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.result.rows.len()
    }
}

/// A single row of a result, borrowed from its cursor.
/// Column indexes are 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [ColumnMeta],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn new(columns: &'a [ColumnMeta], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &'a [ColumnMeta] {
        self.columns
    }

    pub fn column(&self, index: usize) -> Result<&'a ColumnMeta> {
        self.check_index(index)?;
        Ok(&self.columns[index - 1])
    }

    /// Gets the raw value of a column.
    pub fn get(&self, index: usize) -> Result<&'a Value> {
        self.check_index(index)?;
        self.values
            .get(index - 1)
            .ok_or_else(|| SqlError::new(format!("Row has no value for column {}", index)).into())
    }

    /// Gets a column value converted to `kind`.
    pub fn get_as(&self, index: usize, kind: SqlKind) -> Result<Value> {
        self.get(index)?.clone().coerce(kind)
    }

    /// Gets a column value as a Rust type.
    pub fn get_field<F: SqlField>(&self, index: usize) -> Result<F> {
        let value = self.get_as(index, F::KIND)?;
        F::from_value(value)
    }

    /// Gets a value by column label, ignoring case.
    pub fn get_by_label(&self, label: &str) -> Result<&'a Value> {
        let position = self
            .columns
            .iter()
            .position(|c| c.effective_label().eq_ignore_ascii_case(label))
            .ok_or_else(|| RowForgeError::from(SqlError::new(format!("Column not found: {}", label))))?;
        self.get(position + 1)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index == 0 || index > self.columns.len() {
            return Err(SqlError::new(format!(
                "Column index {} out of range (1..={})",
                index,
                self.columns.len()
            ))
            .into());
        }
        Ok(())
    }
}
