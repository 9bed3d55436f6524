use crate::core::error::Result;
use crate::core::types::Value;
use crate::query::command::SqlCommand;

/// Maps a source ordinal of a `BulkReader` to a destination column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source_ordinal: usize,
    pub destination: String,
}

impl ColumnMapping {
    pub fn new(source_ordinal: usize, destination: impl Into<String>) -> Self {
        ColumnMapping { source_ordinal, destination: destination.into() }
    }
}

/// Forward-only, read-once row source for bulk copy. Fields are addressed by
/// ordinal; `read` advances to the next row and returns false when exhausted.
pub trait BulkReader {
    fn table_name(&self) -> &str;
    fn field_count(&self) -> usize;
    fn field_name(&self, ordinal: usize) -> Option<&str>;
    fn read(&mut self) -> bool;
    fn value(&self, ordinal: usize) -> Result<Value>;

    /// Identity mapping of every field onto the column of the same name
    fn column_mappings(&self) -> Vec<ColumnMapping> {
        (0..self.field_count())
            .filter_map(|i| self.field_name(i).map(|name| ColumnMapping::new(i, name)))
            .collect()
    }
}

/// Connection or transaction handle. Implementations own transaction
/// boundaries; nothing here retries or rolls back.
pub trait DbClient {
    fn execute(&mut self, command: &SqlCommand) -> Result<usize>;

    /// Run several statements as one administrative unit
    fn execute_batch(&mut self, commands: &[SqlCommand]) -> Result<usize> {
        let mut affected = 0;
        for command in commands {
            affected += self.execute(command)?;
        }
        Ok(affected)
    }

    fn table_exists(&mut self, table: &str) -> Result<bool>;

    fn column_names(&mut self, table: &str) -> Result<Vec<String>>;

    /// Read the first column of every row the command returns
    fn query_column(&mut self, command: &SqlCommand) -> Result<Vec<Value>>;

    fn bulk_copy(
        &mut self,
        table: &str,
        mappings: &[ColumnMapping],
        reader: &mut dyn BulkReader,
        batch_size: usize,
    ) -> Result<usize>;
}
