use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{UniqueMode, Value};
use crate::dac::client::BulkReader;
use crate::schema::field::{MemberField, StorageSchema, StorageSchemaSet};
use crate::structure::index::StructureIndex;
use crate::structure::structure::Structure;

/// Forward-only position over a row slice
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    next: usize,
    current: Option<usize>,
}

impl Cursor {
    fn advance(&mut self, len: usize) -> bool {
        if self.next < len {
            self.current = Some(self.next);
            self.next += 1;
            true
        } else {
            self.current = None;
            false
        }
    }

    fn row(&self) -> Result<usize> {
        self.current
            .ok_or_else(|| Error::new(ErrorKind::Internal, "Reader is not positioned on a row".to_string()))
    }
}

fn unknown_field(schema: &StorageSchema, ordinal: usize) -> Error {
    Error::new(
        ErrorKind::InvalidArgument,
        format!("Table '{}' has no field at ordinal {}", schema.table_name, ordinal),
    )
}

fn truncate(value: &Value, max_length: usize) -> Value {
    match value {
        Value::String(s) if s.chars().count() > max_length => {
            Value::String(s.chars().take(max_length).collect())
        }
        other => other.clone(),
    }
}

/// Body rows: `StructureId`, `Json`
pub struct StructuresReader<'a> {
    schema: &'a StorageSchema,
    structures: &'a [Structure],
    cursor: Cursor,
}

impl<'a> StructuresReader<'a> {
    pub fn new(schema: &'a StorageSchema, structures: &'a [Structure]) -> Self {
        StructuresReader { schema, structures, cursor: Cursor::default() }
    }
}

impl BulkReader for StructuresReader<'_> {
    fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    fn field_count(&self) -> usize {
        self.schema.field_count()
    }

    fn field_name(&self, ordinal: usize) -> Option<&str> {
        self.schema.fields.get(ordinal).map(|f| f.name.as_str())
    }

    fn read(&mut self) -> bool {
        self.cursor.advance(self.structures.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        let structure = &self.structures[self.cursor.row()?];
        match ordinal {
            0 => Ok(structure.id.to_value()),
            1 => Ok(Value::String(structure.body.clone())),
            _ => Err(unknown_field(self.schema, ordinal)),
        }
    }
}

/// Index rows of one family table: `StructureId`, `MemberPath`, `Value`
/// and, for textual tables, the untruncated `StringValue`
pub struct IndexesReader<'a> {
    schema: &'a StorageSchema,
    indexes: Vec<&'a StructureIndex>,
    max_length: usize,
    cursor: Cursor,
}

impl<'a> IndexesReader<'a> {
    pub fn new(schema: &'a StorageSchema, indexes: Vec<&'a StructureIndex>, max_length: usize) -> Self {
        IndexesReader { schema, indexes, max_length, cursor: Cursor::default() }
    }
}

impl BulkReader for IndexesReader<'_> {
    fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    fn field_count(&self) -> usize {
        self.schema.field_count()
    }

    fn field_name(&self, ordinal: usize) -> Option<&str> {
        self.schema.fields.get(ordinal).map(|f| f.name.as_str())
    }

    fn read(&mut self) -> bool {
        self.cursor.advance(self.indexes.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        let index = self.indexes[self.cursor.row()?];
        match ordinal {
            0 => Ok(index.structure_id.to_value()),
            1 => Ok(Value::String(index.path.clone())),
            2 => Ok(truncate(&index.value, self.max_length)),
            3 if self.schema.field_count() == 4 => Ok(index.value.clone()),
            _ => Err(unknown_field(self.schema, ordinal)),
        }
    }
}

/// Unique rows: `StructureId`, `UqStructureId` (set for per-instance
/// uniques only), `UqMemberPath`, `UqValue` cut to the column width
pub struct UniquesReader<'a> {
    schema: &'a StorageSchema,
    uniques: Vec<&'a StructureIndex>,
    max_length: usize,
    cursor: Cursor,
}

impl<'a> UniquesReader<'a> {
    pub fn new(schema: &'a StorageSchema, uniques: Vec<&'a StructureIndex>, max_length: usize) -> Self {
        UniquesReader { schema, uniques, max_length, cursor: Cursor::default() }
    }
}

impl BulkReader for UniquesReader<'_> {
    fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    fn field_count(&self) -> usize {
        self.schema.field_count()
    }

    fn field_name(&self, ordinal: usize) -> Option<&str> {
        self.schema.fields.get(ordinal).map(|f| f.name.as_str())
    }

    fn read(&mut self) -> bool {
        self.cursor.advance(self.uniques.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        let unique = self.uniques[self.cursor.row()?];
        match ordinal {
            0 => Ok(unique.structure_id.to_value()),
            1 => Ok(match unique.unique {
                Some(UniqueMode::PerInstance) => unique.structure_id.to_value(),
                _ => Value::Null,
            }),
            2 => Ok(Value::String(unique.path.clone())),
            3 => Ok(match unique.value.to_sql_string() {
                Some(text) => truncate(&Value::String(text), self.max_length),
                None => Value::Null,
            }),
            _ => Err(unknown_field(self.schema, ordinal)),
        }
    }
}

/// One row per structure in the member-column table, with one sparse value
/// per index accessor. Column names and ordinals come from the same layout.
pub struct MemberColumnsReader<'a> {
    schema: &'a StorageSchema,
    members: &'a [MemberField],
    structures: &'a [Structure],
    max_length: usize,
    cursor: Cursor,
}

impl<'a> MemberColumnsReader<'a> {
    pub fn new(tables: &'a StorageSchemaSet, structures: &'a [Structure], max_length: usize) -> Self {
        MemberColumnsReader {
            schema: &tables.member_columns,
            members: &tables.members,
            structures,
            max_length,
            cursor: Cursor::default(),
        }
    }
}

impl BulkReader for MemberColumnsReader<'_> {
    fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    fn field_count(&self) -> usize {
        self.schema.field_count()
    }

    fn field_name(&self, ordinal: usize) -> Option<&str> {
        self.schema.fields.get(ordinal).map(|f| f.name.as_str())
    }

    fn read(&mut self) -> bool {
        self.cursor.advance(self.structures.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        let structure = &self.structures[self.cursor.row()?];
        if ordinal == 0 {
            return Ok(structure.id.to_value());
        }
        let member = self
            .members
            .get(ordinal - 1)
            .ok_or_else(|| unknown_field(self.schema, ordinal))?;
        Ok(match structure.index(&member.path) {
            Some(index) if member.bounded => truncate(&index.value, self.max_length),
            Some(index) => index.value.clone(),
            None => Value::Null,
        })
    }
}
