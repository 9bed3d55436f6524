use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::core::types::{DataTypeFamily, IndexTable};
use crate::schema::naming::MemberNameTranslator;
use crate::schema::schema::StructureSchema;

pub const STRUCTURE_ID: &str = "StructureId";
pub const JSON: &str = "Json";
pub const UQ_STRUCTURE_ID: &str = "UqStructureId";
pub const UQ_MEMBER_PATH: &str = "UqMemberPath";
pub const UQ_VALUE: &str = "UqValue";
pub const MEMBER_PATH: &str = "MemberPath";
pub const VALUE: &str = "Value";
pub const STRING_VALUE: &str = "StringValue";

/// One physical column, addressable by ordinal and by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub ordinal: usize,
    pub name: String,
}

/// Field layout of one physical table
#[derive(Debug, Clone)]
pub struct StorageSchema {
    pub table_name: String,
    pub fields: Vec<SchemaField>,
    by_name: HashMap<String, usize>,
}

impl StorageSchema {
    pub fn new(table_name: String, names: &[&str]) -> Self {
        let fields: Vec<SchemaField> = names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| SchemaField { ordinal, name: name.to_string() })
            .collect();
        let by_name = fields.iter().map(|f| (f.name.clone(), f.ordinal)).collect();

        StorageSchema { table_name, fields, by_name }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

pub fn body_table_name(structure: &str) -> String {
    format!("{}Structure", structure)
}

pub fn uniques_table_name(structure: &str) -> String {
    format!("{}Uniques", structure)
}

pub fn index_table_name(structure: &str, table: IndexTable) -> String {
    format!("{}{}", structure, table.suffix())
}

pub fn member_columns_table_name(structure: &str) -> String {
    format!("{}Indexes", structure)
}

/// Accessor behind one member column. Entry `n` feeds ordinal `n + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberField {
    pub path: String,
    pub bounded: bool,  // Free text columns are not length bound
}

/// All table layouts of one structure type
#[derive(Debug, Clone)]
pub struct StorageSchemaSet {
    pub body: StorageSchema,
    pub uniques: StorageSchema,
    pub indexes: HashMap<IndexTable, StorageSchema>,
    pub member_columns: StorageSchema,
    pub members: Vec<MemberField>,
}

impl StorageSchemaSet {
    pub fn for_structure(schema: &StructureSchema, translator: &dyn MemberNameTranslator) -> Self {
        let name = &schema.name;

        let indexes = IndexTable::ALL
            .iter()
            .map(|table| {
                let columns: &[&str] = if table.has_string_value() {
                    &[STRUCTURE_ID, MEMBER_PATH, VALUE, STRING_VALUE]
                } else {
                    &[STRUCTURE_ID, MEMBER_PATH, VALUE]
                };
                (*table, StorageSchema::new(index_table_name(name, *table), columns))
            })
            .collect();

        let member_names: Vec<String> = schema
            .index_accessors
            .iter()
            .map(|a| translator.translate(&a.path))
            .collect();
        let mut member_fields: Vec<&str> = vec![STRUCTURE_ID];
        member_fields.extend(member_names.iter().map(String::as_str));
        let members = schema
            .index_accessors
            .iter()
            .map(|a| MemberField {
                path: a.path.clone(),
                bounded: a.storage_family() != DataTypeFamily::Text,
            })
            .collect();

        StorageSchemaSet {
            body: StorageSchema::new(body_table_name(name), &[STRUCTURE_ID, JSON]),
            uniques: StorageSchema::new(
                uniques_table_name(name),
                &[STRUCTURE_ID, UQ_STRUCTURE_ID, UQ_MEMBER_PATH, UQ_VALUE],
            ),
            indexes,
            member_columns: StorageSchema::new(member_columns_table_name(name), &member_fields),
            members,
        }
    }

    /// Whether this layout was built from the schema's current accessors
    pub fn describes(&self, schema: &StructureSchema) -> bool {
        self.members.len() == schema.index_accessors.len()
            && self
                .members
                .iter()
                .zip(&schema.index_accessors)
                .all(|(m, a)| m.path == a.path && m.bounded == (a.storage_family() != DataTypeFamily::Text))
    }

    pub fn index(&self, table: IndexTable) -> &StorageSchema {
        &self.indexes[&table]
    }
}

/// Process-lifetime cache of storage layouts, keyed by structure name.
/// A layout built from other accessors than the schema's is replaced.
/// Owned by the caller; clone the `Arc` to share it.
#[derive(Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<StorageSchemaSet>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        SchemaCache { entries: RwLock::new(HashMap::new()) }
    }

    pub fn get_or_create(
        &self,
        schema: &StructureSchema,
        translator: &dyn MemberNameTranslator,
    ) -> Arc<StorageSchemaSet> {
        if let Some(existing) = self.entries.read().get(&schema.name) {
            if existing.describes(schema) {
                return existing.clone();
            }
        }

        let mut entries = self.entries.write();
        match entries.get(&schema.name) {
            Some(existing) if existing.describes(schema) => existing.clone(),
            _ => {
                let set = Arc::new(StorageSchemaSet::for_structure(schema, translator));
                entries.insert(schema.name.clone(), set.clone());
                set
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
