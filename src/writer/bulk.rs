use std::sync::Arc;
use tracing::{debug, info};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::IndexTable;
use crate::dac::client::{BulkReader, DbClient};
use crate::query::dialect::SqlDialect;
use crate::schema::field::SchemaCache;
use crate::schema::naming::{DefaultNameTranslator, MemberNameTranslator};
use crate::schema::schema::StructureSchema;
use crate::structure::index::StructureIndex;
use crate::structure::structure::Structure;
use crate::sync::ddl;
use crate::writer::readers::{IndexesReader, MemberColumnsReader, StructuresReader, UniquesReader};

/// One grouped write against one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupWrite {
    pub table: String,
    pub rows: usize,
    pub streamed: bool,  // Bulk copy rather than a single-row insert
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkStats {
    pub structures: usize,
    pub groups: Vec<GroupWrite>,
}

impl BulkStats {
    pub fn group(&self, table: &str) -> Option<&GroupWrite> {
        self.groups.iter().find(|g| g.table == table)
    }

    pub fn rows_written(&self) -> usize {
        self.groups.iter().map(|g| g.rows).sum()
    }

    pub fn streamed_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.streamed).count()
    }
}

/// Persists batches of structures with one write per destination table
pub struct BulkInserter {
    dialect: Box<dyn SqlDialect>,
    translator: Arc<dyn MemberNameTranslator>,
    schemas: Arc<SchemaCache>,
    batch_size: usize,
    max_length: usize,
}

impl BulkInserter {
    pub fn new(config: &Config) -> Self {
        let dialect = config.dialect.create();
        let max_length = config
            .max_identifier_length
            .unwrap_or_else(|| dialect.max_identifier_length());
        BulkInserter {
            dialect,
            translator: Arc::new(DefaultNameTranslator::new(max_length)),
            schemas: Arc::new(SchemaCache::new()),
            batch_size: config.bulk_batch_size.max(1),
            max_length: config.string_value_max_length,
        }
    }

    pub fn with_schema_cache(mut self, schemas: Arc<SchemaCache>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn MemberNameTranslator>) -> Self {
        self.translator = translator;
        self
    }

    /// Write bodies, then index rows per family table, then uniques and the
    /// member columns. Stops at the first failing group; undoing earlier
    /// groups is up to the client's transaction.
    pub fn insert(
        &self,
        schema: &StructureSchema,
        structures: &[Structure],
        client: &mut dyn DbClient,
    ) -> Result<BulkStats> {
        let mut stats = BulkStats { structures: structures.len(), groups: Vec::new() };
        if structures.is_empty() {
            return Ok(stats);
        }

        let tables = self.schemas.get_or_create(schema, self.translator.as_ref());

        let mut bodies = StructuresReader::new(&tables.body, structures);
        self.write_group(client, &mut bodies, structures.len(), &mut stats)?;

        for table in IndexTable::ALL {
            // Null members have no index row
            let entries: Vec<&StructureIndex> = structures
                .iter()
                .flat_map(|s| s.indexes.iter())
                .filter(|i| i.table() == table && !i.value.is_null())
                .collect();
            if entries.is_empty() {
                continue;
            }
            let rows = entries.len();
            let mut reader = IndexesReader::new(tables.index(table), entries, self.max_length);
            self.write_group(client, &mut reader, rows, &mut stats)?;
        }

        let uniques: Vec<&StructureIndex> = structures.iter().flat_map(|s| s.uniques.iter()).collect();
        if !uniques.is_empty() {
            let rows = uniques.len();
            let mut reader = UniquesReader::new(&tables.uniques, uniques, self.max_length);
            self.write_group(client, &mut reader, rows, &mut stats)?;
        }

        if !schema.index_accessors.is_empty() {
            let mut members = MemberColumnsReader::new(&tables, structures, self.max_length);
            self.write_group(client, &mut members, structures.len(), &mut stats)?;
        }

        info!(
            structure = %schema.name,
            structures = structures.len(),
            groups = stats.groups.len(),
            rows = stats.rows_written(),
            "bulk inserted structures"
        );
        Ok(stats)
    }

    fn write_group(
        &self,
        client: &mut dyn DbClient,
        reader: &mut dyn BulkReader,
        rows: usize,
        stats: &mut BulkStats,
    ) -> Result<()> {
        let table = reader.table_name().to_string();
        let streamed = rows > 1;

        if streamed {
            let mappings = reader.column_mappings();
            client.bulk_copy(&table, &mappings, reader, self.batch_size)?;
        } else {
            reader.read();
            let names: Vec<String> = (0..reader.field_count())
                .filter_map(|i| reader.field_name(i).map(str::to_string))
                .collect();
            let values = (0..names.len()).map(|i| reader.value(i)).collect::<Result<Vec<_>>>()?;
            let columns: Vec<&str> = names.iter().map(String::as_str).collect();
            client.execute(&ddl::insert_row(self.dialect.as_ref(), &table, &columns, values))?;
        }

        debug!(table = %table, rows, streamed, "wrote group");
        stats.groups.push(GroupWrite { table, rows, streamed });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DataTypeFamily, UniqueMode, Value};
    use crate::dac::memory::MemoryClient;
    use crate::structure::id::StructureId;

    fn schema() -> StructureSchema {
        StructureSchema::builder("Item")
            .identity_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .unique("Code", DataTypeFamily::String, UniqueMode::PerType)
            .build()
            .unwrap()
    }

    fn structure(id: i64, int1: Option<i64>) -> Structure {
        let id = StructureId::identity(id).unwrap();
        let int1 = int1.map(Value::from).unwrap_or(Value::Null);
        Structure::new(
            id,
            "Item",
            format!("{{\"Id\":{}}}", id),
            vec![
                StructureIndex::new(id, "Int1", int1, DataTypeFamily::Integer, None),
                StructureIndex::new(id, "Code", Value::from(format!("C{}", id)), DataTypeFamily::String, Some(UniqueMode::PerType)),
            ],
        )
        .unwrap()
    }

    fn client() -> MemoryClient {
        let mut client = MemoryClient::new();
        client.create_table("ItemStructure", &["StructureId", "Json"]);
        client.create_table("ItemIntegers", &["StructureId", "MemberPath", "Value"]);
        client.create_table("ItemStrings", &["StructureId", "MemberPath", "Value", "StringValue"]);
        client.create_table("ItemUniques", &["StructureId", "UqStructureId", "UqMemberPath", "UqValue"]);
        client.create_table("ItemIndexes", &["StructureId", "Int1", "Code"]);
        client
    }

    #[test]
    fn skips_null_index_rows() {
        let mut client = client();
        let inserter = BulkInserter::new(&Config::default());
        let stats = inserter
            .insert(&schema(), &[structure(1, Some(5)), structure(2, None)], &mut client)
            .unwrap();

        let ints = stats.group("ItemIntegers").unwrap();
        assert_eq!(ints.rows, 1);
        assert!(!ints.streamed);
        assert!(stats.group("ItemStructure").unwrap().streamed);
        assert_eq!(client.rows("ItemIndexes").len(), 2);
        assert_eq!(client.column_values("ItemIndexes", "Int1"), vec![Value::Integer(5), Value::Null]);
    }

    #[test]
    fn failing_group_aborts_the_batch() {
        let mut client = client();
        client.fail_on("ItemStrings");
        let inserter = BulkInserter::new(&Config::default());
        let err = inserter
            .insert(&schema(), &[structure(1, Some(1)), structure(2, Some(2))], &mut client)
            .unwrap_err();

        assert!(err.is(crate::core::error::ErrorKind::Storage));
        assert!(client.rows("ItemUniques").is_empty());
    }

    #[test]
    fn batches_follow_configured_size() {
        let mut client = client();
        let inserter = BulkInserter::new(&Config::default().with_bulk_batch_size(2));
        let items: Vec<Structure> = (1..=5).map(|i| structure(i, Some(i))).collect();
        inserter.insert(&schema(), &items, &mut client).unwrap();

        let body = client.bulk_copies().iter().find(|c| c.table == "ItemStructure").unwrap();
        assert_eq!(body.rows, 5);
        assert_eq!(body.batches, 3);
    }
}
