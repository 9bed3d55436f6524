use tracing::info;
use crate::core::error::Result;
use crate::core::types::IndexTable;
use crate::dac::client::DbClient;
use crate::query::command::SqlCommand;
use crate::schema::field::StorageSchemaSet;
use crate::schema::schema::StructureSchema;
use crate::sync::ddl;
use crate::sync::synchronizer::{SchemaSynchronizer, SyncPlan};

/// Tables created and the synchronization applied by one upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub created: Vec<String>,
    pub sync: SyncPlan,
}

/// Makes sure every table of a structure type exists. First use creates them
/// in their current shape; existing member-column tables go through the
/// synchronizer instead.
pub struct TableUpserter<'a> {
    synchronizer: &'a SchemaSynchronizer,
}

impl<'a> TableUpserter<'a> {
    pub fn new(synchronizer: &'a SchemaSynchronizer) -> Self {
        TableUpserter { synchronizer }
    }

    pub fn upsert(&self, schema: &StructureSchema, client: &mut dyn DbClient) -> Result<UpsertOutcome> {
        if self.synchronizer.memo().is_synced(&schema.name) {
            return Ok(UpsertOutcome::default());
        }

        // Creation and synchronization of one type run under the same lock
        let lock = self.synchronizer.memo().lock_for(&schema.name);
        let _guard = lock.lock();
        if self.synchronizer.memo().is_synced(&schema.name) {
            return Ok(UpsertOutcome::default());
        }

        let dialect = self.synchronizer.dialect();
        let tables = StorageSchemaSet::for_structure(schema, self.synchronizer.translator());
        let mut outcome = UpsertOutcome::default();

        let members_existed = client.table_exists(&tables.member_columns.table_name)?;

        let mut wanted: Vec<(&str, SqlCommand)> = vec![
            (tables.body.table_name.as_str(), ddl::create_body_table(dialect, schema, &tables)),
            (tables.uniques.table_name.as_str(), ddl::create_uniques_table(dialect, schema, &tables)),
        ];
        for table in IndexTable::ALL {
            wanted.push((
                tables.index(table).table_name.as_str(),
                ddl::create_index_table(dialect, schema, &tables, table),
            ));
        }
        let columns = ddl::member_columns(schema, self.synchronizer.translator());
        wanted.push((
            tables.member_columns.table_name.as_str(),
            ddl::create_member_columns_table(dialect, schema, &tables, &columns),
        ));

        for (name, command) in wanted {
            if !client.table_exists(name)? {
                client.execute(&command)?;
                outcome.created.push(name.to_string());
            }
        }
        if !outcome.created.is_empty() {
            info!(structure = %schema.name, created = outcome.created.len(), "created structure tables");
        }

        if members_existed {
            outcome.sync = self.synchronizer.synchronize_locked(schema, client)?;
        } else {
            // Freshly created tables already match the schema
            self.synchronizer.memo().mark_synced(&schema.name);
        }
        Ok(outcome)
    }
}
