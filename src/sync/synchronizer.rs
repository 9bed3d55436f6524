use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::dac::client::DbClient;
use crate::query::command::SqlCommand;
use crate::query::dialect::SqlDialect;
use crate::schema::field::{self, member_columns_table_name, uniques_table_name};
use crate::schema::naming::{DefaultNameTranslator, MemberNameTranslator};
use crate::schema::schema::StructureSchema;
use crate::sync::ddl::{self, ColumnDefinition};

/// Structure types already synchronized, plus one lock per type so that
/// concurrent first use runs the diff once. Owned by the caller; share it
/// through an `Arc` to cover several synchronizers.
#[derive(Debug, Default)]
pub struct SyncMemo {
    synced: Mutex<HashSet<String>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncMemo {
    pub fn new() -> Self {
        SyncMemo::default()
    }

    pub fn is_synced(&self, structure: &str) -> bool {
        self.synced.lock().contains(structure)
    }

    pub fn mark_synced(&self, structure: &str) {
        self.synced.lock().insert(structure.to_string());
    }

    /// Force the next synchronization of `structure` to diff again
    pub fn forget(&self, structure: &str) {
        self.synced.lock().remove(structure);
    }

    pub fn clear(&self) {
        self.synced.lock().clear();
    }

    /// Lock serializing DDL of one structure type
    pub(crate) fn lock_for(&self, structure: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(structure.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Outcome of one diff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub drop_columns: Vec<String>,
    pub add_columns: Vec<ColumnDefinition>,
    pub obsolete_uniques: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.drop_columns.is_empty() && self.add_columns.is_empty() && self.obsolete_uniques.is_empty()
    }

    /// Column changes as one administrative unit
    pub fn column_commands(&self, dialect: &dyn SqlDialect, table: &str) -> Vec<SqlCommand> {
        let mut commands = Vec::with_capacity(2);
        if !self.drop_columns.is_empty() {
            commands.push(ddl::drop_columns(dialect, table, &self.drop_columns));
        }
        if !self.add_columns.is_empty() {
            commands.push(ddl::add_columns(dialect, table, &self.add_columns));
        }
        commands
    }

    pub fn unique_commands(&self, dialect: &dyn SqlDialect, table: &str) -> Vec<SqlCommand> {
        self.obsolete_uniques
            .iter()
            .map(|path| ddl::delete_unique_rows(dialect, table, path))
            .collect()
    }
}

/// Reconciles the member-column table and the uniques table of a structure
/// type with its current schema.
pub struct SchemaSynchronizer {
    memo: Arc<SyncMemo>,
    dialect: Box<dyn SqlDialect>,
    translator: Arc<dyn MemberNameTranslator>,
}

impl SchemaSynchronizer {
    pub fn new(config: &Config, memo: Arc<SyncMemo>) -> Self {
        let dialect = config.dialect.create();
        let max_length = config
            .max_identifier_length
            .unwrap_or_else(|| dialect.max_identifier_length());
        SchemaSynchronizer {
            memo,
            dialect,
            translator: Arc::new(DefaultNameTranslator::new(max_length)),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn MemberNameTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn memo(&self) -> &Arc<SyncMemo> {
        &self.memo
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn translator(&self) -> &dyn MemberNameTranslator {
        self.translator.as_ref()
    }

    /// Diff and apply once per type. Later calls short-circuit on the memo.
    pub fn synchronize(&self, schema: &StructureSchema, client: &mut dyn DbClient) -> Result<SyncPlan> {
        if self.memo.is_synced(&schema.name) {
            return Ok(SyncPlan::default());
        }

        let lock = self.memo.lock_for(&schema.name);
        let _guard = lock.lock();
        self.synchronize_locked(schema, client)
    }

    /// `synchronize` for a caller already holding the type's lock
    pub(crate) fn synchronize_locked(&self, schema: &StructureSchema, client: &mut dyn DbClient) -> Result<SyncPlan> {
        if self.memo.is_synced(&schema.name) {
            return Ok(SyncPlan::default());
        }

        let table = member_columns_table_name(&schema.name);
        if !client.table_exists(&table)? {
            warn!(structure = %schema.name, table = %table, "skipping synchronization of missing table");
            return Ok(SyncPlan::default());
        }

        let plan = self.plan(schema, client)?;
        self.apply(schema, &plan, client)?;
        self.memo.mark_synced(&schema.name);
        Ok(plan)
    }

    /// Compute the DDL without running it
    pub fn plan(&self, schema: &StructureSchema, client: &mut dyn DbClient) -> Result<SyncPlan> {
        let table = member_columns_table_name(&schema.name);
        let logical = ddl::member_columns(schema, self.translator.as_ref());
        let physical: Vec<String> = client
            .column_names(&table)?
            .into_iter()
            .filter(|c| c != field::STRUCTURE_ID)
            .collect();

        let logical_names: HashSet<&str> = logical.iter().map(|c| c.name.as_str()).collect();
        let physical_names: HashSet<&str> = physical.iter().map(String::as_str).collect();

        let drop_columns: Vec<String> = physical
            .iter()
            .filter(|name| !logical_names.contains(name.as_str()))
            .cloned()
            .collect();
        let add_columns: Vec<ColumnDefinition> = logical
            .into_iter()
            .filter(|c| !physical_names.contains(c.name.as_str()))
            .collect();

        let obsolete_uniques = self.obsolete_uniques(schema, client)?;

        let plan = SyncPlan { drop_columns, add_columns, obsolete_uniques };
        debug!(structure = %schema.name, ?plan, "computed schema diff");
        Ok(plan)
    }

    fn obsolete_uniques(&self, schema: &StructureSchema, client: &mut dyn DbClient) -> Result<Vec<String>> {
        let table = uniques_table_name(&schema.name);
        if !client.table_exists(&table)? {
            return Ok(Vec::new());
        }

        let current: HashSet<&str> = schema.unique_accessors().map(|a| a.path.as_str()).collect();
        let stored = client.query_column(&ddl::stored_unique_paths(self.dialect.as_ref(), &table))?;

        Ok(stored
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|path| !current.contains(path))
            .map(str::to_string)
            .collect())
    }

    fn apply(&self, schema: &StructureSchema, plan: &SyncPlan, client: &mut dyn DbClient) -> Result<()> {
        let columns_table = member_columns_table_name(&schema.name);
        let column_commands = plan.column_commands(self.dialect.as_ref(), &columns_table);
        if !column_commands.is_empty() {
            client.execute_batch(&column_commands)?;
            info!(
                structure = %schema.name,
                dropped = plan.drop_columns.len(),
                added = plan.add_columns.len(),
                "synchronized member columns"
            );
        }

        let uniques_table = uniques_table_name(&schema.name);
        for command in plan.unique_commands(self.dialect.as_ref(), &uniques_table) {
            let deleted = client.execute(&command)?;
            info!(structure = %schema.name, deleted, "pruned unique rows of a non-unique member");
        }
        Ok(())
    }
}
