use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use regex::Regex;
use tracing::trace;
use crate::core::error::{Error, Result};
use crate::core::types::Value;
use crate::dac::client::{BulkReader, ColumnMapping, DbClient};
use crate::query::command::SqlCommand;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    pub fn ordinal(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// One `bulk_copy` call as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCopyRecord {
    pub table: String,
    pub rows: usize,
    pub batches: usize,
}

struct Statements {
    create: Regex,
    drop_columns: Regex,
    add_columns: Regex,
    delete: Regex,
    insert: Regex,
    select_distinct: Regex,
    bracketed: Regex,
}

fn statements() -> &'static Statements {
    static STATEMENTS: OnceLock<Statements> = OnceLock::new();
    STATEMENTS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("valid statement regex");
        Statements {
            create: re(r"(?is)^\s*create table \[([^\]]+)\]\s*\((.*)\)\s*$"),
            drop_columns: re(r"(?is)^\s*alter table \[([^\]]+)\] drop column (.*)$"),
            add_columns: re(r"(?is)^\s*alter table \[([^\]]+)\] add (.*)$"),
            delete: re(r"(?is)^\s*delete from \[([^\]]+)\] where \[([^\]]+)\] = (@p\d+)\s*$"),
            insert: re(r"(?is)^\s*insert into \[([^\]]+)\] \((.*?)\) values \((.*)\)\s*$"),
            select_distinct: re(r"(?is)^\s*select distinct \[([^\]]+)\] from \[([^\]]+)\]\s*$"),
            bracketed: re(r"\[([^\]]+)\]"),
        }
    })
}

/// In-memory client for tests and dry runs. Understands the DDL and DML this
/// crate emits; every other statement is only recorded.
#[derive(Debug, Default)]
pub struct MemoryClient {
    tables: BTreeMap<String, MemoryTable>,
    executed: Vec<SqlCommand>,
    bulk_copies: Vec<BulkCopyRecord>,
    failing_tables: HashSet<String>,
}

impl MemoryClient {
    pub fn new() -> Self {
        MemoryClient::default()
    }

    /// Make every operation touching `table` fail with a storage error
    pub fn fail_on(&mut self, table: &str) {
        self.failing_tables.insert(table.to_string());
    }

    pub fn create_table(&mut self, table: &str, columns: &[&str]) {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn table(&self, table: &str) -> Option<&MemoryTable> {
        self.tables.get(table)
    }

    pub fn rows(&self, table: &str) -> &[Vec<Value>] {
        self.tables.get(table).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    pub fn column_values(&self, table: &str, column: &str) -> Vec<Value> {
        match self.tables.get(table) {
            Some(t) => match t.ordinal(column) {
                Some(i) => t.rows.iter().map(|row| row[i].clone()).collect(),
                None => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    pub fn executed(&self) -> &[SqlCommand] {
        &self.executed
    }

    pub fn bulk_copies(&self) -> &[BulkCopyRecord] {
        &self.bulk_copies
    }

    pub fn clear_log(&mut self) {
        self.executed.clear();
        self.bulk_copies.clear();
    }

    fn check(&self, table: &str) -> Result<()> {
        if self.failing_tables.contains(table) {
            return Err(Error::storage(format!("Table '{}' is unavailable", table)));
        }
        Ok(())
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemoryTable> {
        self.check(table)?;
        self.tables
            .get_mut(table)
            .ok_or_else(|| Error::storage(format!("Invalid object name '{}'", table)))
    }

    fn apply(&mut self, command: &SqlCommand) -> Result<usize> {
        let st = statements();
        let sql = command.sql.as_str();

        if let Some(caps) = st.create.captures(sql) {
            let table = caps[1].to_string();
            self.check(&table)?;
            if self.tables.contains_key(&table) {
                return Err(Error::storage(format!("There is already an object named '{}'", table)));
            }
            let columns = split_top_level(&caps[2])
                .into_iter()
                .filter_map(|def| leading_name(st, def))
                .collect();
            self.tables.insert(table, MemoryTable { columns, rows: Vec::new() });
            return Ok(0);
        }

        if let Some(caps) = st.drop_columns.captures(sql) {
            let names: Vec<String> = st.bracketed.captures_iter(&caps[2]).map(|c| c[1].to_string()).collect();
            let table = self.table_mut(&caps[1])?;
            for name in names {
                let ordinal = table
                    .ordinal(&name)
                    .ok_or_else(|| Error::storage(format!("Column '{}' does not exist", name)))?;
                table.columns.remove(ordinal);
                for row in &mut table.rows {
                    row.remove(ordinal);
                }
            }
            return Ok(0);
        }

        if let Some(caps) = st.add_columns.captures(sql) {
            let names: Vec<String> = split_top_level(&caps[2])
                .into_iter()
                .filter_map(|def| leading_name(st, def))
                .collect();
            let table = self.table_mut(&caps[1])?;
            for name in names {
                if table.ordinal(&name).is_some() {
                    return Err(Error::storage(format!("Column '{}' already exists", name)));
                }
                table.columns.push(name);
                for row in &mut table.rows {
                    row.push(Value::Null);
                }
            }
            return Ok(0);
        }

        if let Some(caps) = st.delete.captures(sql) {
            let value = command.param(&caps[3]).cloned().unwrap_or(Value::Null);
            let column = caps[2].to_string();
            let table = self.table_mut(&caps[1])?;
            let ordinal = table
                .ordinal(&column)
                .ok_or_else(|| Error::storage(format!("Invalid column name '{}'", column)))?;
            let before = table.rows.len();
            table.rows.retain(|row| row[ordinal] != value);
            return Ok(before - table.rows.len());
        }

        if let Some(caps) = st.insert.captures(sql) {
            let columns: Vec<String> = st.bracketed.captures_iter(&caps[2]).map(|c| c[1].to_string()).collect();
            let values: Vec<Value> = caps[3]
                .split(',')
                .map(|name| command.param(name.trim()).cloned().unwrap_or(Value::Null))
                .collect();
            let table = self.table_mut(&caps[1])?;
            let mut row = vec![Value::Null; table.columns.len()];
            for (column, value) in columns.iter().zip(values) {
                let ordinal = table
                    .ordinal(column)
                    .ok_or_else(|| Error::storage(format!("Invalid column name '{}'", column)))?;
                row[ordinal] = value;
            }
            table.rows.push(row);
            return Ok(1);
        }

        Ok(0)
    }
}

impl DbClient for MemoryClient {
    fn execute(&mut self, command: &SqlCommand) -> Result<usize> {
        trace!(sql = %command.sql, "memory execute");
        let affected = self.apply(command)?;
        self.executed.push(command.clone());
        Ok(affected)
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.check(table)?;
        Ok(self.tables.contains_key(table))
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self.table_mut(table)?.columns.clone())
    }

    fn query_column(&mut self, command: &SqlCommand) -> Result<Vec<Value>> {
        let caps = statements().select_distinct.captures(&command.sql).ok_or_else(|| {
            Error::storage(format!("Unsupported query for the memory client: {}", command.sql))
        })?;
        let column = caps[1].to_string();
        let table = self.table_mut(&caps[2])?;
        let ordinal = table
            .ordinal(&column)
            .ok_or_else(|| Error::storage(format!("Invalid column name '{}'", column)))?;

        let mut values: Vec<Value> = Vec::new();
        for row in &table.rows {
            if !values.contains(&row[ordinal]) {
                values.push(row[ordinal].clone());
            }
        }
        Ok(values)
    }

    fn bulk_copy(
        &mut self,
        table: &str,
        mappings: &[ColumnMapping],
        reader: &mut dyn BulkReader,
        batch_size: usize,
    ) -> Result<usize> {
        let target = self.table_mut(table)?;
        let mut ordinals = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let ordinal = target.ordinal(&mapping.destination).ok_or_else(|| {
                Error::storage(format!("Column mapping '{}' does not match table '{}'", mapping.destination, table))
            })?;
            ordinals.push((mapping.source_ordinal, ordinal));
        }

        let mut rows = Vec::new();
        while reader.read() {
            let mut row = vec![Value::Null; target.columns.len()];
            for (source, destination) in &ordinals {
                row[*destination] = reader.value(*source)?;
            }
            rows.push(row);
        }

        let count = rows.len();
        target.rows.extend(rows);
        self.bulk_copies.push(BulkCopyRecord {
            table: table.to_string(),
            rows: count,
            batches: count.div_ceil(batch_size.max(1)),
        });
        Ok(count)
    }
}

/// Split a definition list on commas outside parentheses
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in list.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts
}

// Column definitions start with the bracketed name; constraints do not
fn leading_name(st: &Statements, definition: &str) -> Option<String> {
    if !definition.starts_with('[') {
        return None;
    }
    st.bracketed.captures(definition).map(|c| c[1].to_string())
}
