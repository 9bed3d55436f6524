use crate::core::types::{DataTypeFamily, IndexTable, Value};
use crate::query::command::{QueryParam, SqlCommand};
use crate::query::dialect::SqlDialect;
use crate::schema::field::{self, StorageSchemaSet};
use crate::schema::naming::MemberNameTranslator;
use crate::schema::schema::StructureSchema;
use crate::structure::id::IdKind;

/// Sparse member column wanted in the member-column table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub family: DataTypeFamily,
}

/// Logical member columns of a schema, named the way queries name them
pub fn member_columns(schema: &StructureSchema, translator: &dyn MemberNameTranslator) -> Vec<ColumnDefinition> {
    schema
        .index_accessors
        .iter()
        .map(|a| ColumnDefinition {
            name: translator.translate(&a.path),
            family: a.storage_family(),
        })
        .collect()
}

fn id_type(schema: &StructureSchema) -> &'static str {
    match schema.id_accessor.kind {
        IdKind::Identity => "bigint",
        IdKind::Guid => "uniqueidentifier",
    }
}

pub fn create_body_table(dialect: &dyn SqlDialect, schema: &StructureSchema, tables: &StorageSchemaSet) -> SqlCommand {
    SqlCommand::text(format!(
        "create table {} ({} {} not null primary key, {} nvarchar(max) not null)",
        dialect.quote(&tables.body.table_name),
        dialect.quote(field::STRUCTURE_ID),
        id_type(schema),
        dialect.quote(field::JSON)
    ))
}

pub fn create_uniques_table(dialect: &dyn SqlDialect, schema: &StructureSchema, tables: &StorageSchemaSet) -> SqlCommand {
    let id = id_type(schema);
    SqlCommand::text(format!(
        "create table {} ({} {} not null, {} {} null, {} nvarchar(300) not null, {} nvarchar(300) not null, unique ({}, {}, {}))",
        dialect.quote(&tables.uniques.table_name),
        dialect.quote(field::STRUCTURE_ID),
        id,
        dialect.quote(field::UQ_STRUCTURE_ID),
        id,
        dialect.quote(field::UQ_MEMBER_PATH),
        dialect.quote(field::UQ_VALUE),
        dialect.quote(field::UQ_STRUCTURE_ID),
        dialect.quote(field::UQ_MEMBER_PATH),
        dialect.quote(field::UQ_VALUE)
    ))
}

pub fn create_index_table(
    dialect: &dyn SqlDialect,
    schema: &StructureSchema,
    tables: &StorageSchemaSet,
    table: IndexTable,
) -> SqlCommand {
    // Textual tables keep the indexed prefix in Value and the full value aside
    let value_type = if table.has_string_value() {
        dialect.column_type(DataTypeFamily::String)
    } else {
        dialect.column_type(table.value_family())
    };
    let mut columns = format!(
        "{} {} not null, {} nvarchar(300) not null, {} {} null",
        dialect.quote(field::STRUCTURE_ID),
        id_type(schema),
        dialect.quote(field::MEMBER_PATH),
        dialect.quote(field::VALUE),
        value_type
    );
    if table.has_string_value() {
        columns.push_str(&format!(", {} nvarchar(max) null", dialect.quote(field::STRING_VALUE)));
    }
    SqlCommand::text(format!("create table {} ({})", dialect.quote(&tables.index(table).table_name), columns))
}

pub fn create_member_columns_table(
    dialect: &dyn SqlDialect,
    schema: &StructureSchema,
    tables: &StorageSchemaSet,
    columns: &[ColumnDefinition],
) -> SqlCommand {
    let mut definitions = format!(
        "{} {} not null primary key",
        dialect.quote(field::STRUCTURE_ID),
        id_type(schema)
    );
    for column in columns {
        definitions.push_str(", ");
        definitions.push_str(&sparse_column(dialect, column));
    }
    SqlCommand::text(format!(
        "create table {} ({})",
        dialect.quote(&tables.member_columns.table_name),
        definitions
    ))
}

fn sparse_column(dialect: &dyn SqlDialect, column: &ColumnDefinition) -> String {
    format!("{} {} sparse null", dialect.quote(&column.name), dialect.column_type(column.family))
}

pub fn add_columns(dialect: &dyn SqlDialect, table: &str, columns: &[ColumnDefinition]) -> SqlCommand {
    let definitions: Vec<String> = columns.iter().map(|c| sparse_column(dialect, c)).collect();
    SqlCommand::text(format!("alter table {} add {}", dialect.quote(table), definitions.join(", ")))
}

pub fn drop_columns(dialect: &dyn SqlDialect, table: &str, columns: &[String]) -> SqlCommand {
    let names: Vec<String> = columns.iter().map(|c| dialect.quote(c)).collect();
    SqlCommand::text(format!("alter table {} drop column {}", dialect.quote(table), names.join(", ")))
}

pub fn stored_unique_paths(dialect: &dyn SqlDialect, table: &str) -> SqlCommand {
    SqlCommand::text(format!(
        "select distinct {} from {}",
        dialect.quote(field::UQ_MEMBER_PATH),
        dialect.quote(table)
    ))
}

pub fn delete_unique_rows(dialect: &dyn SqlDialect, table: &str, path: &str) -> SqlCommand {
    SqlCommand::new(
        format!("delete from {} where {} = @p0", dialect.quote(table), dialect.quote(field::UQ_MEMBER_PATH)),
        vec![QueryParam::new("@p0", Value::from(path))],
    )
}

/// Single-row insert used when a group holds exactly one row
pub fn insert_row(dialect: &dyn SqlDialect, table: &str, columns: &[&str], values: Vec<Value>) -> SqlCommand {
    let names: Vec<String> = columns.iter().map(|c| dialect.quote(c)).collect();
    let params: Vec<QueryParam> = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| QueryParam::new(format!("@p{}", i), value))
        .collect();
    let placeholders: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    let sql = format!(
        "insert into {} ({}) values ({})",
        dialect.quote(table),
        names.join(", "),
        placeholders.join(", ")
    );
    SqlCommand::new(sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::dialect::OffsetFetchDialect;
    use crate::schema::naming::DefaultNameTranslator;

    #[test]
    fn member_columns_are_sparse_and_typed() {
        let schema = StructureSchema::builder("Item")
            .guid_id("Id")
            .index("Address.Zip", DataTypeFamily::Integer)
            .enumerable("Tags", DataTypeFamily::Integer)
            .build()
            .unwrap();
        let translator = DefaultNameTranslator::new(128);
        let columns = member_columns(&schema, &translator);
        let command = add_columns(&OffsetFetchDialect, "ItemIndexes", &columns);

        assert_eq!(
            command.sql,
            "alter table [ItemIndexes] add [Address_Zip] bigint sparse null, [Tags] nvarchar(300) sparse null"
        );
    }

    #[test]
    fn single_row_insert_is_parameterized() {
        let command = insert_row(
            &OffsetFetchDialect,
            "ItemIntegers",
            &["StructureId", "MemberPath", "Value"],
            vec![Value::from(1), Value::from("Int1"), Value::from(42)],
        );
        assert_eq!(
            command.sql,
            "insert into [ItemIntegers] ([StructureId], [MemberPath], [Value]) values (@p0, @p1, @p2)"
        );
        assert_eq!(command.param("@p2"), Some(&Value::Integer(42)));
    }
}
