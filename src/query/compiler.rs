use std::collections::HashMap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{IndexTable, Value};
use crate::query::command::Params;
use crate::query::dialect::SqlDialect;
use crate::query::nodes::{MemberNode, Node, Operator};
use crate::query::query::Query;
use crate::schema::field::{self, index_table_name};
use crate::schema::naming::MemberNameTranslator;
use crate::schema::schema::StructureSchema;

// Column names the derived table already uses
const RESERVED: [&str; 3] = [field::STRUCTURE_ID, field::JSON, "RowNum"];

/// Member value projected into the derived table `rs`
#[derive(Debug, Clone, PartialEq)]
pub struct MemberColumn {
    pub path: String,
    pub alias: String,
    pub table: IndexTable,
}

impl MemberColumn {
    pub fn value_column(&self) -> &'static str {
        if self.table.has_string_value() { field::STRING_VALUE } else { field::VALUE }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeJoin {
    pub join: String,
    pub column: String,
    pub output: String,  // Result column name of `column`
}

/// Query pieces shared by every result shape
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub members: Vec<MemberColumn>,
    pub where_sql: String,
    pub order_by: Vec<String>,
    pub includes: Vec<IncludeJoin>,
    pub params: Params,
}

pub struct QueryCompiler<'a> {
    dialect: &'a dyn SqlDialect,
    translator: &'a dyn MemberNameTranslator,
}

struct CompileState<'s> {
    schema: &'s StructureSchema,
    members: Vec<MemberColumn>,
    by_path: HashMap<String, usize>,
    params: Params,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, translator: &'a dyn MemberNameTranslator) -> Self {
        QueryCompiler { dialect, translator }
    }

    pub fn compile(&self, schema: &StructureSchema, query: &Query) -> Result<CompiledQuery> {
        let mut state = CompileState {
            schema,
            members: Vec::new(),
            by_path: HashMap::new(),
            params: Params::new(),
        };

        let where_sql = self.compile_where(&mut state, &query.where_nodes)?;

        let mut order_by = Vec::with_capacity(query.sortings.len());
        for sorting in &query.sortings {
            let column = self.column_ref(&mut state, &sorting.member)?;
            order_by.push(format!("{} {}", column, sorting.direction.sql()));
        }

        let mut includes = Vec::with_capacity(query.includes.len());
        for (i, include) in query.includes.iter().enumerate() {
            let column = self.column_ref(&mut state, &include.member)?;
            let alias = format!("inc{}", i);
            let output = format!("IncludeJson{}", i);
            includes.push(IncludeJoin {
                join: format!(
                    "left join {} {} on {}.{} = {}",
                    self.dialect.quote(&field::body_table_name(&include.target)),
                    alias,
                    alias,
                    self.dialect.quote(field::STRUCTURE_ID),
                    column
                ),
                column: format!(
                    "{}.{} as {}",
                    alias,
                    self.dialect.quote(field::JSON),
                    self.dialect.quote(&output)
                ),
                output,
            });
        }

        Ok(CompiledQuery {
            members: state.members,
            where_sql,
            order_by,
            includes,
            params: state.params,
        })
    }

    /// Build the `from` clause: a derived table `rs` with one column per
    /// referenced member, or the body table alone when nothing is referenced.
    pub fn source(&self, structure: &str, compiled: &CompiledQuery, with_includes: bool) -> String {
        let body = self.dialect.quote(&field::body_table_name(structure));
        let id = self.dialect.quote(field::STRUCTURE_ID);

        let mut source = if compiled.members.is_empty() {
            format!("from {} rs", body)
        } else {
            let mut columns = format!("s.{}, s.{}", id, self.dialect.quote(field::JSON));
            let mut joins = String::new();
            for (i, member) in compiled.members.iter().enumerate() {
                columns.push_str(&format!(
                    ", mem{}.{} as {}",
                    i,
                    self.dialect.quote(member.value_column()),
                    self.dialect.quote(&member.alias)
                ));
                joins.push_str(&format!(
                    " left join {} mem{} on mem{}.{} = s.{} and mem{}.{} = '{}'",
                    self.dialect.quote(&index_table_name(structure, member.table)),
                    i,
                    i,
                    id,
                    id,
                    i,
                    self.dialect.quote(field::MEMBER_PATH),
                    member.path.replace('\'', "''")
                ));
            }
            format!("from (select {} from {} s{}) rs", columns, body, joins)
        };

        if with_includes {
            for include in &compiled.includes {
                source.push(' ');
                source.push_str(&include.join);
            }
        }
        source
    }

    fn compile_where(&self, state: &mut CompileState, nodes: &[Node]) -> Result<String> {
        let mut sql = String::new();
        let mut previous_op = None;

        for node in nodes {
            let token = match node {
                Node::Member(member) => self.column_ref(state, member)?,
                Node::Operator(op) => op.sql().to_string(),
                Node::Value(Value::List(values)) => {
                    if !matches!(previous_op, Some(Operator::In | Operator::NotIn)) {
                        return Err(Error::new(
                            ErrorKind::Internal,
                            "Value list outside of an in comparison".to_string(),
                        ));
                    }
                    if values.is_empty() {
                        "(select null where 1 = 0)".to_string()
                    } else {
                        let names: Vec<String> =
                            values.iter().map(|v| state.params.add(v.clone())).collect();
                        format!("({})", names.join(", "))
                    }
                }
                Node::Value(value) => state.params.add(value.clone()),
                Node::Null => "null".to_string(),
                Node::StartGroup => "(".to_string(),
                Node::EndGroup => ")".to_string(),
                Node::Sorting(_) | Node::Include(_) => {
                    return Err(Error::new(
                        ErrorKind::Internal,
                        "Sorting and include nodes do not belong in a where clause".to_string(),
                    ));
                }
            };
            previous_op = node.as_operator();
            push_token(&mut sql, &token);
        }
        Ok(sql)
    }

    fn column_ref(&self, state: &mut CompileState, member: &MemberNode) -> Result<String> {
        if member.is_id {
            return Ok(format!("rs.{}", self.dialect.quote(field::STRUCTURE_ID)));
        }
        if let Some(&i) = state.by_path.get(&member.path) {
            return Ok(format!("rs.{}", self.dialect.quote(&state.members[i].alias)));
        }

        let accessor = state
            .schema
            .accessor(&member.path)
            .ok_or_else(|| Error::schema_mismatch(&state.schema.name, &member.path))?;

        let mut alias = self.translator.translate(&member.path);
        let mut attempt = 0;
        while RESERVED.contains(&alias.as_str()) || state.members.iter().any(|m| m.alias == alias) {
            attempt += 1;
            alias = self.translator.translate(&format!("{}_{}", member.path, attempt));
        }

        state.by_path.insert(member.path.clone(), state.members.len());
        state.members.push(MemberColumn {
            path: member.path.clone(),
            alias: alias.clone(),
            table: accessor.storage_family().index_table(),
        });
        Ok(format!("rs.{}", self.dialect.quote(&alias)))
    }
}

fn push_token(sql: &mut String, token: &str) {
    if !sql.is_empty() && !sql.ends_with('(') && token != ")" {
        sql.push(' ');
    }
    sql.push_str(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DataTypeFamily;
    use crate::query::dialect::OffsetFetchDialect;
    use crate::query::query::QueryBuilder;
    use crate::schema::naming::DefaultNameTranslator;

    fn schema() -> StructureSchema {
        StructureSchema::builder("Item")
            .guid_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .index("Name", DataTypeFamily::String)
            .index("Json", DataTypeFamily::String)
            .build()
            .unwrap()
    }

    fn compile(query: &Query) -> Result<CompiledQuery> {
        let translator = DefaultNameTranslator::new(128);
        QueryCompiler::new(&OffsetFetchDialect, &translator).compile(&schema(), query)
    }

    #[test]
    fn writes_groups_without_inner_spaces() {
        let schema = schema();
        let query = QueryBuilder::new(&schema)
            .filter("i => (i.Int1 > 1 && i.Int1 < 5) || i.Name == \"x\"")
            .unwrap()
            .build();
        let compiled = compile(&query).unwrap();

        assert_eq!(
            compiled.where_sql,
            "((rs.[Int1] > @p0) and (rs.[Int1] < @p1)) or (rs.[Name] = @p2)"
        );
        assert_eq!(compiled.members.len(), 2);
        assert_eq!(compiled.members[1].table, IndexTable::Strings);
    }

    #[test]
    fn expands_value_lists() {
        let schema = schema();
        let query = QueryBuilder::new(&schema)
            .filter("i => i.Int1.In([1, 2, 3])")
            .unwrap()
            .build();
        let compiled = compile(&query).unwrap();
        assert_eq!(compiled.where_sql, "rs.[Int1] in (@p0, @p1, @p2)");
        assert_eq!(compiled.params.len(), 3);
    }

    #[test]
    fn avoids_reserved_aliases() {
        let schema = schema();
        let query = QueryBuilder::new(&schema).filter("i => i.Json == \"a\"").unwrap().build();
        let compiled = compile(&query).unwrap();
        assert_eq!(compiled.members[0].alias, "Json_1");
    }

    #[test]
    fn unknown_members_are_schema_mismatches() {
        let mut query = QueryBuilder::new(&schema()).filter("i => i.Int1 == 1").unwrap().build();
        if let Node::Member(member) = &mut query.where_nodes[0] {
            member.path = "Missing".to_string();
        }
        let err = compile(&query).unwrap_err();
        assert!(err.is(ErrorKind::SchemaMismatch));
    }
}
