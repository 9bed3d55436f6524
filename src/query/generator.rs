use std::sync::Arc;
use serde::Serialize;
use tracing::debug;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::query::command::SqlCommand;
use crate::query::compiler::{CompiledQuery, QueryCompiler};
use crate::query::dialect::{SelectParts, SqlDialect};
use crate::query::query::Query;
use crate::schema::field;
use crate::schema::naming::{DefaultNameTranslator, MemberNameTranslator};
use crate::schema::schema::StructureSchema;

/// Result shape of a generated query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryShape {
    Full,    // StructureId, Json and included bodies
    Ids,
    Count,
    Exists,
}

/// Turns parsed queries into parameterized SQL for one dialect
pub struct QueryGenerator {
    dialect: Box<dyn SqlDialect>,
    translator: Arc<dyn MemberNameTranslator>,
}

impl QueryGenerator {
    pub fn new(config: &Config) -> Self {
        let dialect = config.dialect.create();
        let max_length = config
            .max_identifier_length
            .unwrap_or_else(|| dialect.max_identifier_length());
        QueryGenerator {
            dialect,
            translator: Arc::new(DefaultNameTranslator::new(max_length)),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn MemberNameTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn translator(&self) -> Arc<dyn MemberNameTranslator> {
        self.translator.clone()
    }

    pub fn generate_shape(&self, schema: &StructureSchema, query: &Query, shape: QueryShape) -> Result<SqlCommand> {
        let compiler = QueryCompiler::new(self.dialect.as_ref(), self.translator.as_ref());
        let compiled = compiler.compile(schema, query)?;

        let filter = if compiled.where_sql.is_empty() {
            String::new()
        } else {
            format!(" where {}", compiled.where_sql)
        };

        let (sql, compiled) = match shape {
            QueryShape::Full | QueryShape::Ids => self.select(&compiler, query, compiled, &filter, shape),
            QueryShape::Count => {
                let source = compiler.source(&query.structure, &compiled, false);
                (format!("select count(*) {}{}", source, filter), compiled)
            }
            QueryShape::Exists => {
                let source = compiler.source(&query.structure, &compiled, false);
                let inner = format!("select 1 {}{}", source, filter);
                (self.dialect.format_exists(&inner), compiled)
            }
        };

        debug!(structure = %query.structure, ?shape, sql = %sql, "generated query");
        Ok(SqlCommand::new(sql, compiled.params.into_vec()))
    }

    pub fn generate(&self, schema: &StructureSchema, query: &Query) -> Result<SqlCommand> {
        self.generate_shape(schema, query, QueryShape::Full)
    }

    pub fn generate_ids(&self, schema: &StructureSchema, query: &Query) -> Result<SqlCommand> {
        self.generate_shape(schema, query, QueryShape::Ids)
    }

    pub fn generate_count(&self, schema: &StructureSchema, query: &Query) -> Result<SqlCommand> {
        self.generate_shape(schema, query, QueryShape::Count)
    }

    pub fn generate_exists(&self, schema: &StructureSchema, query: &Query) -> Result<SqlCommand> {
        self.generate_shape(schema, query, QueryShape::Exists)
    }

    fn select(
        &self,
        compiler: &QueryCompiler,
        query: &Query,
        mut compiled: CompiledQuery,
        filter: &str,
        shape: QueryShape,
    ) -> (String, CompiledQuery) {
        let with_includes = shape == QueryShape::Full;
        let source = compiler.source(&query.structure, &compiled, with_includes);

        let mut columns = format!("rs.{}", self.dialect.quote(field::STRUCTURE_ID));
        let mut outputs = vec![field::STRUCTURE_ID.to_string()];
        if shape == QueryShape::Full {
            columns.push_str(&format!(", rs.{}", self.dialect.quote(field::JSON)));
            outputs.push(field::JSON.to_string());
            for include in &compiled.includes {
                columns.push_str(", ");
                columns.push_str(&include.column);
                outputs.push(include.output.clone());
            }
        }

        if let Some(paging) = &query.paging {
            // Paging needs a stable order
            let order_by = if compiled.order_by.is_empty() {
                format!("rs.{} asc", self.dialect.quote(field::STRUCTURE_ID))
            } else {
                compiled.order_by.join(", ")
            };
            let parts = SelectParts {
                columns: &columns,
                outputs: &outputs,
                source: &source,
                filter,
                order_by: &order_by,
            };
            let sql = self.dialect.format_paging(&parts, paging, &mut compiled.params);
            return (sql, compiled);
        }

        let take = query.take.map(|n| self.dialect.format_take(n)).unwrap_or_default();
        let mut sql = format!("select {}{} {}{}", take, columns, source, filter);
        if !compiled.order_by.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&compiled.order_by.join(", "));
        }
        (sql, compiled)
    }
}
