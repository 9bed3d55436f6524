use serde::Serialize;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Value;
use crate::query::ast::Lambda;
use crate::query::eval::Bindings;
use crate::query::expression_parser::WhereParser;
use crate::query::includes::parse_include;
use crate::query::nodes::{IncludeNode, Node, Operator, SortDirection, SortingNode};
use crate::query::parser::parse_lambda;
use crate::query::sorting::parse_sorting;
use crate::query::transformers::HasValueRewrite;
use crate::schema::schema::StructureSchema;

/// One page of a result. Every row number of a page fits a `bigint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paging {
    page_index: usize,  // Zero based
    page_size: usize,
    offset: i64,
    last_row: i64,
}

impl Paging {
    pub fn new(page_index: usize, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument, "Page size must be at least 1".to_string()));
        }
        let bounds = page_index.checked_mul(page_size).and_then(|offset| {
            let last_row = offset.checked_add(page_size)?;
            Some((i64::try_from(offset).ok()?, i64::try_from(last_row).ok()?))
        });
        let (offset, last_row) = bounds.ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("Page {} of size {} is beyond the last addressable row", page_index, page_size),
            )
        })?;
        Ok(Paging { page_index, page_size, offset, last_row })
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows skipped before the page
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// One-based row numbers of the first and last row of the page
    pub fn first_row(&self) -> i64 {
        self.offset + 1
    }

    pub fn last_row(&self) -> i64 {
        self.last_row
    }

    /// Rows fetched for the page
    pub fn fetch(&self) -> i64 {
        self.last_row - self.offset
    }
}

/// Parsed form of a query against one structure type
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Query {
    pub structure: String,
    pub where_nodes: Vec<Node>,
    pub sortings: Vec<SortingNode>,
    pub includes: Vec<IncludeNode>,
    pub take: Option<usize>,
    pub paging: Option<Paging>,
}

impl Query {
    pub fn has_where(&self) -> bool {
        !self.where_nodes.is_empty()
    }
}

pub struct QueryBuilder<'a> {
    pub schema: &'a StructureSchema,
    pub bindings: Bindings,
    has_value_rewrite: HasValueRewrite,
    query: Query,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a StructureSchema) -> Self {
        QueryBuilder {
            schema,
            bindings: Bindings::new(),
            has_value_rewrite: HasValueRewrite::Strict,
            query: Query {
                structure: schema.name.clone(),
                ..Query::default()
            },
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.has_value_rewrite = if config.legacy_has_value_rewrite {
            HasValueRewrite::Legacy
        } else {
            HasValueRewrite::Strict
        };
        self
    }

    /// Bind a captured variable used by later expressions
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.bindings.set(name, value);
        self
    }

    pub fn filter(self, expression: &str) -> Result<Self> {
        let lambda = parse_lambda(expression)?;
        self.filter_lambda(&lambda)
    }

    /// Add a predicate; several predicates are combined with `and`
    pub fn filter_lambda(mut self, lambda: &Lambda) -> Result<Self> {
        let nodes = WhereParser::new(self.schema, &self.bindings)
            .with_has_value_rewrite(self.has_value_rewrite)
            .parse(lambda)?;

        if self.query.where_nodes.is_empty() {
            self.query.where_nodes = nodes;
        } else {
            let previous = std::mem::take(&mut self.query.where_nodes);
            let combined = &mut self.query.where_nodes;
            combined.push(Node::StartGroup);
            combined.extend(previous);
            combined.push(Node::EndGroup);
            combined.push(Node::Operator(Operator::And));
            combined.push(Node::StartGroup);
            combined.extend(nodes);
            combined.push(Node::EndGroup);
        }
        Ok(self)
    }

    pub fn order_by(self, expression: &str) -> Result<Self> {
        let lambda = parse_lambda(expression)?;
        self.order_by_lambda(&lambda, SortDirection::Asc)
    }

    pub fn order_by_desc(self, expression: &str) -> Result<Self> {
        let lambda = parse_lambda(expression)?;
        self.order_by_lambda(&lambda, SortDirection::Desc)
    }

    pub fn order_by_lambda(mut self, lambda: &Lambda, direction: SortDirection) -> Result<Self> {
        let sorting = parse_sorting(self.schema, lambda, direction)?;
        self.query.sortings.push(sorting);
        Ok(self)
    }

    /// Fetch the body of the `target` structure referenced by the member
    pub fn include(self, target: &str, expression: &str) -> Result<Self> {
        let lambda = parse_lambda(expression)?;
        self.include_lambda(target, &lambda)
    }

    pub fn include_lambda(mut self, target: &str, lambda: &Lambda) -> Result<Self> {
        let include = parse_include(self.schema, target, lambda)?;
        self.query.includes.push(include);
        Ok(self)
    }

    pub fn take(mut self, count: usize) -> Self {
        self.query.take = Some(count);
        self
    }

    pub fn page(mut self, page_index: usize, page_size: usize) -> Result<Self> {
        self.query.paging = Some(Paging::new(page_index, page_size)?);
        Ok(self)
    }

    pub fn build(self) -> Query {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DataTypeFamily;

    fn schema() -> StructureSchema {
        StructureSchema::builder("Item")
            .guid_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .index("Bool1", DataTypeFamily::Boolean)
            .build()
            .unwrap()
    }

    #[test]
    fn combines_filters_with_and() {
        let schema = schema();
        let query = QueryBuilder::new(&schema)
            .filter("i => i.Int1 > 1")
            .unwrap()
            .filter("i => i.Bool1")
            .unwrap()
            .build();

        assert_eq!(query.where_nodes.first(), Some(&Node::StartGroup));
        assert!(query.where_nodes.contains(&Node::Operator(Operator::And)));
        assert_eq!(query.where_nodes.len(), 11);
    }

    #[test]
    fn uses_bound_variables() {
        let schema = schema();
        let query = QueryBuilder::new(&schema)
            .bind("min", 5)
            .filter("i => i.Int1 > min")
            .unwrap()
            .build();
        assert_eq!(query.where_nodes[2], Node::Value(Value::Integer(5)));
    }

    #[test]
    fn rejects_empty_pages() {
        let schema = schema();
        assert!(QueryBuilder::new(&schema).page(0, 0).is_err());
        let query = QueryBuilder::new(&schema).page(2, 10).unwrap().build();
        let paging = query.paging.unwrap();
        assert_eq!(paging.offset(), 20);
        assert_eq!((paging.first_row(), paging.last_row(), paging.fetch()), (21, 30, 10));
    }

    #[test]
    fn rejects_pages_past_the_last_row() {
        let schema = schema();
        let err = QueryBuilder::new(&schema).page(usize::MAX / 2, 4).err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(QueryBuilder::new(&schema).page(i64::MAX as usize, 1).is_err());
        assert!(QueryBuilder::new(&schema).page(1, i64::MAX as usize).is_err());

        let last = Paging::new(i64::MAX as usize - 1, 1).unwrap();
        assert_eq!(last.last_row(), i64::MAX);
    }
}
