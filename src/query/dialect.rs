use crate::core::types::{DataTypeFamily, Value};
use crate::query::command::Params;
use crate::query::query::Paging;

/// Selects the SQL generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    RowNumber,    // Paging through a row_number() window
    OffsetFetch,  // Native offset/fetch paging
}

impl DialectKind {
    pub fn create(&self) -> Box<dyn SqlDialect> {
        match self {
            DialectKind::RowNumber => Box::new(RowNumberDialect),
            DialectKind::OffsetFetch => Box::new(OffsetFetchDialect),
        }
    }
}

/// Pieces of an unpaged select that paging wraps
#[derive(Debug, Clone)]
pub struct SelectParts<'a> {
    pub columns: &'a str,       // "rs.[StructureId], rs.[Json]"
    pub outputs: &'a [String],  // Result column names of `columns`, unquoted
    pub source: &'a str,        // "from ... rs left join ..."
    pub filter: &'a str,        // "where ..." or empty
    pub order_by: &'a str,      // "rs.[StructureId] asc"
}

/// Provider capabilities the query generator and the schema tools rely on.
/// Everything that differs between engines goes through here.
pub trait SqlDialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    fn max_identifier_length(&self) -> usize {
        128
    }

    fn quote(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn column_type(&self, family: DataTypeFamily) -> &'static str {
        match family {
            DataTypeFamily::Integer => "bigint",
            DataTypeFamily::Fractal => "float",
            DataTypeFamily::Boolean => "bit",
            DataTypeFamily::DateTime => "datetime2",
            DataTypeFamily::Guid => "uniqueidentifier",
            DataTypeFamily::String | DataTypeFamily::Enum => "nvarchar(300)",
            DataTypeFamily::Text => "nvarchar(max)",
        }
    }

    fn format_take(&self, take: usize) -> String {
        format!("top({}) ", take)
    }

    fn format_paging(&self, parts: &SelectParts, paging: &Paging, params: &mut Params) -> String;

    fn format_exists(&self, inner: &str) -> String {
        format!("select case when exists ({}) then 1 else 0 end", inner)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RowNumberDialect;

impl SqlDialect for RowNumberDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::RowNumber
    }

    /// The window column stays inside; the outer select projects the same
    /// columns an unpaged select returns.
    fn format_paging(&self, parts: &SelectParts, paging: &Paging, params: &mut Params) -> String {
        let first = params.add(Value::Integer(paging.first_row()));
        let last = params.add(Value::Integer(paging.last_row()));
        let outputs: Vec<String> = parts
            .outputs
            .iter()
            .map(|name| format!("pg.{}", self.quote(name)))
            .collect();
        format!(
            "select {} from (select {}, row_number() over (order by {}) as [RowNum] {}{}) pg \
             where pg.[RowNum] between {} and {} order by pg.[RowNum]",
            outputs.join(", "),
            parts.columns,
            parts.order_by,
            parts.source,
            parts.filter,
            first,
            last
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetFetchDialect;

impl SqlDialect for OffsetFetchDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::OffsetFetch
    }

    fn format_paging(&self, parts: &SelectParts, paging: &Paging, params: &mut Params) -> String {
        let offset = params.add(Value::Integer(paging.offset()));
        let size = params.add(Value::Integer(paging.fetch()));
        format!(
            "select {} {}{} order by {} offset {} rows fetch next {} rows only",
            parts.columns, parts.source, parts.filter, parts.order_by, offset, size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(outputs: &[String]) -> SelectParts<'_> {
        SelectParts {
            columns: "rs.[StructureId]",
            outputs,
            source: "from [ItemStructure] rs",
            filter: "",
            order_by: "rs.[StructureId] asc",
        }
    }

    fn outputs() -> Vec<String> {
        vec!["StructureId".to_string()]
    }

    #[test]
    fn row_number_pages_by_window() {
        let mut params = Params::new();
        let outputs = outputs();
        let sql = RowNumberDialect.format_paging(&parts(&outputs), &Paging::new(2, 10).unwrap(), &mut params);

        assert!(sql.starts_with("select pg.[StructureId] from (select rs.[StructureId], row_number()"));
        assert!(!sql.contains("pg.*"));
        assert!(sql.contains("row_number() over (order by rs.[StructureId] asc)"));
        assert!(sql.contains("between @p0 and @p1"));
        let params = params.into_vec();
        assert_eq!(params[0].value, Value::Integer(21));
        assert_eq!(params[1].value, Value::Integer(30));
    }

    #[test]
    fn offset_fetch_pages_natively() {
        let mut params = Params::new();
        let outputs = outputs();
        let sql = OffsetFetchDialect.format_paging(&parts(&outputs), &Paging::new(2, 10).unwrap(), &mut params);

        assert!(sql.ends_with("order by rs.[StructureId] asc offset @p0 rows fetch next @p1 rows only"));
        let params = params.into_vec();
        assert_eq!(params[0].value, Value::Integer(20));
        assert_eq!(params[1].value, Value::Integer(10));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(OffsetFetchDialect.quote("Int1"), "[Int1]");
        assert_eq!(OffsetFetchDialect.quote("a]b"), "[a]]b]");
    }
}
