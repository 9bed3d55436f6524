use serde::Serialize;
use crate::core::types::{DataTypeFamily, IndexTable, UniqueMode, Value};
use crate::structure::id::StructureId;

pub const COMPOSITE_START: &str = "<$";
pub const COMPOSITE_END: &str = "$>";

/// One flattened, indexed member value of a structure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureIndex {
    pub structure_id: StructureId,
    pub path: String,
    pub value: Value,
    pub family: DataTypeFamily,
    pub unique: Option<UniqueMode>,
}

impl StructureIndex {
    pub fn new(
        structure_id: StructureId,
        path: impl Into<String>,
        value: Value,
        family: DataTypeFamily,
        unique: Option<UniqueMode>,
    ) -> Self {
        StructureIndex {
            structure_id,
            path: path.into(),
            value,
            family,
            unique,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.unique.is_some()
    }

    pub fn table(&self) -> IndexTable {
        self.family.index_table()
    }
}

/// Wrap one element value for the composite string of an enumerable member
pub fn composite_element(value: &str) -> String {
    format!("{}{}{}", COMPOSITE_START, value, COMPOSITE_END)
}

/// Serialize several values into one delimited string so that a member keeps
/// a single row per structure. Null elements are skipped, duplicates kept once.
pub fn to_composite(values: &[Value]) -> Value {
    let mut seen: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if let Some(s) = value.to_sql_string() {
            if !seen.contains(&s) {
                seen.push(s);
            }
        }
    }

    if seen.is_empty() {
        return Value::Null;
    }

    Value::String(seen.iter().map(|s| composite_element(s)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keeps_distinct_values_in_order() {
        let values = vec![
            Value::from("b"),
            Value::from("a"),
            Value::from("b"),
            Value::Null,
        ];
        assert_eq!(to_composite(&values), Value::from("<$b$><$a$>"));
        assert_eq!(to_composite(&[Value::Null]), Value::Null);
    }

    #[test]
    fn composite_stringifies_numbers() {
        let values = vec![Value::Integer(1), Value::Integer(22)];
        assert_eq!(to_composite(&values), Value::from("<$1$><$22$>"));
    }
}
