use crate::core::error::{Error, Result};
use crate::query::ast::Lambda;
use crate::query::expression_parser::member_node;
use crate::query::nodes::{SortDirection, SortingNode};
use crate::schema::schema::StructureSchema;

/// Single pass: the lambda body must be one member of the queried item
pub fn parse_sorting(
    schema: &StructureSchema,
    lambda: &Lambda,
    direction: SortDirection,
) -> Result<SortingNode> {
    let member = member_node(schema, &lambda.body, &lambda.param)?;
    if member.has_value {
        return Err(Error::unsupported(lambda, "Cannot sort by a HasValue check"));
    }
    Ok(SortingNode { member, direction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DataTypeFamily;
    use crate::query::parser::parse_lambda;

    fn schema() -> StructureSchema {
        StructureSchema::builder("Item")
            .identity_id("Id")
            .index("Address.Zip", DataTypeFamily::Integer)
            .build()
            .unwrap()
    }

    #[test]
    fn extracts_member_and_direction() {
        let lambda = parse_lambda("i => i.Address.Zip").unwrap();
        let node = parse_sorting(&schema(), &lambda, SortDirection::Desc).unwrap();
        assert_eq!(node.member.path, "Address.Zip");
        assert_eq!(node.direction, SortDirection::Desc);
    }

    #[test]
    fn rejects_non_member_keys() {
        let lambda = parse_lambda("i => i.Address.Zip + 1").unwrap();
        assert!(parse_sorting(&schema(), &lambda, SortDirection::Asc).is_err());
    }
}
