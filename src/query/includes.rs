use crate::core::error::{Error, Result};
use crate::core::types::DataTypeFamily;
use crate::query::ast::Lambda;
use crate::query::expression_parser::member_node;
use crate::query::nodes::IncludeNode;
use crate::schema::schema::StructureSchema;

/// Single pass: the lambda body must be a member holding the identity of a
/// `target` structure.
pub fn parse_include(schema: &StructureSchema, target: &str, lambda: &Lambda) -> Result<IncludeNode> {
    let member = member_node(schema, &lambda.body, &lambda.param)?;

    match member.family {
        Some(DataTypeFamily::Guid | DataTypeFamily::Integer) if !member.has_value => {
            Ok(IncludeNode { member, target: target.to_string() })
        }
        _ => Err(Error::unsupported(
            lambda,
            &format!("Include of '{}' needs an indexed guid or integer member", target),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse_lambda;

    fn schema() -> StructureSchema {
        StructureSchema::builder("Order")
            .guid_id("Id")
            .index("CustomerId", DataTypeFamily::Guid)
            .index("Note", DataTypeFamily::String)
            .build()
            .unwrap()
    }

    #[test]
    fn extracts_reference_member() {
        let lambda = parse_lambda("o => o.CustomerId").unwrap();
        let node = parse_include(&schema(), "Customer", &lambda).unwrap();
        assert_eq!(node.member.path, "CustomerId");
        assert_eq!(node.target, "Customer");
    }

    #[test]
    fn rejects_non_identity_members() {
        let lambda = parse_lambda("o => o.Note").unwrap();
        assert!(parse_include(&schema(), "Customer", &lambda).is_err());
    }
}
