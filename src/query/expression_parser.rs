use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::types::{DataTypeFamily, Value};
use crate::query::ast::{BinaryOp, Expr, Lambda, UnaryOp};
use crate::query::eval::{evaluate, Bindings, Eval};
use crate::query::nodes::{MemberNode, Node, Operator};
use crate::query::transformers::{complete_bool_members, complete_has_value, HasValueRewrite};
use crate::schema::schema::StructureSchema;
use crate::structure::id::IdKind;
use crate::structure::index::composite_element;

/// Lowers a predicate lambda into the node sequence the compiler walks.
///
/// Comparisons become `member op value` triples, nested binaries are wrapped
/// in groups, and everything that does not read the parameter is folded into
/// literal values up front.
pub struct WhereParser<'a> {
    pub schema: &'a StructureSchema,
    pub bindings: &'a Bindings,
    pub has_value_rewrite: HasValueRewrite,
    nodes: Vec<Node>,
}

impl<'a> WhereParser<'a> {
    pub fn new(schema: &'a StructureSchema, bindings: &'a Bindings) -> Self {
        WhereParser {
            schema,
            bindings,
            has_value_rewrite: HasValueRewrite::Strict,
            nodes: Vec::new(),
        }
    }

    pub fn with_has_value_rewrite(mut self, rewrite: HasValueRewrite) -> Self {
        self.has_value_rewrite = rewrite;
        self
    }

    pub fn parse(mut self, lambda: &Lambda) -> Result<Vec<Node>> {
        self.visit(&lambda.body, &lambda.param)?;

        if !self.nodes.iter().any(|n| matches!(n, Node::Member(_))) {
            return Err(Error::unsupported(lambda, "Predicate does not reference the queried item"));
        }

        let nodes = complete_bool_members(self.nodes);
        let nodes = complete_has_value(nodes, self.has_value_rewrite);
        debug!(structure = %self.schema.name, nodes = nodes.len(), "parsed where expression");
        Ok(nodes)
    }

    fn visit(&mut self, expr: &Expr, param: &str) -> Result<()> {
        match expr {
            Expr::Binary { op, left, right } if op.is_logical() => {
                self.visit_operand(left, param)?;
                let logical = if *op == BinaryOp::And { Operator::And } else { Operator::Or };
                self.nodes.push(Node::Operator(logical));
                self.visit_operand(right, param)
            }
            Expr::Binary { op, left, right } if op.is_comparison() => {
                self.visit_comparison(expr, *op, left, right, param)
            }
            Expr::Unary { op: UnaryOp::Not, operand } => self.visit_not(operand, param),
            Expr::Member { .. } | Expr::Param(_) => self.visit_member(expr, param),
            Expr::Call { target: Some(target), method, args } if target.references_param() => {
                self.visit_member_call(expr, target, method, args, param)
            }
            _ => self.visit_constant(expr),
        }
    }

    fn visit_operand(&mut self, expr: &Expr, param: &str) -> Result<()> {
        if expr.is_binary() {
            self.nodes.push(Node::StartGroup);
            self.visit(expr, param)?;
            self.nodes.push(Node::EndGroup);
            Ok(())
        } else {
            self.visit(expr, param)
        }
    }

    fn visit_comparison(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        param: &str,
    ) -> Result<()> {
        let left_value = fold(left, self.bindings)?;
        let right_value = fold(right, self.bindings)?;

        // Keep the symbolic side on the left
        let (symbolic, op, value) = match (left_value, right_value) {
            (Some(_), Some(_)) => {
                return Err(Error::unsupported(expr, "Comparison does not reference the queried item"));
            }
            (Some(value), None) => (right, op.mirrored(), Some(value)),
            (None, value) => (left, op, value),
        };

        self.visit_operand(symbolic, param)?;

        match value {
            Some(Value::Null) => {
                let op = match op {
                    BinaryOp::Equal => Operator::Is,
                    BinaryOp::NotEqual => Operator::IsNot,
                    _ => return Err(Error::unsupported(expr, "Only == and != can compare with null")),
                };
                self.nodes.push(Node::Operator(op));
                self.nodes.push(Node::Null);
            }
            Some(value) => {
                self.nodes.push(Node::Operator(comparison_operator(op)));
                self.nodes.push(Node::Value(value));
            }
            None => {
                self.nodes.push(Node::Operator(comparison_operator(op)));
                self.visit_operand(right, param)?;
            }
        }
        Ok(())
    }

    fn visit_not(&mut self, operand: &Expr, param: &str) -> Result<()> {
        if matches!(operand, Expr::Member { .. }) && operand.references_param() {
            let member = member_node(self.schema, operand, param)?;
            if member.is_boolean() || member.has_value {
                self.nodes.push(Node::Member(member));
                self.nodes.push(Node::Operator(Operator::Equal));
                self.nodes.push(Node::Value(Value::Boolean(false)));
                return Ok(());
            }
        }

        self.nodes.push(Node::Operator(Operator::Not));
        self.nodes.push(Node::StartGroup);
        self.visit(operand, param)?;
        self.nodes.push(Node::EndGroup);
        Ok(())
    }

    fn visit_member(&mut self, expr: &Expr, param: &str) -> Result<()> {
        match evaluate(expr, self.bindings) {
            Ok(value) => self.push_value(value),
            Err(Eval::NotConstant) => {
                let member = member_node(self.schema, expr, param)?;
                self.nodes.push(Node::Member(member));
            }
            Err(Eval::Failed(err)) => return Err(err),
        }
        Ok(())
    }

    fn visit_constant(&mut self, expr: &Expr) -> Result<()> {
        match evaluate(expr, self.bindings) {
            Ok(value) => {
                self.push_value(value);
                Ok(())
            }
            Err(Eval::NotConstant) => Err(Error::unsupported(expr, "Unsupported expression")),
            Err(Eval::Failed(err)) => Err(err),
        }
    }

    fn push_value(&mut self, value: Value) {
        if value.is_null() {
            self.nodes.push(Node::Null);
        } else {
            self.nodes.push(Node::Value(value));
        }
    }

    fn visit_member_call(
        &mut self,
        expr: &Expr,
        target: &Expr,
        method: &str,
        args: &[Expr],
        param: &str,
    ) -> Result<()> {
        match (method, args) {
            ("StartsWith" | "EndsWith" | "Contains" | "Like", [arg]) => {
                let member = member_node(self.schema, target, param)?;
                let text = string_argument(expr, arg, self.bindings)?;
                let collection = self
                    .schema
                    .accessor(&member.path)
                    .is_some_and(|a| a.is_collection());

                let pattern = match method {
                    "Contains" if collection => format!("%{}%", composite_element(&escape_like(&text))),
                    "Contains" => format!("%{}%", escape_like(&text)),
                    "StartsWith" => format!("{}%", escape_like(&text)),
                    "EndsWith" => format!("%{}", escape_like(&text)),
                    _ => text,
                };
                self.nodes.push(Node::Member(member));
                self.nodes.push(Node::Operator(Operator::Like));
                self.nodes.push(Node::Value(Value::String(pattern)));
                Ok(())
            }
            ("In" | "NotIn", [arg]) => {
                let member = member_node(self.schema, target, param)?;
                let values = match fold(arg, self.bindings)? {
                    Some(Value::List(values)) => values,
                    Some(value) => vec![value],
                    None => return Err(Error::unsupported(expr, "In expects constant values")),
                };
                let op = if method == "In" { Operator::In } else { Operator::NotIn };
                self.nodes.push(Node::Member(member));
                self.nodes.push(Node::Operator(op));
                self.nodes.push(Node::Value(Value::List(values)));
                Ok(())
            }
            ("Any", []) => {
                let member = member_node(self.schema, target, param)?;
                self.nodes.push(Node::Member(member));
                self.nodes.push(Node::Operator(Operator::IsNot));
                self.nodes.push(Node::Null);
                Ok(())
            }
            ("Any", [Expr::Lambda(predicate)]) => {
                let prefix = member_path(target, param)
                    .ok_or_else(|| Error::unsupported(target, "Any expects a member of the queried item"))?;
                self.visit_quantified(&predicate.body, &prefix, &predicate.param)
            }
            _ => Err(Error::unsupported(expr, "Unsupported method call")),
        }
    }

    /// Lower the predicate of `collection.Any(e => ...)`. Element members are
    /// stored as composite strings, so comparisons become pattern matches.
    fn visit_quantified(&mut self, body: &Expr, prefix: &str, element: &str) -> Result<()> {
        match body {
            Expr::Binary { op, left, right } if op.is_logical() => {
                for (i, side) in [left, right].into_iter().enumerate() {
                    if i == 1 {
                        let logical = if *op == BinaryOp::And { Operator::And } else { Operator::Or };
                        self.nodes.push(Node::Operator(logical));
                    }
                    if side.is_binary() {
                        self.nodes.push(Node::StartGroup);
                        self.visit_quantified(side, prefix, element)?;
                        self.nodes.push(Node::EndGroup);
                    } else {
                        self.visit_quantified(side, prefix, element)?;
                    }
                }
                Ok(())
            }
            Expr::Binary { op: op @ (BinaryOp::Equal | BinaryOp::NotEqual), left, right } => {
                let (member, value) = match (fold(left, self.bindings)?, fold(right, self.bindings)?) {
                    (None, Some(value)) => (left, value),
                    (Some(value), None) => (right, value),
                    _ => return Err(Error::unsupported(body, "Any predicate must compare an element with a value")),
                };
                let text = value
                    .to_sql_string()
                    .ok_or_else(|| Error::unsupported(body, "Any predicate cannot compare with null"))?;
                let node = element_member(self.schema, body, member, prefix, element)?;
                if *op == BinaryOp::NotEqual {
                    self.push_element_differs(node, &text);
                } else {
                    self.nodes.push(Node::Member(node));
                    self.nodes.push(Node::Operator(Operator::Like));
                    self.nodes.push(Node::Value(Value::String(format!("%{}%", composite_element(&escape_like(&text))))));
                }
                Ok(())
            }
            Expr::Call { target: Some(target), method, args } if args.len() == 1 => {
                let text = string_argument(body, &args[0], self.bindings)?;
                let text = escape_like(&text);
                let pattern = match method.as_str() {
                    "StartsWith" => format!("%<${}%", text),
                    "EndsWith" => format!("%{}$>%", text),
                    "Contains" => format!("%{}%", text),
                    _ => return Err(Error::unsupported(body, "Unsupported method call in Any predicate")),
                };
                let node = element_member(self.schema, body, target, prefix, element)?;
                self.nodes.push(Node::Member(node));
                self.nodes.push(Node::Operator(Operator::Like));
                self.nodes.push(Node::Value(Value::String(pattern)));
                Ok(())
            }
            _ => Err(Error::unsupported(body, "Unsupported Any predicate")),
        }
    }

    /// Some element differs from `text`. Composites hold distinct values, so
    /// that holds unless the composite is missing or is `text` alone.
    fn push_element_differs(&mut self, node: MemberNode, text: &str) {
        self.nodes.extend([
            Node::StartGroup,
            Node::StartGroup,
            Node::Member(node.clone()),
            Node::Operator(Operator::IsNot),
            Node::Null,
            Node::EndGroup,
            Node::Operator(Operator::And),
            Node::StartGroup,
            Node::Member(node),
            Node::Operator(Operator::NotEqual),
            Node::Value(Value::String(composite_element(text))),
            Node::EndGroup,
            Node::EndGroup,
        ]);
    }
}

/// Member node of `element.Path` inside `prefix.Any(element => ...)`
fn element_member(schema: &StructureSchema, body: &Expr, member: &Expr, prefix: &str, element: &str) -> Result<MemberNode> {
    let suffix = member_path(member, element)
        .ok_or_else(|| Error::unsupported(body, "Any predicate must reference the element"))?;
    let path = if suffix.is_empty() { prefix.to_string() } else { format!("{}.{}", prefix, suffix) };
    Ok(resolve_member(schema, &path, false))
}

fn comparison_operator(op: BinaryOp) -> Operator {
    match op {
        BinaryOp::Equal => Operator::Equal,
        BinaryOp::NotEqual => Operator::NotEqual,
        BinaryOp::LessThan => Operator::LessThan,
        BinaryOp::LessOrEqual => Operator::LessOrEqual,
        BinaryOp::GreaterThan => Operator::GreaterThan,
        _ => Operator::GreaterOrEqual,
    }
}

/// `Some` when the expression folds to a constant, `None` when it reads
/// the parameter
fn fold(expr: &Expr, bindings: &Bindings) -> Result<Option<Value>> {
    match evaluate(expr, bindings) {
        Ok(value) => Ok(Some(value)),
        Err(Eval::NotConstant) => Ok(None),
        Err(Eval::Failed(err)) => Err(err),
    }
}

fn string_argument(expr: &Expr, arg: &Expr, bindings: &Bindings) -> Result<String> {
    match fold(arg, bindings)? {
        Some(Value::String(text)) => Ok(text),
        _ => Err(Error::unsupported(expr, "Expected a constant string argument")),
    }
}

/// Escape pattern characters so user text matches literally
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            '%' => escaped.push_str("[%]"),
            '_' => escaped.push_str("[_]"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Dotted path of a member chain rooted at `param`. The bare parameter
/// yields an empty path.
pub fn member_path(expr: &Expr, param: &str) -> Option<String> {
    match expr {
        Expr::Param(name) if name == param => Some(String::new()),
        Expr::Member { target, name } => {
            let parent = member_path(target, param)?;
            if parent.is_empty() {
                Some(name.clone())
            } else {
                Some(format!("{}.{}", parent, name))
            }
        }
        _ => None,
    }
}

/// Build the member node for a member chain of the queried item
pub fn member_node(schema: &StructureSchema, expr: &Expr, param: &str) -> Result<MemberNode> {
    let path = member_path(expr, param)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::unsupported(expr, "Expected a member of the queried item"))?;

    // Nullable members: `X.HasValue` checks presence, `X.Value` reads it
    if let Some(stripped) = path.strip_suffix(".HasValue") {
        return Ok(resolve_member(schema, stripped, true));
    }
    if let Some(stripped) = path.strip_suffix(".Value") {
        if schema.accessor(&path).is_none() && (schema.accessor(stripped).is_some() || schema.is_id_member(stripped)) {
            return Ok(resolve_member(schema, stripped, false));
        }
    }

    Ok(resolve_member(schema, &path, false))
}

fn resolve_member(schema: &StructureSchema, path: &str, has_value: bool) -> MemberNode {
    let is_id = schema.is_id_member(path);
    let family = if is_id {
        Some(match schema.id_accessor.kind {
            IdKind::Identity => DataTypeFamily::Integer,
            IdKind::Guid => DataTypeFamily::Guid,
        })
    } else {
        schema.accessor(path).map(|a| a.storage_family())
    };

    MemberNode {
        path: path.to_string(),
        parent_path: path.rsplit_once('.').map(|(parent, _)| parent.to_string()),
        family,
        is_id,
        has_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::query::parser::parse_lambda;

    fn schema() -> StructureSchema {
        StructureSchema::builder("Item")
            .guid_id("Id")
            .index("Int1", DataTypeFamily::Integer)
            .index("String1", DataTypeFamily::String)
            .index("Bool1", DataTypeFamily::Boolean)
            .index("NullableInt", DataTypeFamily::Integer)
            .index("Address.City", DataTypeFamily::String)
            .enumerable("Tags", DataTypeFamily::String)
            .element("Lines.ProductNo", DataTypeFamily::String)
            .build()
            .unwrap()
    }

    fn parse(text: &str) -> Result<Vec<Node>> {
        parse_with(text, &Bindings::new())
    }

    fn parse_with(text: &str, bindings: &Bindings) -> Result<Vec<Node>> {
        let schema = schema();
        let lambda = parse_lambda(text).unwrap();
        WhereParser::new(&schema, bindings).parse(&lambda)
    }

    fn member(path: &str) -> Node {
        Node::Member(resolve_member(&schema(), path, false))
    }

    #[test]
    fn lowers_comparison_to_triple() {
        assert_eq!(
            parse("i => i.Int1 == 42").unwrap(),
            vec![member("Int1"), Node::Operator(Operator::Equal), Node::Value(Value::Integer(42))]
        );
    }

    #[test]
    fn swaps_constant_on_left() {
        assert_eq!(
            parse("i => 42 < i.Int1").unwrap(),
            vec![member("Int1"), Node::Operator(Operator::GreaterThan), Node::Value(Value::Integer(42))]
        );
    }

    #[test]
    fn null_comparisons_become_is_and_is_not() {
        assert_eq!(
            parse("i => i.String1 == null").unwrap(),
            vec![member("String1"), Node::Operator(Operator::Is), Node::Null]
        );
        assert_eq!(
            parse("i => i.String1 != nothing").map_err(|e| e.kind),
            Err(ErrorKind::Parse)
        );
        let bindings = Bindings::new().bind("nothing", Value::Null);
        assert_eq!(
            parse_with("i => i.String1 != nothing", &bindings).unwrap(),
            vec![member("String1"), Node::Operator(Operator::IsNot), Node::Null]
        );
    }

    #[test]
    fn groups_nested_binaries() {
        let nodes = parse("i => i.Int1 == 1 && (i.String1 == \"a\" || i.String1 == \"b\")").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::StartGroup,
                member("Int1"),
                Node::Operator(Operator::Equal),
                Node::Value(Value::Integer(1)),
                Node::EndGroup,
                Node::Operator(Operator::And),
                Node::StartGroup,
                Node::StartGroup,
                member("String1"),
                Node::Operator(Operator::Equal),
                Node::Value(Value::from("a")),
                Node::EndGroup,
                Node::Operator(Operator::Or),
                Node::StartGroup,
                member("String1"),
                Node::Operator(Operator::Equal),
                Node::Value(Value::from("b")),
                Node::EndGroup,
                Node::EndGroup,
            ]
        );
    }

    #[test]
    fn folds_captured_values() {
        let bindings = Bindings::new().bind("limit", 40);
        assert_eq!(
            parse_with("i => i.Int1 >= limit + 2", &bindings).unwrap(),
            vec![member("Int1"), Node::Operator(Operator::GreaterOrEqual), Node::Value(Value::Integer(42))]
        );
    }

    #[test]
    fn member_paths_accumulate_parents() {
        let nodes = parse("i => i.Address.City == \"Oslo\"").unwrap();
        let Node::Member(city) = &nodes[0] else { panic!("expected member") };
        assert_eq!(city.path, "Address.City");
        assert_eq!(city.parent_path.as_deref(), Some("Address"));
        assert_eq!(city.name(), "City");
    }

    #[test]
    fn string_calls_become_like_patterns() {
        assert_eq!(
            parse("i => i.String1.StartsWith(\"50%\")").unwrap(),
            vec![member("String1"), Node::Operator(Operator::Like), Node::Value(Value::from("50[%]%"))]
        );
        assert_eq!(
            parse("i => i.Tags.Contains(\"gold\")").unwrap(),
            vec![member("Tags"), Node::Operator(Operator::Like), Node::Value(Value::from("%<$gold$>%"))]
        );
    }

    #[test]
    fn any_lowers_to_element_member() {
        assert_eq!(
            parse("i => i.Lines.Any(l => l.ProductNo == \"p1\")").unwrap(),
            vec![member("Lines.ProductNo"), Node::Operator(Operator::Like), Node::Value(Value::from("%<$p1$>%"))]
        );
        assert_eq!(
            parse("i => i.Tags.Any(t => t == \"x\" || t == \"y\")").unwrap(),
            vec![
                Node::StartGroup,
                member("Tags"),
                Node::Operator(Operator::Like),
                Node::Value(Value::from("%<$x$>%")),
                Node::EndGroup,
                Node::Operator(Operator::Or),
                Node::StartGroup,
                member("Tags"),
                Node::Operator(Operator::Like),
                Node::Value(Value::from("%<$y$>%")),
                Node::EndGroup,
            ]
        );
    }

    #[test]
    fn any_not_equal_asks_for_a_differing_element() {
        let nodes = parse("i => i.Tags.Any(t => t != \"x\")").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::StartGroup,
                Node::StartGroup,
                member("Tags"),
                Node::Operator(Operator::IsNot),
                Node::Null,
                Node::EndGroup,
                Node::Operator(Operator::And),
                Node::StartGroup,
                member("Tags"),
                Node::Operator(Operator::NotEqual),
                Node::Value(Value::from("<$x$>")),
                Node::EndGroup,
                Node::EndGroup,
            ]
        );
        assert!(!nodes.contains(&Node::Operator(Operator::Not)));
    }

    #[test]
    fn in_lists_keep_all_values() {
        assert_eq!(
            parse("i => i.Int1.In([1, 2, 3])").unwrap(),
            vec![
                member("Int1"),
                Node::Operator(Operator::In),
                Node::Value(Value::List(vec![1.into(), 2.into(), 3.into()])),
            ]
        );
    }

    #[test]
    fn constant_calls_fold_and_unknown_calls_fail() {
        let nodes = parse(r#"i => i.String1 == "abc".ToUpper()"#).unwrap();
        assert_eq!(nodes[2], Node::Value(Value::from("ABC")));

        let err = parse("i => i.String1.Reverse() == \"a\"").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
        assert!(err.context.contains("Reverse"));

        let err = parse("i => i.String1 == unknown_fn(1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
    }

    #[test]
    fn constant_predicates_are_rejected() {
        let err = parse("i => 1 == 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
    }

    #[test]
    fn not_over_group_and_bool_member() {
        assert_eq!(
            parse("i => !i.Bool1").unwrap(),
            vec![member("Bool1"), Node::Operator(Operator::Equal), Node::Value(Value::Boolean(false))]
        );
        assert_eq!(
            parse("i => !(i.Int1 == 1)").unwrap(),
            vec![
                Node::Operator(Operator::Not),
                Node::StartGroup,
                member("Int1"),
                Node::Operator(Operator::Equal),
                Node::Value(Value::Integer(1)),
                Node::EndGroup,
            ]
        );
    }

    #[test]
    fn identity_member_is_flagged() {
        let nodes = parse(r#"i => i.Id == guid("5b1f3d0c-8b0a-4a55-9f3c-1e3f1c1f0a10")"#).unwrap();
        let Node::Member(id) = &nodes[0] else { panic!("expected member") };
        assert!(id.is_id);
        assert_eq!(id.family, Some(DataTypeFamily::Guid));
    }
}
