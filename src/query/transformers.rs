use crate::core::types::Value;
use crate::query::nodes::{Node, Operator};

/// How an explicit boolean comparison of a `HasValue` check is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HasValueRewrite {
    /// `== false` and `!= true` mean "is null"
    #[default]
    Strict,
    /// Only `== false` means "is null"; `!= true` reads as "is not null"
    Legacy,
}

impl HasValueRewrite {
    fn is_null(&self, op: Operator, flag: bool) -> bool {
        match self {
            HasValueRewrite::Strict => {
                (op == Operator::Equal && !flag) || (op == Operator::NotEqual && flag)
            }
            HasValueRewrite::Legacy => op == Operator::Equal && !flag,
        }
    }
}

/// A boolean member used as a predicate on its own gets an explicit
/// `= true` comparison. Either side of a comparison is left alone.
pub fn complete_bool_members(nodes: Vec<Node>) -> Vec<Node> {
    let mut completed: Vec<Node> = Vec::with_capacity(nodes.len() + 2);
    let mut iter = nodes.into_iter().peekable();

    while let Some(node) = iter.next() {
        let bare_bool = match &node {
            Node::Member(member) => {
                member.is_boolean()
                    && !member.has_value
                    && !matches!(
                        iter.peek(),
                        Some(Node::Operator(op)) if op.is_comparison()
                    )
                    && !matches!(
                        completed.last(),
                        Some(Node::Operator(op)) if op.is_comparison()
                    )
            }
            _ => false,
        };

        completed.push(node);
        if bare_bool {
            completed.push(Node::Operator(Operator::Equal));
            completed.push(Node::Value(Value::Boolean(true)));
        }
    }

    completed
}

/// `HasValue` checks become null checks. A check compared with a boolean
/// literal consumes that comparison.
pub fn complete_has_value(nodes: Vec<Node>, rewrite: HasValueRewrite) -> Vec<Node> {
    let mut completed = Vec::with_capacity(nodes.len() + 2);
    let mut i = 0;

    while i < nodes.len() {
        let Node::Member(member) = &nodes[i] else {
            completed.push(nodes[i].clone());
            i += 1;
            continue;
        };
        if !member.has_value {
            completed.push(nodes[i].clone());
            i += 1;
            continue;
        }

        let mut plain = member.clone();
        plain.has_value = false;

        let paired = match (nodes.get(i + 1), nodes.get(i + 2)) {
            (Some(Node::Operator(op @ (Operator::Equal | Operator::NotEqual))), Some(Node::Value(Value::Boolean(flag)))) => {
                Some((*op, *flag))
            }
            _ => None,
        };

        completed.push(Node::Member(plain));
        match paired {
            Some((op, flag)) => {
                let null_check = if rewrite.is_null(op, flag) { Operator::Is } else { Operator::IsNot };
                completed.push(Node::Operator(null_check));
                completed.push(Node::Null);
                i += 3;
            }
            None => {
                completed.push(Node::Operator(Operator::IsNot));
                completed.push(Node::Null);
                i += 1;
            }
        }
    }

    completed
}
