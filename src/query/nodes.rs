use serde::{Serialize, Deserialize};
use crate::core::types::{DataTypeFamily, Value};

/// Operator of the intermediate node sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    And,
    Or,
    Not,
    Is,
    IsNot,
    Like,
    In,
    NotIn,
}

impl Operator {
    pub fn sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::Like => "like",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }

    /// Operators that relate a member to a value
    pub fn is_comparison(&self) -> bool {
        !matches!(self, Operator::And | Operator::Or | Operator::Not)
    }
}

/// Member reference with its full dotted path. The parent path is
/// accumulated while descending, so nodes never point at each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberNode {
    pub path: String,
    pub parent_path: Option<String>,
    pub family: Option<DataTypeFamily>,  // None when the schema does not index the member
    pub is_id: bool,
    pub has_value: bool,                 // `Member.HasValue` check
}

impl MemberNode {
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn is_boolean(&self) -> bool {
        self.family == Some(DataTypeFamily::Boolean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortingNode {
    pub member: MemberNode,
    pub direction: SortDirection,
}

/// Member holding the identity of another structure whose body is fetched
/// along with the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeNode {
    pub member: MemberNode,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Member(MemberNode),
    Operator(Operator),
    Value(Value),
    Null,
    StartGroup,
    EndGroup,
    Sorting(SortingNode),
    Include(IncludeNode),
}

impl Node {
    pub fn as_member(&self) -> Option<&MemberNode> {
        match self {
            Node::Member(member) => Some(member),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<Operator> {
        match self {
            Node::Operator(op) => Some(*op),
            _ => None,
        }
    }
}
