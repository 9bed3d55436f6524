use std::fmt;
use serde::{Serialize, Deserialize};
use crate::core::types::Value;

/// Query expression tree. A predicate, sort key or include key is a
/// `Lambda` whose parameter stands for the queried item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Param(String),                                   // The lambda parameter
    Member { target: Box<Expr>, name: String },      // target.name
    Constant(Value),
    Variable(String),                                // Captured value, resolved from bindings
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Call { target: Option<Box<Expr>>, method: String, args: Vec<Expr> },
    Lambda(Box<Lambda>),
    Array(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub param: String,
    pub body: Expr,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Operator to use when the operands swap sides
    pub fn mirrored(&self) -> BinaryOp {
        match self {
            BinaryOp::LessThan => BinaryOp::GreaterThan,
            BinaryOp::LessOrEqual => BinaryOp::GreaterOrEqual,
            BinaryOp::GreaterThan => BinaryOp::LessThan,
            BinaryOp::GreaterOrEqual => BinaryOp::LessOrEqual,
            other => *other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

impl Lambda {
    pub fn new(param: &str, body: Expr) -> Self {
        Lambda { param: param.to_string(), body }
    }
}

impl Expr {
    pub fn param(name: &str) -> Expr {
        Expr::Param(name.to_string())
    }

    pub fn value(value: impl Into<Value>) -> Expr {
        Expr::Constant(value.into())
    }

    pub fn null() -> Expr {
        Expr::Constant(Value::Null)
    }

    pub fn variable(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    pub fn member(self, name: &str) -> Expr {
        Expr::Member { target: Box::new(self), name: name.to_string() }
    }

    pub fn call(self, method: &str, args: Vec<Expr>) -> Expr {
        Expr::Call { target: Some(Box::new(self)), method: method.to_string(), args }
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call { target: None, method: name.to_string(), args }
    }

    pub fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary { op, left: Box::new(self), right: Box::new(right) }
    }

    pub fn equal(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Equal, right)
    }

    pub fn not_equal(self, right: Expr) -> Expr {
        self.binary(BinaryOp::NotEqual, right)
    }

    pub fn less_than(self, right: Expr) -> Expr {
        self.binary(BinaryOp::LessThan, right)
    }

    pub fn greater_than(self, right: Expr) -> Expr {
        self.binary(BinaryOp::GreaterThan, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    pub fn not(self) -> Expr {
        Expr::Unary { op: UnaryOp::Not, operand: Box::new(self) }
    }

    pub fn lambda(param: &str, body: Expr) -> Expr {
        Expr::Lambda(Box::new(Lambda::new(param, body)))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Expr::Binary { .. })
    }

    /// True when the expression reads the parameter of an enclosing lambda
    pub fn references_param(&self) -> bool {
        match self {
            Expr::Param(_) => true,
            Expr::Constant(_) | Expr::Variable(_) => false,
            Expr::Member { target, .. } => target.references_param(),
            Expr::Binary { left, right, .. } => left.references_param() || right.references_param(),
            Expr::Unary { operand, .. } => operand.references_param(),
            Expr::Call { target, args, .. } => {
                target.as_ref().is_some_and(|t| t.references_param())
                    || args.iter().any(Expr::references_param)
            }
            Expr::Lambda(lambda) => lambda.body.references_param(),
            Expr::Array(items) => items.iter().any(Expr::references_param),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Param(name) | Expr::Variable(name) => write!(f, "{}", name),
            Expr::Member { target, name } => write!(f, "{}.{}", target, name),
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Unary { op: UnaryOp::Not, operand } => write!(f, "!{}", operand),
            Expr::Unary { op: UnaryOp::Negate, operand } => write!(f, "-{}", operand),
            Expr::Call { target, method, args } => {
                if let Some(target) = target {
                    write!(f, "{}.", target)?;
                }
                write!(f, "{}(", method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Lambda(lambda) => write!(f, "{}", lambda),
            Expr::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.param, self.body)
    }
}
