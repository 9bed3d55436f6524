use std::collections::HashMap;
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind};
use crate::core::types::{parse_datetime, Value};
use crate::query::ast::{BinaryOp, Expr, UnaryOp};

/// Values of captured variables referenced by query expressions
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings { values: HashMap::new() }
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Why an expression could not be folded to a constant
#[derive(Debug)]
pub enum Eval {
    NotConstant,   // Reads the query parameter; lower it symbolically
    Failed(Error), // Constant but invalid, e.g. an unbound variable
}

impl From<Error> for Eval {
    fn from(err: Error) -> Self {
        Eval::Failed(err)
    }
}

type EvalResult = std::result::Result<Value, Eval>;

fn invalid(expr: &Expr, reason: &str) -> Eval {
    Eval::Failed(Error::new(ErrorKind::Parse, format!("{} in '{}'", reason, expr)))
}

/// Fold an expression that does not depend on the query parameter
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> EvalResult {
    if expr.references_param() {
        return Err(Eval::NotConstant);
    }

    match expr {
        Expr::Param(_) | Expr::Lambda(_) => Err(Eval::NotConstant),
        Expr::Constant(value) => Ok(value.clone()),
        Expr::Variable(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| invalid(expr, &format!("Unbound variable '{}'", name))),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, bindings))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, bindings)?;
            match (op, value) {
                (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                (UnaryOp::Negate, Value::Integer(i)) => i
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| invalid(expr, "Integer overflow")),
                (UnaryOp::Negate, Value::Fractal(f)) => Ok(Value::Fractal(-f)),
                _ => Err(invalid(expr, "Invalid operand")),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, bindings)?;
            let right = evaluate(right, bindings)?;
            binary(*op, left, right).ok_or_else(|| invalid(expr, "Invalid operands"))
        }
        Expr::Member { target, name } => {
            let value = evaluate(target, bindings)?;
            member(&value, name).ok_or_else(|| invalid(expr, &format!("Unknown member '{}'", name)))
        }
        Expr::Call { target, method, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            let (result, known) = match target {
                Some(target) => (
                    method_call(&evaluate(target, bindings)?, method, &args),
                    METHODS.contains(&method.as_str()),
                ),
                None => (function_call(method, &args), FUNCTIONS.contains(&method.as_str())),
            };
            result.ok_or_else(|| {
                if known {
                    invalid(expr, &format!("Cannot evaluate call '{}'", method))
                } else {
                    Eval::Failed(Error::unsupported(expr, &format!("Unsupported call '{}'", method)))
                }
            })
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Option<Value> {
    use Value::*;

    let value = match (op, left, right) {
        (BinaryOp::Add, Integer(a), Integer(b)) => Integer(a.checked_add(b)?),
        (BinaryOp::Subtract, Integer(a), Integer(b)) => Integer(a.checked_sub(b)?),
        (BinaryOp::Multiply, Integer(a), Integer(b)) => Integer(a.checked_mul(b)?),
        (BinaryOp::Divide, Integer(a), Integer(b)) => Integer(a.checked_div(b)?),
        (BinaryOp::Add, String(a), String(b)) => String(a + &b),
        (BinaryOp::And, Boolean(a), Boolean(b)) => Boolean(a && b),
        (BinaryOp::Or, Boolean(a), Boolean(b)) => Boolean(a || b),
        (BinaryOp::Equal, a, b) => Boolean(a == b),
        (BinaryOp::NotEqual, a, b) => Boolean(a != b),
        (op, a, b) => {
            let (a, b) = (as_fractal(&a)?, as_fractal(&b)?);
            match op {
                BinaryOp::Add => Fractal(a + b),
                BinaryOp::Subtract => Fractal(a - b),
                BinaryOp::Multiply => Fractal(a * b),
                BinaryOp::Divide => Fractal(a / b),
                BinaryOp::LessThan => Boolean(a < b),
                BinaryOp::LessOrEqual => Boolean(a <= b),
                BinaryOp::GreaterThan => Boolean(a > b),
                BinaryOp::GreaterOrEqual => Boolean(a >= b),
                _ => return None,
            }
        }
    };
    Some(value)
}

fn as_fractal(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Fractal(f) => Some(*f),
        _ => None,
    }
}

fn member(value: &Value, name: &str) -> Option<Value> {
    match (value, name) {
        (Value::String(s), "Length") => Some(Value::Integer(s.chars().count() as i64)),
        (Value::List(items), "Length" | "Count") => Some(Value::Integer(items.len() as i64)),
        _ => None,
    }
}

const METHODS: [&str; 4] = ["ToUpper", "ToLower", "Trim", "ToString"];
const FUNCTIONS: [&str; 2] = ["guid", "datetime"];

fn method_call(target: &Value, method: &str, args: &[Value]) -> Option<Value> {
    match (target, method, args) {
        (Value::String(s), "ToUpper", []) => Some(Value::String(s.to_uppercase())),
        (Value::String(s), "ToLower", []) => Some(Value::String(s.to_lowercase())),
        (Value::String(s), "Trim", []) => Some(Value::String(s.trim().to_string())),
        (value, "ToString", []) => value.to_sql_string().map(Value::String),
        _ => None,
    }
}

fn function_call(name: &str, args: &[Value]) -> Option<Value> {
    match (name, args) {
        ("guid", [Value::String(s)]) => Uuid::parse_str(s).ok().map(Value::Guid),
        ("datetime", [Value::String(s)]) => parse_datetime(s).map(Value::DateTime),
        _ => None,
    }
}
