use nom::{IResult, Parser};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, digit1, multispace0};
use nom::combinator::{opt, recognize};
use nom::error::{Error as NomError, ErrorKind as NomErrorKind};
use nom::multi::many0_count;
use nom::sequence::pair;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Value;
use crate::query::ast::{BinaryOp, Expr, Lambda, UnaryOp};

type Res<'a, T> = IResult<&'a str, T>;

/// Parse lambda text into an expression tree.
/// Examples:
/// - `i => i.Int1 == 42`
/// - `i => i.Name.StartsWith("Al") && !i.IsDeleted`
/// - `i => i.Lines.Any(l => l.ProductNo == productNo)`
/// - `i => i.Id.In([1, 2, 3]) || i.Created > datetime("2024-01-01T00:00:00Z")`
///
/// Identifiers other than lambda parameters are captured variables, resolved
/// from bindings when the expression is lowered.
pub fn parse_lambda(input: &str) -> Result<Lambda> {
    let (rest, parsed) = lambda(input)?;
    let (rest, _) = multispace0::<&str, NomError<&str>>(rest)?;
    if !rest.is_empty() {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("Unexpected trailing input '{}' in '{}'", rest, input),
        ));
    }

    let mut scope = vec![parsed.param.clone()];
    let body = resolve_params(parsed.body, &mut scope);
    Ok(Lambda { param: parsed.param, body })
}

fn fail(input: &str, kind: NomErrorKind) -> nom::Err<NomError<&str>> {
    nom::Err::Error(NomError::new(input, kind))
}

fn token<'a>(input: &'a str, symbol: &'static str) -> Res<'a, &'a str> {
    let (input, _) = multispace0(input)?;
    tag(symbol).parse(input)
}

fn identifier(input: &str) -> Res<&str> {
    let (input, _) = multispace0(input)?;
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn lambda(input: &str) -> Res<Lambda> {
    let (input, param) = identifier(input)?;
    let (input, _) = token(input, "=>")?;
    let (input, body) = expression(input)?;
    Ok((input, Lambda::new(param, body)))
}

fn expression(input: &str) -> Res<Expr> {
    or_expr(input)
}

/// Left-associative chain of one precedence level
fn chain<'a>(
    input: &'a str,
    operand: fn(&'a str) -> Res<'a, Expr>,
    operators: &[(&'static str, BinaryOp)],
) -> Res<'a, Expr> {
    let (mut input, mut left) = operand(input)?;
    'outer: loop {
        for (symbol, op) in operators {
            if let Ok((rest, _)) = token(input, *symbol) {
                let (rest, right) = operand(rest)?;
                left = left.binary(*op, right);
                input = rest;
                continue 'outer;
            }
        }
        return Ok((input, left));
    }
}

fn or_expr(input: &str) -> Res<Expr> {
    chain(input, and_expr, &[("||", BinaryOp::Or)])
}

fn and_expr(input: &str) -> Res<Expr> {
    chain(input, comparison, &[("&&", BinaryOp::And)])
}

fn comparison(input: &str) -> Res<Expr> {
    const OPERATORS: [(&str, BinaryOp); 6] = [
        ("==", BinaryOp::Equal),
        ("!=", BinaryOp::NotEqual),
        ("<=", BinaryOp::LessOrEqual),
        (">=", BinaryOp::GreaterOrEqual),
        ("<", BinaryOp::LessThan),
        (">", BinaryOp::GreaterThan),
    ];

    let (input, left) = additive(input)?;
    for (symbol, op) in OPERATORS {
        if let Ok((rest, _)) = token(input, symbol) {
            let (rest, right) = additive(rest)?;
            return Ok((rest, left.binary(op, right)));
        }
    }
    Ok((input, left))
}

fn additive(input: &str) -> Res<Expr> {
    chain(input, multiplicative, &[("+", BinaryOp::Add), ("-", BinaryOp::Subtract)])
}

fn multiplicative(input: &str) -> Res<Expr> {
    chain(input, unary, &[("*", BinaryOp::Multiply), ("/", BinaryOp::Divide)])
}

fn unary(input: &str) -> Res<Expr> {
    if let Ok((rest, _)) = token(input, "!") {
        let (rest, operand) = unary(rest)?;
        return Ok((rest, operand.not()));
    }
    if let Ok((rest, _)) = token(input, "-") {
        let (rest, operand) = unary(rest)?;
        let negated = match operand {
            Expr::Constant(Value::Integer(v)) if v != i64::MIN => Expr::Constant(Value::Integer(-v)),
            Expr::Constant(Value::Fractal(v)) => Expr::Constant(Value::Fractal(-v)),
            other => Expr::Unary { op: UnaryOp::Negate, operand: Box::new(other) },
        };
        return Ok((rest, negated));
    }
    postfix(input)
}

fn postfix(input: &str) -> Res<Expr> {
    let (mut input, mut expr) = primary(input)?;
    loop {
        let Ok((rest, _)) = token(input, ".") else {
            return Ok((input, expr));
        };
        let (rest, name) = identifier(rest)?;
        match arguments(rest, "(", ")") {
            Ok((after, args)) => {
                expr = expr.call(name, args);
                input = after;
            }
            Err(_) => {
                expr = expr.member(name);
                input = rest;
            }
        }
    }
}

fn arguments<'a>(input: &'a str, open: &'static str, close: &'static str) -> Res<'a, Vec<Expr>> {
    let (input, _) = token(input, open)?;
    if let Ok((rest, _)) = token(input, close) {
        return Ok((rest, Vec::new()));
    }

    let (mut input, first) = argument(input)?;
    let mut args = vec![first];
    while let Ok((rest, _)) = token(input, ",") {
        let (rest, arg) = argument(rest)?;
        args.push(arg);
        input = rest;
    }
    let (input, _) = token(input, close)?;
    Ok((input, args))
}

fn argument(input: &str) -> Res<Expr> {
    if let Ok((rest, nested)) = lambda(input) {
        return Ok((rest, Expr::Lambda(Box::new(nested))));
    }
    expression(input)
}

fn primary(input: &str) -> Res<Expr> {
    let (input, _) = multispace0(input)?;

    match input.chars().next() {
        Some('"') => {
            let (rest, text) = string_literal(input)?;
            Ok((rest, Expr::Constant(Value::String(text))))
        }
        Some(c) if c.is_ascii_digit() => number(input),
        Some('(') => {
            let (rest, _) = token(input, "(")?;
            let (rest, inner) = expression(rest)?;
            let (rest, _) = token(rest, ")")?;
            Ok((rest, inner))
        }
        Some('[') => {
            let (rest, items) = arguments(input, "[", "]")?;
            Ok((rest, Expr::Array(items)))
        }
        Some(_) => {
            let (rest, name) = identifier(input)?;
            let expr = match name {
                "true" => Expr::Constant(Value::Boolean(true)),
                "false" => Expr::Constant(Value::Boolean(false)),
                "null" => Expr::Constant(Value::Null),
                _ => {
                    if let Ok((after, args)) = arguments(rest, "(", ")") {
                        return Ok((after, Expr::function(name, args)));
                    }
                    Expr::Variable(name.to_string())
                }
            };
            Ok((rest, expr))
        }
        None => Err(fail(input, NomErrorKind::Eof)),
    }
}

fn string_literal(input: &str) -> Res<String> {
    let mut chars = input.char_indices();
    if !matches!(chars.next(), Some((_, '"'))) {
        return Err(fail(input, NomErrorKind::Char));
    }

    let mut text = String::new();
    let mut escaped = false;
    for (pos, c) in chars {
        if escaped {
            text.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok((&input[pos + 1..], text));
        } else {
            text.push(c);
        }
    }

    // Unterminated
    Err(nom::Err::Failure(NomError::new(input, NomErrorKind::Char)))
}

fn number(input: &str) -> Res<Expr> {
    let (rest, text) = recognize(pair(digit1, opt(pair(tag("."), digit1)))).parse(input)?;
    let value = if text.contains('.') {
        text.parse::<f64>().ok().map(Value::Fractal)
    } else {
        text.parse::<i64>().ok().map(Value::Integer)
    };

    match value {
        Some(value) => Ok((rest, Expr::Constant(value))),
        None => Err(nom::Err::Failure(NomError::new(input, NomErrorKind::Digit))),
    }
}

/// Identifiers naming a lambda parameter in scope become `Param`
fn resolve_params(expr: Expr, scope: &mut Vec<String>) -> Expr {
    match expr {
        Expr::Variable(name) if scope.contains(&name) => Expr::Param(name),
        Expr::Member { target, name } => Expr::Member {
            target: Box::new(resolve_params(*target, scope)),
            name,
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(resolve_params(*left, scope)),
            right: Box::new(resolve_params(*right, scope)),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(resolve_params(*operand, scope)),
        },
        Expr::Call { target, method, args } => Expr::Call {
            target: target.map(|t| Box::new(resolve_params(*t, scope))),
            method,
            args: args.into_iter().map(|a| resolve_params(a, scope)).collect(),
        },
        Expr::Lambda(nested) => {
            let Lambda { param, body } = *nested;
            scope.push(param.clone());
            let body = resolve_params(body, scope);
            scope.pop();
            Expr::Lambda(Box::new(Lambda { param, body }))
        }
        Expr::Array(items) => Expr::Array(items.into_iter().map(|i| resolve_params(i, scope)).collect()),
        other => other,
    }
}
