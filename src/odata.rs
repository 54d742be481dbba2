//! OData `$filter` rendering of the expression tree.

use serde_json::Value;

use crate::ast::{BinaryOp, Expression, ExpressionKind, LambdaOp, LogicalOp, UnaryOp};
use crate::error::TranslateError;
use crate::filter::Filter;

/// Renders `expr` as an OData `$filter` string.
pub fn to_odata(expr: &Expression) -> Result<String, TranslateError> {
    condition(expr)
}

fn condition(expr: &Expression) -> Result<String, TranslateError> {
    match &expr.kind {
        ExpressionKind::Logical { op, left, right } => {
            let keyword = match op {
                LogicalOp::And => "and",
                LogicalOp::Or => "or",
            };
            Ok(format!(
                "{} {} {}",
                logical_operand(*op, left)?,
                keyword,
                logical_operand(*op, right)?
            ))
        }
        ExpressionKind::Binary { op, left, right } => {
            Ok(format!("{} {} {}", operand(left)?, binary_keyword(*op), operand(right)?))
        }
        ExpressionKind::Unary { op: UnaryOp::Not, arg } => match arg.kind {
            ExpressionKind::Call { .. } => Ok(format!("not {}", condition(arg)?)),
            _ => Ok(format!("not ({})", condition(arg)?)),
        },
        ExpressionKind::Call { name, args } => {
            let args = args.iter().map(operand).collect::<Result<Vec<_>, _>>()?;
            Ok(format!("{}({})", name, args.join(",")))
        }
        ExpressionKind::Lambda {
            op,
            reference,
            variable,
            condition: body,
        } => {
            let keyword = match op {
                LambdaOp::Any => "any",
                LambdaOp::All => "all",
            };
            let target = operand(reference)?;
            match (variable, body) {
                (Some(variable), Some(body)) => Ok(format!(
                    "{}/{}({}:{})",
                    target,
                    keyword,
                    operand(variable)?,
                    condition(body)?
                )),
                _ => Ok(format!("{}/{}()", target, keyword)),
            }
        }
        _ => Err(TranslateError::UnexpectedNode {
            found: expr.type_name(),
            position: "condition",
        }),
    }
}

/// `or` binds looser than `and`, so an `or` below an `and` needs parentheses.
fn logical_operand(parent: LogicalOp, child: &Expression) -> Result<String, TranslateError> {
    let rendered = condition(child)?;
    match (parent, &child.kind) {
        (LogicalOp::And, ExpressionKind::Logical { op: LogicalOp::Or, .. }) => Ok(format!("({})", rendered)),
        _ => Ok(rendered),
    }
}

fn operand(expr: &Expression) -> Result<String, TranslateError> {
    match &expr.kind {
        ExpressionKind::Reference { path } => Ok(path.clone()),
        ExpressionKind::Variable { name } => Ok(name.clone()),
        ExpressionKind::Literal { value } => literal(value),
        _ => Err(TranslateError::UnexpectedNode {
            found: expr.type_name(),
            position: "operand",
        }),
    }
}

fn binary_keyword(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Equal => "eq",
        BinaryOp::NotEqual => "ne",
        BinaryOp::LessThan => "lt",
        BinaryOp::GreaterThan => "gt",
        BinaryOp::LessThanOrEqual => "le",
        BinaryOp::GreaterThanOrEqual => "ge",
    }
}

fn literal(value: &Value) -> Result<String, TranslateError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => Err(TranslateError::UnsupportedLiteral(value.to_string())),
    }
}

impl Filter {
    /// Compiles and renders the filter as an OData `$filter` string.
    pub fn to_odata(&self) -> Result<String, TranslateError> {
        let expr = self.ast(false)?;
        to_odata(&expr)
    }
}
