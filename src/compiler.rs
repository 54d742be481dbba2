//! Compiles a [`Filter`] tree into the generic [`Expression`] tree.
//!
//! | Operator                              | Expression                                   |
//! |---------------------------------------|----------------------------------------------|
//! | EQ NE LT GT LE GE                     | `Binary(op, ref, value1)`                    |
//! | Contains StartsWith EndsWith          | `Call(fn, [ref, value1])`                    |
//! | NotContains NotStartsWith NotEndsWith | `Unary(!, Call(fn, [ref, value1]))`          |
//! | BT                                    | `ref >= value1 && ref <= value2`             |
//! | NB                                    | `ref < value1 \|\| ref > value2`             |
//! | Any All                               | `Lambda(op, ref, Variable, compile(cond))`   |
//!
//! Composite filters fold from the right: `[f1, f2, f3]` becomes
//! `f1 op (f2 op f3)`.

use serde_json::Value;

use crate::ast::{BinaryOp, Expression, Function, LambdaOp, LogicalOp};
use crate::error::CompileError;
use crate::filter::{Filter, LeafFilter, LeafTest, LambdaFilter};
use crate::operator::FilterOperator;

/// Compile `filter`. With `include_origin` every compiled subtree root
/// carries the operator token it came from.
pub fn compile(filter: &Filter, include_origin: bool) -> Result<Expression, CompileError> {
    let (mut expr, origin) = match filter {
        Filter::Composite(composite) => {
            let (op, origin) = if composite.is_and() {
                (LogicalOp::And, "AND")
            } else {
                (LogicalOp::Or, "OR")
            };
            let mut children = composite.filters().iter().rev();
            let Some(last) = children.next() else {
                return Err(CompileError::UnknownOperator("empty multi filter".to_string()));
            };
            let mut result = compile(last, include_origin)?;
            for child in children {
                result = Expression::logical(op, compile(child, include_origin)?, result);
            }
            (result, origin)
        }
        Filter::Leaf(leaf) => compile_leaf(leaf)?,
        Filter::Lambda(lambda) => compile_lambda(lambda, include_origin)?,
    };

    if include_origin && expr.origin.is_none() {
        expr.origin = Some(origin.to_string());
    }
    Ok(expr)
}

fn compile_leaf(leaf: &LeafFilter) -> Result<(Expression, &'static str), CompileError> {
    let LeafTest::Operator {
        operator,
        value1,
        value2,
    } = leaf.test()
    else {
        return Err(CompileError::UnknownOperator(format!(
            "custom test function on '{}'",
            leaf.path()
        )));
    };

    let reference = || Expression::reference(leaf.path());
    let value = || Expression::literal(value1.clone());
    let upper = || Expression::literal(value2.clone().unwrap_or(Value::Null));

    let expr = match operator {
        FilterOperator::EQ => Expression::binary(BinaryOp::Equal, reference(), value()),
        FilterOperator::NE => Expression::binary(BinaryOp::NotEqual, reference(), value()),
        FilterOperator::LT => Expression::binary(BinaryOp::LessThan, reference(), value()),
        FilterOperator::GT => Expression::binary(BinaryOp::GreaterThan, reference(), value()),
        FilterOperator::LE => Expression::binary(BinaryOp::LessThanOrEqual, reference(), value()),
        FilterOperator::GE => Expression::binary(BinaryOp::GreaterThanOrEqual, reference(), value()),
        FilterOperator::Contains => Expression::call(Function::Contains, vec![reference(), value()]),
        FilterOperator::StartsWith => Expression::call(Function::StartsWith, vec![reference(), value()]),
        FilterOperator::EndsWith => Expression::call(Function::EndsWith, vec![reference(), value()]),
        FilterOperator::NotContains => {
            Expression::not(Expression::call(Function::Contains, vec![reference(), value()]))
        }
        FilterOperator::NotStartsWith => {
            Expression::not(Expression::call(Function::StartsWith, vec![reference(), value()]))
        }
        FilterOperator::NotEndsWith => {
            Expression::not(Expression::call(Function::EndsWith, vec![reference(), value()]))
        }
        FilterOperator::BT => Expression::logical(
            LogicalOp::And,
            Expression::binary(BinaryOp::GreaterThanOrEqual, reference(), value()),
            Expression::binary(BinaryOp::LessThanOrEqual, reference(), upper()),
        ),
        FilterOperator::NB => Expression::logical(
            LogicalOp::Or,
            Expression::binary(BinaryOp::LessThan, reference(), value()),
            Expression::binary(BinaryOp::GreaterThan, reference(), upper()),
        ),
        // leaves never carry lambda operators
        FilterOperator::Any | FilterOperator::All => {
            return Err(CompileError::UnknownOperator(operator.to_string()));
        }
    };
    Ok((expr, operator.as_str()))
}

fn compile_lambda(lambda: &LambdaFilter, include_origin: bool) -> Result<(Expression, &'static str), CompileError> {
    let op = match lambda.operator() {
        FilterOperator::Any => LambdaOp::Any,
        FilterOperator::All => LambdaOp::All,
        other => return Err(CompileError::UnknownOperator(other.to_string())),
    };
    let (variable, condition) = match lambda.binding() {
        Some(binding) => (
            Some(Expression::variable(binding.variable())),
            Some(compile(binding.condition(), include_origin)?),
        ),
        None => (None, None),
    };
    let expr = Expression::lambda(op, Expression::reference(lambda.path()), variable, condition);
    Ok((expr, lambda.operator().as_str()))
}

impl Filter {
    /// See [`compile`].
    pub fn ast(&self, include_origin: bool) -> Result<Expression, CompileError> {
        tracing::trace!(include_origin, "compiling filter");
        compile(self, include_origin)
    }
}
