//! SQL compiler that converts the expression tree to PostgreSQL using sea-query.

use crate::ast::{BinaryOp, Expression, ExpressionKind, Function, LambdaOp, LogicalOp, UnaryOp};
use crate::error::TranslateError;
use crate::filter::Filter;
use sea_query::{Asterisk, Expr, Iden, LikeExpr, PostgresQueryBuilder, Query, SimpleExpr, Value};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Configuration for SQL optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Minimum number of OR-ed equalities on one column before converting to IN clause
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
        }
    }
}

/// Full compiler configuration
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Maps entity and collection names to table names
    pub table_mapping: HashMap<String, String>,
    pub optimization_config: OptimizationConfig,
    /// Column of a collection table referencing the owning row's `id`
    pub foreign_key: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            table_mapping: HashMap::new(),
            optimization_config: OptimizationConfig::default(),
            foreign_key: "parent_id".to_string(),
        }
    }
}

/// Represents a table identifier for sea-query
#[derive(Debug, Clone)]
pub enum TableName {
    Base,
    Named(String),
    Joined(usize), // one alias per lambda subquery
}

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = match self {
            TableName::Base => write!(s, "base_table"),
            TableName::Named(name) => write!(s, "{}", name),
            TableName::Joined(idx) => write!(s, "joined_table_{}", idx),
        };
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = write!(s, "{}", self.0);
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that converts expression trees to SQL queries
pub struct SqlCompiler {
    config: OptimizationConfig,
    table_mapping: HashMap<String, String>,
    foreign_key: String,
}

/// Lambda variables in scope, innermost last, and the running alias counter.
#[derive(Default)]
struct Context {
    scopes: Vec<(String, usize)>,
    joins: usize,
    optimizations: Vec<Optimization>,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::from_config(CompilerConfig::default())
    }

    pub fn with_config(config: OptimizationConfig) -> Self {
        Self::from_config(CompilerConfig {
            optimization_config: config,
            ..Default::default()
        })
    }

    pub fn from_config(config: CompilerConfig) -> Self {
        Self {
            config: config.optimization_config,
            table_mapping: config.table_mapping,
            foreign_key: config.foreign_key,
        }
    }

    /// Set table mapping for entity names
    pub fn set_table_mapping(&mut self, mapping: HashMap<String, String>) {
        self.table_mapping = mapping;
    }

    /// Get the actual table name for an entity
    fn get_table_name(&self, entity: &str) -> String {
        self.table_mapping
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    /// Compile an expression over `entity` into a SELECT statement
    pub fn compile(&self, entity: &str, expr: &Expression) -> Result<CompileResult, TranslateError> {
        let mut ctx = Context::default();
        let condition = self.compile_condition(expr, &mut ctx)?;

        let mut select = Query::select();
        select
            .column(Asterisk)
            .from_as(TableName::Named(self.get_table_name(entity)), TableName::Base)
            .and_where(condition);

        let sql = select.to_string(PostgresQueryBuilder);
        tracing::debug!(entity, optimizations = ctx.optimizations.len(), "compiled filter to SQL");

        Ok(CompileResult {
            sql,
            optimizations: ctx.optimizations,
        })
    }

    /// Compile a filter through its expression tree
    pub fn compile_filter(&self, entity: &str, filter: &Filter) -> Result<CompileResult, TranslateError> {
        let expr = filter.ast(false)?;
        self.compile(entity, &expr)
    }

    fn compile_condition(&self, expr: &Expression, ctx: &mut Context) -> Result<SimpleExpr, TranslateError> {
        match &expr.kind {
            ExpressionKind::Logical { op: LogicalOp::And, left, right } => {
                let left = self.compile_condition(left, ctx)?;
                let right = self.compile_condition(right, ctx)?;
                Ok(left.and(right))
            }
            ExpressionKind::Logical { op: LogicalOp::Or, left, right } => {
                // Check for OR optimization opportunities
                if let Some(in_expr) = self.try_optimize_or_to_in(expr, ctx)? {
                    return Ok(in_expr);
                }
                let left = self.compile_condition(left, ctx)?;
                let right = self.compile_condition(right, ctx)?;
                Ok(left.or(right))
            }
            ExpressionKind::Unary { op: UnaryOp::Not, arg } => Ok(self.compile_condition(arg, ctx)?.not()),
            ExpressionKind::Binary { op, left, right } => self.compile_comparison(*op, left, right, ctx),
            ExpressionKind::Call { name, args } => self.compile_call(*name, args, ctx),
            ExpressionKind::Lambda {
                op,
                reference,
                variable,
                condition,
            } => self.compile_lambda(*op, reference, variable.as_deref(), condition.as_deref(), ctx),
            _ => Err(TranslateError::UnexpectedNode {
                found: expr.type_name(),
                position: "condition",
            }),
        }
    }

    /// Compile a comparison operation
    fn compile_comparison(
        &self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        ctx: &Context,
    ) -> Result<SimpleExpr, TranslateError> {
        let col = self.column(left, ctx)?;
        let value = literal(right)?;

        if value.is_null() {
            match op {
                BinaryOp::Equal => return Ok(col.is_null()),
                BinaryOp::NotEqual => return Ok(col.is_not_null()),
                _ => {}
            }
        }

        let val = literal_to_value(value)?;
        let expr = match op {
            BinaryOp::Equal => col.eq(val),
            BinaryOp::NotEqual => col.ne(val),
            BinaryOp::GreaterThan => col.gt(val),
            BinaryOp::LessThan => col.lt(val),
            BinaryOp::GreaterThanOrEqual => col.gte(val),
            BinaryOp::LessThanOrEqual => col.lte(val),
        };
        Ok(expr)
    }

    /// String functions become LIKE patterns
    fn compile_call(&self, name: Function, args: &[Expression], ctx: &Context) -> Result<SimpleExpr, TranslateError> {
        let [target, needle] = args else {
            return Err(TranslateError::UnexpectedNode {
                found: "Call",
                position: "two-argument function",
            });
        };
        let col = self.column(target, ctx)?;
        let needle = match literal(needle)? {
            JsonValue::String(s) => escape_like(s),
            value @ (JsonValue::Number(_) | JsonValue::Bool(_)) => value.to_string(),
            other => return Err(TranslateError::UnsupportedLiteral(other.to_string())),
        };

        let pattern = match name {
            Function::Contains => format!("%{}%", needle),
            Function::StartsWith => format!("{}%", needle),
            Function::EndsWith => format!("%{}", needle),
        };
        Ok(col.like(LikeExpr::new(pattern).escape('\\')))
    }

    /// Any → EXISTS, All → NOT EXISTS over the rows failing the condition
    fn compile_lambda(
        &self,
        op: LambdaOp,
        reference: &Expression,
        variable: Option<&Expression>,
        condition: Option<&Expression>,
        ctx: &mut Context,
    ) -> Result<SimpleExpr, TranslateError> {
        let ExpressionKind::Reference { path } = &reference.kind else {
            return Err(TranslateError::UnexpectedNode {
                found: reference.type_name(),
                position: "lambda collection",
            });
        };
        let (owner, collection) = scoped(path, ctx)?;

        ctx.joins += 1;
        let join = ctx.joins;
        let mut subquery = Query::select();
        subquery
            .column(Asterisk)
            .from_as(TableName::Named(self.get_table_name(collection)), TableName::Joined(join))
            .and_where(
                Expr::col((TableName::Joined(join), ColumnName(self.foreign_key.clone())))
                    .equals((owner, ColumnName("id".to_string()))),
            );

        let body = match (variable, condition) {
            (Some(variable), Some(condition)) => {
                let ExpressionKind::Variable { name } = &variable.kind else {
                    return Err(TranslateError::UnexpectedNode {
                        found: variable.type_name(),
                        position: "lambda variable",
                    });
                };
                ctx.scopes.push((name.clone(), join));
                let body = self.compile_condition(condition, ctx);
                ctx.scopes.pop();
                Some(body?)
            }
            _ => None,
        };

        let expr = match (op, body) {
            (LambdaOp::Any, Some(body)) => {
                subquery.and_where(body);
                Expr::exists(subquery)
            }
            (LambdaOp::Any, None) => Expr::exists(subquery),
            (LambdaOp::All, Some(body)) => {
                subquery.and_where(body.not());
                Expr::exists(subquery).not()
            }
            (LambdaOp::All, None) => Expr::val(true).into(),
        };
        Ok(expr)
    }

    /// Try to optimize OR-ed equalities on a single column to an IN clause
    fn try_optimize_or_to_in(&self, expr: &Expression, ctx: &mut Context) -> Result<Option<SimpleExpr>, TranslateError> {
        let mut disjuncts = Vec::new();
        collect_disjuncts(expr, &mut disjuncts);
        if disjuncts.len() < self.config.max_or_conditions_for_in {
            return Ok(None);
        }

        let mut field: Option<&str> = None;
        let mut values = Vec::new();
        for disjunct in disjuncts {
            let ExpressionKind::Binary {
                op: BinaryOp::Equal,
                left,
                right,
            } = &disjunct.kind
            else {
                return Ok(None); // Other condition types break the equality pattern
            };
            let (ExpressionKind::Reference { path }, ExpressionKind::Literal { value }) = (&left.kind, &right.kind) else {
                return Ok(None);
            };
            if value.is_null() {
                return Ok(None);
            }
            if field.is_some_and(|seen| seen != path.as_str()) {
                return Ok(None);
            }
            field = Some(path.as_str());
            values.push(literal_to_value(value)?);
        }

        let Some(path) = field else {
            return Ok(None);
        };
        let col = self.column_for_path(path, ctx)?;
        ctx.optimizations.push(Optimization::OrToIn {
            field: path.to_string(),
            value_count: values.len(),
        });
        Ok(Some(col.is_in(values)))
    }

    fn column(&self, expr: &Expression, ctx: &Context) -> Result<Expr, TranslateError> {
        match &expr.kind {
            ExpressionKind::Reference { path } => self.column_for_path(path, ctx),
            _ => Err(TranslateError::UnexpectedNode {
                found: expr.type_name(),
                position: "column",
            }),
        }
    }

    fn column_for_path(&self, path: &str, ctx: &Context) -> Result<Expr, TranslateError> {
        let (table, column) = scoped(path, ctx)?;
        Ok(Expr::col((table, ColumnName(column.to_string()))))
    }
}

/// Resolves `path` to the table it belongs to: a plain name is a base table
/// column, `variable/name` a column of the lambda's joined table.
fn scoped<'p>(path: &'p str, ctx: &Context) -> Result<(TableName, &'p str), TranslateError> {
    let lookup = |name: &str| {
        ctx.scopes
            .iter()
            .rev()
            .find(|(variable, _)| variable == name)
            .map(|(_, join)| *join)
    };

    match path.split_once('/') {
        None if lookup(path).is_none() => Ok((TableName::Base, path)),
        Some((head, rest)) if !rest.contains('/') => match lookup(head) {
            Some(join) => Ok((TableName::Joined(join), rest)),
            None => Err(TranslateError::UnsupportedPath(path.to_string())),
        },
        _ => Err(TranslateError::UnsupportedPath(path.to_string())),
    }
}

fn collect_disjuncts<'e>(expr: &'e Expression, out: &mut Vec<&'e Expression>) {
    match &expr.kind {
        ExpressionKind::Logical { op: LogicalOp::Or, left, right } => {
            collect_disjuncts(left, out);
            collect_disjuncts(right, out);
        }
        _ => out.push(expr),
    }
}

fn literal(expr: &Expression) -> Result<&JsonValue, TranslateError> {
    match &expr.kind {
        ExpressionKind::Literal { value } => Ok(value),
        _ => Err(TranslateError::UnexpectedNode {
            found: expr.type_name(),
            position: "value",
        }),
    }
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Convert a JSON literal to sea-query Value
fn literal_to_value(value: &JsonValue) -> Result<Value, TranslateError> {
    match value {
        JsonValue::Null => Ok(Value::String(None)),
        JsonValue::Bool(b) => Ok(Value::Bool(Some(*b))),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::BigInt(Some(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::BigUnsigned(Some(u)))
            } else {
                Ok(Value::Double(n.as_f64()))
            }
        }
        JsonValue::String(s) => Ok(Value::String(Some(Box::new(s.clone())))),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(TranslateError::UnsupportedLiteral(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::FilterOperator;
    use serde_json::json;

    fn create_test_compiler() -> SqlCompiler {
        let mut compiler = SqlCompiler::new();
        let mut mapping = HashMap::new();
        mapping.insert("Product".to_string(), "products".to_string());
        mapping.insert("Items".to_string(), "order_items".to_string());
        compiler.set_table_mapping(mapping);
        compiler
    }

    fn leaf(path: &str, op: FilterOperator, value: JsonValue) -> Filter {
        Filter::leaf(path, op, value).unwrap()
    }

    #[test]
    fn test_simple_filter_compilation() {
        let compiler = create_test_compiler();
        let filter = leaf("Status", FilterOperator::EQ, json!("Open"));

        let result = compiler.compile_filter("Product", &filter).unwrap();
        assert!(result.sql.starts_with(r#"SELECT * FROM "products" AS "base_table" WHERE"#));
        assert!(result.sql.contains(r#""base_table"."Status" = 'Open'"#));
        assert!(result.optimizations.is_empty());
    }

    #[test]
    fn test_unmapped_entity_is_lowercased() {
        let compiler = SqlCompiler::new();
        let filter = leaf("Price", FilterOperator::LT, json!(20));

        let result = compiler.compile_filter("Invoice", &filter).unwrap();
        assert!(result.sql.contains(r#"FROM "invoice" AS "base_table""#));
        assert!(result.sql.contains(r#""base_table"."Price" < 20"#));
    }

    #[test]
    fn test_null_comparisons() {
        let compiler = create_test_compiler();

        let eq = compiler
            .compile_filter("Product", &leaf("Name", FilterOperator::EQ, json!(null)))
            .unwrap();
        assert!(eq.sql.contains(r#""base_table"."Name" IS NULL"#));

        let ne = compiler
            .compile_filter("Product", &leaf("Name", FilterOperator::NE, json!(null)))
            .unwrap();
        assert!(ne.sql.contains(r#""base_table"."Name" IS NOT NULL"#));
    }

    #[test]
    fn test_between() {
        let compiler = create_test_compiler();
        let filter = Filter::range("Price", FilterOperator::BT, 10, 20).unwrap();

        let result = compiler.compile_filter("Product", &filter).unwrap();
        assert!(result.sql.contains(r#""base_table"."Price" >= 10"#));
        assert!(result.sql.contains(r#""base_table"."Price" <= 20"#));
        assert!(result.sql.contains("AND"));
    }

    #[test]
    fn test_like_patterns() {
        let compiler = create_test_compiler();

        let contains = compiler
            .compile_filter("Product", &leaf("Name", FilterOperator::Contains, json!("Jo")))
            .unwrap();
        assert!(contains.sql.contains(r#""base_table"."Name" LIKE '%Jo%'"#));
        assert!(contains.sql.contains("ESCAPE"));

        let starts = compiler
            .compile_filter("Product", &leaf("Name", FilterOperator::NotStartsWith, json!("Jo")))
            .unwrap();
        assert!(starts.sql.contains("NOT"));
        assert!(starts.sql.contains("'Jo%'"));
    }

    #[test]
    fn test_like_escaping() {
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_or_to_in_optimization() {
        let mut config = OptimizationConfig::default();
        config.max_or_conditions_for_in = 2; // Lower threshold for testing
        let compiler = SqlCompiler::with_config(config);

        let filter = Filter::any_of(vec![
            leaf("Status", FilterOperator::EQ, json!("Open")),
            leaf("Status", FilterOperator::EQ, json!("Pending")),
            leaf("Status", FilterOperator::EQ, json!("Review")),
        ])
        .unwrap();

        let result = compiler.compile_filter("Issue", &filter).unwrap();
        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn {
                field: "Status".to_string(),
                value_count: 3,
            }]
        );
        assert!(result.sql.contains("IN ("));
        assert!(result.sql.contains("'Review'"));
    }

    #[test]
    fn test_or_on_mixed_columns_is_kept() {
        let mut config = OptimizationConfig::default();
        config.max_or_conditions_for_in = 2;
        let compiler = SqlCompiler::with_config(config);

        let filter = Filter::any_of(vec![
            leaf("Status", FilterOperator::EQ, json!("Open")),
            leaf("Owner", FilterOperator::EQ, json!("me")),
        ])
        .unwrap();

        let result = compiler.compile_filter("Issue", &filter).unwrap();
        assert!(result.optimizations.is_empty());
        assert!(result.sql.contains(" OR "));
    }

    #[test]
    fn test_or_below_threshold_is_kept() {
        let compiler = create_test_compiler();
        let filter = Filter::any_of(vec![
            leaf("Status", FilterOperator::EQ, json!("Open")),
            leaf("Status", FilterOperator::EQ, json!("Closed")),
        ])
        .unwrap();

        let result = compiler.compile_filter("Issue", &filter).unwrap();
        assert!(result.optimizations.is_empty());
        assert!(!result.sql.contains(" IN "));
    }

    #[test]
    fn test_any_lambda_as_exists() {
        let compiler = create_test_compiler();
        let condition = leaf("item/Quantity", FilterOperator::GT, json!(100));
        let filter = Filter::lambda("Items", FilterOperator::Any, "item", condition).unwrap();

        let result = compiler.compile_filter("Order", &filter).unwrap();
        assert!(result.sql.contains("EXISTS"));
        assert!(!result.sql.contains("NOT EXISTS"));
        assert!(result.sql.contains(r#"FROM "order_items" AS "joined_table_1""#));
        assert!(result.sql.contains(r#""joined_table_1"."parent_id" = "base_table"."id""#));
        assert!(result.sql.contains(r#""joined_table_1"."Quantity" > 100"#));
    }

    #[test]
    fn test_all_lambda_as_not_exists() {
        let compiler = create_test_compiler();
        let condition = leaf("item/Quantity", FilterOperator::GT, json!(100));
        let filter = Filter::lambda("Items", FilterOperator::All, "item", condition).unwrap();

        let result = compiler.compile_filter("Order", &filter).unwrap();
        assert!(result.sql.contains("NOT EXISTS"));
        assert!(result.sql.contains(r#""joined_table_1"."Quantity" > 100"#));
    }

    #[test]
    fn test_any_without_condition() {
        let compiler = create_test_compiler();
        let result = compiler.compile_filter("Order", &Filter::non_empty("Items")).unwrap();
        assert!(result.sql.contains("EXISTS"));
        assert!(result.sql.contains(r#""joined_table_1"."parent_id" = "base_table"."id""#));
    }

    #[test]
    fn test_nested_lambdas() {
        let compiler = SqlCompiler::from_config(CompilerConfig {
            foreign_key: "owner_id".to_string(),
            ..Default::default()
        });
        let inner = Filter::lambda(
            "o/Lines",
            FilterOperator::Any,
            "l",
            leaf("l/Qty", FilterOperator::GE, json!(5)),
        )
        .unwrap();
        let filter = Filter::lambda("Orders", FilterOperator::Any, "o", inner).unwrap();

        let result = compiler.compile_filter("Customer", &filter).unwrap();
        assert!(result.sql.contains(r#""joined_table_1"."owner_id" = "base_table"."id""#));
        assert!(result.sql.contains(r#"FROM "lines" AS "joined_table_2""#));
        assert!(result.sql.contains(r#""joined_table_2"."owner_id" = "joined_table_1"."id""#));
        assert!(result.sql.contains(r#""joined_table_2"."Qty" >= 5"#));
    }

    #[test]
    fn test_navigation_outside_lambda_is_rejected() {
        let compiler = create_test_compiler();
        let filter = leaf("Supplier/City", FilterOperator::EQ, json!("Berlin"));
        assert_eq!(
            compiler.compile_filter("Product", &filter).unwrap_err(),
            TranslateError::UnsupportedPath("Supplier/City".to_string())
        );
    }

    #[test]
    fn test_non_scalar_literal_is_rejected() {
        let compiler = create_test_compiler();
        let filter = leaf("Tags", FilterOperator::EQ, json!({"a": 1}));
        assert!(matches!(
            compiler.compile_filter("Product", &filter),
            Err(TranslateError::UnsupportedLiteral(_))
        ));
    }
}
