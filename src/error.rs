//! Error types for filter construction, compilation and translation.

use thiserror::Error;

use crate::operator::FilterOperator;

/// Fatal errors raised while constructing a [`Filter`](crate::filter::Filter).
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("The filter operators 'Any' and 'All' are only supported with the parameter object notation.")]
    LambdaInPositionalForm,

    #[error("When using the filter operator 'Any', a lambda variable and a condition have to be given or neither.")]
    PartialAnyArguments,

    #[error("When using the filter operators 'Any' or 'All', a non-empty string has to be given as argument 'variable'.")]
    InvalidLambdaVariable,

    #[error("When using the filter operator 'Any' or 'All', a valid filter has to be given as argument 'condition'.")]
    MissingLambdaCondition,

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("The filter operator '{0}' requires a second value ('value2').")]
    MissingSecondValue(FilterOperator),

    #[error("Wrong parameters defined for filter: {0}")]
    InvalidShape(String),

    #[error("invalid filter record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the AST compiler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The leaf carries no operator the compiler has a mapping for
    /// (custom test functions have none).
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
}

/// Errors raised while translating an expression tree into a query language.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("unsupported literal value: {0}")]
    UnsupportedLiteral(String),

    #[error("unsupported path '{0}': navigation is only supported inside lambda conditions")]
    UnsupportedPath(String),

    #[error("unexpected {found} in {position} position")]
    UnexpectedNode {
        found: &'static str,
        position: &'static str,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),

    #[error("无法读取配置文件 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
