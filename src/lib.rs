//! Filter expression model: construction and validation of filter trees,
//! compilation into a generic expression tree, client-side evaluation and
//! translation to OData `$filter` and SQL.

pub mod ast;
pub mod comparator;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod odata;
pub mod operator;
pub mod sql_compiler;

pub use ast::{Expression, ExpressionKind};
pub use comparator::default_comparator;
pub use compiler::compile;
pub use config::EngineConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CompileError, ConfigError, FilterError, TranslateError};
pub use evaluator::{group_filters, Evaluator};
pub use filter::{Filter, FilterArg, FilterRecord, LegacyArg, LegacyTarget};
pub use odata::to_odata;
pub use operator::FilterOperator;
pub use sql_compiler::{CompileResult, SqlCompiler};
