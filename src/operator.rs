//! Filter operator tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Operators accepted by a filter leaf or lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    EQ,
    NE,
    LT,
    GT,
    LE,
    GE,
    /// Between, both bounds inclusive.
    BT,
    /// Not between.
    NB,
    Contains,
    StartsWith,
    EndsWith,
    NotContains,
    NotStartsWith,
    NotEndsWith,
    Any,
    All,
}

impl FilterOperator {
    pub const ALL_OPERATORS: [FilterOperator; 16] = [
        FilterOperator::EQ,
        FilterOperator::NE,
        FilterOperator::LT,
        FilterOperator::GT,
        FilterOperator::LE,
        FilterOperator::GE,
        FilterOperator::BT,
        FilterOperator::NB,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::NotContains,
        FilterOperator::NotStartsWith,
        FilterOperator::NotEndsWith,
        FilterOperator::Any,
        FilterOperator::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::EQ => "EQ",
            FilterOperator::NE => "NE",
            FilterOperator::LT => "LT",
            FilterOperator::GT => "GT",
            FilterOperator::LE => "LE",
            FilterOperator::GE => "GE",
            FilterOperator::BT => "BT",
            FilterOperator::NB => "NB",
            FilterOperator::Contains => "Contains",
            FilterOperator::StartsWith => "StartsWith",
            FilterOperator::EndsWith => "EndsWith",
            FilterOperator::NotContains => "NotContains",
            FilterOperator::NotStartsWith => "NotStartsWith",
            FilterOperator::NotEndsWith => "NotEndsWith",
            FilterOperator::Any => "Any",
            FilterOperator::All => "All",
        }
    }

    /// `Any` and `All` bind a variable over a collection.
    pub fn is_lambda(&self) -> bool {
        matches!(self, FilterOperator::Any | FilterOperator::All)
    }

    /// Operators that consume `value2`.
    pub fn is_range(&self) -> bool {
        matches!(self, FilterOperator::BT | FilterOperator::NB)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_OPERATORS
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}
