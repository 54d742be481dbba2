//! Client-side evaluation of filters against JSON records.
//!
//! Paths use `/` separators (`Address/City`). Inside a lambda condition a
//! path starting with the bound variable resolves into the current element.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::comparator::{default_comparator, to_js_string};
use crate::filter::{Filter, LambdaFilter, LeafFilter, LeafTest};
use crate::operator::FilterOperator;

type Bindings<'a> = [(&'a str, &'a Value)];

/// Evaluates filters on records. Leaves without an explicit
/// `case_sensitive` flag use the evaluator default (insensitive).
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    case_sensitive: bool,
}

impl Evaluator {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    pub fn matches(&self, filter: &Filter, record: &Value) -> bool {
        self.eval(filter, record, &[])
    }

    /// Records passing `filter`, in input order.
    pub fn apply<'a>(&self, records: &'a [Value], filter: &Filter) -> Vec<&'a Value> {
        let matched: Vec<&Value> = records.iter().filter(|record| self.matches(filter, record)).collect();
        tracing::debug!(total = records.len(), matched = matched.len(), "client-side filter applied");
        matched
    }

    fn eval(&self, filter: &Filter, record: &Value, bindings: &Bindings<'_>) -> bool {
        match filter {
            Filter::Composite(composite) => {
                if composite.is_and() {
                    composite.filters().iter().all(|f| self.eval(f, record, bindings))
                } else {
                    composite.filters().iter().any(|f| self.eval(f, record, bindings))
                }
            }
            Filter::Leaf(leaf) => self.eval_leaf(leaf, record, bindings),
            Filter::Lambda(lambda) => self.eval_lambda(lambda, record, bindings),
        }
    }

    fn eval_lambda(&self, lambda: &LambdaFilter, record: &Value, bindings: &Bindings<'_>) -> bool {
        let Value::Array(items) = resolve(record, lambda.path(), bindings) else {
            return false;
        };
        let Some(binding) = lambda.binding() else {
            return !items.is_empty();
        };

        let check = |item: &Value| {
            let mut scope: Vec<(&str, &Value)> = bindings.to_vec();
            scope.push((binding.variable(), item));
            self.eval(binding.condition(), record, &scope)
        };
        match lambda.operator() {
            FilterOperator::All => items.iter().all(check),
            _ => items.iter().any(check),
        }
    }

    fn eval_leaf(&self, leaf: &LeafFilter, record: &Value, bindings: &Bindings<'_>) -> bool {
        let value = resolve(record, leaf.path(), bindings);
        let (operator, value1, value2) = match (leaf.predicate(), leaf.test()) {
            (Some(test), _) => return test(value),
            (
                None,
                LeafTest::Operator {
                    operator,
                    value1,
                    value2,
                },
            ) => (*operator, value1, value2.as_ref()),
            (None, LeafTest::Predicate(test)) => return test(value),
        };

        let case_sensitive = leaf.case_sensitive().unwrap_or(self.case_sensitive);
        let value = normalize(value, case_sensitive);
        let value1 = normalize(value1, case_sensitive);
        let value2 = value2.map(|v| normalize(v, case_sensitive));

        let compare = |a: &Value, b: &Value| match leaf.comparator() {
            Some(comparator) => comparator(a, b),
            None => default_comparator(a, b),
        };
        let against = |other: Option<&Cow<'_, Value>>| match other {
            Some(other) => compare(&*value, &**other),
            None => None,
        };

        let lower = against(Some(&value1));
        let upper = against(value2.as_ref());
        match operator {
            FilterOperator::EQ => lower == Some(Ordering::Equal),
            FilterOperator::NE => lower != Some(Ordering::Equal),
            FilterOperator::LT => lower == Some(Ordering::Less),
            FilterOperator::LE => matches!(lower, Some(Ordering::Less | Ordering::Equal)),
            FilterOperator::GT => lower == Some(Ordering::Greater),
            FilterOperator::GE => matches!(lower, Some(Ordering::Greater | Ordering::Equal)),
            FilterOperator::BT => {
                matches!(lower, Some(Ordering::Greater | Ordering::Equal))
                    && matches!(upper, Some(Ordering::Less | Ordering::Equal))
            }
            FilterOperator::NB => lower == Some(Ordering::Less) || upper == Some(Ordering::Greater),
            FilterOperator::Contains => string_test(&value, &value1, |s, n| s.contains(n)),
            FilterOperator::StartsWith => string_test(&value, &value1, |s, n| s.starts_with(n)),
            FilterOperator::EndsWith => string_test(&value, &value1, |s, n| s.ends_with(n)),
            FilterOperator::NotContains => string_test(&value, &value1, |s, n| !s.contains(n)),
            FilterOperator::NotStartsWith => string_test(&value, &value1, |s, n| !s.starts_with(n)),
            FilterOperator::NotEndsWith => string_test(&value, &value1, |s, n| !s.ends_with(n)),
            FilterOperator::Any | FilterOperator::All => false,
        }
    }
}

/// Only string record values take part in string operators.
fn string_test(value: &Value, needle: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    let Value::String(haystack) = value else {
        return false;
    };
    match needle {
        Value::String(needle) => test(haystack, needle),
        Value::Null => false,
        other => test(haystack, &to_js_string(other)),
    }
}

/// NFC-normalize strings, upper-casing them unless case sensitive.
fn normalize(value: &Value, case_sensitive: bool) -> Cow<'_, Value> {
    match value {
        Value::String(s) if case_sensitive => Cow::Owned(Value::String(s.nfc().collect())),
        Value::String(s) => Cow::Owned(Value::String(s.to_uppercase().nfc().collect())),
        other => Cow::Borrowed(other),
    }
}

/// Resolves `path` against the innermost matching lambda variable, else the
/// record. Missing segments yield `null`.
pub fn resolve<'a>(record: &'a Value, path: &str, bindings: &Bindings<'a>) -> &'a Value {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty()).peekable();

    let mut current = match segments.peek() {
        Some(first) => match bindings.iter().rev().find(|(name, _)| name == first) {
            Some((_, bound)) => {
                segments.next();
                *bound
            }
            None => record,
        },
        None => record,
    };

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&Value::Null),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .unwrap_or(&Value::Null),
            _ => &Value::Null,
        };
    }
    current
}

/// Combines separately supplied filters: filters on the same path are
/// OR-ed, groups for different paths are AND-ed.
pub fn group_filters(filters: Vec<Filter>) -> Option<Filter> {
    if filters.len() <= 1 {
        return filters.into_iter().next();
    }

    let mut groups: Vec<(Option<String>, Vec<Filter>)> = Vec::new();
    for filter in filters {
        let key = filter.path().map(str::to_string);
        match groups.iter_mut().find(|(path, _)| *path == key) {
            Some((_, group)) => group.push(filter),
            None => groups.push((key, vec![filter])),
        }
    }

    let mut combined: Vec<Filter> = groups
        .into_iter()
        .map(|(_, mut group)| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                Filter::combined(group, false)
            }
        })
        .collect();

    if combined.len() == 1 {
        combined.pop()
    } else {
        Some(Filter::combined(combined, true))
    }
}

impl Filter {
    /// Evaluates with the default [`Evaluator`].
    pub fn matches(&self, record: &Value) -> bool {
        Evaluator::default().matches(self, record)
    }
}

/// Records passing `filter` under the default [`Evaluator`].
pub fn apply<'a>(records: &'a [Value], filter: &Filter) -> Vec<&'a Value> {
    Evaluator::default().apply(records, filter)
}
