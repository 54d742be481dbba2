//! 过滤器的构造与校验
//!
//! 过滤器有三种形态，构造完成后不可修改：
//!
//! ```text
//! Filter
//!   ├─ Composite  子过滤器列表 + AND/OR 标志
//!   ├─ Leaf       path + operator + value1 [+ value2]，或 path + 自定义 test 函数
//!   └─ Lambda     path + Any/All + 绑定变量 + 嵌套条件
//!                 (Any 可以不带变量和条件，表示集合非空)
//! ```
//!
//! ## 构造方式
//!
//! - 配置记录 [`FilterRecord`]，可以从 JSON 反序列化
//! - 旧式位置参数 [`Filter::positional`]，不支持 `Any`/`All`
//! - 命名工厂函数：[`Filter::leaf`], [`Filter::composite`], [`Filter::lambda`] 等
//!
//! ## 分类规则（按顺序）
//!
//! 1. `Any`：变量和条件要么都给出，要么都不给出
//! 2. `All`：变量必须是非空字符串，条件必须是过滤器
//! 3. 有 `filters` 且 `path`/`operator`/`value1`/`value2` 都不存在 → Composite
//! 4. 无 `filters`、有 `path`，并且有 `operator` + `value1` 或 `test` → Leaf
//! 5. 其他组合 → 记录诊断错误并构造失败

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::FilterError;
use crate::operator::FilterOperator;

/// 自定义过滤函数，参数为 path 处的值
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// 自定义比较函数，`None` 表示不可比较
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> Option<Ordering> + Send + Sync>;

/// 一个经过校验的过滤器
#[derive(Debug, Clone)]
pub enum Filter {
    Composite(CompositeFilter),
    Leaf(LeafFilter),
    Lambda(LambdaFilter),
}

/// 用 AND 或 OR 组合的子过滤器列表（非空）
#[derive(Debug, Clone)]
pub struct CompositeFilter {
    filters: Vec<Filter>,
    and: bool,
}

/// 单个字段上的条件
#[derive(Clone)]
pub struct LeafFilter {
    path: String,
    test: LeafTest,
    /// operator 和 test 同时给出时保留的 test，只用于客户端求值
    client_test: Option<Predicate>,
    comparator: Option<Comparator>,
    case_sensitive: Option<bool>,
}

#[derive(Clone)]
pub enum LeafTest {
    Operator {
        operator: FilterOperator,
        value1: Value,
        /// 只有 BT/NB 使用
        value2: Option<Value>,
    },
    Predicate(Predicate),
}

/// 集合上的 Any/All 条件
#[derive(Debug, Clone)]
pub struct LambdaFilter {
    path: String,
    operator: FilterOperator,
    binding: Option<LambdaBinding>,
}

#[derive(Debug, Clone)]
pub struct LambdaBinding {
    variable: String,
    condition: Box<Filter>,
}

impl CompositeFilter {
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_and(&self) -> bool {
        self.and
    }
}

impl LeafFilter {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn test(&self) -> &LeafTest {
        &self.test
    }

    pub fn operator(&self) -> Option<FilterOperator> {
        match &self.test {
            LeafTest::Operator { operator, .. } => Some(*operator),
            LeafTest::Predicate(_) => None,
        }
    }

    pub fn value1(&self) -> Option<&Value> {
        match &self.test {
            LeafTest::Operator { value1, .. } => Some(value1),
            LeafTest::Predicate(_) => None,
        }
    }

    pub fn value2(&self) -> Option<&Value> {
        match &self.test {
            LeafTest::Operator { value2, .. } => value2.as_ref(),
            LeafTest::Predicate(_) => None,
        }
    }

    /// 客户端求值使用的函数：自定义 test 优先于 operator
    pub fn predicate(&self) -> Option<&Predicate> {
        match &self.test {
            LeafTest::Predicate(test) => Some(test),
            LeafTest::Operator { .. } => self.client_test.as_ref(),
        }
    }

    pub fn comparator(&self) -> Option<&Comparator> {
        self.comparator.as_ref()
    }

    pub fn case_sensitive(&self) -> Option<bool> {
        self.case_sensitive
    }
}

impl fmt::Debug for LeafFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafFilter")
            .field("path", &self.path)
            .field("test", &self.test)
            .field("client_test", &self.client_test.as_ref().map(|_| "<fn>"))
            .field("comparator", &self.comparator.as_ref().map(|_| "<fn>"))
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}

impl fmt::Debug for LeafTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafTest::Operator {
                operator,
                value1,
                value2,
            } => f
                .debug_struct("Operator")
                .field("operator", operator)
                .field("value1", value1)
                .field("value2", value2)
                .finish(),
            LeafTest::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

impl LambdaFilter {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `Any` 或 `All`
    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    /// `None` 只出现在不带参数的 `Any` 上
    pub fn binding(&self) -> Option<&LambdaBinding> {
        self.binding.as_ref()
    }
}

impl LambdaBinding {
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn condition(&self) -> &Filter {
        &self.condition
    }
}

/// 配置记录形式，对应 JSON 对象字面量
///
/// `value1: null` 与未给出 `value1` 是不同的。
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterRecord {
    pub path: Option<String>,
    pub operator: Option<String>,
    #[serde(deserialize_with = "present")]
    pub value1: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub value2: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub variable: Option<Value>,
    pub condition: Option<Box<FilterArg>>,
    pub filters: Option<Vec<FilterArg>>,
    /// `filters` 的旧名称，`filters` 优先
    #[serde(rename = "aFilters")]
    pub a_filters: Option<Vec<FilterArg>>,
    pub and: Option<bool>,
    /// `and` 的旧名称，任一为 true 即为 AND
    #[serde(rename = "bAnd")]
    pub b_and: Option<bool>,
    #[serde(skip)]
    pub test: Option<Predicate>,
    #[serde(skip)]
    pub comparator: Option<Comparator>,
    pub case_sensitive: Option<bool>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// `filters` 和 `condition` 中的元素
pub enum FilterArg {
    Record(FilterRecord),
    Built(Filter),
    /// JSON 中不是对象的元素
    Invalid(Value),
}

impl<'de> Deserialize<'de> for FilterArg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_object() {
            serde_json::from_value(value)
                .map(FilterArg::Record)
                .map_err(<D::Error as serde::de::Error>::custom)
        } else {
            Ok(FilterArg::Invalid(value))
        }
    }
}

impl From<Filter> for FilterArg {
    fn from(filter: Filter) -> Self {
        FilterArg::Built(filter)
    }
}

impl From<FilterRecord> for FilterArg {
    fn from(record: FilterRecord) -> Self {
        FilterArg::Record(record)
    }
}

impl FilterArg {
    fn is_given(&self) -> bool {
        match self {
            FilterArg::Invalid(value) => is_truthy(value),
            _ => true,
        }
    }

    fn into_filter(self, diagnostics: &mut Diagnostics) -> Result<Filter, FilterError> {
        match self {
            FilterArg::Built(filter) => Ok(filter),
            FilterArg::Record(record) => Filter::from_record(record, diagnostics),
            FilterArg::Invalid(value) => Err(shape_error(
                diagnostics,
                format!("filter in aggregation of multi filter has to be a filter, found {}", value),
            )),
        }
    }
}

impl FilterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 接受 [`FilterOperator`] 或原始字符串
    pub fn operator(mut self, operator: impl fmt::Display) -> Self {
        self.operator = Some(operator.to_string());
        self
    }

    pub fn value1(mut self, value: impl Into<Value>) -> Self {
        self.value1 = Some(value.into());
        self
    }

    pub fn value2(mut self, value: impl Into<Value>) -> Self {
        self.value2 = Some(value.into());
        self
    }

    pub fn variable(mut self, variable: impl Into<Value>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<FilterArg>) -> Self {
        self.condition = Some(Box::new(condition.into()));
        self
    }

    pub fn filters<I, F>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FilterArg>,
    {
        self.filters = Some(filters.into_iter().map(Into::into).collect());
        self
    }

    pub fn and(mut self, and: bool) -> Self {
        self.and = Some(and);
        self
    }

    pub fn test<F>(mut self, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.test = Some(Arc::new(test));
        self
    }

    pub fn comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&Value, &Value) -> Option<Ordering> + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = Some(case_sensitive);
        self
    }

    pub fn build(self, diagnostics: &mut Diagnostics) -> Result<Filter, FilterError> {
        Filter::from_record(self, diagnostics)
    }
}

/// 旧式位置参数的第一个参数
pub enum LegacyTarget {
    Path(String),
    Filters(Vec<Filter>),
}

/// 旧式位置参数的第二个参数
pub enum LegacyArg {
    And(bool),
    Test(Predicate),
    Operator(String),
}

impl Filter {
    /// 从配置记录构造并校验过滤器
    pub fn from_record(record: FilterRecord, diagnostics: &mut Diagnostics) -> Result<Filter, FilterError> {
        let FilterRecord {
            path,
            operator,
            value1,
            value2,
            variable,
            condition,
            filters,
            a_filters,
            and,
            b_and,
            test,
            comparator,
            case_sensitive,
        } = record;
        let filters = filters.or(a_filters);
        let and = and.unwrap_or(false) || b_and.unwrap_or(false);

        let operator = match operator.as_deref() {
            Some(token) => match token.parse::<FilterOperator>() {
                Ok(op) => Some(op),
                Err(err) => {
                    diagnostics.error(err.to_string());
                    return Err(err);
                }
            },
            None => None,
        };

        if let Some(op) = operator.filter(FilterOperator::is_lambda) {
            let binding = if op == FilterOperator::Any {
                let has_variable = variable.as_ref().is_some_and(is_truthy);
                let has_condition = condition.as_deref().is_some_and(FilterArg::is_given);
                match (has_variable, has_condition) {
                    (true, true) => Some(lambda_binding(variable, condition, diagnostics)?),
                    // 不带参数的 Any
                    (false, false) => None,
                    _ => return Err(FilterError::PartialAnyArguments),
                }
            } else {
                Some(lambda_binding(variable, condition, diagnostics)?)
            };

            let Some(path) = path else {
                return Err(shape_error(diagnostics, format!("'{}' filters require a collection path", op)));
            };
            tracing::debug!(%path, operator = %op, "lambda filter constructed");
            return Ok(Filter::Lambda(LambdaFilter {
                path,
                operator: op,
                binding,
            }));
        }

        if variable.is_some() || condition.is_some() {
            diagnostics.warn("'variable' and 'condition' are only used by the 'Any' and 'All' operators");
        }

        if let Some(filters) = filters {
            let path_given = path.as_deref().is_some_and(|p| !p.is_empty());
            let value_given = |value: &Option<Value>| value.as_ref().is_some_and(is_truthy);
            if path_given || operator.is_some() || value_given(&value1) || value_given(&value2) {
                return Err(shape_error(
                    diagnostics,
                    "'filters' cannot be combined with 'path', 'operator', 'value1' or 'value2'".to_string(),
                ));
            }
            if filters.is_empty() {
                return Err(shape_error(diagnostics, "'filters' must not be empty".to_string()));
            }
            let filters = filters
                .into_iter()
                .map(|arg| arg.into_filter(diagnostics))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(count = filters.len(), and, "multi filter constructed");
            return Ok(Filter::Composite(CompositeFilter { filters, and }));
        }

        let Some(path) = path else {
            return Err(shape_error(diagnostics, "neither 'path' nor 'filters' given".to_string()));
        };

        let (test, client_test) = match (operator, value1, test) {
            (Some(operator), Some(value1), client_test) => {
                if client_test.is_some() {
                    diagnostics.warn(format!(
                        "filter on '{}' has both an operator and a test function, the test function is only used for client-side evaluation",
                        path
                    ));
                }
                if operator.is_range() && value2.is_none() {
                    return Err(FilterError::MissingSecondValue(operator));
                }
                let test = LeafTest::Operator {
                    operator,
                    value1,
                    value2,
                };
                (test, client_test)
            }
            (_, _, Some(test)) => (LeafTest::Predicate(test), None),
            (Some(operator), None, None) => {
                return Err(shape_error(
                    diagnostics,
                    format!("operator '{}' on '{}' requires 'value1'", operator, path),
                ));
            }
            (None, _, None) => {
                return Err(shape_error(
                    diagnostics,
                    format!("filter on '{}' needs an operator or a test function", path),
                ));
            }
        };

        tracing::debug!(%path, operator = ?operator, "filter constructed");
        Ok(Filter::Leaf(LeafFilter {
            path,
            test,
            client_test,
            comparator,
            case_sensitive,
        }))
    }

    /// 解析 JSON 文本形式的配置记录
    pub fn from_json(input: &str, diagnostics: &mut Diagnostics) -> Result<Filter, FilterError> {
        let record: FilterRecord = serde_json::from_str(input)?;
        Filter::from_record(record, diagnostics)
    }

    pub fn from_value(value: Value, diagnostics: &mut Diagnostics) -> Result<Filter, FilterError> {
        let record: FilterRecord = serde_json::from_value(value)?;
        Filter::from_record(record, diagnostics)
    }

    /// 旧式位置参数：`(path 或 filters, operator / test / and, value1, value2)`
    ///
    /// 位置参数形式不能表达 `Any`/`All`。
    pub fn positional(
        target: LegacyTarget,
        arg: LegacyArg,
        value1: Option<Value>,
        value2: Option<Value>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Filter, FilterError> {
        let mut record = FilterRecord {
            value1,
            value2,
            ..FilterRecord::default()
        };

        match target {
            LegacyTarget::Path(path) => record.path = Some(path),
            LegacyTarget::Filters(filters) => {
                record.filters = Some(filters.into_iter().map(FilterArg::Built).collect())
            }
        }

        match arg {
            LegacyArg::And(and) => record.and = Some(and),
            LegacyArg::Test(test) => record.test = Some(test),
            LegacyArg::Operator(operator) => {
                if operator == FilterOperator::Any.as_str() || operator == FilterOperator::All.as_str() {
                    return Err(FilterError::LambdaInPositionalForm);
                }
                record.operator = Some(operator);
            }
        }

        Filter::from_record(record, diagnostics)
    }

    /// `path operator value1`，不接受 BT/NB 和 Any/All
    pub fn leaf(path: impl Into<String>, operator: FilterOperator, value1: impl Into<Value>) -> Result<Filter, FilterError> {
        if operator.is_lambda() {
            return Err(FilterError::InvalidShape(format!(
                "'{}' is a lambda operator, use Filter::lambda",
                operator
            )));
        }
        if operator.is_range() {
            return Err(FilterError::MissingSecondValue(operator));
        }
        Ok(Filter::Leaf(LeafFilter {
            path: path.into(),
            test: LeafTest::Operator {
                operator,
                value1: value1.into(),
                value2: None,
            },
            client_test: None,
            comparator: None,
            case_sensitive: None,
        }))
    }

    /// 带两个值的叶子，通常用于 BT/NB
    pub fn range(
        path: impl Into<String>,
        operator: FilterOperator,
        value1: impl Into<Value>,
        value2: impl Into<Value>,
    ) -> Result<Filter, FilterError> {
        if operator.is_lambda() {
            return Err(FilterError::InvalidShape(format!(
                "'{}' is a lambda operator, use Filter::lambda",
                operator
            )));
        }
        Ok(Filter::Leaf(LeafFilter {
            path: path.into(),
            test: LeafTest::Operator {
                operator,
                value1: value1.into(),
                value2: Some(value2.into()),
            },
            client_test: None,
            comparator: None,
            case_sensitive: None,
        }))
    }

    pub fn test<F>(path: impl Into<String>, test: F) -> Filter
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Filter::Leaf(LeafFilter {
            path: path.into(),
            test: LeafTest::Predicate(Arc::new(test)),
            client_test: None,
            comparator: None,
            case_sensitive: None,
        })
    }

    pub fn composite(filters: Vec<Filter>, and: bool) -> Result<Filter, FilterError> {
        if filters.is_empty() {
            return Err(FilterError::InvalidShape("'filters' must not be empty".to_string()));
        }
        Ok(Filter::Composite(CompositeFilter { filters, and }))
    }

    /// 调用方保证 `filters` 非空
    pub(crate) fn combined(filters: Vec<Filter>, and: bool) -> Filter {
        debug_assert!(!filters.is_empty());
        Filter::Composite(CompositeFilter { filters, and })
    }

    /// AND 组合
    pub fn all_of(filters: Vec<Filter>) -> Result<Filter, FilterError> {
        Filter::composite(filters, true)
    }

    /// OR 组合
    pub fn any_of(filters: Vec<Filter>) -> Result<Filter, FilterError> {
        Filter::composite(filters, false)
    }

    pub fn lambda(
        path: impl Into<String>,
        operator: FilterOperator,
        variable: impl Into<String>,
        condition: Filter,
    ) -> Result<Filter, FilterError> {
        if !operator.is_lambda() {
            return Err(FilterError::InvalidShape(format!("'{}' is not a lambda operator", operator)));
        }
        let variable = variable.into();
        if variable.is_empty() {
            return Err(FilterError::InvalidLambdaVariable);
        }
        Ok(Filter::Lambda(LambdaFilter {
            path: path.into(),
            operator,
            binding: Some(LambdaBinding {
                variable,
                condition: Box::new(condition),
            }),
        }))
    }

    /// 不带参数的 `Any`：集合非空
    pub fn non_empty(path: impl Into<String>) -> Filter {
        Filter::Lambda(LambdaFilter {
            path: path.into(),
            operator: FilterOperator::Any,
            binding: None,
        })
    }

    /// 只对叶子生效
    pub fn with_comparator<F>(self, comparator: F) -> Filter
    where
        F: Fn(&Value, &Value) -> Option<Ordering> + Send + Sync + 'static,
    {
        match self {
            Filter::Leaf(mut leaf) => {
                leaf.comparator = Some(Arc::new(comparator));
                Filter::Leaf(leaf)
            }
            other => other,
        }
    }

    /// 只对叶子生效
    pub fn with_case_sensitive(self, case_sensitive: bool) -> Filter {
        match self {
            Filter::Leaf(mut leaf) => {
                leaf.case_sensitive = Some(case_sensitive);
                Filter::Leaf(leaf)
            }
            other => other,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Filter::Composite(_) => None,
            Filter::Leaf(leaf) => Some(leaf.path()),
            Filter::Lambda(lambda) => Some(lambda.path()),
        }
    }

    pub fn operator(&self) -> Option<FilterOperator> {
        match self {
            Filter::Composite(_) => None,
            Filter::Leaf(leaf) => leaf.operator(),
            Filter::Lambda(lambda) => Some(lambda.operator()),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Filter::Composite(_))
    }

    pub fn children(&self) -> Option<&[Filter]> {
        match self {
            Filter::Composite(composite) => Some(composite.filters()),
            _ => None,
        }
    }
}

fn lambda_binding(
    variable: Option<Value>,
    condition: Option<Box<FilterArg>>,
    diagnostics: &mut Diagnostics,
) -> Result<LambdaBinding, FilterError> {
    let variable = match variable {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => return Err(FilterError::InvalidLambdaVariable),
    };
    let condition = match condition.map(|arg| *arg) {
        Some(FilterArg::Built(filter)) => filter,
        Some(FilterArg::Record(record)) => Filter::from_record(record, diagnostics)?,
        Some(FilterArg::Invalid(_)) | None => return Err(FilterError::MissingLambdaCondition),
    };
    Ok(LambdaBinding {
        variable,
        condition: Box::new(condition),
    })
}

fn shape_error(diagnostics: &mut Diagnostics, message: String) -> FilterError {
    diagnostics.error(format!("Wrong parameters defined for filter: {}", message));
    FilterError::InvalidShape(message)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
