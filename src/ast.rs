//! 过滤器编译后的通用表达式树

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// 表达式树的节点, `origin` 记录生成该节点的原始运算符 (例如 "AND", "BT")
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    #[serde(flatten)]
    pub kind: ExpressionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ExpressionKind {
    /// 逻辑与/或
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// 二元比较
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// 逻辑非
    Unary { op: UnaryOp, arg: Box<Expression> },
    /// 集合上的 any/all, 不带参数的 any 没有变量和条件
    Lambda {
        op: LambdaOp,
        #[serde(rename = "ref")]
        reference: Box<Expression>,
        variable: Option<Box<Expression>>,
        condition: Option<Box<Expression>>,
    },
    /// 绑定路径
    Reference { path: String },
    /// 字面量值
    Literal { value: Value },
    /// lambda 变量
    Variable { name: String },
    /// 字符串函数调用
    Call { name: Function, args: Vec<Expression> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LambdaOp {
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Function {
    Contains,
    StartsWith,
    EndsWith,
}

impl LogicalOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThanOrEqual => ">=",
        }
    }
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ExpressionKind> for Expression {
    fn from(kind: ExpressionKind) -> Self {
        Expression { kind, origin: None }
    }
}

impl Expression {
    pub fn logical(op: LogicalOp, left: Expression, right: Expression) -> Self {
        ExpressionKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        ExpressionKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    pub fn not(arg: Expression) -> Self {
        ExpressionKind::Unary {
            op: UnaryOp::Not,
            arg: Box::new(arg),
        }
        .into()
    }

    pub fn lambda(
        op: LambdaOp,
        reference: Expression,
        variable: Option<Expression>,
        condition: Option<Expression>,
    ) -> Self {
        ExpressionKind::Lambda {
            op,
            reference: Box::new(reference),
            variable: variable.map(Box::new),
            condition: condition.map(Box::new),
        }
        .into()
    }

    pub fn reference(path: impl Into<String>) -> Self {
        ExpressionKind::Reference { path: path.into() }.into()
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ExpressionKind::Literal { value: value.into() }.into()
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ExpressionKind::Variable { name: name.into() }.into()
    }

    pub fn call(name: Function, args: Vec<Expression>) -> Self {
        ExpressionKind::Call { name, args }.into()
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// 节点类型名称, 用于错误信息
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ExpressionKind::Logical { .. } => "Logical",
            ExpressionKind::Binary { .. } => "Binary",
            ExpressionKind::Unary { .. } => "Unary",
            ExpressionKind::Lambda { .. } => "Lambda",
            ExpressionKind::Reference { .. } => "Reference",
            ExpressionKind::Literal { .. } => "Literal",
            ExpressionKind::Variable { .. } => "Variable",
            ExpressionKind::Call { .. } => "Call",
        }
    }
}
