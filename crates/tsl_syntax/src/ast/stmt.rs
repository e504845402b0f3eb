//! Statement & Declaration AST
//!
//! 语句和顶层定义节点

use super::expr::{Expr, Literal, Span};
use super::types::DataType;

/// 函数/shader 参数
///
/// shader 入口的参数带方向（in/out）并可携带默认字面量，
/// 普通函数的参数恒为 in 且没有默认值
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
    pub is_output: bool,
    pub default: Option<Literal>,
}

/// 结构体字段
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: DataType,
}

/// 赋值目标
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Variable(String),
    /// v.x = ... / s.field = ...
    Member { base: String, field: String },
}

/// 语句
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl {
        span: Span,
        name: String,
        ty: DataType,
        init: Option<Expr>,
    },
    Assign {
        span: Span,
        target: AssignTarget,
        value: Expr,
    },
    If {
        span: Span,
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    While {
        span: Span,
        condition: Expr,
        body: Vec<Stmt>,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Return {
        span: Span,
        value: Option<Expr>,
    },
    Expression {
        span: Span,
        expr: Expr,
    },
    Block {
        span: Span,
        body: Vec<Stmt>,
    },
}

/// 顶层定义
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// 普通函数或 shader 入口（is_shader 区分）
    Function {
        span: Span,
        name: String,
        params: Vec<Param>,
        return_type: DataType,
        body: Vec<Stmt>,
        is_shader: bool,
    },
    /// struct 声明
    Structure {
        span: Span,
        name: String,
        fields: Vec<Field>,
    },
    /// 全局 shader 参数: float roughness = 0.5;
    GlobalParam {
        span: Span,
        name: String,
        ty: DataType,
        init: Literal,
    },
}

impl Decl {
    /// 定义的名称
    pub fn name(&self) -> &str {
        match self {
            Decl::Function { name, .. } => name,
            Decl::Structure { name, .. } => name,
            Decl::GlobalParam { name, .. } => name,
        }
    }
}
