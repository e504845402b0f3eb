pub mod expr;
pub mod stmt;
pub mod types;

// 重新导出核心类型，方便外部直接使用 tsl_syntax::ast::Expr 等
pub use expr::{BinaryOp, Expr, ExprKind, Literal, Span, UnaryOp};
pub use stmt::{AssignTarget, Decl, Field, Param, Stmt};
pub use types::DataType;

// 整个 shader 模块的数据结构
// 这里的 Decl 指的是顶层定义：shader 入口、普通函数、struct 和全局参数
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}
