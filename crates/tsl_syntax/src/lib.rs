//! TSL Syntax
//!
//! Tiny Shading Language 的语法前端：logos 词法分析、chumsky 语法分析、
//! AST 定义、AST 内存 arena 以及面向编译 driver 的回调接口。

pub mod arena;
pub mod ast;
pub mod frontend;
pub mod lexer;
pub mod parser;

pub use arena::{AstRegionGuard, DeclHandle};
pub use ast::{DataType, Decl, Expr, ExprKind, Program, Stmt};
pub use frontend::ParserCallbacks;
pub use parser::parse_program;
