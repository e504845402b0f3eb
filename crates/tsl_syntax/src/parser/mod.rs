//! TSL Parser
//!
//! chumsky 组合子解析器。词法流来自 logos，
//! 所有 AST 节点携带字节偏移 Span

pub mod decl;
pub mod expr;
pub mod helpers;
pub mod stmt;

pub use helpers::ParserError;

use crate::ast::Program;
use crate::lexer::Token;
use chumsky::prelude::*;
use chumsky::Stream;
use logos::Logos;

/// 解析 TSL 源码为 Program
///
/// 词法或语法错误都通过 `ParserError` 返回，调用方（compile driver）
/// 将其折叠为 `ParseFailed`
pub fn parse_program(source: &str) -> Result<Program, Vec<ParserError>> {
    let mut tokens = Vec::new();
    for (token, span) in Token::lexer(source).spanned() {
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(vec![Simple::custom(span, "unknown token")]),
        }
    }

    let eoi = source.len()..source.len() + 1;
    decl::program_parser().parse(Stream::from_iter(eoi, tokens.into_iter()))
}
