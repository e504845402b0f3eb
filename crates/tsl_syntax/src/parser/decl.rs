//! Declaration Parser
//!
//! 顶层定义解析：shader 入口、普通函数、struct 声明和全局参数

use super::helpers::{ident_parser, literal_parser, type_parser, ParserError};
use super::stmt::stmt_parser;
use crate::ast::*;
use crate::lexer::Token;
use chumsky::prelude::*;

/// 解析参数: [in|out] type name [= literal]
fn param_parser() -> impl Parser<Token, Param, Error = ParserError> + Clone {
    just(Token::In)
        .to(false)
        .or(just(Token::Out).to(true))
        .or_not()
        .then(type_parser())
        .then(ident_parser())
        .then(just(Token::Eq).ignore_then(literal_parser()).or_not())
        .map(|(((direction, ty), name), default)| Param {
            name,
            ty,
            is_output: direction.unwrap_or(false),
            default,
        })
}

/// 解析整个程序 (公共接口)
pub fn program_parser() -> impl Parser<Token, Program, Error = ParserError> {
    let params = param_parser()
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let body = stmt_parser()
        .repeated()
        .delimited_by(just(Token::LBrace), just(Token::RBrace));

    // shader entry(in float x, out float y) { ... }
    let shader = just(Token::Shader)
        .ignore_then(ident_parser())
        .then(params.clone())
        .then(body.clone())
        .map_with_span(|((name, params), body), span| Decl::Function {
            span,
            name,
            params,
            return_type: DataType::Void,
            body,
            is_shader: true,
        });

    // float helper(float x) { ... }
    let function = type_parser()
        .then(ident_parser())
        .then(params)
        .then(body)
        .map_with_span(|(((return_type, name), params), body), span| Decl::Function {
            span,
            name,
            params,
            return_type,
            body,
            is_shader: false,
        });

    // struct Foo { float a; int b; };
    let field = type_parser()
        .then(ident_parser())
        .then_ignore(just(Token::Semicolon))
        .map(|(ty, name)| Field { name, ty });
    let structure = just(Token::Struct)
        .ignore_then(ident_parser())
        .then(
            field
                .repeated()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .then_ignore(just(Token::Semicolon).or_not())
        .map_with_span(|(name, fields), span| Decl::Structure { span, name, fields });

    // 全局参数: float roughness = 0.5;
    let global = type_parser()
        .then(ident_parser())
        .then_ignore(just(Token::Eq))
        .then(literal_parser())
        .then_ignore(just(Token::Semicolon))
        .map_with_span(|((ty, name), init), span| Decl::GlobalParam {
            span,
            name,
            ty,
            init,
        });

    choice((shader, structure, global, function))
        .repeated()
        .then_ignore(end())
        .map(|decls| Program { decls })
}
