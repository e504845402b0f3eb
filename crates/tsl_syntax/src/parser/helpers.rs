//! Parser Helpers
//!
//! 标识符、类型和字面量的公共解析器

use crate::ast::{DataType, Literal};
use crate::lexer::Token;
use chumsky::prelude::*;

pub type ParserError = Simple<Token>;

/// 解析标识符
pub fn ident_parser() -> impl Parser<Token, String, Error = ParserError> + Clone {
    select! { Token::Ident(name) => name }
}

/// 解析数据类型
///
/// 未知的标识符按 struct 类型名处理，是否真的存在由 codegen 检查
pub fn type_parser() -> impl Parser<Token, DataType, Error = ParserError> + Clone {
    choice((
        just(Token::TypeVoid).to(DataType::Void),
        just(Token::TypeInt).to(DataType::Int),
        just(Token::TypeFloat3).to(DataType::Float3),
        just(Token::TypeFloat4).to(DataType::Float4),
        just(Token::TypeFloat).to(DataType::Float),
        just(Token::TypeDouble).to(DataType::Double),
        just(Token::TypeBool).to(DataType::Bool),
        just(Token::TypeMatrix).to(DataType::Matrix),
        just(Token::TypeClosure).to(DataType::Closure),
        ident_parser().map(DataType::Struct),
    ))
}

/// 解析字面量（允许负号，用于参数默认值和全局参数初始化）
pub fn literal_parser() -> impl Parser<Token, Literal, Error = ParserError> + Clone {
    let value = select! {
        Token::Int(x) => Literal::Int(x),
        Token::Float(s) => Literal::Float(s.parse().unwrap_or(0.0)),
        Token::True => Literal::Bool(true),
        Token::False => Literal::Bool(false),
    };

    just(Token::Minus)
        .or_not()
        .then(value)
        .try_map(|(neg, lit), span| match (neg, lit) {
            (None, lit) => Ok(lit),
            (Some(_), Literal::Int(x)) => Ok(Literal::Int(-x)),
            (Some(_), Literal::Float(x)) => Ok(Literal::Float(-x)),
            (Some(_), Literal::Bool(_)) => {
                Err(Simple::custom(span, "cannot negate a bool literal"))
            }
        })
}
