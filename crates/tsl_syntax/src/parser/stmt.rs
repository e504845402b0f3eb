//! Statement Parser
//!
//! 语句解析：变量声明、赋值、控制流、return 和块

use super::expr::expr_parser;
use super::helpers::{ident_parser, type_parser, ParserError};
use crate::ast::*;
use crate::lexer::Token;
use chumsky::prelude::*;

/// 解析单条语句 (公共接口)
pub fn stmt_parser() -> impl Parser<Token, Stmt, Error = ParserError> + Clone {
    recursive(|stmt| {
        let expr = expr_parser();

        let block = stmt
            .clone()
            .repeated()
            .delimited_by(just(Token::LBrace), just(Token::RBrace));

        // 变量声明: float x = 1.0; / Foo f;
        let var_decl = type_parser()
            .then(ident_parser())
            .then(just(Token::Eq).ignore_then(expr.clone()).or_not())
            .then_ignore(just(Token::Semicolon))
            .map_with_span(|((ty, name), init), span| Stmt::VarDecl {
                span,
                name,
                ty,
                init,
            });

        // 赋值目标: x 或 v.x
        let assign_target = ident_parser()
            .then(just(Token::Dot).ignore_then(ident_parser()).or_not())
            .map(|(base, field)| match field {
                Some(field) => AssignTarget::Member { base, field },
                None => AssignTarget::Variable(base),
            });

        let assign = assign_target
            .then_ignore(just(Token::Eq))
            .then(expr.clone())
            .then_ignore(just(Token::Semicolon))
            .map_with_span(|(target, value), span| Stmt::Assign {
                span,
                target,
                value,
            });

        // if (cond) { ... } else <block 或单条语句，覆盖 else if>
        let if_stmt = just(Token::If)
            .ignore_then(
                expr.clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block.clone())
            .then(
                just(Token::Else)
                    .ignore_then(block.clone().or(stmt.clone().map(|s| vec![s])))
                    .or_not(),
            )
            .map_with_span(|((condition, then_block), else_block), span| Stmt::If {
                span,
                condition,
                then_block,
                else_block,
            });

        // while (cond) { ... }
        let while_stmt = just(Token::While)
            .ignore_then(
                expr.clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block.clone())
            .map_with_span(|(condition, body), span| Stmt::While {
                span,
                condition,
                body,
            });

        let break_stmt = just(Token::Break)
            .then_ignore(just(Token::Semicolon))
            .map_with_span(|_, span| Stmt::Break { span });

        let continue_stmt = just(Token::Continue)
            .then_ignore(just(Token::Semicolon))
            .map_with_span(|_, span| Stmt::Continue { span });

        let return_stmt = just(Token::Return)
            .ignore_then(expr.clone().or_not())
            .then_ignore(just(Token::Semicolon))
            .map_with_span(|value, span| Stmt::Return { span, value });

        let block_stmt = block.map_with_span(|body, span| Stmt::Block { span, body });

        let expr_stmt = expr
            .then_ignore(just(Token::Semicolon))
            .map_with_span(|expr, span| Stmt::Expression { span, expr });

        choice((
            if_stmt,
            while_stmt,
            break_stmt,
            continue_stmt,
            return_stmt,
            block_stmt,
            var_decl,
            assign,
            expr_stmt,
        ))
    })
}
