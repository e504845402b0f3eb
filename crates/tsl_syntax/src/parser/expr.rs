//! Expression Parser
//!
//! 表达式解析：字面量、变量、运算符、调用、向量构造和 make_closure

use super::helpers::{ident_parser, ParserError};
use crate::ast::*;
use crate::lexer::Token;
use chumsky::prelude::*;

fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
    let span = lhs.span.start..rhs.span.end;
    Expr {
        kind: ExprKind::Binary(Box::new(lhs), op, Box::new(rhs)),
        span,
    }
}

/// 解析表达式 (公共接口)
pub fn expr_parser() -> impl Parser<Token, Expr, Error = ParserError> + Clone {
    recursive(|expr| {
        // 字面量
        let literal = select! {
            Token::Int(x) => Literal::Int(x),
            Token::Float(s) => Literal::Float(s.parse().unwrap_or(0.0)),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
        };

        let val = literal.map_with_span(|lit, span| Expr {
            kind: ExprKind::Literal(lit),
            span,
        });

        // 括号包围的参数列表
        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        // make_closure<Name>(args...)
        let make_closure = just(Token::MakeClosure)
            .ignore_then(ident_parser().delimited_by(just(Token::Lt), just(Token::Gt)))
            .then(args.clone())
            .map_with_span(|(name, args), span| Expr {
                kind: ExprKind::MakeClosure { name, args },
                span,
            });

        // float3(x, y, z) / float4(x, y, z, w)
        let vec_ctor = choice((
            just(Token::TypeFloat3).to(DataType::Float3),
            just(Token::TypeFloat4).to(DataType::Float4),
        ))
        .then(args.clone())
        .map_with_span(|(ty, args), span| Expr {
            kind: ExprKind::VecCtor { ty, args },
            span,
        });

        // 函数调用: func(arg1, arg2)
        let call = ident_parser()
            .then(args)
            .map_with_span(|(callee, args), span| Expr {
                kind: ExprKind::Call { callee, args },
                span,
            });

        // 变量
        let ident = ident_parser().map_with_span(|name, span| Expr {
            kind: ExprKind::Variable(name),
            span,
        });

        let paren = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = make_closure
            .or(vec_ctor)
            .or(val)
            .or(call)
            .or(ident)
            .or(paren);

        // 后缀成员访问: v.x / s.field，可以链式
        let member = atom
            .then(just(Token::Dot).ignore_then(ident_parser()).repeated())
            .foldl(|base, field| {
                let span = base.span.clone();
                Expr {
                    kind: ExprKind::Member {
                        base: Box::new(base),
                        field,
                    },
                    span,
                }
            });

        // 一元运算
        let unary_op = just(Token::Minus)
            .to(UnaryOp::Neg)
            .or(just(Token::Bang).to(UnaryOp::Not));
        let unary = unary_op.repeated().then(member).foldr(|op, operand| {
            let span = operand.span.clone();
            Expr {
                kind: ExprKind::Unary(op, Box::new(operand)),
                span,
            }
        });

        // 乘除模
        let product_op = choice((
            just(Token::Star).to(BinaryOp::Mul),
            just(Token::Slash).to(BinaryOp::Div),
            just(Token::Percent).to(BinaryOp::Mod),
        ));
        let product = unary
            .clone()
            .then(product_op.then(unary).repeated())
            .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs));

        // 加减
        let sum_op = just(Token::Plus)
            .to(BinaryOp::Add)
            .or(just(Token::Minus).to(BinaryOp::Sub));
        let sum = product
            .clone()
            .then(sum_op.then(product).repeated())
            .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs));

        // 比较
        let cmp_op = choice((
            just(Token::Leq).to(BinaryOp::Leq),
            just(Token::Geq).to(BinaryOp::Geq),
            just(Token::Lt).to(BinaryOp::Lt),
            just(Token::Gt).to(BinaryOp::Gt),
        ));
        let comparison = sum
            .clone()
            .then(cmp_op.then(sum).repeated())
            .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs));

        // 相等
        let eq_op = just(Token::EqEq)
            .to(BinaryOp::Eq)
            .or(just(Token::NotEq).to(BinaryOp::Neq));
        let equality = comparison
            .clone()
            .then(eq_op.then(comparison).repeated())
            .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs));

        // 逻辑与、或
        let logic_and = equality
            .clone()
            .then(just(Token::And).to(BinaryOp::And).then(equality).repeated())
            .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs));

        logic_and
            .clone()
            .then(just(Token::Or).to(BinaryOp::Or).then(logic_and).repeated())
            .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs))
    })
}
