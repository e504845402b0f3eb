use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // --- 关键字 (Keywords) ---
    #[token("shader")]
    Shader,
    #[token("in")]
    In,
    #[token("out")]
    Out,
    #[token("struct")]
    Struct,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("make_closure")]
    MakeClosure,

    // 字面量关键字
    #[token("true")]
    True,
    #[token("false")]
    False,

    // --- 基础类型关键字 ---
    #[token("void")]
    TypeVoid,
    #[token("int")]
    TypeInt,
    #[token("float3")]
    TypeFloat3,
    #[token("float4")]
    TypeFloat4,
    #[token("float")]
    TypeFloat,
    #[token("double")]
    TypeDouble,
    #[token("bool")]
    TypeBool,
    #[token("matrix")]
    TypeMatrix,
    #[token("closure")]
    TypeClosure,

    // --- 符号 (Symbols) ---
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Leq,
    #[token(">=")]
    Geq,

    #[token("!")]
    Bang,
    #[token("&&")]
    And,
    #[token("||")]
    Or,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,

    // --- 复杂数据 (Data) ---
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Int(i32),

    // 为了 Hash 实现，浮点字面量先存 String，AST 阶段再转 f32
    #[regex(r"[0-9]+\.[0-9]*", |lex| lex.slice().to_string())]
    Float(String),

    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    Comment,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_shader_decl() {
        let tokens = lex("shader entry(out float o){ o = 3.5; }");
        assert_eq!(tokens[0], Token::Shader);
        assert_eq!(tokens[1], Token::Ident("entry".to_string()));
        assert_eq!(tokens[3], Token::Out);
        assert_eq!(tokens[4], Token::TypeFloat);
        assert!(tokens.contains(&Token::Float("3.5".to_string())));
    }

    #[test]
    fn test_float3_not_split() {
        // float3 必须整体识别，不能拆成 float + 3
        let tokens = lex("float3 v");
        assert_eq!(tokens[0], Token::TypeFloat3);
    }

    #[test]
    fn test_make_closure() {
        let tokens = lex("make_closure<Lambert>(0.5)");
        assert_eq!(tokens[0], Token::MakeClosure);
        assert_eq!(tokens[1], Token::Lt);
        assert_eq!(tokens[2], Token::Ident("Lambert".to_string()));
        assert_eq!(tokens[3], Token::Gt);
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = lex("int a; // trailing\n/* block */ int b;");
        assert_eq!(
            tokens,
            vec![
                Token::TypeInt,
                Token::Ident("a".to_string()),
                Token::Semicolon,
                Token::TypeInt,
                Token::Ident("b".to_string()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_unknown_token_fails() {
        let mut lexer = Token::lexer("float @");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
    }
}
