use quill_ast::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    // trivia / eof / error
    Eof,
    /// Lexing error (unexpected character, unterminated string)
    Error(String),
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semicolon,
    // assignment
    Eq,
    // arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // equality
    EqEq,
    BangEq,
    // relational
    Lt,
    Le,
    Gt,
    Ge,
    // unary
    Bang,
    // idents / keywords
    Ident(String),
    KwAnd,
    KwOr,
    KwVar,
    KwFun,
    KwClass,
    KwThis,
    KwSuper,
    KwTrue,
    KwFalse,
    KwNil,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwBreak,
    KwContinue,
    KwReturn,
    KwPrint,
    // literals
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
}
