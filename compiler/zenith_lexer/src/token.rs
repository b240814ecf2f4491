//! Token definitions for the Zenith language

use serde::{Deserialize, Serialize};
use std::fmt;
use zenith_common::Span;

/// Token types in the Zenith language
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    IntegerLiteral(i64),
    StringLiteral(String),
    BooleanLiteral(bool),

    // Identifiers
    Identifier(String),

    // Keywords
    KeywordIf,
    KeywordElsif,
    KeywordElse,
    KeywordFor,
    KeywordSelect,
    KeywordCase,
    KeywordRet,
    KeywordStruct,
    KeywordAnd,
    KeywordOr,

    // Operators
    Plus,          // +
    Minus,         // -
    Star,          // * (multiply or pointer suffix)
    Slash,         // /
    Ampersand,     // &
    Pipe,          // |
    Caret,         // ^
    Equal,         // = (equality or assignment, by position)
    Greater,       // >
    Less,          // <
    GreaterEqual,  // >=
    LessEqual,     // <=
    NotEqual,      // <>
    PlusPlus,      // ++
    MinusMinus,    // --

    // Delimiters
    LeftParen,     // (
    RightParen,    // )
    LeftBrace,     // {
    RightBrace,    // }
    LeftBracket,   // [
    RightBracket,  // ]
    Colon,         // :
    Comma,         // ,
    Dot,           // .
    Semicolon,     // ;

    // Special
    EndOfFile,

    // Error token for best-effort recovery
    Error(String),
}

impl TokenKind {
    /// Keyword lookup for identifier-shaped lexemes.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "if" => TokenKind::KeywordIf,
            "elsif" => TokenKind::KeywordElsif,
            "else" => TokenKind::KeywordElse,
            "for" => TokenKind::KeywordFor,
            "select" => TokenKind::KeywordSelect,
            "case" => TokenKind::KeywordCase,
            "ret" => TokenKind::KeywordRet,
            "struct" => TokenKind::KeywordStruct,
            "and" => TokenKind::KeywordAnd,
            "or" => TokenKind::KeywordOr,
            "true" => TokenKind::BooleanLiteral(true),
            "false" => TokenKind::BooleanLiteral(false),
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntegerLiteral(n) => write!(f, "{}", n),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenKind::BooleanLiteral(b) => write!(f, "{}", b),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Error(msg) => write!(f, "ERROR: {}", msg),
            _ => {
                let text = match self {
                    TokenKind::KeywordIf => "if",
                    TokenKind::KeywordElsif => "elsif",
                    TokenKind::KeywordElse => "else",
                    TokenKind::KeywordFor => "for",
                    TokenKind::KeywordSelect => "select",
                    TokenKind::KeywordCase => "case",
                    TokenKind::KeywordRet => "ret",
                    TokenKind::KeywordStruct => "struct",
                    TokenKind::KeywordAnd => "and",
                    TokenKind::KeywordOr => "or",
                    TokenKind::Plus => "+",
                    TokenKind::Minus => "-",
                    TokenKind::Star => "*",
                    TokenKind::Slash => "/",
                    TokenKind::Ampersand => "&",
                    TokenKind::Pipe => "|",
                    TokenKind::Caret => "^",
                    TokenKind::Equal => "=",
                    TokenKind::Greater => ">",
                    TokenKind::Less => "<",
                    TokenKind::GreaterEqual => ">=",
                    TokenKind::LessEqual => "<=",
                    TokenKind::NotEqual => "<>",
                    TokenKind::PlusPlus => "++",
                    TokenKind::MinusMinus => "--",
                    TokenKind::LeftParen => "(",
                    TokenKind::RightParen => ")",
                    TokenKind::LeftBrace => "{",
                    TokenKind::RightBrace => "}",
                    TokenKind::LeftBracket => "[",
                    TokenKind::RightBracket => "]",
                    TokenKind::Colon => ":",
                    TokenKind::Comma => ",",
                    TokenKind::Dot => ".",
                    TokenKind::Semicolon => ";",
                    TokenKind::EndOfFile => "<eof>",
                    _ => unreachable!(),
                };
                write!(f, "{}", text)
            }
        }
    }
}

/// A token with its raw lexeme and source span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token, exactly as written (string literals
    /// keep their quotes).
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self { kind, text: text.into(), span }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::EndOfFile)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}
