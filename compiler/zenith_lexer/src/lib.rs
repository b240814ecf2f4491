//! Lexical analysis for the Zenith surface language
//!
//! Turns source text into a flat token stream. Tokens keep their raw lexeme
//! so later stages can recover literal text exactly as written.

pub mod lexer;
pub mod token;

pub use lexer::*;
pub use token::*;
