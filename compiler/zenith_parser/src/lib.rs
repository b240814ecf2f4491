//! Syntax analysis for the Zenith language
//!
//! The parser is a plain recursive-descent walk over the token stream. One
//! deliberate grammar property worth knowing about: binary operators have
//! *no precedence* and associate strictly left-to-right, so `2 + 3 * 4`
//! parses as `(2 + 3) * 4`.

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::*;
