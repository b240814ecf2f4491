//! Error handling utilities for the Zenith compiler

use thiserror::Error;

/// The main error type for the Zenith compiler
#[derive(Error, Debug, Clone)]
pub enum ZenithError {
    #[error("Lexical error: {message}")]
    LexError { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Semantic error: {message}")]
    SemanticError { message: String },

    #[error("Code generation error: {message}")]
    CodegenError { message: String },

    #[error("Unsupported target architecture: {name}")]
    UnsupportedTarget { name: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Result type alias for Zenith compiler operations
pub type ZenithResult<T> = Result<T, ZenithError>;

impl ZenithError {
    pub fn lex_error(message: impl Into<String>) -> Self {
        Self::LexError { message: message.into() }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into() }
    }

    pub fn semantic_error(message: impl Into<String>) -> Self {
        Self::SemanticError { message: message.into() }
    }

    pub fn codegen_error(message: impl Into<String>) -> Self {
        Self::CodegenError { message: message.into() }
    }

    pub fn unsupported_target(name: impl Into<String>) -> Self {
        Self::UnsupportedTarget { name: name.into() }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::IoError { message: message.into() }
    }
}
