//! Diagnostic message handling for the Zenith compiler

use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for diagnostic messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// The compiler stage a diagnostic originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Lexer,
    Parser,
    Semantic,
    Codegen,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexer => write!(f, "lex"),
            Phase::Parser => write!(f, "parse"),
            Phase::Semantic => write!(f, "semantic"),
            Phase::Codegen => write!(f, "codegen"),
        }
    }
}

/// A diagnostic message with phase, location and severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(phase: Phase, message: impl Into<String>, span: Span) -> Self {
        Self {
            phase,
            severity: Severity::Error,
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn warning(phase: Phase, message: impl Into<String>, span: Span) -> Self {
        Self {
            phase,
            severity: Severity::Warning,
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.phase, self.span.start, self.severity, self.message
        )?;

        if let Some(help) = &self.help {
            write!(f, "\n  help: {}", help)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic messages accumulated by a stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.messages.push(diagnostic);
    }

    pub fn error(&mut self, phase: Phase, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::error(phase, message, span));
    }

    pub fn warning(&mut self, phase: Phase, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::warning(phase, message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn for_phase(&self, phase: Phase) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.messages.iter().filter(move |d| d.phase == phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.warning(Phase::Semantic, "unused variable 'x'", Span::empty());
        assert!(!diags.has_errors());

        diags.error(Phase::Semantic, "undefined identifier 'y'", Span::empty());
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn for_phase_partitions_messages() {
        let mut diags = Diagnostics::new();
        diags.error(Phase::Lexer, "unknown character '@'", Span::empty());
        diags.error(Phase::Semantic, "undefined type 'Foo'", Span::empty());
        assert_eq!(diags.for_phase(Phase::Lexer).count(), 1);
        assert_eq!(diags.for_phase(Phase::Semantic).count(), 1);
        assert_eq!(diags.for_phase(Phase::Codegen).count(), 0);
    }
}
