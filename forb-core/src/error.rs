//! Structured, user-facing errors
//!
//! Expression misuse (wrong arity, out-of-domain input, unknown names) is
//! reported to the caller as a `ForbError` value carrying a machine-readable
//! code and an optional suggestion.

use crate::NumberError;
use serde::{Deserialize, Serialize};

/// Codes carried by `ForbError::code`
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const DIV_ZERO: &str = "DIV_ZERO";
    pub const UNDEFINED_FUNC: &str = "UNDEFINED_FUNC";
    pub const UNDEFINED_CONST: &str = "UNDEFINED_CONST";
    pub const ARITY_MISMATCH: &str = "ARITY_MISMATCH";
    pub const DOMAIN_ERROR: &str = "DOMAIN_ERROR";
    pub const OVERFLOW: &str = "OVERFLOW";
    pub const PLUGIN_FAULT: &str = "PLUGIN_FAULT";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A plugin misbehaved; other results are unaffected
    Warning,
    /// The call itself was malformed or out of domain
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForbError {
    pub code: String,
    pub message: String,
    /// Usage line or "Similar: ..." hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub severity: Severity,
}

impl ForbError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            suggestion: None,
            notes: Vec::new(),
            severity: Severity::Error,
        }
    }

    pub fn with_suggestion(self, suggestion: impl Into<String>) -> Self {
        Self { suggestion: Some(suggestion.into()), ..self }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, format!("cannot parse {}", details.into()))
    }

    pub fn div_zero() -> Self {
        Self::new(codes::DIV_ZERO, "Division by zero")
    }

    pub fn undefined_func(name: &str) -> Self {
        Self::new(codes::UNDEFINED_FUNC, format!("Unknown function: {}", name))
    }

    pub fn undefined_const(name: &str) -> Self {
        Self::new(codes::UNDEFINED_CONST, format!("Unknown constant: {}", name))
    }

    /// `factorial() expects 1 argument, got 2`
    pub fn arity_mismatch(func: &str, expected: usize, got: usize) -> Self {
        let noun = match expected {
            1 => "argument",
            _ => "arguments",
        };
        Self::new(codes::ARITY_MISMATCH, format!("{}() expects {} {}, got {}", func, expected, noun, got))
    }

    pub fn domain_error(details: impl Into<String>) -> Self {
        Self::new(codes::DOMAIN_ERROR, format!("Domain error: {}", details.into()))
    }

    pub fn overflow(details: impl Into<String>) -> Self {
        Self::new(codes::OVERFLOW, format!("Overflow: {}", details.into()))
    }

    pub fn plugin_fault(capability: &str, reason: impl Into<String>) -> Self {
        let mut err = Self::new(codes::PLUGIN_FAULT, format!("Plugin '{}' failed: {}", capability, reason.into()));
        err.severity = Severity::Warning;
        err
    }
}

impl std::fmt::Display for ForbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suggestion {
            Some(hint) => write!(f, "[{}] {} (suggestion: {})", self.code, self.message, hint),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ForbError {}

impl From<NumberError> for ForbError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::ParseError(s) => Self::parse_error(s),
            NumberError::DivisionByZero => Self::div_zero(),
            NumberError::DomainError(s) => Self::domain_error(s),
            NumberError::Overflow => Self::overflow("result too large"),
        }
    }
}
