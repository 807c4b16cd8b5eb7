//! Resolved values and decoder interpretations
//!
//! A `CoreValue` is what a decoder resolves raw input into. Its `TypeTag`
//! decides which traits are eligible to observe it.

use crate::Number;
use serde::{Deserialize, Serialize};

/// Value kind used for trait eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Bytes,
    Text,
    Integer,
    Decimal,
    Bool,
    Currency,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Bytes => "bytes",
            TypeTag::Text => "text",
            TypeTag::Integer => "integer",
            TypeTag::Decimal => "decimal",
            TypeTag::Bool => "bool",
            TypeTag::Currency => "currency",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved, typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CoreValue {
    Bytes(Vec<u8>),
    Text(String),
    Integer(i128),
    Decimal(Number),
    Bool(bool),
    /// Amount in whole units (not cents) of an ISO-like currency code
    Currency { amount: Number, code: String },
}

impl CoreValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            CoreValue::Bytes(_) => TypeTag::Bytes,
            CoreValue::Text(_) => TypeTag::Text,
            CoreValue::Integer(_) => TypeTag::Integer,
            CoreValue::Decimal(_) => TypeTag::Decimal,
            CoreValue::Bool(_) => TypeTag::Bool,
            CoreValue::Currency { .. } => TypeTag::Currency,
        }
    }

    /// Size measure compared against trait cost gates.
    ///
    /// Byte and text values measure their length in bytes; scalars count
    /// the characters of their rendering.
    pub fn input_size(&self) -> usize {
        match self {
            CoreValue::Bytes(b) => b.len(),
            CoreValue::Text(s) => s.len(),
            CoreValue::Integer(i) => i.to_string().len(),
            CoreValue::Decimal(n) => n.to_string().len(),
            CoreValue::Bool(_) => 1,
            CoreValue::Currency { amount, .. } => amount.to_string().len(),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CoreValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CoreValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            CoreValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl std::fmt::Display for CoreValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreValue::Bytes(b) => {
                if b.len() <= 16 {
                    let hex: Vec<String> = b.iter().map(|x| format!("{:02x}", x)).collect();
                    write!(f, "[{}]", hex.join(" "))
                } else {
                    write!(f, "[{} bytes]", b.len())
                }
            }
            CoreValue::Text(s) => write!(f, "{}", s),
            CoreValue::Integer(i) => write!(f, "{}", i),
            CoreValue::Decimal(n) => write!(f, "{}", n),
            CoreValue::Bool(b) => write!(f, "{}", b),
            CoreValue::Currency { amount, code } => write!(f, "{} {}", amount, code),
        }
    }
}

impl From<&str> for CoreValue {
    fn from(s: &str) -> Self {
        CoreValue::Text(s.to_string())
    }
}

impl From<String> for CoreValue {
    fn from(s: String) -> Self {
        CoreValue::Text(s)
    }
}

impl From<Vec<u8>> for CoreValue {
    fn from(b: Vec<u8>) -> Self {
        CoreValue::Bytes(b)
    }
}

impl From<i128> for CoreValue {
    fn from(i: i128) -> Self {
        CoreValue::Integer(i)
    }
}

impl From<Number> for CoreValue {
    fn from(n: Number) -> Self {
        CoreValue::Decimal(n)
    }
}

/// One candidate decoding of raw input.
///
/// Immutable once created: the fields are read through accessors and the
/// only transformation is `with_source`, which the dispatcher uses to stamp
/// the producing decoder's id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpretation {
    value: CoreValue,
    confidence: f64,
    description: String,
    source_decoder: String,
}

impl Interpretation {
    /// Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn new(value: CoreValue, confidence: f64, description: impl Into<String>) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            value,
            confidence,
            description: description.into(),
            source_decoder: String::new(),
        }
    }

    pub fn with_source(mut self, decoder_id: impl Into<String>) -> Self {
        self.source_decoder = decoder_id.into();
        self
    }

    pub fn value(&self) -> &CoreValue {
        &self.value
    }

    pub fn into_value(self) -> CoreValue {
        self.value
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn source_decoder(&self) -> &str {
        &self.source_decoder
    }
}
